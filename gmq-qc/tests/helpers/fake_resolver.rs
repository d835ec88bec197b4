//! Scripted track resolver
//!
//! Answers from a fixed table and counts thumbnail derivations.

use async_trait::async_trait;
use gmq_common::Track;
use gmq_qc::resolver::TrackResolver;
use gmq_qc::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedResolver {
    results: Mutex<HashMap<String, Vec<Track>>>,
    playlists: Mutex<HashMap<String, Vec<Track>>>,
    thumbnail_calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `track` findable by its uri and by its title
    pub fn with_track(self, track: Track) -> Self {
        {
            let mut results = self.results.lock().unwrap();
            results.insert(track.uri.clone(), vec![track.clone()]);
            results.insert(track.title.clone(), vec![track]);
        }
        self
    }

    pub fn with_playlist(self, url: &str, tracks: Vec<Track>) -> Self {
        self.playlists
            .lock()
            .unwrap()
            .insert(url.to_string(), tracks);
        self
    }

    pub fn thumbnail_calls(&self) -> usize {
        self.thumbnail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackResolver for ScriptedResolver {
    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(query.trim())
            .cloned()
            .unwrap_or_default())
    }

    async fn extract_playlist(&self, url: &str) -> Result<Vec<Track>> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .get(url.trim())
            .cloned()
            .unwrap_or_default())
    }

    async fn thumbnail(&self, track: &Track) -> String {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        track.derive_thumbnail_url()
    }
}
