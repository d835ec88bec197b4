//! Query resolution through the Lavalink `/v4/loadtracks` endpoint

use super::TrackResolver;
use crate::backend::LavalinkClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use gmq_common::Track;
use serde::Deserialize;
use tracing::debug;

/// Body of a `/v4/loadtracks` response
#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResult {
    Track(LavalinkTrack),
    Playlist(LavalinkPlaylist),
    Search(Vec<LavalinkTrack>),
    Empty(serde_json::Value),
    Error(LoadError),
}

#[derive(Debug, Deserialize)]
struct LavalinkTrack {
    encoded: String,
    info: TrackInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackInfo {
    title: String,
    /// Length in milliseconds
    length: u64,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    artwork_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LavalinkPlaylist {
    tracks: Vec<LavalinkTrack>,
}

#[derive(Debug, Deserialize)]
struct LoadError {
    message: Option<String>,
    #[serde(default)]
    severity: String,
}

impl From<LavalinkTrack> for Track {
    fn from(t: LavalinkTrack) -> Self {
        let uri = t.info.uri.unwrap_or(t.info.identifier);
        let mut track = Track::new(t.info.title, uri, t.info.length / 1000);
        track.thumbnail = t.info.artwork_url;
        track.encoded = Some(t.encoded);
        track
    }
}

impl LoadResult {
    fn into_tracks(self) -> Result<Vec<Track>> {
        match self {
            LoadResult::Track(track) => Ok(vec![track.into()]),
            LoadResult::Playlist(playlist) => {
                Ok(playlist.tracks.into_iter().map(Track::from).collect())
            }
            LoadResult::Search(tracks) => Ok(tracks.into_iter().map(Track::from).collect()),
            LoadResult::Empty(_) => Ok(Vec::new()),
            LoadResult::Error(e) => Err(Error::Resolver(format!(
                "{} ({})",
                e.message.unwrap_or_else(|| "load failed".to_string()),
                e.severity
            ))),
        }
    }
}

impl LavalinkClient {
    async fn load_tracks(&self, identifier: &str) -> Result<Vec<Track>> {
        let url = format!("{}/v4/loadtracks", self.base_url());
        debug!(identifier = %identifier, "Resolving through Lavalink");

        let response = self
            .http()
            .get(&url)
            .query(&[("identifier", identifier)])
            .header("Authorization", self.password())
            .send()
            .await
            .map_err(|e| Error::Resolver(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Resolver(format!("{} {}", status.as_u16(), error_text)));
        }

        let result: LoadResult = response
            .json()
            .await
            .map_err(|e| Error::Resolver(format!("Unexpected loadtracks body: {}", e)))?;

        result.into_tracks()
    }
}

#[async_trait]
impl TrackResolver for LavalinkClient {
    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        let identifier = super::QueryKind::classify(query);
        self.load_tracks(identifier.identifier()).await
    }

    async fn extract_playlist(&self, url: &str) -> Result<Vec<Track>> {
        self.load_tracks(url.trim()).await
    }
}
