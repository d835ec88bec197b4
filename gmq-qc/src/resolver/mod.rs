//! Query resolution
//!
//! Turns free text or URLs into playable [`Track`]s. Thumbnail derivation
//! lives here too so tests can observe how often a session asks for one.

pub mod lavalink;

use crate::error::Result;
use async_trait::async_trait;
use gmq_common::Track;

/// Search prefix for plain-text queries
pub const SEARCH_PREFIX: &str = "ytsearch:";

/// What a user query refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Platform playlist URL (contains `list=`)
    PlatformPlaylist(String),
    /// Direct track URL
    Url(String),
    /// Free-text search, already prefixed with [`SEARCH_PREFIX`]
    Search(String),
}

impl QueryKind {
    /// Classify a raw query
    ///
    /// Playlist detection wins over URL detection, so a watch URL that also
    /// carries a `list=` parameter enqueues the whole playlist.
    pub fn classify(query: &str) -> Self {
        let query = query.trim();
        if query.contains("list=") {
            QueryKind::PlatformPlaylist(query.to_string())
        } else if query.starts_with("http://") || query.starts_with("https://") {
            QueryKind::Url(query.to_string())
        } else {
            QueryKind::Search(format!("{}{}", SEARCH_PREFIX, query))
        }
    }

    /// Identifier to hand to the resolver
    pub fn identifier(&self) -> &str {
        match self {
            QueryKind::PlatformPlaylist(s) | QueryKind::Url(s) | QueryKind::Search(s) => s,
        }
    }
}

/// Track resolver interface
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// All tracks matching `query` (URL or search), best match first
    async fn search(&self, query: &str) -> Result<Vec<Track>>;

    /// Best match for `query`, if any
    async fn search_first(&self, query: &str) -> Result<Option<Track>> {
        Ok(self.search(query).await?.into_iter().next())
    }

    /// Ordered entries of a platform playlist
    async fn extract_playlist(&self, url: &str) -> Result<Vec<Track>>;

    /// Display thumbnail for `track`
    async fn thumbnail(&self, track: &Track) -> String {
        track.derive_thumbnail_url()
    }
}
