//! Domain model shared across GMQ crates
//!
//! Identifiers, resolved tracks and the persisted playlist records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder shown when no thumbnail can be derived for a track
pub const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/150";

/// Chat-platform guild (server) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

/// Chat-platform user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GuildId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(GuildId)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

/// A resolved, playable track
///
/// Immutable once resolved; the session only ever replaces whole tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Display title
    pub title: String,

    /// Source URI (also the identity used for duplicate detection)
    pub uri: String,

    /// Duration in seconds
    pub duration_secs: u64,

    /// Thumbnail URL reported by the resolver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// User who requested the track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<UserId>,

    /// Opaque backend handle used to replay the track without re-resolving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded: Option<String>,
}

impl Track {
    /// Create a track with no thumbnail, requester or backend handle
    pub fn new(title: impl Into<String>, uri: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
            duration_secs,
            thumbnail: None,
            requester: None,
            encoded: None,
        }
    }

    /// Same track, attributed to `requester`
    pub fn requested_by(mut self, requester: UserId) -> Self {
        self.requester = Some(requester);
        self
    }

    /// YouTube video id embedded in the uri (`v=` or `youtu.be/` form)
    pub fn youtube_video_id(&self) -> Option<&str> {
        let rest = if let Some(pos) = self.uri.find("v=") {
            &self.uri[pos + 2..]
        } else if let Some(pos) = self.uri.find("youtu.be/") {
            &self.uri[pos + "youtu.be/".len()..]
        } else {
            return None;
        };

        let id_len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .count();

        if id_len >= 11 {
            Some(&rest[..11])
        } else {
            None
        }
    }

    /// Thumbnail for display: the resolver's, else one derived from the
    /// video id, else the placeholder.
    pub fn derive_thumbnail_url(&self) -> String {
        if let Some(thumbnail) = self.thumbnail.as_deref().filter(|t| !t.is_empty()) {
            return thumbnail.to_string();
        }
        match self.youtube_video_id() {
            Some(id) => format!("https://img.youtube.com/vi/{}/0.jpg", id),
            None => PLACEHOLDER_THUMBNAIL.to_string(),
        }
    }
}

/// A track as stored in a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub title: String,
    pub url: String,
}

impl From<&Track> for PlaylistTrack {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            url: track.uri.clone(),
        }
    }
}

/// Persisted playlist record
///
/// Invariant: no two entries of `tracks` share a url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    /// Name, unique per owner (case-insensitive)
    pub name: String,

    /// Owner user id
    pub owner_id: UserId,

    /// Public playlists are visible to, and mutable by, every user
    #[serde(default)]
    pub is_public: bool,

    /// Ordered track list
    #[serde(default)]
    pub tracks: Vec<PlaylistTrack>,
}

impl PlaylistRecord {
    /// Case-insensitive name comparison
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Whether a track with this url is already present
    pub fn contains_url(&self, url: &str) -> bool {
        self.tracks.iter().any(|t| t.url == url)
    }

    /// Visible and playable by `user`
    pub fn visible_to(&self, user: UserId) -> bool {
        self.is_public || self.owner_id == user
    }

    /// Mutable by `user` (public playlists are mutable by anyone)
    pub fn mutable_by(&self, user: UserId) -> bool {
        self.visible_to(user)
    }
}
