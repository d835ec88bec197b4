//! Queue and playlist change type definitions

use serde::{Deserialize, Serialize};

/// How a track reached the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EnqueueSource {
    /// Ad-hoc play command (search text or direct URL)
    Direct,
    /// Stored playlist selected by the user
    Playlist,
    /// Platform playlist URL expanded by the resolver
    PlatformPlaylist,
}

impl std::fmt::Display for EnqueueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueSource::Direct => write!(f, "Direct"),
            EnqueueSource::Playlist => write!(f, "Playlist"),
            EnqueueSource::PlatformPlaylist => write!(f, "PlatformPlaylist"),
        }
    }
}

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    UserEnqueue,
    Skip,
    TrackCompletion,
    Stop,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::Skip => write!(f, "Skip"),
            QueueChangeTrigger::TrackCompletion => write!(f, "TrackCompletion"),
            QueueChangeTrigger::Stop => write!(f, "Stop"),
        }
    }
}

/// Playlist mutation kinds reported on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlaylistChange {
    Created,
    TrackAdded,
    TrackRemoved,
    Renamed,
    Cleared,
    Deleted,
    VisibilityChanged,
}

impl std::fmt::Display for PlaylistChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistChange::Created => write!(f, "Created"),
            PlaylistChange::TrackAdded => write!(f, "TrackAdded"),
            PlaylistChange::TrackRemoved => write!(f, "TrackRemoved"),
            PlaylistChange::Renamed => write!(f, "Renamed"),
            PlaylistChange::Cleared => write!(f, "Cleared"),
            PlaylistChange::Deleted => write!(f, "Deleted"),
            PlaylistChange::VisibilityChanged => write!(f, "VisibilityChanged"),
        }
    }
}
