//! Error types for gmq-qc
//!
//! One enum covers the whole failure taxonomy of the controller. Every
//! variant maps to an HTTP status in `status_code`, and `kind` gives the UI
//! layer a stable machine-readable name.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for gmq-qc
#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------
    // User input errors: reported to the issuing user, no state change
    // ------------------------------------------------------------------
    /// Play-type command from a user who is not in a voice channel
    #[error("You must be in a voice channel")]
    NoVoiceChannel,

    /// Malformed volume value
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    /// Index does not address an existing playlist track
    #[error("Index {index} out of range (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Other malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Track url already current or queued (only with duplicate rejection on)
    #[error("Already in queue: {0}")]
    DuplicateInQueue(String),

    // ------------------------------------------------------------------
    // Resolution failures
    // ------------------------------------------------------------------
    /// Resolver returned nothing for the query
    #[error("No results found for: {0}")]
    NotFound(String),

    /// Resolver itself failed
    #[error("Resolver error: {0}")]
    Resolver(String),

    // ------------------------------------------------------------------
    // Backend errors: not retried, user re-issues after reconnecting
    // ------------------------------------------------------------------
    /// No live control link for the guild
    #[error("Audio backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend rejected or failed a control call
    #[error("Audio backend error: {0}")]
    Backend(String),

    /// Backend did not acknowledge within the configured timeout
    #[error("Audio backend timed out after {0} ms")]
    BackendTimeout(u64),

    // ------------------------------------------------------------------
    // Session state errors
    // ------------------------------------------------------------------
    /// Skip with nothing playing (or after stop)
    #[error("Nothing is playing")]
    NothingPlaying,

    /// Pause/volume/etc. without an active session or backend link
    #[error("The player is not active")]
    NotPlaying,

    /// Skip with an empty queue
    #[error("There are no other tracks in the queue")]
    EmptyQueue,

    /// The session finished while the command was in flight
    #[error("Session closed for guild {0}")]
    SessionClosed(u64),

    // ------------------------------------------------------------------
    // Playlist errors
    // ------------------------------------------------------------------
    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    /// Private playlist of another user
    #[error("You are not the owner of playlist {0}")]
    Forbidden(String),

    #[error("A playlist named {0} already exists")]
    NameTaken(String),

    /// Playlist has no playable tracks
    #[error("Playlist {0} is empty")]
    EmptyPlaylist(String),

    /// Durable write failed after all retries
    #[error("Failed to persist playlists: {0}")]
    Persistence(String),

    // ------------------------------------------------------------------
    // Privileged commands
    // ------------------------------------------------------------------
    #[error("Invalid secret key")]
    InvalidSecret,

    #[error("Privileged commands are disabled")]
    PrivilegedDisabled,

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NoVoiceChannel
            | Error::InvalidVolume(_)
            | Error::IndexOutOfRange { .. }
            | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) | Error::PlaylistNotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateInQueue(_)
            | Error::NothingPlaying
            | Error::NotPlaying
            | Error::EmptyQueue
            | Error::SessionClosed(_)
            | Error::NameTaken(_)
            | Error::EmptyPlaylist(_) => StatusCode::CONFLICT,
            Error::Forbidden(_) | Error::InvalidSecret | Error::PrivilegedDisabled => {
                StatusCode::FORBIDDEN
            }
            Error::Resolver(_) | Error::Backend(_) => StatusCode::BAD_GATEWAY,
            Error::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Persistence(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error name
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NoVoiceChannel => "no_voice_channel",
            Error::InvalidVolume(_) => "invalid_volume",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
            Error::InvalidInput(_) => "invalid_input",
            Error::DuplicateInQueue(_) => "duplicate_in_queue",
            Error::NotFound(_) => "not_found",
            Error::Resolver(_) => "resolver_error",
            Error::BackendUnavailable(_) => "backend_unavailable",
            Error::Backend(_) => "backend_error",
            Error::BackendTimeout(_) => "backend_timeout",
            Error::NothingPlaying => "nothing_playing",
            Error::NotPlaying => "not_playing",
            Error::EmptyQueue => "empty_queue",
            Error::SessionClosed(_) => "session_closed",
            Error::PlaylistNotFound(_) => "playlist_not_found",
            Error::Forbidden(_) => "forbidden",
            Error::NameTaken(_) => "name_taken",
            Error::EmptyPlaylist(_) => "empty_playlist",
            Error::Persistence(_) => "persistence_failure",
            Error::InvalidSecret => "invalid_secret",
            Error::PrivilegedDisabled => "privileged_disabled",
            Error::Config(_) => "config_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<gmq_common::Error> for Error {
    fn from(e: gmq_common::Error) -> Self {
        match e {
            gmq_common::Error::Config(msg) => Error::Config(msg),
            gmq_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            other => Error::Internal(other.to_string()),
        }
    }
}

/// Convenience Result type using gmq-qc Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_bad_request() {
        assert_eq!(Error::NoVoiceChannel.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::IndexOutOfRange { index: 4, len: 2 }.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_backend_errors_map_to_gateway_statuses() {
        assert_eq!(Error::BackendTimeout(5000).status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            Error::BackendUnavailable("no session".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Error::EmptyQueue.kind(), "empty_queue");
        assert_eq!(Error::Persistence("disk full".into()).kind(), "persistence_failure");
    }

    #[test]
    fn test_common_error_conversion() {
        let err: Error = gmq_common::Error::Config("bad".into()).into();
        assert!(matches!(err, Error::Config(_)));
    }
}
