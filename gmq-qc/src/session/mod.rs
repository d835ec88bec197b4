//! Per-guild playback sessions
//!
//! Each guild with an active player gets one [`PlaybackSession`] owned by a
//! single actor task ([`actor`]). Commands from users and track-ended
//! notifications from the backend are delivered through the same mailbox,
//! so all mutations of a session are serialized without locks.
//!
//! The [`SessionRegistry`] maps guild ids to live actors and creates them on
//! the first play-type command.

pub mod actor;
pub mod registry;
pub mod state;

pub use actor::SessionHandle;
pub use registry::SessionRegistry;
pub use state::{
    BulkPlayOutcome, ControlSurface, ExtremeOutcome, PlayOutcome, PlaybackSession,
    SessionSnapshot, StopOutcome, TrackEndOutcome, VolumeChange,
};

use gmq_common::config::SessionSection;
use std::time::Duration;

/// Lowest user-facing volume
pub const MIN_VOLUME: u16 = 1;

/// Highest user-facing volume
pub const MAX_VOLUME: u16 = 100;

/// Step used by the volume up/down controls
pub const VOLUME_STEP: i64 = 10;

/// Tunables shared by every session of the process
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Delay between queue exhaustion and automatic teardown
    pub grace_period: Duration,
    /// Per-call backend acknowledgement timeout
    pub backend_timeout: Duration,
    /// Volume a new session starts with
    pub default_volume: u16,
    /// Reject tracks whose url is already current or queued
    pub reject_duplicate_urls: bool,
    /// Mailbox depth of each session actor
    pub mailbox_capacity: usize,
}

impl SessionSettings {
    pub fn from_config(session: &SessionSection, backend_timeout_ms: u64) -> Self {
        Self {
            grace_period: Duration::from_millis(session.grace_period_ms),
            backend_timeout: Duration::from_millis(backend_timeout_ms),
            default_volume: session.default_volume.clamp(MIN_VOLUME, MAX_VOLUME),
            reject_duplicate_urls: session.reject_duplicate_urls,
            ..Default::default()
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            backend_timeout: Duration::from_secs(5),
            default_volume: MAX_VOLUME,
            reject_duplicate_urls: false,
            mailbox_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config_clamps_volume() {
        let section = SessionSection {
            grace_period_ms: 250,
            default_volume: 400,
            reject_duplicate_urls: true,
            event_capacity: 10,
        };
        let settings = SessionSettings::from_config(&section, 1200);

        assert_eq!(settings.grace_period, Duration::from_millis(250));
        assert_eq!(settings.backend_timeout, Duration::from_millis(1200));
        assert_eq!(settings.default_volume, 100);
        assert!(settings.reject_duplicate_urls);
    }
}
