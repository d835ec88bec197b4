//! Audio backend client interface
//!
//! The backend decodes and streams audio into a guild's voice channel. This
//! service only drives it: one control interface per process, addressed by
//! guild, plus an asynchronous "track ended" notification that is fed back
//! into the owning session's mailbox.
//!
//! All control calls are asynchronous I/O. Sessions wrap every call in
//! [`with_timeout`] so a backend that never acknowledges fails the command
//! instead of wedging the session.

pub mod lavalink;

use crate::error::{Error, Result};
use async_trait::async_trait;
use gmq_common::{GuildId, Track};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub use lavalink::LavalinkClient;

/// Backend volume used by the extreme volume preset (normal range is 1-100)
pub const EXTREME_VOLUME: u16 = 500;

/// Upper bound accepted by the backend volume control
pub const MAX_BACKEND_VOLUME: u16 = 1000;

/// 15-band bass boost preset applied together with [`EXTREME_VOLUME`]
pub const BASS_BOOST_PRESET: [(u8, f32); 15] = [
    (0, 0.5),
    (1, 0.45),
    (2, 0.40),
    (3, 0.30),
    (4, 0.20),
    (5, 0.00),
    (6, -0.10),
    (7, -0.20),
    (8, -0.30),
    (9, -0.20),
    (10, -0.10),
    (11, 0.00),
    (12, 0.00),
    (13, 0.00),
    (14, 0.00),
];

/// Voice connection details forwarded by the chat gateway layer
///
/// The gateway itself is out of scope; the UI layer passes along what the
/// platform told it about the user's voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConnection {
    /// Voice channel the user is connected to
    pub channel_id: u64,
    /// Voice server token
    #[serde(default)]
    pub token: String,
    /// Voice server endpoint
    #[serde(default)]
    pub endpoint: String,
    /// Voice session id of the bot user
    #[serde(default)]
    pub session_id: String,
}

/// One equalizer band setting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerBand {
    pub band: u8,
    pub gain: f32,
}

/// Structured control messages sent over the backend's control channel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Replace the equalizer with the given bands
    Equalizer(Vec<EqualizerBand>),
}

impl ControlMessage {
    /// The bass boost preset as an equalizer message
    pub fn bass_boost() -> Self {
        ControlMessage::Equalizer(
            BASS_BOOST_PRESET
                .iter()
                .map(|&(band, gain)| EqualizerBand { band, gain })
                .collect(),
        )
    }
}

/// Why the backend stopped rendering a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    /// Reached the end of the track
    #[default]
    Finished,
    /// Track failed to load or decode
    LoadFailed,
    /// Stopped by a control call
    Stopped,
    /// Replaced by another play call
    Replaced,
    /// Player was cleaned up
    Cleanup,
}

impl std::fmt::Display for TrackEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackEndReason::Finished => write!(f, "finished"),
            TrackEndReason::LoadFailed => write!(f, "loadFailed"),
            TrackEndReason::Stopped => write!(f, "stopped"),
            TrackEndReason::Replaced => write!(f, "replaced"),
            TrackEndReason::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Control interface of the audio backend
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Join the voice channel and create the guild's player
    async fn connect(&self, guild: GuildId, voice: &VoiceConnection) -> Result<()>;

    /// Start rendering `track`, replacing whatever is playing
    async fn play(&self, guild: GuildId, track: &Track) -> Result<()>;

    /// Stop rendering the current track
    async fn stop(&self, guild: GuildId) -> Result<()>;

    async fn set_pause(&self, guild: GuildId, paused: bool) -> Result<()>;

    /// Set backend volume (0-1000, 100 is unity)
    async fn set_volume(&self, guild: GuildId, volume: u16) -> Result<()>;

    /// Send a structured control message (equalizer)
    async fn send_control(&self, guild: GuildId, message: ControlMessage) -> Result<()>;

    /// Leave the voice channel and destroy the guild's player
    async fn disconnect(&self, guild: GuildId) -> Result<()>;
}

/// Await a backend call, failing with `BackendTimeout` after `timeout`
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::BackendTimeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bass_boost_shape() {
        let ControlMessage::Equalizer(bands) = ControlMessage::bass_boost();
        assert_eq!(bands.len(), 15);
        assert_eq!(bands[0], EqualizerBand { band: 0, gain: 0.5 });
        assert_eq!(bands[8].gain, -0.30);
        assert!(bands.iter().enumerate().all(|(i, b)| b.band as usize == i));
    }

    #[test]
    fn test_end_reason_wire_names() {
        let reason: TrackEndReason = serde_json::from_str("\"loadFailed\"").unwrap();
        assert_eq!(reason, TrackEndReason::LoadFailed);
        assert_eq!(serde_json::to_string(&TrackEndReason::Finished).unwrap(), "\"finished\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let result: Result<()> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::BackendTimeout(50))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
