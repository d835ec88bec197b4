//! Event types for the GMQ event system
//!
//! Provides shared event definitions and the EventBus used by the session
//! actors, the playlist store and the SSE stream.

// Sub-modules (supporting types)
mod playback_types;
mod queue_types;

pub use playback_types::PlaybackState;
pub use queue_types::{EnqueueSource, PlaylistChange, QueueChangeTrigger};

use crate::model::{GuildId, Track, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// GMQ event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// The excluded chat UI layer renders its control surfaces from these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GmqEvent {
    /// A playback session was created for a guild
    SessionCreated {
        guild_id: GuildId,
        /// Instance id, distinguishes successive sessions of one guild
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A playback session ended (explicit stop or idle teardown)
    SessionDestroyed {
        guild_id: GuildId,
        session_id: Uuid,
        /// Human-readable cause ("stopped", "idle")
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track became the current track
    ///
    /// Triggers:
    /// - SSE: Update now-playing display
    TrackStarted {
        guild_id: GuildId,
        track: Track,
        /// Tracks waiting after this one
        queue_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was appended to the queue
    TrackEnqueued {
        guild_id: GuildId,
        track: Track,
        /// Position in queue (0-based)
        position: usize,
        source: EnqueueSource,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue changed
    QueueChanged {
        guild_id: GuildId,
        queue_len: usize,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback state changed
    PlaybackStateChanged {
        guild_id: GuildId,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed (user-facing 1-100 scale)
    VolumeChanged {
        guild_id: GuildId,
        volume: u16,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Loop mode toggled
    LoopToggled {
        guild_id: GuildId,
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Control surface content should be replaced
    ///
    /// NOTE: Carries everything the UI layer needs to redraw the surface,
    /// so no follow-up query is required.
    SurfaceUpdated {
        guild_id: GuildId,
        /// Opaque surface reference supplied by the UI layer
        surface: String,
        track: Track,
        thumbnail: String,
        volume: u16,
        loop_enabled: bool,
        queue_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Control surface released; the UI layer should delete it
    SurfaceReleased {
        guild_id: GuildId,
        surface: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stored playlist changed
    PlaylistChanged {
        owner_id: UserId,
        name: String,
        change: PlaylistChange,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GmqEvent {
    /// Guild the event belongs to (None for playlist events)
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            GmqEvent::SessionCreated { guild_id, .. }
            | GmqEvent::SessionDestroyed { guild_id, .. }
            | GmqEvent::TrackStarted { guild_id, .. }
            | GmqEvent::TrackEnqueued { guild_id, .. }
            | GmqEvent::QueueChanged { guild_id, .. }
            | GmqEvent::PlaybackStateChanged { guild_id, .. }
            | GmqEvent::VolumeChanged { guild_id, .. }
            | GmqEvent::LoopToggled { guild_id, .. }
            | GmqEvent::SurfaceUpdated { guild_id, .. }
            | GmqEvent::SurfaceReleased { guild_id, .. } => Some(*guild_id),
            GmqEvent::PlaylistChanged { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use gmq_common::events::{EventBus, GmqEvent};
/// use gmq_common::GuildId;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(GmqEvent::LoopToggled {
///     guild_id: GuildId(1),
///     enabled: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(GmqEvent::LoopToggled { enabled: true, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GmqEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<GmqEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GmqEvent,
    ) -> Result<usize, broadcast::error::SendError<GmqEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GmqEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        let result = bus.emit(GmqEvent::LoopToggled {
            guild_id: GuildId(1),
            enabled: false,
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(GmqEvent::VolumeChanged {
            guild_id: GuildId(9),
            volume: 40,
            timestamp: chrono::Utc::now(),
        });

        match rx.try_recv() {
            Ok(GmqEvent::VolumeChanged { guild_id, volume, .. }) => {
                assert_eq!(guild_id, GuildId(9));
                assert_eq!(volume, 40);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = GmqEvent::SurfaceReleased {
            guild_id: GuildId(5),
            surface: "msg-1".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SurfaceReleased");
        assert_eq!(json["guild_id"], 5);
        assert_eq!(event.guild_id(), Some(GuildId(5)));
    }

    #[test]
    fn test_playlist_event_has_no_guild() {
        let event = GmqEvent::PlaylistChanged {
            owner_id: UserId(1),
            name: "Chill".to_string(),
            change: PlaylistChange::Created,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.guild_id(), None);
    }
}
