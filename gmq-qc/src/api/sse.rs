//! Server-Sent Events (SSE) broadcaster
//!
//! Streams every `GmqEvent` to connected clients. The UI layer redraws and
//! deletes control surfaces from `SurfaceUpdated` / `SurfaceReleased`.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use gmq_common::events::GmqEvent;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = ctx.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event_type_str(&event)).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged receivers skip ahead
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// SSE `event:` field for a GmqEvent
fn event_type_str(event: &GmqEvent) -> &'static str {
    match event {
        GmqEvent::SessionCreated { .. } => "SessionCreated",
        GmqEvent::SessionDestroyed { .. } => "SessionDestroyed",
        GmqEvent::TrackStarted { .. } => "TrackStarted",
        GmqEvent::TrackEnqueued { .. } => "TrackEnqueued",
        GmqEvent::QueueChanged { .. } => "QueueChanged",
        GmqEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
        GmqEvent::VolumeChanged { .. } => "VolumeChanged",
        GmqEvent::LoopToggled { .. } => "LoopToggled",
        GmqEvent::SurfaceUpdated { .. } => "SurfaceUpdated",
        GmqEvent::SurfaceReleased { .. } => "SurfaceReleased",
        GmqEvent::PlaylistChanged { .. } => "PlaylistChanged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmq_common::GuildId;

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = GmqEvent::LoopToggled {
            guild_id: GuildId(1),
            enabled: true,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event_type_str(&event));
    }
}
