//! Test helper modules for gmq-qc integration tests
//!
//! Provides reusable test infrastructure components:
//! - RecordingBackend: audio backend that records control calls
//! - ScriptedResolver: resolver answering from a fixed table
//! - MemoryPersistence: playlist persistence with injectable failures

#![allow(dead_code)]

pub mod fake_backend;
pub mod fake_resolver;
pub mod memory_store;

pub use fake_backend::{BackendCall, RecordingBackend};
pub use fake_resolver::ScriptedResolver;
pub use memory_store::MemoryPersistence;

use gmq_common::events::EventBus;
use gmq_common::{GuildId, Track};
use gmq_qc::backend::VoiceConnection;
use gmq_qc::session::{SessionRegistry, SessionSettings};
use std::sync::Arc;
use std::time::Duration;

pub const GUILD: GuildId = GuildId(1001);

/// Track with a YouTube-style uri derived from `id` (padded to 11 chars)
pub fn track(id: &str) -> Track {
    Track::new(
        format!("Track {}", id),
        format!("https://www.youtube.com/watch?v={:_<11}", id),
        180,
    )
}

pub fn voice() -> VoiceConnection {
    VoiceConnection {
        channel_id: 555,
        token: "token".to_string(),
        endpoint: "voice.example:443".to_string(),
        session_id: "voice-session".to_string(),
    }
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        grace_period: Duration::from_secs(5),
        backend_timeout: Duration::from_secs(5),
        default_volume: 100,
        reject_duplicate_urls: false,
        mailbox_capacity: 16,
    }
}

/// Registry wired to fresh fakes
pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub backend: Arc<RecordingBackend>,
    pub resolver: Arc<ScriptedResolver>,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_settings(), ScriptedResolver::new())
    }

    pub fn with(settings: SessionSettings, resolver: ScriptedResolver) -> Self {
        let backend = Arc::new(RecordingBackend::new());
        let resolver = Arc::new(resolver);
        let events = EventBus::new(256);
        let registry = Arc::new(SessionRegistry::new(
            backend.clone(),
            resolver.clone(),
            events.clone(),
            settings,
        ));
        Self {
            registry,
            backend,
            resolver,
            events,
        }
    }
}

/// Let spawned actors run until `guild` has no session (bounded)
pub async fn wait_for_session_gone(registry: &SessionRegistry, guild: GuildId) -> bool {
    for _ in 0..100 {
        if !registry.contains(guild).await && registry.len().await == 0 {
            return true;
        }
        tokio::task::yield_now().await;
    }
    false
}
