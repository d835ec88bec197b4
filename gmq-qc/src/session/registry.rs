//! Session registry
//!
//! Process-wide map of guild id to session actor. Sessions are created by
//! the first play-type command of a guild and remove themselves when they
//! finish. Every other command is routed to an existing session only.

use super::actor::{self, SessionHandle, SessionMap};
use super::state::{
    BulkPlayOutcome, ControlSurface, ExtremeOutcome, PlaybackSession, SessionSnapshot,
    StopOutcome, TrackEndOutcome, VolumeChange,
};
use super::SessionSettings;
use crate::backend::{AudioBackend, TrackEndReason, VoiceConnection};
use crate::error::{Error, Result};
use crate::resolver::TrackResolver;
use gmq_common::events::{EnqueueSource, EventBus, GmqEvent};
use gmq_common::{GuildId, Track};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SessionRegistry {
    sessions: SessionMap,
    backend: Arc<dyn AudioBackend>,
    resolver: Arc<dyn TrackResolver>,
    events: EventBus,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        resolver: Arc<dyn TrackResolver>,
        events: EventBus,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            resolver,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Handle of the live session for `guild`, if any
    pub async fn get(&self, guild: GuildId) -> Option<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&guild)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    pub async fn contains(&self, guild: GuildId) -> bool {
        self.get(guild).await.is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn get_or_create(&self, guild: GuildId) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(&guild).filter(|h| !h.is_closed()) {
            return handle.clone();
        }

        let session_id = Uuid::new_v4();
        let session = PlaybackSession::new(
            guild,
            session_id,
            Arc::clone(&self.backend),
            Arc::clone(&self.resolver),
            self.events.clone(),
            self.settings.clone(),
        );
        let handle = actor::spawn(
            session,
            Arc::clone(&self.sessions),
            self.events.clone(),
            self.settings.mailbox_capacity,
        );
        sessions.insert(guild, handle.clone());

        info!(guild = %guild, session_id = %session_id, "Session created");
        self.events.emit_lossy(GmqEvent::SessionCreated {
            guild_id: guild,
            session_id,
            timestamp: chrono::Utc::now(),
        });

        handle
    }

    /// Remove `handle` if it is still the registered session of its guild
    async fn evict(&self, handle: &SessionHandle) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(&handle.guild_id())
            .is_some_and(|h| h.session_id() == handle.session_id())
        {
            sessions.remove(&handle.guild_id());
        }
    }

    // ========================================
    // Play-type commands
    // ========================================

    /// Play or enqueue `tracks`, creating the session if needed
    ///
    /// A session that finished while the request was in flight is replaced
    /// by a fresh one and the request is retried once.
    pub async fn play(
        &self,
        guild: GuildId,
        tracks: Vec<Track>,
        source: EnqueueSource,
        voice: Option<VoiceConnection>,
        surface: Option<ControlSurface>,
    ) -> Result<BulkPlayOutcome> {
        if tracks.is_empty() {
            return Err(Error::InvalidInput("no tracks to play".to_string()));
        }
        if voice.is_none() && !self.contains(guild).await {
            return Err(Error::NoVoiceChannel);
        }

        let mut retried = false;
        loop {
            let handle = self.get_or_create(guild).await;
            match handle
                .play(tracks.clone(), source, voice.clone(), surface.clone())
                .await
            {
                Err(Error::SessionClosed(_)) if !retried => {
                    debug!(guild = %guild, "Session closed during play, retrying on a new one");
                    self.evict(&handle).await;
                    retried = true;
                }
                result => return result,
            }
        }
    }

    // ========================================
    // Commands on an existing session
    // ========================================

    pub async fn skip(&self, guild: GuildId) -> Result<Track> {
        let handle = self.get(guild).await.ok_or(Error::NothingPlaying)?;
        handle.skip().await
    }

    pub async fn toggle_pause(&self, guild: GuildId) -> Result<bool> {
        let handle = self.get(guild).await.ok_or(Error::NotPlaying)?;
        handle.toggle_pause().await
    }

    pub async fn toggle_loop(&self, guild: GuildId) -> Result<bool> {
        let handle = self.get(guild).await.ok_or(Error::NotPlaying)?;
        handle.toggle_loop().await
    }

    /// Stop and destroy the guild's session
    ///
    /// Without a session, or when it is already finishing, reports
    /// `AlreadyStopped`.
    pub async fn stop(&self, guild: GuildId) -> Result<StopOutcome> {
        let Some(handle) = self.get(guild).await else {
            return Ok(StopOutcome::AlreadyStopped);
        };
        match handle.stop().await {
            Ok(StopOutcome::Stopped) => {
                self.evict(&handle).await;
                Ok(StopOutcome::Stopped)
            }
            Err(Error::SessionClosed(_)) => Ok(StopOutcome::AlreadyStopped),
            result => result,
        }
    }

    pub async fn set_volume(&self, guild: GuildId, change: VolumeChange) -> Result<u16> {
        let handle = self.get(guild).await.ok_or(Error::NotPlaying)?;
        handle.set_volume(change).await
    }

    /// Extreme volume; the caller has already verified the secret
    pub async fn set_extreme_volume(&self, guild: GuildId) -> Result<ExtremeOutcome> {
        let handle = self.get(guild).await.ok_or(Error::NotPlaying)?;
        handle.set_extreme_volume().await
    }

    pub async fn attach_surface(&self, guild: GuildId, surface: ControlSurface) -> Result<()> {
        let handle = self.get(guild).await.ok_or(Error::NotPlaying)?;
        handle.attach_surface(surface).await
    }

    pub async fn snapshot(&self, guild: GuildId) -> Result<SessionSnapshot> {
        let handle = self.get(guild).await.ok_or(Error::NotPlaying)?;
        handle.snapshot().await
    }

    /// Snapshots of every live session, ordered by guild id
    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(snapshot) = handle.snapshot().await {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by_key(|s| s.guild_id);
        snapshots
    }

    // ========================================
    // Backend notifications
    // ========================================

    /// Route a track-ended event into the guild's mailbox
    pub async fn track_ended(
        &self,
        guild: GuildId,
        track: Track,
        reason: TrackEndReason,
    ) -> Result<TrackEndOutcome> {
        let Some(handle) = self.get(guild).await else {
            debug!(guild = %guild, "Track end for a guild without session");
            return Ok(TrackEndOutcome::Ignored);
        };
        match handle.track_ended(track, reason).await {
            Err(Error::SessionClosed(_)) => Ok(TrackEndOutcome::Ignored),
            result => result,
        }
    }

    /// Stop every session (process shutdown)
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        info!(sessions = handles.len(), "Stopping all sessions");

        for handle in handles {
            if let Err(e) = handle.stop().await {
                warn!(guild = %handle.guild_id(), error = %e, "Failed to stop session");
            }
        }
    }
}
