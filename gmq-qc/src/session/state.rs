//! Playback session state machine
//!
//! `Idle -> Playing <-> Paused -> Stopped`. A [`PlaybackSession`] is owned
//! by exactly one actor task; every method here runs with exclusive access
//! and awaits the backend's acknowledgement before committing, so an
//! operation either applies fully or leaves the session untouched.
//!
//! Secondary backend calls (volume re-application after a track change, the
//! bass boost equalizer) are logged and never roll back the primary change.

use super::{SessionSettings, MAX_VOLUME, MIN_VOLUME, VOLUME_STEP};
use crate::backend::{
    with_timeout, AudioBackend, ControlMessage, TrackEndReason, VoiceConnection, EXTREME_VOLUME,
};
use crate::error::{Error, Result};
use crate::resolver::TrackResolver;
use gmq_common::events::{
    EnqueueSource, EventBus, GmqEvent, PlaybackState, QueueChangeTrigger,
};
use gmq_common::human_time::format_track_duration;
use gmq_common::{GuildId, Track};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque reference to the UI object showing a session's status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlSurface(pub String);

impl std::fmt::Display for ControlSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transient marker consumed by the next track-ended event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EndSuppression {
    #[default]
    None,
    /// A manual skip replaced the current track; its end event must not advance
    SkipPending,
}

/// Result of a play request for a single track
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayOutcome {
    /// The track became current and the backend started it
    Started { track: Track, queue_len: usize },
    /// Something was already playing; the track joined the queue tail
    Enqueued {
        track: Track,
        /// 0-based queue position
        position: usize,
        queue_len: usize,
    },
}

impl PlayOutcome {
    pub fn track(&self) -> &Track {
        match self {
            PlayOutcome::Started { track, .. } | PlayOutcome::Enqueued { track, .. } => track,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, PlayOutcome::Started { .. })
    }
}

/// Result of a play request carrying several tracks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkPlayOutcome {
    /// What happened to the first accepted track
    #[serde(flatten)]
    pub head: PlayOutcome,
    /// Remaining tracks appended to the queue
    pub appended: usize,
    /// Tracks dropped by duplicate rejection
    pub skipped_duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

/// What a track-ended event did to the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrackEndOutcome {
    /// Consumed by a pending skip
    Suppressed,
    /// No current track, nothing to do
    Ignored,
    /// Loop mode replayed the same track
    Looped,
    /// Next queued track started
    Advanced { track: Track },
    /// Queue exhausted, teardown armed
    Draining,
}

/// Requested volume change on the user-facing 1-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeChange {
    Set(i64),
    Adjust(i64),
}

impl VolumeChange {
    /// One step up, as the volume-up control applies it
    pub fn step_up() -> Self {
        VolumeChange::Adjust(VOLUME_STEP)
    }

    /// One step down, as the volume-down control applies it
    pub fn step_down() -> Self {
        VolumeChange::Adjust(-VOLUME_STEP)
    }

    /// Resulting volume when applied to `current`, clamped to 1-100
    pub fn apply(self, current: u16) -> u16 {
        let target = match self {
            VolumeChange::Set(value) => value,
            VolumeChange::Adjust(delta) => i64::from(current).saturating_add(delta),
        };
        target.clamp(i64::from(MIN_VOLUME), i64::from(MAX_VOLUME)) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtremeOutcome {
    /// Backend volume now in effect
    pub backend_volume: u16,
    /// False when the equalizer call failed (volume stays applied)
    pub equalizer_applied: bool,
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub session_id: Uuid,
    pub state: PlaybackState,
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub volume: u16,
    pub loop_enabled: bool,
    pub boosted: bool,
    pub surface: Option<ControlSurface>,
    pub cached_thumbnail: Option<String>,
    pub skip_pending: bool,
    pub teardown_pending: bool,
    pub connected: bool,
}

/// Live playback state of one guild
pub struct PlaybackSession {
    guild_id: GuildId,
    session_id: Uuid,
    state: PlaybackState,
    current: Option<Track>,
    queue: VecDeque<Track>,
    loop_enabled: bool,
    /// User-facing volume (1-100)
    volume: u16,
    /// Extreme volume preset in effect
    boosted: bool,
    /// Thumbnail reused while looping; cleared on any track change
    cached_thumbnail: Option<String>,
    surface: Option<ControlSurface>,
    end_suppression: EndSuppression,
    teardown_at: Option<Instant>,
    connected: bool,

    backend: Arc<dyn AudioBackend>,
    resolver: Arc<dyn TrackResolver>,
    events: EventBus,
    settings: SessionSettings,
}

impl PlaybackSession {
    pub fn new(
        guild_id: GuildId,
        session_id: Uuid,
        backend: Arc<dyn AudioBackend>,
        resolver: Arc<dyn TrackResolver>,
        events: EventBus,
        settings: SessionSettings,
    ) -> Self {
        Self {
            guild_id,
            session_id,
            state: PlaybackState::Idle,
            current: None,
            queue: VecDeque::new(),
            loop_enabled: false,
            volume: settings.default_volume,
            boosted: false,
            cached_thumbnail: None,
            surface: None,
            end_suppression: EndSuppression::None,
            teardown_at: None,
            connected: false,
            backend,
            resolver,
            events,
            settings,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// When the idle teardown fires, if armed
    pub fn teardown_deadline(&self) -> Option<Instant> {
        self.teardown_at
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            guild_id: self.guild_id,
            session_id: self.session_id,
            state: self.state,
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            volume: self.volume,
            loop_enabled: self.loop_enabled,
            boosted: self.boosted,
            surface: self.surface.clone(),
            cached_thumbnail: self.cached_thumbnail.clone(),
            skip_pending: self.end_suppression == EndSuppression::SkipPending,
            teardown_pending: self.teardown_at.is_some(),
            connected: self.connected,
        }
    }

    // ========================================
    // Commands
    // ========================================

    /// Start `track` if nothing is rendering, else append it to the queue
    ///
    /// A call during the teardown grace window starts the track on the
    /// existing session and cancels the teardown.
    pub async fn request_play(
        &mut self,
        track: Track,
        source: EnqueueSource,
        voice: Option<&VoiceConnection>,
        surface: Option<ControlSurface>,
    ) -> Result<PlayOutcome> {
        self.ensure_open()?;
        if self.settings.reject_duplicate_urls && self.is_duplicate(&track.uri) {
            return Err(Error::DuplicateInQueue(track.uri));
        }
        self.ensure_connected(voice).await?;
        self.play_or_enqueue(track, source, surface).await
    }

    /// Play the first track and append the rest
    ///
    /// With duplicate rejection on, duplicates (against the session and
    /// against earlier tracks of the same batch) are skipped and counted.
    pub async fn request_play_bulk(
        &mut self,
        tracks: Vec<Track>,
        source: EnqueueSource,
        voice: Option<&VoiceConnection>,
        surface: Option<ControlSurface>,
    ) -> Result<BulkPlayOutcome> {
        self.ensure_open()?;

        let mut accepted: Vec<Track> = Vec::with_capacity(tracks.len());
        let mut skipped_duplicates = 0;
        for track in tracks {
            let duplicate = self.settings.reject_duplicate_urls
                && (self.is_duplicate(&track.uri) || accepted.iter().any(|t| t.uri == track.uri));
            if duplicate {
                skipped_duplicates += 1;
            } else {
                accepted.push(track);
            }
        }

        let mut accepted = accepted.into_iter();
        let head = match accepted.next() {
            Some(track) => track,
            None if skipped_duplicates > 0 => {
                return Err(Error::DuplicateInQueue(format!(
                    "all {} tracks",
                    skipped_duplicates
                )))
            }
            None => return Err(Error::InvalidInput("no tracks to play".to_string())),
        };

        self.ensure_connected(voice).await?;
        let head = self.play_or_enqueue(head, source, surface).await?;

        let mut appended = 0;
        for track in accepted {
            self.queue.push_back(track);
            appended += 1;
        }
        if appended > 0 {
            debug!(guild = %self.guild_id, appended, "Appended remaining tracks");
            self.emit_queue_changed(QueueChangeTrigger::UserEnqueue);
        }

        Ok(BulkPlayOutcome {
            head,
            appended,
            skipped_duplicates,
        })
    }

    /// Replace the current track with the queue head
    pub async fn skip(&mut self) -> Result<Track> {
        if self.state == PlaybackState::Stopped || self.current.is_none() {
            return Err(Error::NothingPlaying);
        }
        let next = match self.queue.front() {
            Some(track) => track.clone(),
            None => return Err(Error::EmptyQueue),
        };

        with_timeout(self.timeout(), self.backend.play(self.guild_id, &next)).await?;

        self.queue.pop_front();
        self.end_suppression = EndSuppression::SkipPending;
        self.cached_thumbnail = None;
        self.current = Some(next.clone());
        info!(guild = %self.guild_id, title = %next.title, "Skipped to next track");

        self.reapply_volume().await;
        self.emit_track_started(&next);
        self.emit_queue_changed(QueueChangeTrigger::Skip);
        self.publish_surface().await;

        Ok(next)
    }

    pub async fn toggle_loop(&mut self) -> Result<bool> {
        self.ensure_open().map_err(|_| Error::NotPlaying)?;

        self.loop_enabled = !self.loop_enabled;
        info!(guild = %self.guild_id, enabled = self.loop_enabled, "Loop toggled");

        self.emit(GmqEvent::LoopToggled {
            guild_id: self.guild_id,
            enabled: self.loop_enabled,
            timestamp: chrono::Utc::now(),
        });
        self.publish_surface().await;

        Ok(self.loop_enabled)
    }

    /// Pause or resume; returns true when now paused
    pub async fn toggle_pause(&mut self) -> Result<bool> {
        let pause = match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Paused => false,
            _ => return Err(Error::NotPlaying),
        };
        if !self.connected || self.current.is_none() {
            return Err(Error::NotPlaying);
        }

        with_timeout(self.timeout(), self.backend.set_pause(self.guild_id, pause)).await?;

        self.set_state(if pause {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        });
        Ok(pause)
    }

    /// Stop playback and release the backend link
    ///
    /// Local teardown always completes; backend failures are logged because
    /// the session is destroyed regardless.
    pub async fn stop(&mut self) -> Result<StopOutcome> {
        if self.state == PlaybackState::Stopped {
            return Ok(StopOutcome::AlreadyStopped);
        }

        if self.connected {
            if let Err(e) = with_timeout(self.timeout(), self.backend.stop(self.guild_id)).await {
                warn!(guild = %self.guild_id, error = %e, "Backend stop failed");
            }
            if let Err(e) =
                with_timeout(self.timeout(), self.backend.disconnect(self.guild_id)).await
            {
                warn!(guild = %self.guild_id, error = %e, "Backend disconnect failed");
            }
            self.connected = false;
        }

        let had_queue = !self.queue.is_empty();
        self.queue.clear();
        self.current = None;
        self.cached_thumbnail = None;
        self.end_suppression = EndSuppression::None;
        self.teardown_at = None;
        self.release_surface();
        self.set_state(PlaybackState::Stopped);
        if had_queue {
            self.emit_queue_changed(QueueChangeTrigger::Stop);
        }

        info!(guild = %self.guild_id, "Playback stopped");
        Ok(StopOutcome::Stopped)
    }

    pub async fn set_volume(&mut self, change: VolumeChange) -> Result<u16> {
        if self.state == PlaybackState::Stopped || !self.connected {
            return Err(Error::NotPlaying);
        }
        let volume = change.apply(self.volume);

        with_timeout(self.timeout(), self.backend.set_volume(self.guild_id, volume)).await?;

        self.volume = volume;
        self.boosted = false;
        info!(guild = %self.guild_id, volume, "Volume set");

        self.emit(GmqEvent::VolumeChanged {
            guild_id: self.guild_id,
            volume,
            timestamp: chrono::Utc::now(),
        });
        self.publish_surface().await;

        Ok(volume)
    }

    /// Backend volume 500 plus the bass boost equalizer
    ///
    /// Authorization is checked by the caller.
    pub async fn set_extreme_volume(&mut self) -> Result<ExtremeOutcome> {
        if self.state == PlaybackState::Stopped || !self.connected {
            return Err(Error::NotPlaying);
        }

        with_timeout(
            self.timeout(),
            self.backend.set_volume(self.guild_id, EXTREME_VOLUME),
        )
        .await?;
        self.boosted = true;

        let equalizer_applied = match with_timeout(
            self.timeout(),
            self.backend
                .send_control(self.guild_id, ControlMessage::bass_boost()),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(guild = %self.guild_id, error = %e, "Bass boost not applied");
                false
            }
        };

        info!(guild = %self.guild_id, equalizer_applied, "Extreme volume applied");
        Ok(ExtremeOutcome {
            backend_volume: EXTREME_VOLUME,
            equalizer_applied,
        })
    }

    /// Bind the control surface, releasing any previous one
    pub async fn attach_surface(&mut self, surface: ControlSurface) -> Result<()> {
        self.ensure_open().map_err(|_| Error::NotPlaying)?;
        self.bind_surface(surface);
        self.publish_surface().await;
        Ok(())
    }

    // ========================================
    // Backend notifications
    // ========================================

    /// Advance after the backend finished rendering a track
    pub async fn on_track_ended(
        &mut self,
        track: &Track,
        reason: TrackEndReason,
    ) -> Result<TrackEndOutcome> {
        debug!(guild = %self.guild_id, title = %track.title, %reason, "Track ended");

        if self.end_suppression == EndSuppression::SkipPending {
            self.end_suppression = EndSuppression::None;
            debug!(guild = %self.guild_id, "Track end consumed by pending skip");
            return Ok(TrackEndOutcome::Suppressed);
        }

        let current = match (&self.state, &self.current) {
            (PlaybackState::Stopped, _) | (_, None) => return Ok(TrackEndOutcome::Ignored),
            (_, Some(current)) => current.clone(),
        };

        if self.loop_enabled {
            match with_timeout(self.timeout(), self.backend.play(self.guild_id, &current)).await {
                Ok(()) => {
                    if self.cached_thumbnail.is_none() {
                        self.cached_thumbnail = Some(self.resolver.thumbnail(&current).await);
                    }
                    debug!(guild = %self.guild_id, title = %current.title, "Looping track");
                    self.publish_surface().await;
                    return Ok(TrackEndOutcome::Looped);
                }
                Err(e) => {
                    warn!(guild = %self.guild_id, error = %e, "Loop replay failed, advancing");
                }
            }
        }

        self.cached_thumbnail = None;

        while let Some(next) = self.queue.pop_front() {
            match with_timeout(self.timeout(), self.backend.play(self.guild_id, &next)).await {
                Ok(()) => {
                    self.current = Some(next.clone());
                    self.set_state(PlaybackState::Playing);
                    info!(guild = %self.guild_id, title = %next.title, "Advanced to next track");

                    self.reapply_volume().await;
                    self.emit_track_started(&next);
                    self.emit_queue_changed(QueueChangeTrigger::TrackCompletion);
                    self.publish_surface().await;
                    return Ok(TrackEndOutcome::Advanced { track: next });
                }
                Err(e) => {
                    warn!(
                        guild = %self.guild_id,
                        title = %next.title,
                        error = %e,
                        "Dropping track the backend could not start"
                    );
                    self.emit_queue_changed(QueueChangeTrigger::TrackCompletion);
                }
            }
        }

        self.current = None;
        self.set_state(PlaybackState::Idle);
        self.teardown_at = Some(Instant::now() + self.settings.grace_period);
        info!(
            guild = %self.guild_id,
            grace_ms = self.settings.grace_period.as_millis() as u64,
            "Queue exhausted, teardown armed"
        );
        Ok(TrackEndOutcome::Draining)
    }

    /// Idle teardown after the grace period elapsed
    pub async fn teardown(&mut self) {
        self.teardown_at = None;
        self.release_surface();
        if self.connected {
            if let Err(e) =
                with_timeout(self.timeout(), self.backend.disconnect(self.guild_id)).await
            {
                warn!(guild = %self.guild_id, error = %e, "Backend disconnect failed");
            }
            self.connected = false;
        }
        self.queue.clear();
        self.current = None;
        info!(guild = %self.guild_id, "Idle session torn down");
    }

    // ========================================
    // Internals
    // ========================================

    fn timeout(&self) -> Duration {
        self.settings.backend_timeout
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == PlaybackState::Stopped {
            return Err(Error::SessionClosed(self.guild_id.0));
        }
        Ok(())
    }

    fn is_duplicate(&self, uri: &str) -> bool {
        self.current.as_ref().is_some_and(|t| t.uri == uri) || self.queue.iter().any(|t| t.uri == uri)
    }

    async fn ensure_connected(&mut self, voice: Option<&VoiceConnection>) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        let voice = voice.ok_or(Error::NoVoiceChannel)?;

        if let Err(e) = with_timeout(self.timeout(), self.backend.connect(self.guild_id, voice)).await
        {
            warn!(guild = %self.guild_id, error = %e, "Voice connect failed");
            self.arm_idle_teardown();
            return Err(e);
        }
        self.connected = true;
        info!(guild = %self.guild_id, channel = voice.channel_id, "Connected to voice channel");

        self.reapply_volume().await;
        Ok(())
    }

    /// Schedule teardown of a session left with nothing rendering
    ///
    /// A grace period already running is left alone.
    fn arm_idle_teardown(&mut self) {
        if self.state.is_rendering() || self.teardown_at.is_some() {
            return;
        }
        self.teardown_at = Some(Instant::now() + self.settings.grace_period);
        info!(guild = %self.guild_id, "Nothing rendering, teardown armed");
    }

    async fn play_or_enqueue(
        &mut self,
        track: Track,
        source: EnqueueSource,
        surface: Option<ControlSurface>,
    ) -> Result<PlayOutcome> {
        if self.state.is_rendering() {
            self.queue.push_back(track.clone());
            let position = self.queue.len() - 1;
            if self.surface.is_none() {
                if let Some(surface) = surface {
                    self.bind_surface(surface);
                }
            }
            info!(guild = %self.guild_id, title = %track.title, position, "Track enqueued");

            self.emit(GmqEvent::TrackEnqueued {
                guild_id: self.guild_id,
                track: track.clone(),
                position,
                source,
                timestamp: chrono::Utc::now(),
            });
            return Ok(PlayOutcome::Enqueued {
                track,
                position,
                queue_len: self.queue.len(),
            });
        }

        if let Err(e) = with_timeout(self.timeout(), self.backend.play(self.guild_id, &track)).await
        {
            warn!(guild = %self.guild_id, error = %e, "Start failed");
            self.arm_idle_teardown();
            return Err(e);
        }

        if self.teardown_at.take().is_some() {
            info!(guild = %self.guild_id, "Pending teardown cancelled");
        }
        self.end_suppression = EndSuppression::None;
        self.cached_thumbnail = None;
        self.current = Some(track.clone());
        self.set_state(PlaybackState::Playing);
        if let Some(surface) = surface {
            self.bind_surface(surface);
        }
        info!(
            guild = %self.guild_id,
            title = %track.title,
            duration = %format_track_duration(track.duration_secs),
            "Now playing"
        );

        self.emit_track_started(&track);
        self.publish_surface().await;

        Ok(PlayOutcome::Started {
            track,
            queue_len: self.queue.len(),
        })
    }

    /// Restore the session's volume on the backend after a track change
    async fn reapply_volume(&self) {
        let level = if self.boosted {
            EXTREME_VOLUME
        } else {
            self.volume
        };
        if let Err(e) =
            with_timeout(self.timeout(), self.backend.set_volume(self.guild_id, level)).await
        {
            warn!(guild = %self.guild_id, error = %e, "Failed to re-apply volume");
        }
    }

    fn set_state(&mut self, new_state: PlaybackState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        debug!(guild = %self.guild_id, %old_state, %new_state, "Playback state changed");
        self.emit(GmqEvent::PlaybackStateChanged {
            guild_id: self.guild_id,
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn bind_surface(&mut self, surface: ControlSurface) {
        if let Some(old) = self.surface.replace(surface.clone()) {
            if old != surface {
                self.emit_surface_released(old);
            }
        }
    }

    fn release_surface(&mut self) {
        if let Some(old) = self.surface.take() {
            self.emit_surface_released(old);
        }
    }

    /// Push the current status to the bound control surface
    async fn publish_surface(&mut self) {
        let (Some(surface), Some(track)) = (self.surface.clone(), self.current.clone()) else {
            return;
        };
        let thumbnail = match &self.cached_thumbnail {
            Some(cached) => cached.clone(),
            None => self.resolver.thumbnail(&track).await,
        };
        self.emit(GmqEvent::SurfaceUpdated {
            guild_id: self.guild_id,
            surface: surface.0,
            track,
            thumbnail,
            volume: self.volume,
            loop_enabled: self.loop_enabled,
            queue_len: self.queue.len(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_surface_released(&self, surface: ControlSurface) {
        debug!(guild = %self.guild_id, %surface, "Control surface released");
        self.emit(GmqEvent::SurfaceReleased {
            guild_id: self.guild_id,
            surface: surface.0,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_track_started(&self, track: &Track) {
        self.emit(GmqEvent::TrackStarted {
            guild_id: self.guild_id,
            track: track.clone(),
            queue_len: self.queue.len(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_queue_changed(&self, trigger: QueueChangeTrigger) {
        self.emit(GmqEvent::QueueChanged {
            guild_id: self.guild_id,
            queue_len: self.queue.len(),
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: GmqEvent) {
        self.events.emit_lossy(event);
    }
}
