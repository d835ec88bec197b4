//! Session actor
//!
//! One tokio task per guild owns the [`PlaybackSession`]. Callers talk to it
//! through a [`SessionHandle`]: each command carries a oneshot reply channel
//! and the actor handles commands strictly one at a time, including the
//! backend round trips they make.
//!
//! The idle teardown deadline is polled in the same `select!` loop as the
//! mailbox, so a play request that arrives first always cancels it.

use super::state::{
    BulkPlayOutcome, ControlSurface, ExtremeOutcome, PlaybackSession, SessionSnapshot,
    StopOutcome, TrackEndOutcome, VolumeChange,
};
use crate::backend::{TrackEndReason, VoiceConnection};
use crate::error::{Error, Result};
use gmq_common::events::{EnqueueSource, EventBus, GmqEvent};
use gmq_common::{GuildId, Track};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry map shared with the actors so they can remove themselves
pub(crate) type SessionMap = Arc<RwLock<HashMap<GuildId, SessionHandle>>>;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Messages accepted by a session actor
pub enum SessionCommand {
    Play {
        tracks: Vec<Track>,
        source: EnqueueSource,
        voice: Option<VoiceConnection>,
        surface: Option<ControlSurface>,
        reply: Reply<BulkPlayOutcome>,
    },
    Skip {
        reply: Reply<Track>,
    },
    TogglePause {
        reply: Reply<bool>,
    },
    ToggleLoop {
        reply: Reply<bool>,
    },
    Stop {
        reply: Reply<StopOutcome>,
    },
    SetVolume {
        change: VolumeChange,
        reply: Reply<u16>,
    },
    ExtremeVolume {
        reply: Reply<ExtremeOutcome>,
    },
    AttachSurface {
        surface: ControlSurface,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<SessionSnapshot>,
    },
    /// Backend notification, serialized with user commands
    TrackEnded {
        track: Track,
        reason: TrackEndReason,
        reply: Reply<TrackEndOutcome>,
    },
}

impl SessionCommand {
    /// Answer a command the actor will never run
    fn reject(self, guild: GuildId) {
        let closed = || Error::SessionClosed(guild.0);
        match self {
            SessionCommand::Stop { reply } => {
                let _ = reply.send(Ok(StopOutcome::AlreadyStopped));
            }
            SessionCommand::TrackEnded { reply, .. } => {
                let _ = reply.send(Ok(TrackEndOutcome::Ignored));
            }
            SessionCommand::Play { reply, .. } => {
                let _ = reply.send(Err(closed()));
            }
            SessionCommand::Skip { reply } => {
                let _ = reply.send(Err(Error::NothingPlaying));
            }
            SessionCommand::TogglePause { reply } | SessionCommand::ToggleLoop { reply } => {
                let _ = reply.send(Err(Error::NotPlaying));
            }
            SessionCommand::SetVolume { reply, .. } => {
                let _ = reply.send(Err(Error::NotPlaying));
            }
            SessionCommand::ExtremeVolume { reply } => {
                let _ = reply.send(Err(Error::NotPlaying));
            }
            SessionCommand::AttachSurface { reply, .. } => {
                let _ = reply.send(Err(Error::NotPlaying));
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(Err(closed()));
            }
        }
    }
}

/// Cloneable address of a running session actor
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    session_id: Uuid,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Instance id, distinguishes successive sessions of one guild
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the actor stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| Error::SessionClosed(self.guild_id.0))?;
        rx.await.map_err(|_| Error::SessionClosed(self.guild_id.0))?
    }

    pub async fn play(
        &self,
        tracks: Vec<Track>,
        source: EnqueueSource,
        voice: Option<VoiceConnection>,
        surface: Option<ControlSurface>,
    ) -> Result<BulkPlayOutcome> {
        self.request(|reply| SessionCommand::Play {
            tracks,
            source,
            voice,
            surface,
            reply,
        })
        .await
    }

    pub async fn skip(&self) -> Result<Track> {
        self.request(|reply| SessionCommand::Skip { reply }).await
    }

    pub async fn toggle_pause(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::TogglePause { reply })
            .await
    }

    pub async fn toggle_loop(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::ToggleLoop { reply })
            .await
    }

    pub async fn stop(&self) -> Result<StopOutcome> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }

    pub async fn set_volume(&self, change: VolumeChange) -> Result<u16> {
        self.request(|reply| SessionCommand::SetVolume { change, reply })
            .await
    }

    pub async fn set_extreme_volume(&self) -> Result<ExtremeOutcome> {
        self.request(|reply| SessionCommand::ExtremeVolume { reply })
            .await
    }

    pub async fn attach_surface(&self, surface: ControlSurface) -> Result<()> {
        self.request(|reply| SessionCommand::AttachSurface { surface, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    pub async fn track_ended(&self, track: Track, reason: TrackEndReason) -> Result<TrackEndOutcome> {
        self.request(|reply| SessionCommand::TrackEnded {
            track,
            reason,
            reply,
        })
        .await
    }
}

/// Why the actor loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Stopped,
    Idle,
    /// Every handle was dropped (registry gone)
    Orphaned,
}

impl Exit {
    fn as_str(&self) -> &'static str {
        match self {
            Exit::Stopped => "stopped",
            Exit::Idle => "idle",
            Exit::Orphaned => "orphaned",
        }
    }
}

/// Spawn the actor for `session` and return its handle
///
/// The caller is responsible for inserting the handle into `sessions`; the
/// actor removes it again when it finishes.
pub(crate) fn spawn(
    session: PlaybackSession,
    sessions: SessionMap,
    events: EventBus,
    mailbox_capacity: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let handle = SessionHandle {
        guild_id: session.guild_id(),
        session_id: session.session_id(),
        tx,
    };

    let actor = SessionActor {
        session,
        rx,
        sessions,
        events,
    };
    tokio::spawn(actor.run());

    handle
}

struct SessionActor {
    session: PlaybackSession,
    rx: mpsc::Receiver<SessionCommand>,
    sessions: SessionMap,
    events: EventBus,
}

impl SessionActor {
    async fn run(mut self) {
        let guild = self.session.guild_id();
        debug!(guild = %guild, session_id = %self.session.session_id(), "Session actor started");

        let exit = loop {
            let deadline = self.session.teardown_deadline();
            // The sleep is only polled when a deadline is armed
            let sleep = tokio::time::sleep_until(
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400)),
            );

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => {
                        if self.handle(command).await {
                            break Exit::Stopped;
                        }
                    }
                    None => {
                        self.session.stop().await.ok();
                        break Exit::Orphaned;
                    }
                },
                _ = sleep, if deadline.is_some() => {
                    self.session.teardown().await;
                    break Exit::Idle;
                }
            }
        };

        self.finish(exit).await;
    }

    /// Run one command; returns true when the session was stopped
    async fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Play {
                tracks,
                source,
                voice,
                surface,
                reply,
            } => {
                let result = if tracks.len() == 1 {
                    let mut tracks = tracks;
                    let track = tracks.remove(0);
                    self.session
                        .request_play(track, source, voice.as_ref(), surface)
                        .await
                        .map(|head| BulkPlayOutcome {
                            head,
                            appended: 0,
                            skipped_duplicates: 0,
                        })
                } else {
                    self.session
                        .request_play_bulk(tracks, source, voice.as_ref(), surface)
                        .await
                };
                let _ = reply.send(result);
            }
            SessionCommand::Skip { reply } => {
                let _ = reply.send(self.session.skip().await);
            }
            SessionCommand::TogglePause { reply } => {
                let _ = reply.send(self.session.toggle_pause().await);
            }
            SessionCommand::ToggleLoop { reply } => {
                let _ = reply.send(self.session.toggle_loop().await);
            }
            SessionCommand::Stop { reply } => {
                let result = self.session.stop().await;
                let stopped = matches!(result, Ok(StopOutcome::Stopped));
                let _ = reply.send(result);
                return stopped;
            }
            SessionCommand::SetVolume { change, reply } => {
                let _ = reply.send(self.session.set_volume(change).await);
            }
            SessionCommand::ExtremeVolume { reply } => {
                let _ = reply.send(self.session.set_extreme_volume().await);
            }
            SessionCommand::AttachSurface { surface, reply } => {
                let _ = reply.send(self.session.attach_surface(surface).await);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.session.snapshot()));
            }
            SessionCommand::TrackEnded {
                track,
                reason,
                reply,
            } => {
                let _ = reply.send(self.session.on_track_ended(&track, reason).await);
            }
        }
        false
    }

    /// Close the mailbox, answer what is still queued and deregister
    async fn finish(mut self, exit: Exit) {
        let guild = self.session.guild_id();
        let session_id = self.session.session_id();

        self.rx.close();
        let mut rejected = 0;
        while let Ok(command) = self.rx.try_recv() {
            command.reject(guild);
            rejected += 1;
        }

        {
            let mut sessions = self.sessions.write().await;
            if sessions
                .get(&guild)
                .is_some_and(|handle| handle.session_id == session_id)
            {
                sessions.remove(&guild);
            }
        }

        info!(guild = %guild, reason = exit.as_str(), rejected, "Session destroyed");
        self.events.emit_lossy(GmqEvent::SessionDestroyed {
            guild_id: guild,
            session_id,
            reason: exit.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}
