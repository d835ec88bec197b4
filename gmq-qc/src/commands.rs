//! User command orchestration
//!
//! Commands that span several components: resolving a query before handing
//! tracks to a session, playing a stored playlist, adding the current track
//! to a playlist, and the privileged extreme volume. Single-component
//! commands (skip, pause, ...) go straight to the [`SessionRegistry`].

use crate::backend::VoiceConnection;
use crate::error::{Error, Result};
use crate::resolver::{QueryKind, TrackResolver};
use crate::session::{BulkPlayOutcome, ControlSurface, ExtremeOutcome, SessionRegistry};
use crate::store::{AddOutcome, PlaylistStore};
use gmq_common::events::EnqueueSource;
use gmq_common::{GuildId, PlaylistRecord, PlaylistTrack, Track, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Who is asking, and where they are
#[derive(Debug, Clone)]
pub struct Requester {
    pub user: UserId,
    /// The user's voice channel, None when not connected
    pub voice: Option<VoiceConnection>,
    /// Control surface to bind if the request starts playback
    pub surface: Option<ControlSurface>,
}

/// Track to add to a playlist
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TrackSelection {
    /// Explicit title and url
    Explicit(PlaylistTrack),
    /// Whatever the guild's session is playing right now
    Current { guild_id: GuildId },
}

/// Playlist management actions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageAction {
    Clear,
    Rename { new_name: String },
    Delete,
    /// 0-based track index
    RemoveTrack { index: usize },
    SetVisibility { is_public: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ManageOutcome {
    Cleared,
    Renamed { name: String },
    Deleted,
    TrackRemoved { track: PlaylistTrack },
    VisibilityChanged { is_public: bool },
}

pub struct CommandService {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
    store: Arc<PlaylistStore>,
    /// Shared secret for privileged commands; None disables them
    privileged_secret: Option<String>,
}

impl CommandService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn TrackResolver>,
        store: Arc<PlaylistStore>,
        privileged_secret: Option<String>,
    ) -> Self {
        Self {
            registry,
            resolver,
            store,
            privileged_secret: privileged_secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<PlaylistStore> {
        &self.store
    }

    /// Resolve `query` and play or enqueue the result
    ///
    /// Platform playlist URLs enqueue every entry; anything else plays the
    /// best match.
    pub async fn play(
        &self,
        guild: GuildId,
        requester: Requester,
        query: &str,
    ) -> Result<BulkPlayOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        self.check_voice(guild, &requester).await?;

        info!(guild = %guild, user = %requester.user, query = %query, "Play requested");

        let (tracks, source) = match QueryKind::classify(query) {
            QueryKind::PlatformPlaylist(url) => {
                let tracks = self.resolver.extract_playlist(&url).await?;
                (tracks, EnqueueSource::PlatformPlaylist)
            }
            _ => {
                let track = self
                    .resolver
                    .search_first(query)
                    .await?
                    .ok_or_else(|| Error::NotFound(query.to_string()))?;
                (vec![track], EnqueueSource::Direct)
            }
        };
        if tracks.is_empty() {
            return Err(Error::NotFound(query.to_string()));
        }

        let tracks = attribute(tracks, requester.user);
        self.registry
            .play(guild, tracks, source, requester.voice, requester.surface)
            .await
    }

    /// Play a stored playlist visible to the requester
    ///
    /// Entries that no longer resolve are skipped.
    pub async fn play_from_playlist(
        &self,
        guild: GuildId,
        requester: Requester,
        owner: UserId,
        name: &str,
    ) -> Result<BulkPlayOutcome> {
        self.check_voice(guild, &requester).await?;
        let playlist = self.store.get(requester.user, owner, name).await?;

        info!(
            guild = %guild,
            user = %requester.user,
            playlist = %playlist.name,
            entries = playlist.tracks.len(),
            "Playlist play requested"
        );

        let mut tracks = Vec::with_capacity(playlist.tracks.len());
        for entry in &playlist.tracks {
            match self.resolver.search_first(&entry.url).await {
                Ok(Some(track)) => tracks.push(track),
                Ok(None) => warn!(url = %entry.url, "Playlist entry no longer resolves"),
                Err(e) => warn!(url = %entry.url, error = %e, "Failed to resolve playlist entry"),
            }
        }
        if tracks.is_empty() {
            return Err(Error::EmptyPlaylist(playlist.name));
        }

        let tracks = attribute(tracks, requester.user);
        self.registry
            .play(
                guild,
                tracks,
                EnqueueSource::Playlist,
                requester.voice,
                requester.surface,
            )
            .await
    }

    /// Add a track to a playlist (owner defaults to the acting user)
    pub async fn add_to_playlist(
        &self,
        actor: UserId,
        owner: Option<UserId>,
        name: &str,
        selection: TrackSelection,
        is_public: bool,
        create_if_missing: bool,
    ) -> Result<AddOutcome> {
        let track = match selection {
            TrackSelection::Explicit(track) => track,
            TrackSelection::Current { guild_id } => {
                let snapshot = self.registry.snapshot(guild_id).await?;
                let current = snapshot.current.ok_or(Error::NothingPlaying)?;
                PlaylistTrack::from(&current)
            }
        };
        if track.url.trim().is_empty() {
            return Err(Error::InvalidInput("track url must not be empty".to_string()));
        }

        self.store
            .add_track(
                actor,
                owner.unwrap_or(actor),
                name,
                track,
                is_public,
                create_if_missing,
            )
            .await
    }

    pub async fn manage_playlist(
        &self,
        actor: UserId,
        owner: UserId,
        name: &str,
        action: ManageAction,
    ) -> Result<ManageOutcome> {
        match action {
            ManageAction::Clear => {
                self.store.clear(actor, owner, name).await?;
                Ok(ManageOutcome::Cleared)
            }
            ManageAction::Rename { new_name } => {
                self.store.rename(actor, owner, name, &new_name).await?;
                Ok(ManageOutcome::Renamed {
                    name: new_name.trim().to_string(),
                })
            }
            ManageAction::Delete => {
                self.store.delete(actor, owner, name).await?;
                Ok(ManageOutcome::Deleted)
            }
            ManageAction::RemoveTrack { index } => {
                let track = self.store.remove_at(actor, owner, name, index).await?;
                Ok(ManageOutcome::TrackRemoved { track })
            }
            ManageAction::SetVisibility { is_public } => {
                self.store
                    .set_visibility(actor, owner, name, is_public)
                    .await?;
                Ok(ManageOutcome::VisibilityChanged { is_public })
            }
        }
    }

    pub async fn list_playlists(&self, user: UserId) -> Vec<PlaylistRecord> {
        self.store.list_available(user).await
    }

    /// Privileged: backend volume 500 plus bass boost
    pub async fn set_extreme_volume(&self, guild: GuildId, secret: &str) -> Result<ExtremeOutcome> {
        let configured = self
            .privileged_secret
            .as_deref()
            .ok_or(Error::PrivilegedDisabled)?;
        if !gmq_common::secret::secret_matches(secret, Some(configured)) {
            warn!(guild = %guild, "Extreme volume refused: invalid secret");
            return Err(Error::InvalidSecret);
        }
        self.registry.set_extreme_volume(guild).await
    }

    /// Play-type commands need a voice channel unless a session exists
    async fn check_voice(&self, guild: GuildId, requester: &Requester) -> Result<()> {
        if requester.voice.is_none() && !self.registry.contains(guild).await {
            return Err(Error::NoVoiceChannel);
        }
        Ok(())
    }
}

fn attribute(tracks: Vec<Track>, user: UserId) -> Vec<Track> {
    tracks.into_iter().map(|t| t.requested_by(user)).collect()
}
