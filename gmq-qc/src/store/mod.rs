//! Playlist store
//!
//! Named, owned track lists persisted as one JSON document. The store is a
//! single writer: a mutex guards the authoritative snapshot, and each
//! mutation works on a copy that is swapped in only after it was written
//! durably. A failed write therefore leaves the snapshot exactly as it was.
//!
//! Access rules:
//! - visible (and playable) when public or owned by the viewer
//! - mutable when public or owned by the actor
//! - creating a playlist and changing its visibility require ownership

pub mod document;
pub mod persistence;

pub use document::PlaylistDocument;
pub use persistence::{JsonFilePersistence, PlaylistPersistence};

use crate::error::{Error, Result};
use gmq_common::config::StoreSection;
use gmq_common::events::{EventBus, GmqEvent, PlaylistChange};
use gmq_common::{PlaylistRecord, PlaylistTrack, UserId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Result of [`PlaylistStore::add_track`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    /// Same url already present, nothing changed
    Duplicate,
    Created,
    /// No such playlist and creation was not requested
    NotFound,
}

/// Write retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the first retry, doubled for each further retry
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(store: &StoreSection) -> Self {
        Self {
            attempts: store.write_attempts.max(1),
            backoff: Duration::from_millis(store.retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Outcome of a mutation closure: whether the copy must be persisted
enum Mutation<T> {
    Changed(T),
    Unchanged(T),
}

pub struct PlaylistStore {
    snapshot: Mutex<PlaylistDocument>,
    persistence: Arc<dyn PlaylistPersistence>,
    retry: RetryPolicy,
    events: EventBus,
}

impl PlaylistStore {
    /// Load the durable document and open the store on it
    pub async fn open(
        persistence: Arc<dyn PlaylistPersistence>,
        retry: RetryPolicy,
        events: EventBus,
    ) -> Result<Self> {
        let document = persistence.load().await?;
        info!(playlists = document.playlist_count(), "Playlist store opened");

        Ok(Self {
            snapshot: Mutex::new(document),
            persistence,
            retry,
            events,
        })
    }

    // ========================================
    // Queries
    // ========================================

    /// Every playlist that is public or owned by `user`
    pub async fn list_available(&self, user: UserId) -> Vec<PlaylistRecord> {
        self.snapshot.lock().await.visible_to(user)
    }

    pub async fn user_playlists(&self, owner: UserId) -> Vec<PlaylistRecord> {
        self.snapshot.lock().await.owned_by(owner).to_vec()
    }

    /// One playlist, if `viewer` may see it
    pub async fn get(&self, viewer: UserId, owner: UserId, name: &str) -> Result<PlaylistRecord> {
        let name = name.trim();
        let snapshot = self.snapshot.lock().await;
        let playlist = snapshot
            .find(owner, name)
            .ok_or_else(|| Error::PlaylistNotFound(name.to_string()))?;
        if !playlist.visible_to(viewer) {
            return Err(Error::Forbidden(playlist.name.clone()));
        }
        Ok(playlist.clone())
    }

    /// Copy of the whole authoritative snapshot
    pub async fn snapshot(&self) -> PlaylistDocument {
        self.snapshot.lock().await.clone()
    }

    // ========================================
    // Mutations
    // ========================================

    /// Append `track` to `owner`'s playlist `name`, creating it on request
    ///
    /// An existing playlist keeps its visibility; `is_public` only applies
    /// to a newly created one.
    pub async fn add_track(
        &self,
        actor: UserId,
        owner: UserId,
        name: &str,
        track: PlaylistTrack,
        is_public: bool,
        create_if_missing: bool,
    ) -> Result<AddOutcome> {
        let name = validate_name(name)?;

        let outcome = self
            .mutate(|doc| match doc.find_mut(owner, name) {
                Some(playlist) => {
                    if !playlist.mutable_by(actor) {
                        return Err(Error::Forbidden(playlist.name.clone()));
                    }
                    if playlist.contains_url(&track.url) {
                        return Ok(Mutation::Unchanged(AddOutcome::Duplicate));
                    }
                    playlist.tracks.push(track);
                    Ok(Mutation::Changed(AddOutcome::Added))
                }
                None if create_if_missing => {
                    if actor != owner {
                        return Err(Error::Forbidden(name.to_string()));
                    }
                    doc.insert(PlaylistRecord {
                        name: name.to_string(),
                        owner_id: owner,
                        is_public,
                        tracks: vec![track],
                    });
                    Ok(Mutation::Changed(AddOutcome::Created))
                }
                None => Ok(Mutation::Unchanged(AddOutcome::NotFound)),
            })
            .await?;

        match outcome {
            AddOutcome::Added => self.emit(owner, name, PlaylistChange::TrackAdded),
            AddOutcome::Created => self.emit(owner, name, PlaylistChange::Created),
            AddOutcome::Duplicate | AddOutcome::NotFound => {}
        }
        Ok(outcome)
    }

    pub async fn rename(&self, actor: UserId, owner: UserId, old: &str, new: &str) -> Result<()> {
        let old = old.trim();
        let new = validate_name(new)?;

        self.mutate(|doc| {
            writable(doc, actor, owner, old)?;
            let index = doc
                .position(owner, old)
                .ok_or_else(|| Error::PlaylistNotFound(old.to_string()))?;
            if doc.name_taken(owner, new, index) {
                return Err(Error::NameTaken(new.to_string()));
            }
            writable(doc, actor, owner, old)?.name = new.to_string();
            Ok(Mutation::Changed(()))
        })
        .await?;

        self.emit(owner, new, PlaylistChange::Renamed);
        Ok(())
    }

    pub async fn clear(&self, actor: UserId, owner: UserId, name: &str) -> Result<()> {
        let name = name.trim();
        self.mutate(|doc| {
            writable(doc, actor, owner, name)?.tracks.clear();
            Ok(Mutation::Changed(()))
        })
        .await?;

        self.emit(owner, name, PlaylistChange::Cleared);
        Ok(())
    }

    /// Remove the track at 0-based `index`, returning it
    pub async fn remove_at(
        &self,
        actor: UserId,
        owner: UserId,
        name: &str,
        index: usize,
    ) -> Result<PlaylistTrack> {
        let name = name.trim();
        let removed = self
            .mutate(|doc| {
                let playlist = writable(doc, actor, owner, name)?;
                let len = playlist.tracks.len();
                if index >= len {
                    return Err(Error::IndexOutOfRange { index, len });
                }
                Ok(Mutation::Changed(playlist.tracks.remove(index)))
            })
            .await?;

        self.emit(owner, name, PlaylistChange::TrackRemoved);
        Ok(removed)
    }

    pub async fn delete(&self, actor: UserId, owner: UserId, name: &str) -> Result<()> {
        let name = name.trim();
        self.mutate(|doc| {
            writable(doc, actor, owner, name)?;
            doc.remove(owner, name);
            Ok(Mutation::Changed(()))
        })
        .await?;

        self.emit(owner, name, PlaylistChange::Deleted);
        Ok(())
    }

    /// Change visibility; only the owner may do this
    pub async fn set_visibility(
        &self,
        actor: UserId,
        owner: UserId,
        name: &str,
        is_public: bool,
    ) -> Result<()> {
        let name = name.trim();
        let changed = self
            .mutate(|doc| {
                let playlist = doc
                    .find_mut(owner, name)
                    .ok_or_else(|| Error::PlaylistNotFound(name.to_string()))?;
                if actor != owner {
                    return Err(Error::Forbidden(playlist.name.clone()));
                }
                if playlist.is_public == is_public {
                    return Ok(Mutation::Unchanged(false));
                }
                playlist.is_public = is_public;
                Ok(Mutation::Changed(true))
            })
            .await?;

        if changed {
            self.emit(owner, name, PlaylistChange::VisibilityChanged);
        }
        Ok(())
    }

    // ========================================
    // Internals
    // ========================================

    /// Apply `f` to a copy of the snapshot; persist and swap on change
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut PlaylistDocument) -> Result<Mutation<T>>,
    ) -> Result<T> {
        let mut snapshot = self.snapshot.lock().await;
        let mut working = snapshot.clone();

        match f(&mut working)? {
            Mutation::Unchanged(value) => Ok(value),
            Mutation::Changed(value) => {
                self.persist(&working).await?;
                *snapshot = working;
                Ok(value)
            }
        }
    }

    async fn persist(&self, document: &PlaylistDocument) -> Result<()> {
        let mut delay = self.retry.backoff;
        let mut attempt = 1;
        loop {
            match self.persistence.save(document).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.attempts => {
                    warn!(attempt, error = %e, "Playlist write failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "Playlist write failed, change discarded");
                    return Err(match e {
                        Error::Persistence(msg) => Error::Persistence(msg),
                        other => Error::Persistence(other.to_string()),
                    });
                }
            }
        }
    }

    fn emit(&self, owner: UserId, name: &str, change: PlaylistChange) {
        info!(owner = %owner, playlist = %name, %change, "Playlist changed");
        self.events.emit_lossy(GmqEvent::PlaylistChanged {
            owner_id: owner,
            name: name.to_string(),
            change,
            timestamp: chrono::Utc::now(),
        });
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("playlist name must not be empty".to_string()));
    }
    Ok(name)
}

/// Locate a playlist the actor may modify
fn writable<'a>(
    doc: &'a mut PlaylistDocument,
    actor: UserId,
    owner: UserId,
    name: &str,
) -> Result<&'a mut PlaylistRecord> {
    let playlist = doc
        .find_mut(owner, name)
        .ok_or_else(|| Error::PlaylistNotFound(name.to_string()))?;
    if !playlist.mutable_by(actor) {
        return Err(Error::Forbidden(playlist.name.clone()));
    }
    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryPolicy::from_config(&StoreSection {
            file_name: "x.json".into(),
            write_attempts: 0,
            retry_backoff_ms: 20,
        });
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.backoff, Duration::from_millis(20));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Chill ").unwrap(), "Chill");
        assert!(matches!(validate_name("   "), Err(Error::InvalidInput(_))));
    }
}
