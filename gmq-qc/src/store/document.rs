//! In-memory form of the persisted playlist document
//!
//! A JSON object mapping owner id (as a string) to that owner's playlists.

use gmq_common::{PlaylistRecord, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistDocument {
    owners: BTreeMap<String, Vec<PlaylistRecord>>,
}

impl PlaylistDocument {
    pub fn is_empty(&self) -> bool {
        self.owners.values().all(Vec::is_empty)
    }

    /// Total number of playlists across owners
    pub fn playlist_count(&self) -> usize {
        self.owners.values().map(Vec::len).sum()
    }

    /// Playlists of `owner`, empty when the owner has none
    pub fn owned_by(&self, owner: UserId) -> &[PlaylistRecord] {
        self.owners
            .get(&owner.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Index of `owner`'s playlist named `name` (case-insensitive)
    pub fn position(&self, owner: UserId, name: &str) -> Option<usize> {
        self.owned_by(owner).iter().position(|p| p.name_matches(name))
    }

    pub fn find(&self, owner: UserId, name: &str) -> Option<&PlaylistRecord> {
        self.owned_by(owner).iter().find(|p| p.name_matches(name))
    }

    pub fn find_mut(&mut self, owner: UserId, name: &str) -> Option<&mut PlaylistRecord> {
        self.owners
            .get_mut(&owner.to_string())?
            .iter_mut()
            .find(|p| p.name_matches(name))
    }

    pub fn insert(&mut self, record: PlaylistRecord) {
        self.owners
            .entry(record.owner_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn remove(&mut self, owner: UserId, name: &str) -> Option<PlaylistRecord> {
        let index = self.position(owner, name)?;
        self.owners
            .get_mut(&owner.to_string())
            .map(|list| list.remove(index))
    }

    /// Whether another playlist of `owner` (not at `except`) is named `name`
    pub fn name_taken(&self, owner: UserId, name: &str, except: usize) -> bool {
        self.owned_by(owner)
            .iter()
            .enumerate()
            .any(|(i, p)| i != except && p.name_matches(name))
    }

    /// Every playlist visible to `user`, owners in key order
    pub fn visible_to(&self, user: UserId) -> Vec<PlaylistRecord> {
        self.owners
            .values()
            .flatten()
            .filter(|p| p.visible_to(user))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmq_common::PlaylistTrack;

    fn record(name: &str, owner: u64, public: bool) -> PlaylistRecord {
        PlaylistRecord {
            name: name.to_string(),
            owner_id: UserId(owner),
            is_public: public,
            tracks: vec![],
        }
    }

    #[test]
    fn test_document_wire_format() {
        let json = r#"{
            "1": [{"name": "Chill", "owner_id": 1, "is_public": false,
                   "tracks": [{"title": "a", "url": "u1"}], "extra": 5}],
            "2": []
        }"#;
        let doc: PlaylistDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.playlist_count(), 1);
        let chill = doc.find(UserId(1), "chill").unwrap();
        assert_eq!(
            chill.tracks,
            vec![PlaylistTrack {
                title: "a".into(),
                url: "u1".into()
            }]
        );
    }

    #[test]
    fn test_visible_to_includes_public_and_owned() {
        let mut doc = PlaylistDocument::default();
        doc.insert(record("Mine", 1, false));
        doc.insert(record("Secret", 2, false));
        doc.insert(record("Shared", 2, true));

        let names: Vec<String> = doc.visible_to(UserId(1)).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Mine", "Shared"]);
    }

    #[test]
    fn test_name_taken_ignores_self() {
        let mut doc = PlaylistDocument::default();
        doc.insert(record("Chill", 1, false));
        doc.insert(record("Party", 1, false));

        assert!(!doc.name_taken(UserId(1), "CHILL", 0));
        assert!(doc.name_taken(UserId(1), "party", 0));
    }

    #[test]
    fn test_remove() {
        let mut doc = PlaylistDocument::default();
        doc.insert(record("Chill", 1, false));

        assert!(doc.remove(UserId(1), "chill").is_some());
        assert!(doc.remove(UserId(1), "chill").is_none());
        assert!(doc.is_empty());
    }
}
