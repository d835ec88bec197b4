//! In-memory playlist persistence with injectable write failures

use async_trait::async_trait;
use gmq_qc::store::{PlaylistDocument, PlaylistPersistence};
use gmq_qc::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<PlaylistDocument>>,
    failures_left: AtomicUsize,
    save_attempts: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` save calls
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    /// Last successfully saved document
    pub fn saved(&self) -> Option<PlaylistDocument> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaylistPersistence for MemoryPersistence {
    async fn load(&self) -> Result<PlaylistDocument> {
        Ok(self.saved().unwrap_or_default())
    }

    async fn save(&self, document: &PlaylistDocument) -> Result<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Persistence("disk full".to_string()));
        }
        *self.saved.lock().unwrap() = Some(document.clone());
        Ok(())
    }
}
