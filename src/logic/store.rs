//! Remote match storage contract and an in-memory implementation.
//!
//! Stores apply partial patches and push the full record to subscribers after
//! every write. Delivery keeps only the latest value: a slow subscriber may
//! skip intermediate versions but always ends up with the newest record.

use crate::models::{MatchError, MatchId, MatchPatch, MatchRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::watch;

/// Errors reported by a match store.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("match {0} not found")]
    NotFound(MatchId),
    #[error("match {0} already exists")]
    AlreadyExists(MatchId),
    #[error("write rejected: {0}")]
    Rejected(#[from] MatchError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write contract the game flow depends on.
pub trait MatchStore: Send + Sync {
    /// Current record.
    fn load(&self, id: MatchId) -> Result<MatchRecord, SyncError>;

    /// Apply a partial write and return the resulting record.
    fn apply(&self, id: MatchId, patch: &MatchPatch) -> Result<MatchRecord, SyncError>;

    /// Start receiving the record on every change. The first poll yields the
    /// current record.
    fn subscribe(&self, id: MatchId) -> Result<Subscription, SyncError>;
}

/// Scoped handle on a match's change feed. Dropping it releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    match_id: MatchId,
    receiver: watch::Receiver<MatchRecord>,
}

impl Subscription {
    pub fn new(match_id: MatchId, mut receiver: watch::Receiver<MatchRecord>) -> Self {
        receiver.mark_changed();
        log::debug!("subscribed to match {}", match_id);
        Self { match_id, receiver }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Newest record if it changed since the last call, without waiting.
    pub fn latest(&mut self) -> Option<MatchRecord> {
        match self.receiver.has_changed() {
            Ok(true) => Some(self.receiver.borrow_and_update().clone()),
            Ok(false) => None,
            Err(_) => {
                log::warn!("match {} feed closed", self.match_id);
                None
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.has_changed().is_err()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        log::debug!("released subscription to match {}", self.match_id);
    }
}

/// Process-local store. Each record lives in a watch channel so writes reach
/// every subscriber.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matches: RwLock<HashMap<MatchId, watch::Sender<MatchRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new record. Its integrity is checked first.
    pub fn insert(&self, record: MatchRecord) -> Result<MatchRecord, SyncError> {
        record.validate()?;
        let mut matches = self.matches.write().map_err(|_| poisoned())?;
        if matches.contains_key(&record.id) {
            return Err(SyncError::AlreadyExists(record.id));
        }
        log::info!("stored match {}", record.id);
        let (sender, _) = watch::channel(record.clone());
        matches.insert(record.id, sender);
        Ok(record)
    }

    /// Drop a record; its subscribers see their feed close.
    pub fn remove(&self, id: MatchId) -> Result<bool, SyncError> {
        let mut matches = self.matches.write().map_err(|_| poisoned())?;
        Ok(matches.remove(&id).is_some())
    }

    /// Live subscriptions on a match (0 if unknown).
    pub fn subscriber_count(&self, id: MatchId) -> usize {
        self.matches
            .read()
            .ok()
            .and_then(|matches| matches.get(&id).map(|sender| sender.receiver_count()))
            .unwrap_or(0)
    }
}

impl MatchStore for MemoryStore {
    fn load(&self, id: MatchId) -> Result<MatchRecord, SyncError> {
        let matches = self.matches.read().map_err(|_| poisoned())?;
        let sender = matches.get(&id).ok_or(SyncError::NotFound(id))?;
        let record = sender.borrow().clone();
        Ok(record)
    }

    fn apply(&self, id: MatchId, patch: &MatchPatch) -> Result<MatchRecord, SyncError> {
        let matches = self.matches.read().map_err(|_| poisoned())?;
        let sender = matches.get(&id).ok_or(SyncError::NotFound(id))?;

        let mut outcome = Ok(());
        sender.send_if_modified(|record| match record.apply_patch(patch) {
            Ok(()) => {
                record.version += 1;
                record.updated_at = Utc::now();
                true
            }
            Err(err) => {
                outcome = Err(err);
                false
            }
        });
        if let Err(err) = outcome {
            log::warn!("match {}: rejected patch ({} updates): {}", id, patch.len(), err);
            return Err(err.into());
        }

        let record = sender.borrow().clone();
        log::debug!("match {} now at version {}", id, record.version);
        Ok(record)
    }

    fn subscribe(&self, id: MatchId) -> Result<Subscription, SyncError> {
        let matches = self.matches.read().map_err(|_| poisoned())?;
        let sender = matches.get(&id).ok_or(SyncError::NotFound(id))?;
        Ok(Subscription::new(id, sender.subscribe()))
    }
}

fn poisoned() -> SyncError {
    SyncError::Unavailable("lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldUpdate, MatchStatus};

    fn record() -> MatchRecord {
        let home = (1..=4).map(|i| format!("h{i}")).collect();
        let away = (1..=4).map(|i| format!("a{i}")).collect();
        MatchRecord::new(home, away).unwrap()
    }

    fn start_patch() -> MatchPatch {
        MatchPatch::from(FieldUpdate::Status {
            status: MatchStatus::InProgress,
        })
    }

    #[test]
    fn apply_bumps_version_and_notifies() {
        let store = MemoryStore::new();
        let id = store.insert(record()).unwrap().id;
        let mut sub = store.subscribe(id).unwrap();

        let first = sub.latest().unwrap();
        assert_eq!(first.version, 0);
        assert!(sub.latest().is_none());

        let updated = store.apply(id, &start_patch()).unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status, MatchStatus::InProgress);
        assert_eq!(sub.latest(), Some(updated));
    }

    #[test]
    fn subscribers_only_see_the_latest_version() {
        let store = MemoryStore::new();
        let id = store.insert(record()).unwrap().id;
        let mut sub = store.subscribe(id).unwrap();
        sub.latest();

        store.apply(id, &start_patch()).unwrap();
        store.apply(id, &start_patch()).unwrap();
        assert_eq!(sub.latest().map(|r| r.version), Some(2));
        assert!(sub.latest().is_none());
    }

    #[test]
    fn rejected_patch_changes_nothing() {
        let store = MemoryStore::new();
        let id = store.insert(record()).unwrap().id;
        let mut sub = store.subscribe(id).unwrap();
        sub.latest();

        let bad = MatchPatch::from(FieldUpdate::Lineup {
            round: crate::models::RoundIndex::FIRST,
            side: crate::models::TeamSide::Home,
            players: ["h4", "h3", "h2", "h1"].map(String::from),
        });
        assert!(matches!(
            store.apply(id, &bad),
            Err(SyncError::Rejected(MatchError::StartingLineupImmutable))
        ));
        assert!(sub.latest().is_none());
        assert_eq!(store.load(id).unwrap().version, 0);
    }

    #[test]
    fn dropping_a_subscription_releases_it() {
        let store = MemoryStore::new();
        let id = store.insert(record()).unwrap().id;
        let sub = store.subscribe(id).unwrap();
        assert_eq!(store.subscriber_count(id), 1);
        drop(sub);
        assert_eq!(store.subscriber_count(id), 0);
    }

    #[test]
    fn unknown_and_duplicate_matches() {
        let store = MemoryStore::new();
        let record = store.insert(record()).unwrap();
        assert_eq!(
            store.insert(record.clone()),
            Err(SyncError::AlreadyExists(record.id))
        );
        let missing = uuid::Uuid::new_v4();
        assert_eq!(store.load(missing), Err(SyncError::NotFound(missing)));
        assert!(store.subscribe(missing).is_err());

        let sub = store.subscribe(record.id).unwrap();
        assert!(store.remove(record.id).unwrap());
        assert!(sub.is_closed());
    }
}
