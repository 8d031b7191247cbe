//! Device-persisted mirror of recent completions.
//!
//! Reads fall back to this store when the authoritative one is unreachable,
//! and writes land here first when the authoritative store is down. Entries
//! captured that way stay `synced: false` until reconciled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use challenge_types::{ChallengeCompletion, DateRange, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::{CompletionStore, InsertOutcome, StoreError};

pub const DEFAULT_LOCAL_CAPACITY: usize = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEntry {
    pub completion: ChallengeCompletion,
    pub synced: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Per user, ordered by `challenge_date` ascending.
    users: HashMap<UserId, Vec<LocalEntry>>,
}

pub struct LocalCompletionStore {
    path: Option<PathBuf>,
    capacity: usize,
    state: Mutex<Snapshot>,
}

impl LocalCompletionStore {
    /// A store that lives only as long as the process.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            state: Mutex::new(Snapshot::default()),
        }
    }

    /// Open the store persisted at `path`, starting empty if the file does
    /// not exist yet.
    pub async fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(err) => return Err(err.into()),
        };

        info!(
            "Opened local completion store at {} ({} users)",
            path.display(),
            snapshot.users.len()
        );
        Ok(Self {
            path: Some(path),
            capacity: capacity.max(1),
            state: Mutex::new(snapshot),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert unless the user already has an entry for that day. Check and
    /// insert happen under one lock. Nothing changes in memory unless the
    /// snapshot was written.
    pub async fn insert_entry(
        &self,
        completion: ChallengeCompletion,
        synced: bool,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let entries = next.users.entry(completion.user_id).or_default();

        let position = match entries
            .binary_search_by_key(&completion.challenge_date, |e| e.completion.challenge_date)
        {
            Ok(_) => return Ok(InsertOutcome::Conflict),
            Err(position) => position,
        };
        entries.insert(
            position,
            LocalEntry {
                completion: completion.clone(),
                synced,
            },
        );

        let overflow = entries.len().saturating_sub(self.capacity);
        if overflow > 0 {
            let evicted: Vec<LocalEntry> = entries.drain(..overflow).collect();
            for entry in evicted.iter().filter(|e| !e.synced) {
                warn!(
                    "Evicting unsynced local completion for user {} on {}",
                    entry.completion.user_id, entry.completion.challenge_date
                );
            }
        }

        self.persist(&next).await?;
        *state = next;
        Ok(InsertOutcome::Inserted(completion))
    }

    pub async fn entries(&self, user_id: UserId) -> Vec<LocalEntry> {
        let state = self.state.lock().await;
        state.users.get(&user_id).cloned().unwrap_or_default()
    }

    /// Entries still waiting to reach the authoritative store, oldest first.
    pub async fn unsynced(&self, user_id: UserId) -> Vec<ChallengeCompletion> {
        let state = self.state.lock().await;
        state
            .users
            .get(&user_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| !e.synced)
                    .map(|e| e.completion.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn mark_synced(&self, user_id: UserId, day: NaiveDate) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let updated = next
            .users
            .get_mut(&user_id)
            .and_then(|entries| {
                entries
                    .iter_mut()
                    .find(|e| e.completion.challenge_date == day)
            })
            .map(|entry| entry.synced = true)
            .is_some();

        if updated {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(updated)
    }

    /// Drop the entry for that user and day.
    pub async fn discard(&self, user_id: UserId, day: NaiveDate) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let removed = match next.users.get_mut(&user_id) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|e| e.completion.challenge_date != day);
                entries.len() != before
            }
            None => false,
        };

        if removed {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(removed)
    }

    /// Overwrite whatever is stored for that user and day with the
    /// authoritative record.
    pub async fn replace_with_authoritative(
        &self,
        completion: ChallengeCompletion,
    ) -> Result<(), StoreError> {
        self.mirror_authoritative(std::slice::from_ref(&completion)).await
    }

    /// Apply a batch of authoritative records, each replacing the local
    /// entry for its user and day. Persists once.
    pub async fn mirror_authoritative(
        &self,
        completions: &[ChallengeCompletion],
    ) -> Result<(), StoreError> {
        if completions.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        for completion in completions {
            let entries = next.users.entry(completion.user_id).or_default();
            let entry = LocalEntry {
                completion: completion.clone(),
                synced: true,
            };
            match entries
                .binary_search_by_key(&completion.challenge_date, |e| e.completion.challenge_date)
            {
                Ok(position) => entries[position] = entry,
                Err(position) => entries.insert(position, entry),
            }
            let overflow = entries.len().saturating_sub(self.capacity);
            entries.drain(..overflow);
        }

        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn persist(&self, state: &Snapshot) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("Persisted local completion store to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl CompletionStore for LocalCompletionStore {
    async fn find(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<ChallengeCompletion>, StoreError> {
        let state = self.state.lock().await;
        let completions = state
            .users
            .get(&user_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .filter(|e| range.contains(e.completion.challenge_date))
                    .map(|e| e.completion.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(completions)
    }

    /// Entries arriving through the generic store interface have unknown
    /// provenance, so they are kept unsynced and replayed by reconciliation.
    async fn insert_if_absent(
        &self,
        completion: ChallengeCompletion,
    ) -> Result<InsertOutcome, StoreError> {
        self.insert_entry(completion, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_types::GameType;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn completion(user_id: UserId, date: NaiveDate, points: u32) -> ChallengeCompletion {
        ChallengeCompletion {
            id: Uuid::new_v4(),
            user_id,
            challenge_date: date,
            completed_at: Utc.from_utc_datetime(&date.and_hms_opt(8, 0, 0).unwrap()),
            game_type: GameType::Sequence,
            earned_points: points,
            source_result_id: "local".to_string(),
        }
    }

    fn full_range() -> DateRange {
        DateRange::new(day(1), day(28)).unwrap()
    }

    #[tokio::test]
    async fn test_one_entry_per_user_and_day() {
        let store = LocalCompletionStore::in_memory(10);
        let user_id = Uuid::new_v4();

        let first = store.insert_entry(completion(user_id, day(3), 100), true).await.unwrap();
        let second = store.insert_entry(completion(user_id, day(3), 50), false).await.unwrap();

        assert!(matches!(first, InsertOutcome::Inserted(_)));
        assert_eq!(second, InsertOutcome::Conflict);
        assert_eq!(store.find(user_id, full_range()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_day_first() {
        let store = LocalCompletionStore::in_memory(3);
        let user_id = Uuid::new_v4();

        for d in [5, 2, 7, 4] {
            store.insert_entry(completion(user_id, day(d), 10), true).await.unwrap();
        }

        let days: Vec<NaiveDate> = store
            .entries(user_id)
            .await
            .into_iter()
            .map(|e| e.completion.challenge_date)
            .collect();
        assert_eq!(days, vec![day(4), day(5), day(7)]);
    }

    #[tokio::test]
    async fn test_find_filters_range_newest_first() {
        let store = LocalCompletionStore::in_memory(10);
        let user_id = Uuid::new_v4();
        for d in [1, 10, 20] {
            store.insert_entry(completion(user_id, day(d), 10), true).await.unwrap();
        }

        let found = store
            .find(user_id, DateRange::new(day(5), day(25)).unwrap())
            .await
            .unwrap();
        let days: Vec<NaiveDate> = found.iter().map(|c| c.challenge_date).collect();
        assert_eq!(days, vec![day(20), day(10)]);
        assert!(store.find(Uuid::new_v4(), full_range()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsynced_tracking() {
        let store = LocalCompletionStore::in_memory(10);
        let user_id = Uuid::new_v4();
        store.insert_entry(completion(user_id, day(1), 10), true).await.unwrap();
        store.insert_entry(completion(user_id, day(2), 10), false).await.unwrap();
        store.insert_if_absent(completion(user_id, day(3), 10)).await.unwrap();

        let pending: Vec<NaiveDate> = store
            .unsynced(user_id)
            .await
            .into_iter()
            .map(|c| c.challenge_date)
            .collect();
        assert_eq!(pending, vec![day(2), day(3)]);

        assert!(store.mark_synced(user_id, day(2)).await.unwrap());
        assert!(!store.mark_synced(user_id, day(9)).await.unwrap());
        assert_eq!(store.unsynced(user_id).await.len(), 1);

        assert!(store.discard(user_id, day(3)).await.unwrap());
        assert!(!store.discard(user_id, day(3)).await.unwrap());
        assert!(store.unsynced(user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_replace_with_authoritative_overwrites_day() {
        let store = LocalCompletionStore::in_memory(10);
        let user_id = Uuid::new_v4();
        store.insert_entry(completion(user_id, day(6), 75), false).await.unwrap();

        let authoritative = completion(user_id, day(6), 125);
        store.replace_with_authoritative(authoritative.clone()).await.unwrap();

        let entries = store.entries(user_id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].completion, authoritative);
        assert!(entries[0].synced);
    }

    #[tokio::test]
    async fn test_mirror_keeps_unsynced_days_it_does_not_cover() {
        let store = LocalCompletionStore::in_memory(10);
        let user_id = Uuid::new_v4();
        store.insert_entry(completion(user_id, day(8), 75), false).await.unwrap();
        store.insert_entry(completion(user_id, day(9), 75), false).await.unwrap();

        store
            .mirror_authoritative(&[completion(user_id, day(7), 100), completion(user_id, day(8), 100)])
            .await
            .unwrap();

        let entries = store.entries(user_id).await;
        let summary: Vec<(NaiveDate, u32, bool)> = entries
            .iter()
            .map(|e| (e.completion.challenge_date, e.completion.earned_points, e.synced))
            .collect();
        assert_eq!(
            summary,
            vec![(day(7), 100, true), (day(8), 100, true), (day(9), 75, false)]
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let path = std::env::temp_dir().join(format!("local-store-{}.json", Uuid::new_v4()));
        let user_id = Uuid::new_v4();

        {
            let store = LocalCompletionStore::open(&path, 10).await.unwrap();
            store.insert_entry(completion(user_id, day(11), 90), false).await.unwrap();
        }

        let reopened = LocalCompletionStore::open(&path, 10).await.unwrap();
        let entries = reopened.entries(user_id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].completion.earned_points, 90);
        assert!(!entries[0].synced);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_unchanged() {
        let path = std::env::temp_dir()
            .join(format!("missing-dir-{}", Uuid::new_v4()))
            .join("store.json");
        let store = LocalCompletionStore::open(&path, 10).await.unwrap();
        let user_id = Uuid::new_v4();

        assert!(store.insert_entry(completion(user_id, day(12), 90), false).await.is_err());
        assert!(store.entries(user_id).await.is_empty());
        assert!(store.insert_entry(completion(user_id, day(12), 90), false).await.is_err());
        assert!(
            store
                .mirror_authoritative(&[completion(user_id, day(13), 100)])
                .await
                .is_err()
        );
        assert!(store.entries(user_id).await.is_empty());
    }
}
