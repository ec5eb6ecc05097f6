use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Result, StatsStorage, StorageError};
use crate::item::{ItemKey, ProfileId};
use crate::stats::ItemStatistic;

/// In-process statistics table.
///
/// Every operation can optionally suspend (yield to the executor) before it
/// touches the map, which models an asynchronous storage round-trip and lets
/// concurrent read-modify-write sequences interleave. Reads and writes can
/// also be switched to fail, standing in for an unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<BTreeMap<(ProfileId, ItemKey), ItemStatistic>>,
    suspend: bool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the executor before every operation
    pub fn with_suspension() -> Self {
        Self {
            suspend: true,
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn read_point(&self) -> Result<()> {
        self.suspend_point().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    async fn write_point(&self) -> Result<()> {
        self.suspend_point().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    async fn suspend_point(&self) {
        if self.suspend {
            tokio::task::yield_now().await;
        }
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(ProfileId, ItemKey), ItemStatistic>>> {
        self.records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory table lock poisoned".to_string()))
    }
}

impl StatsStorage for MemoryStorage {
    async fn get(&self, profile: &ProfileId, item: &ItemKey) -> Result<Option<ItemStatistic>> {
        self.read_point().await?;
        Ok(self.records()?.get(&(profile.clone(), *item)).cloned())
    }

    async fn put(&self, profile: &ProfileId, stat: &ItemStatistic) -> Result<()> {
        self.write_point().await?;
        self.records()?
            .insert((profile.clone(), stat.item()), stat.clone());
        Ok(())
    }

    async fn put_batch(&self, profile: &ProfileId, stats: &[ItemStatistic]) -> Result<()> {
        self.write_point().await?;
        let mut records = self.records()?;
        for stat in stats {
            records.insert((profile.clone(), stat.item()), stat.clone());
        }
        Ok(())
    }

    async fn query_by_profile(&self, profile: &ProfileId) -> Result<Vec<ItemStatistic>> {
        self.read_point().await?;
        Ok(self
            .records()?
            .iter()
            .filter(|((owner, _), _)| owner == profile)
            .map(|(_, stat)| stat.clone())
            .collect())
    }

    async fn delete_profile(&self, profile: &ProfileId) -> Result<()> {
        self.write_point().await?;
        self.records()?.retain(|(owner, _), _| owner != profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::future::join_all;

    #[tokio::test]
    async fn test_failure_switches() {
        let storage = MemoryStorage::new();
        let profile = ProfileId::from("ada");
        let stat = ItemStatistic::new(ItemKey::lower('a'));

        storage.set_fail_writes(true);
        assert!(storage.put(&profile, &stat).await.is_err());
        storage.set_fail_writes(false);
        storage.put(&profile, &stat).await.unwrap();

        storage.set_fail_reads(true);
        assert!(storage.query_by_profile(&profile).await.is_err());
        storage.set_fail_reads(false);
        assert_eq!(storage.query_by_profile(&profile).await.unwrap().len(), 1);
    }

    // Sanity check for the harness: without serialization, interleaved
    // read-modify-write sequences against a suspending backend lose updates.
    #[tokio::test]
    async fn test_unserialized_updates_interleave() {
        let storage = MemoryStorage::with_suspension();
        let profile = ProfileId::from("ada");
        let item = ItemKey::lower('a');
        let writers = 25;
        let storage = &storage;
        let profile = &profile;

        join_all((0..writers).map(|_| async move {
            let mut stat = storage
                .get(profile, &item)
                .await
                .unwrap()
                .unwrap_or_else(|| ItemStatistic::new(item));
            stat.record(true, Utc::now());
            storage.put(profile, &stat).await.unwrap();
        }))
        .await;

        let stored = storage.get(profile, &item).await.unwrap().unwrap();
        assert!(stored.total_attempts() < writers);
    }
}
