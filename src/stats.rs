use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as WriteQueue;

use crate::item::{ItemKey, ProfileId};
use crate::storage::{Result, StatsStorage};

/// Attempt counters for one item of one profile.
///
/// `total_attempts` always equals `correct_count + incorrect_count`: the
/// counters are private and only move together through [`record`](Self::record).
/// The success rate is derived on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatistic {
    item: ItemKey,
    correct_count: u32,
    incorrect_count: u32,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl ItemStatistic {
    /// A zeroed record, as seeded at profile initialization
    pub fn new(item: ItemKey) -> Self {
        Self {
            item,
            correct_count: 0,
            incorrect_count: 0,
            last_attempt_at: None,
        }
    }

    pub fn from_counts(
        item: ItemKey,
        correct_count: u32,
        incorrect_count: u32,
        last_attempt_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            item,
            correct_count,
            incorrect_count,
            last_attempt_at,
        }
    }

    pub fn item(&self) -> ItemKey {
        self.item
    }

    pub fn total_attempts(&self) -> u32 {
        self.correct_count.saturating_add(self.incorrect_count)
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }

    /// correct / total, or 0 for an item never attempted
    pub fn success_rate(&self) -> f64 {
        match self.total_attempts() {
            0 => 0.0,
            total => self.correct_count as f64 / total as f64,
        }
    }

    pub fn is_unseen(&self) -> bool {
        self.total_attempts() == 0
    }

    /// Count one judged answer
    pub fn record(&mut self, was_correct: bool, at: DateTime<Utc>) {
        if was_correct {
            self.correct_count = self.correct_count.saturating_add(1);
        } else {
            self.incorrect_count = self.incorrect_count.saturating_add(1);
        }
        self.last_attempt_at = Some(at);
    }
}

/// Owner of all [`ItemStatistic`] records.
///
/// Writes for a profile go through that profile's FIFO queue, so a
/// read-modify-write against the backing storage is never interleaved with
/// another write for the same profile, however many times the storage
/// suspends in between. Reads do not queue.
#[derive(Debug)]
pub struct StatisticsStore<S> {
    storage: S,
    write_queues: Mutex<HashMap<ProfileId, Arc<WriteQueue<()>>>>,
}

impl<S: StatsStorage> StatisticsStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn write_queue(&self, profile: &ProfileId) -> Arc<WriteQueue<()>> {
        let mut queues = self
            .write_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        queues.entry(profile.clone()).or_default().clone()
    }

    /// Seed a zeroed record for every item, unless the profile already has
    /// records. Returns whether anything was seeded.
    pub async fn initialize(&self, profile: &ProfileId, items: &[ItemKey]) -> Result<bool> {
        let queue = self.write_queue(profile);
        let _turn = queue.lock().await;

        if !self.storage.query_by_profile(profile).await?.is_empty() {
            return Ok(false);
        }

        let zeroed: Vec<ItemStatistic> = items.iter().copied().map(ItemStatistic::new).collect();
        self.storage.put_batch(profile, &zeroed).await?;
        log::info!("seeded {} items for profile {profile}", zeroed.len());
        Ok(true)
    }

    /// Current snapshot; an unknown profile yields an empty list
    pub async fn get_all(&self, profile: &ProfileId) -> Result<Vec<ItemStatistic>> {
        self.storage.query_by_profile(profile).await
    }

    pub async fn record_answer(
        &self,
        profile: &ProfileId,
        item: ItemKey,
        was_correct: bool,
    ) -> Result<ItemStatistic> {
        self.record_answer_at(profile, item, was_correct, Utc::now())
            .await
    }

    /// Fetch-or-create, count the answer, persist; one queued unit per call
    pub async fn record_answer_at(
        &self,
        profile: &ProfileId,
        item: ItemKey,
        was_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<ItemStatistic> {
        let queue = self.write_queue(profile);
        let _turn = queue.lock().await;

        let mut stat = self
            .storage
            .get(profile, &item)
            .await?
            .unwrap_or_else(|| ItemStatistic::new(item));
        stat.record(was_correct, at);
        self.storage.put(profile, &stat).await?;

        log::debug!(
            "recorded {} answer for {item} in profile {profile} ({}/{})",
            if was_correct { "correct" } else { "incorrect" },
            stat.correct_count(),
            stat.total_attempts()
        );
        Ok(stat)
    }

    /// Delete every record of the profile
    pub async fn clear(&self, profile: &ProfileId) -> Result<()> {
        let queue = self.write_queue(profile);
        let _turn = queue.lock().await;

        self.storage.delete_profile(profile).await?;
        log::info!("cleared statistics for profile {profile}");
        Ok(())
    }
}
