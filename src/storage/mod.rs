//! Minimal persistence interface for per-profile item statistics.
//!
//! Any key-value or embedded database that can `get`, `put`, list by
//! profile and delete by profile satisfies [`StatsStorage`]. Implementations
//! do not need to make read-modify-write sequences atomic; the
//! [`StatisticsStore`](crate::stats::StatisticsStore) serializes writers per
//! profile on top of them.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use thiserror::Error;

use crate::item::{ItemKey, ProfileId};
use crate::stats::ItemStatistic;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt statistics for {item} in profile {profile}")]
    Corrupt { profile: ProfileId, item: ItemKey },
}

pub type Result<T> = std::result::Result<T, StorageError>;

// Callers are generic over the backend, so the futures never need to be Send.
#[allow(async_fn_in_trait)]
pub trait StatsStorage {
    async fn get(&self, profile: &ProfileId, item: &ItemKey) -> Result<Option<ItemStatistic>>;

    /// Insert or replace the record for `(profile, stat.item())`
    async fn put(&self, profile: &ProfileId, stat: &ItemStatistic) -> Result<()>;

    async fn put_batch(&self, profile: &ProfileId, stats: &[ItemStatistic]) -> Result<()> {
        for stat in stats {
            self.put(profile, stat).await?;
        }
        Ok(())
    }

    async fn query_by_profile(&self, profile: &ProfileId) -> Result<Vec<ItemStatistic>>;

    async fn delete_profile(&self, profile: &ProfileId) -> Result<()>;
}
