use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

use super::{Result, StatsStorage, StorageError};
use crate::app_dirs::AppDirs;
use crate::item::{ItemKey, LetterCase, ProfileId};
use crate::stats::ItemStatistic;

/// Current on-disk schema, tracked in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

const SELECT_COLUMNS: &str =
    "letter, letter_case, total_attempts, correct_count, incorrect_count, last_attempt_at";

const UPSERT: &str = r#"
    INSERT INTO item_stats
    (profile_id, letter, letter_case, total_attempts, correct_count, incorrect_count, last_attempt_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (profile_id, letter, letter_case) DO UPDATE SET
        total_attempts = excluded.total_attempts,
        correct_count = excluded.correct_count,
        incorrect_count = excluded.incorrect_count,
        last_attempt_at = excluded.last_attempt_at
"#;

/// SQLite-backed statistics table
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at the default per-user location
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().ok_or_else(|| {
            StorageError::Unavailable("could not resolve a data directory".to_string())
        })?;
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;
        Ok(f(&mut *conn)?)
    }

    /// Schema version currently recorded in the database
    pub fn schema_version(&self) -> Result<i32> {
        self.with_conn(|conn| read_user_version(conn))
    }
}

/// Bring the schema up to `SCHEMA_VERSION`
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let version = read_user_version(conn)?;

    if version < 1 {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS item_stats (
                profile_id TEXT NOT NULL,
                letter TEXT NOT NULL,
                letter_case TEXT NOT NULL,
                total_attempts INTEGER NOT NULL DEFAULT 0,
                correct_count INTEGER NOT NULL DEFAULT 0,
                incorrect_count INTEGER NOT NULL DEFAULT 0,
                last_attempt_at TEXT,
                PRIMARY KEY (profile_id, letter, letter_case)
            );
            CREATE INDEX IF NOT EXISTS idx_item_stats_profile ON item_stats(profile_id);
            PRAGMA user_version = 1;
            "#,
        )?;
        log::debug!("migrated statistics schema to version 1");
    }

    Ok(())
}

fn read_user_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Raw row contents; counters are checked against each other after reading
struct StatRow {
    item: ItemKey,
    total_attempts: u32,
    correct_count: u32,
    incorrect_count: u32,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl StatRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let letter_str: String = row.get(0)?;
        let letter = letter_str.chars().next().ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(0, "letter".to_string(), rusqlite::types::Type::Text)
        })?;
        let case_str: String = row.get(1)?;
        let case = LetterCase::from_tag(&case_str).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(
                1,
                "letter_case".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;
        let last_attempt_at = row
            .get::<_, Option<String>>(5)?
            .map(|ts| {
                DateTime::parse_from_rfc3339(&ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| {
                        rusqlite::Error::InvalidColumnType(
                            5,
                            "last_attempt_at".to_string(),
                            rusqlite::types::Type::Text,
                        )
                    })
            })
            .transpose()?;

        Ok(Self {
            item: ItemKey::new(letter, case),
            total_attempts: row.get(2)?,
            correct_count: row.get(3)?,
            incorrect_count: row.get(4)?,
            last_attempt_at,
        })
    }

    fn into_statistic(self, profile: &ProfileId) -> Result<ItemStatistic> {
        if self.correct_count.checked_add(self.incorrect_count) != Some(self.total_attempts) {
            return Err(StorageError::Corrupt {
                profile: profile.clone(),
                item: self.item,
            });
        }
        Ok(ItemStatistic::from_counts(
            self.item,
            self.correct_count,
            self.incorrect_count,
            self.last_attempt_at,
        ))
    }
}

fn upsert(conn: &Connection, profile: &ProfileId, stat: &ItemStatistic) -> rusqlite::Result<usize> {
    let item = stat.item();
    conn.execute(
        UPSERT,
        params![
            profile.as_str(),
            item.letter.to_string(),
            item.case.to_string(),
            stat.total_attempts(),
            stat.correct_count(),
            stat.incorrect_count(),
            stat.last_attempt_at().map(|ts| ts.to_rfc3339()),
        ],
    )
}

impl StatsStorage for SqliteStorage {
    async fn get(&self, profile: &ProfileId, item: &ItemKey) -> Result<Option<ItemStatistic>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM item_stats \
                     WHERE profile_id = ?1 AND letter = ?2 AND letter_case = ?3"
                ),
                params![profile.as_str(), item.letter.to_string(), item.case.to_string()],
                StatRow::from_row,
            )
            .optional()
        })?;

        row.map(|row| row.into_statistic(profile)).transpose()
    }

    async fn put(&self, profile: &ProfileId, stat: &ItemStatistic) -> Result<()> {
        self.with_conn(|conn| upsert(conn, profile, stat))?;
        Ok(())
    }

    async fn put_batch(&self, profile: &ProfileId, stats: &[ItemStatistic]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for stat in stats {
                upsert(&tx, profile, stat)?;
            }
            tx.commit()
        })
    }

    async fn query_by_profile(&self, profile: &ProfileId) -> Result<Vec<ItemStatistic>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM item_stats \
                 WHERE profile_id = ?1 ORDER BY letter, letter_case"
            ))?;
            let row_iter = stmt.query_map([profile.as_str()], StatRow::from_row)?;

            let mut rows = Vec::new();
            for row in row_iter {
                rows.push(row?);
            }
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|row| row.into_statistic(profile))
            .collect()
    }

    async fn delete_profile(&self, profile: &ProfileId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM item_stats WHERE profile_id = ?1",
                [profile.as_str()],
            )
        })?;
        Ok(())
    }
}
