use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::io::Write;

use crate::item::ItemKey;
use crate::stats::ItemStatistic;
use crate::util::{mean, ratio, std_dev};
use crate::weight::{weight, Difficulty};

pub const MASTERY_MIN_ATTEMPTS: u32 = 5;
pub const MASTERY_SUCCESS_RATE: f64 = 0.9;

/// Aggregate view of a profile's statistics for progress screens
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub items_tracked: usize,
    pub items_practiced: usize,
    pub total_attempts: u64,
    /// Correct answers over all attempts, None before the first answer
    pub overall_success_rate: Option<f64>,
    pub mean_item_success: Option<f64>,
    /// Spread of per-item success rates; low means evenly learned
    pub success_spread: Option<f64>,
    pub mastered: Vec<ItemKey>,
    /// Practiced items that would currently be drawn most often, heaviest first
    pub weakest: Vec<(ItemKey, f64)>,
}

impl ProgressSummary {
    pub fn from_snapshot(
        snapshot: &[ItemStatistic],
        difficulty: Difficulty,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Self {
        let practiced: Vec<&ItemStatistic> = snapshot.iter().filter(|s| !s.is_unseen()).collect();

        let total_attempts: u64 = practiced.iter().map(|s| u64::from(s.total_attempts())).sum();
        let total_correct: u64 = practiced.iter().map(|s| u64::from(s.correct_count())).sum();
        let rates: Vec<f64> = practiced.iter().map(|s| s.success_rate()).collect();

        let mastered = practiced
            .iter()
            .filter(|s| {
                s.total_attempts() >= MASTERY_MIN_ATTEMPTS
                    && s.success_rate() >= MASTERY_SUCCESS_RATE
            })
            .map(|s| s.item())
            .sorted()
            .collect();

        let weakest = practiced
            .iter()
            .map(|s| (s.item(), weight(s, difficulty, now)))
            .sorted_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
            .take(limit)
            .collect();

        Self {
            items_tracked: snapshot.len(),
            items_practiced: practiced.len(),
            total_attempts,
            overall_success_rate: ratio(total_correct, total_attempts),
            mean_item_success: mean(&rates),
            success_spread: std_dev(&rates),
            mastered,
            weakest,
        }
    }
}

#[derive(Serialize)]
struct CsvRow {
    letter: char,
    case: String,
    total_attempts: u32,
    correct_count: u32,
    incorrect_count: u32,
    success_rate: f64,
    last_attempt_at: Option<String>,
}

/// Export a snapshot as CSV with a header row
pub fn write_csv<W: Write>(snapshot: &[ItemStatistic], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for stat in snapshot {
        wtr.serialize(CsvRow {
            letter: stat.item().letter,
            case: stat.item().case.to_string(),
            total_attempts: stat.total_attempts(),
            correct_count: stat.correct_count(),
            incorrect_count: stat.incorrect_count(),
            success_rate: stat.success_rate(),
            last_attempt_at: stat.last_attempt_at().map(|ts| ts.to_rfc3339()),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
