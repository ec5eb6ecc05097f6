use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::ItemStatistic;

/// How strongly a round leans toward weak items
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    /// Flattens weights toward uniform sampling
    Relaxed,
    #[default]
    Standard,
    /// Amplifies the bias toward weak items
    Intensive,
}

/// Tuning constants for [`weight_with`]
#[derive(Debug, Clone, PartialEq)]
pub struct WeightParams {
    /// Items not attempted for longer than this get the recency boost
    pub recency_threshold: Duration,
    pub recency_boost: f64,
    /// No item ever drops below this weight
    pub floor: f64,
    /// `relaxed` maps w to `base + (1 - base) * w`
    pub relaxed_base: f64,
    /// `intensive` maps w to `w ^ exponent`
    pub intensive_exponent: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            recency_threshold: Duration::days(7),
            recency_boost: 1.2,
            floor: 0.1,
            relaxed_base: 0.3,
            intensive_exponent: 0.7,
        }
    }
}

impl WeightParams {
    fn recency_factor(&self, stat: &ItemStatistic, now: DateTime<Utc>) -> f64 {
        match stat.last_attempt_at() {
            Some(last) if now - last > self.recency_threshold => self.recency_boost,
            _ => 1.0,
        }
    }

    fn apply_difficulty(&self, w: f64, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Relaxed => self.relaxed_base + (1.0 - self.relaxed_base) * w,
            Difficulty::Standard => w,
            Difficulty::Intensive => w.powf(self.intensive_exponent),
        }
    }
}

/// Selection weight of an item with the default constants
pub fn weight(stat: &ItemStatistic, difficulty: Difficulty, now: DateTime<Utc>) -> f64 {
    weight_with(stat, difficulty, now, &WeightParams::default())
}

/// Selection weight of an item: its error rate, boosted when it has not been
/// practiced recently, shaped by the difficulty tier and floored so every
/// item keeps a non-zero chance. Unseen items always weigh 1.0.
pub fn weight_with(
    stat: &ItemStatistic,
    difficulty: Difficulty,
    now: DateTime<Utc>,
    params: &WeightParams,
) -> f64 {
    if stat.is_unseen() {
        return 1.0;
    }

    let error_weight = 1.0 - stat.success_rate();
    let boosted = error_weight * params.recency_factor(stat, now);

    params
        .apply_difficulty(boosted, difficulty)
        .max(params.floor)
}
