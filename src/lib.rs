// Adaptive letter practice: picks which items a learner sees each round from
// their accumulated per-item statistics, and keeps those statistics correct
// under rapid, interleaved answers.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod progress;
pub mod recorder;
pub mod round;
pub mod sampler;
pub mod stats;
pub mod storage;
pub mod util;
pub mod weight;

pub use engine::PracticeEngine;
pub use error::{EngineError, Result};
pub use item::{Alphabet, CaseFilter, ItemKey, ItemUniverse, LetterCase, ProfileId};
pub use recorder::AnswerOutcome;
pub use round::{RoundConfiguration, RoundMode, RoundResult, RoundState};
pub use stats::ItemStatistic;
pub use weight::Difficulty;
