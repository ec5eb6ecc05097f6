//! The surface the UI talks to.
//!
//! A [`PracticeEngine`] owns the statistics store for one item universe and
//! at most one round in play. Every mutation of statistics goes through the
//! [`AnswerRecorder`]; round generation only reads snapshots.

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::item::{ItemKey, ItemUniverse, ProfileId};
use crate::progress::ProgressSummary;
use crate::recorder::{AnswerOutcome, AnswerRecorder};
use crate::round::{Round, RoundConfiguration, RoundGenerator, RoundResult};
use crate::stats::{ItemStatistic, StatisticsStore};
use crate::storage::{SqliteStorage, StatsStorage};
use crate::weight::{Difficulty, WeightParams};

#[derive(Debug)]
struct ActiveRound {
    profile: ProfileId,
    round: Round,
}

#[derive(Debug)]
pub struct PracticeEngine<S> {
    store: StatisticsStore<S>,
    universe: ItemUniverse,
    params: WeightParams,
    active: Option<ActiveRound>,
}

impl PracticeEngine<SqliteStorage> {
    /// Engine backed by the per-user SQLite database
    pub fn open_default(universe: ItemUniverse) -> Result<Self> {
        Ok(Self::new(SqliteStorage::open_default()?, universe))
    }
}

impl<S: StatsStorage> PracticeEngine<S> {
    pub fn new(storage: S, universe: ItemUniverse) -> Self {
        Self {
            store: StatisticsStore::new(storage),
            universe,
            params: WeightParams::default(),
            active: None,
        }
    }

    pub fn with_weight_params(mut self, params: WeightParams) -> Self {
        self.params = params;
        self
    }

    pub fn universe(&self) -> &ItemUniverse {
        &self.universe
    }

    pub fn store(&self) -> &StatisticsStore<S> {
        &self.store
    }

    /// Seed zeroed statistics for the universe if the profile has none yet
    pub async fn initialize_for_profile(&self, profile: &ProfileId) -> Result<()> {
        self.store
            .initialize(profile, &self.universe.all_items())
            .await?;
        Ok(())
    }

    /// Build a new round, replacing any round still in play
    pub async fn start_round(
        &mut self,
        profile: &ProfileId,
        config: &RoundConfiguration,
    ) -> Result<RoundResult> {
        self.start_round_with(profile, config, &mut rand::thread_rng())
            .await
    }

    pub async fn start_round_with<R: rand::Rng + ?Sized>(
        &mut self,
        profile: &ProfileId,
        config: &RoundConfiguration,
        rng: &mut R,
    ) -> Result<RoundResult> {
        if let Some(previous) = self.active.take() {
            if !previous.round.is_complete() {
                log::debug!(
                    "discarding unfinished round for profile {} at {}/{}",
                    previous.profile,
                    previous.round.position(),
                    previous.round.items().len()
                );
            }
        }

        self.initialize_for_profile(profile).await?;

        let generator = RoundGenerator::new(&self.store, &self.params);
        let round = generator
            .start_round(profile, &self.universe, config, rng)
            .await?;
        let result = round.result();

        self.active = Some(ActiveRound {
            profile: profile.clone(),
            round,
        });
        Ok(result)
    }

    /// Record the answer for the current item and move on. On a storage
    /// failure the same item stays active.
    pub async fn submit_answer(&mut self, was_correct: bool) -> Result<AnswerOutcome> {
        let active = self.active.as_mut().ok_or(EngineError::NoRoundInProgress)?;
        AnswerRecorder::new(&self.store)
            .submit(&active.profile, &mut active.round, was_correct)
            .await
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.active.as_ref().map(|active| &active.round)
    }

    pub fn current_item(&self) -> Option<ItemKey> {
        self.current_round().and_then(Round::current_item)
    }

    /// Statistics for progress views; an uninitialized profile yields an empty list
    pub async fn get_statistics_snapshot(&self, profile: &ProfileId) -> Result<Vec<ItemStatistic>> {
        Ok(self.store.get_all(profile).await?)
    }

    /// Wipe the profile's history and reseed zeros for the universe
    pub async fn reset_statistics(&mut self, profile: &ProfileId) -> Result<()> {
        if self
            .active
            .as_ref()
            .is_some_and(|active| &active.profile == profile)
        {
            self.active = None;
        }

        self.store.clear(profile).await?;
        self.initialize_for_profile(profile).await
    }

    pub async fn progress(
        &self,
        profile: &ProfileId,
        difficulty: Difficulty,
        limit: usize,
    ) -> Result<ProgressSummary> {
        let snapshot = self.get_statistics_snapshot(profile).await?;
        Ok(ProgressSummary::from_snapshot(
            &snapshot,
            difficulty,
            Utc::now(),
            limit,
        ))
    }
}
