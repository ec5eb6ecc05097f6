use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::item::{CaseFilter, ItemKey, ItemUniverse, ProfileId};
use crate::sampler::{sample_with, WeightedCandidate};
use crate::stats::{ItemStatistic, StatisticsStore};
use crate::storage::StatsStorage;
use crate::weight::{weight_with, Difficulty, WeightParams};

/// Per-round settings supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct RoundConfiguration {
    pub round_size: usize,
    pub case_filter: CaseFilter,
    pub difficulty: Difficulty,
    /// Restrict the round to these letters
    pub letters: Option<Vec<char>>,
    /// Cover the whole universe even if the profile has history
    pub force_bootstrap: bool,
}

impl Default for RoundConfiguration {
    fn default() -> Self {
        Self {
            round_size: 10,
            case_filter: CaseFilter::default(),
            difficulty: Difficulty::default(),
            letters: None,
            force_bootstrap: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RoundMode {
    /// One entry per letter, covering the whole (filtered) universe
    Bootstrap,
    /// `round_size` items sampled by weight
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    NotStarted,
    InProgress,
    Complete,
}

/// The ordered items handed to the UI for one play session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub mode: RoundMode,
    pub items: Vec<ItemKey>,
}

/// One play session. The item list never changes once the round exists;
/// only the position and the answers move.
#[derive(Debug, Clone)]
pub struct Round {
    items: Vec<ItemKey>,
    mode: RoundMode,
    state: RoundState,
    position: usize,
    answers: Vec<bool>,
}

impl Round {
    pub fn new(items: Vec<ItemKey>, mode: RoundMode) -> Self {
        Self {
            items,
            mode,
            state: RoundState::NotStarted,
            position: 0,
            answers: Vec::new(),
        }
    }

    pub(crate) fn start(&mut self) {
        if self.state == RoundState::NotStarted {
            self.state = if self.items.is_empty() {
                RoundState::Complete
            } else {
                RoundState::InProgress
            };
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn mode(&self) -> RoundMode {
        self.mode
    }

    pub fn items(&self) -> &[ItemKey] {
        &self.items
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn answers(&self) -> &[bool] {
        &self.answers
    }

    /// The item awaiting an answer, while the round is in progress
    pub fn current_item(&self) -> Option<ItemKey> {
        match self.state {
            RoundState::InProgress => self.items.get(self.position).copied(),
            _ => None,
        }
    }

    /// Number of correct answers so far; final once the round is complete
    pub fn score(&self) -> usize {
        self.answers.iter().filter(|&&correct| correct).count()
    }

    pub fn is_complete(&self) -> bool {
        self.state == RoundState::Complete
    }

    pub fn result(&self) -> RoundResult {
        RoundResult {
            mode: self.mode,
            items: self.items.clone(),
        }
    }

    /// Move past the current item. Returns false if the round was not in progress.
    pub(crate) fn advance(&mut self, was_correct: bool) -> bool {
        if self.state != RoundState::InProgress {
            return false;
        }
        self.answers.push(was_correct);
        self.position += 1;
        if self.position >= self.items.len() {
            self.state = RoundState::Complete;
        }
        true
    }
}

/// Builds rounds from read-only statistics snapshots
#[derive(Debug)]
pub struct RoundGenerator<'a, S> {
    store: &'a StatisticsStore<S>,
    params: &'a WeightParams,
}

impl<'a, S: StatsStorage> RoundGenerator<'a, S> {
    pub fn new(store: &'a StatisticsStore<S>, params: &'a WeightParams) -> Self {
        Self { store, params }
    }

    /// Fetch statistics and build a started round. Storage failures fail the
    /// whole call; there is no fallback round.
    pub async fn start_round<R: Rng + ?Sized>(
        &self,
        profile: &ProfileId,
        universe: &ItemUniverse,
        config: &RoundConfiguration,
        rng: &mut R,
    ) -> Result<Round> {
        let snapshot = self.store.get_all(profile).await?;
        let letters = universe.focused_letters(config.letters.as_deref());
        if letters.is_empty() {
            return Err(EngineError::EmptyCandidatePool);
        }

        let first_round = snapshot.iter().all(ItemStatistic::is_unseen);
        let mut round = if config.force_bootstrap || first_round {
            bootstrap_round(&letters, config.case_filter, rng)
        } else {
            adaptive_round(
                &letters,
                &snapshot,
                config,
                self.params,
                Utc::now(),
                rng,
            )?
        };

        round.start();
        log::info!(
            "started {} round of {} items for profile {profile}",
            round.mode(),
            round.items().len()
        );
        Ok(round)
    }
}

/// Every letter once, each in a case the filter allows, shuffled
pub fn bootstrap_round<R: Rng + ?Sized>(
    letters: &[char],
    case_filter: CaseFilter,
    rng: &mut R,
) -> Round {
    let mut items: Vec<ItemKey> = letters
        .iter()
        .map(|&letter| ItemKey::new(letter, case_filter.pick(rng)))
        .collect();
    items.shuffle(rng);
    Round::new(items, RoundMode::Bootstrap)
}

/// Weighted sample of `round_size` items, shuffled for presentation
pub fn adaptive_round<R: Rng + ?Sized>(
    letters: &[char],
    snapshot: &[ItemStatistic],
    config: &RoundConfiguration,
    params: &WeightParams,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Round> {
    if config.round_size == 0 {
        return Err(EngineError::InvalidRoundSize);
    }

    let by_item: HashMap<ItemKey, &ItemStatistic> =
        snapshot.iter().map(|stat| (stat.item(), stat)).collect();

    let candidates: Vec<WeightedCandidate<ItemKey>> = letters
        .iter()
        .flat_map(|&letter| {
            config
                .case_filter
                .cases()
                .iter()
                .map(move |&case| ItemKey::new(letter, case))
        })
        .map(|item| {
            let weight = match by_item.get(&item) {
                Some(stat) => weight_with(stat, config.difficulty, now, params),
                None => weight_with(&ItemStatistic::new(item), config.difficulty, now, params),
            };
            WeightedCandidate::new(item, weight)
        })
        .collect();

    if candidates.is_empty() {
        return Err(EngineError::EmptyCandidatePool);
    }

    let mut items = sample_with(&candidates, config.round_size, false, rng);
    items.shuffle(rng);
    Ok(Round::new(items, RoundMode::Adaptive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::LetterCase;
    use crate::storage::MemoryStorage;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn letters() -> Vec<char> {
        ('a'..='z').collect()
    }

    #[test]
    fn test_bootstrap_covers_every_letter_once() {
        let mut rng = StdRng::seed_from_u64(3);
        let round = bootstrap_round(&letters(), CaseFilter::Lower, &mut rng);

        assert_eq!(round.mode(), RoundMode::Bootstrap);
        assert_eq!(round.items().len(), 26);
        let unique: HashSet<ItemKey> = round.items().iter().copied().collect();
        assert_eq!(unique.len(), 26);
        assert!(round.items().iter().all(|i| i.case == LetterCase::Lower));
    }

    #[test]
    fn test_bootstrap_mixed_case_picks_one_variant_per_letter() {
        let mut rng = StdRng::seed_from_u64(11);
        let round = bootstrap_round(&letters(), CaseFilter::Mixed, &mut rng);

        let distinct_letters: HashSet<char> = round.items().iter().map(|i| i.letter).collect();
        assert_eq!(distinct_letters.len(), 26);
        assert!(round.items().iter().any(|i| i.case == LetterCase::Upper));
        assert!(round.items().iter().any(|i| i.case == LetterCase::Lower));
    }

    #[test]
    fn test_adaptive_round_size_and_uniqueness() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = RoundConfiguration {
            round_size: 12,
            case_filter: CaseFilter::Mixed,
            ..RoundConfiguration::default()
        };

        let round = adaptive_round(
            &letters(),
            &[],
            &config,
            &WeightParams::default(),
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(round.mode(), RoundMode::Adaptive);
        assert_eq!(round.items().len(), 12);
        let unique: HashSet<ItemKey> = round.items().iter().copied().collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_adaptive_round_clamps_to_pool() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = RoundConfiguration {
            round_size: 50,
            ..RoundConfiguration::default()
        };

        let round = adaptive_round(
            &['a', 'b', 'c'],
            &[],
            &config,
            &WeightParams::default(),
            Utc::now(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(round.items().len(), 3);
    }

    #[test]
    fn test_adaptive_round_rejects_zero_size() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = RoundConfiguration {
            round_size: 0,
            ..RoundConfiguration::default()
        };

        let result = adaptive_round(
            &letters(),
            &[],
            &config,
            &WeightParams::default(),
            Utc::now(),
            &mut rng,
        );
        assert_matches!(result, Err(EngineError::InvalidRoundSize));
    }

    #[test]
    fn test_adaptive_round_prefers_unseen_over_mastered() {
        let mut rng = StdRng::seed_from_u64(77);
        let now = Utc::now();
        let mastered = ItemStatistic::from_counts(ItemKey::lower('a'), 8, 2, Some(now));
        let config = RoundConfiguration {
            round_size: 1,
            ..RoundConfiguration::default()
        };
        let trials = 4000;

        let picked_b = (0..trials)
            .filter(|_| {
                let round = adaptive_round(
                    &['a', 'b'],
                    std::slice::from_ref(&mastered),
                    &config,
                    &WeightParams::default(),
                    now,
                    &mut rng,
                )
                .unwrap();
                round.items() == [ItemKey::lower('b')]
            })
            .count();

        // weight(a) = 0.2, weight(b) = 1.0
        let ratio = picked_b as f64 / trials as f64;
        assert!((ratio - 1.0 / 1.2).abs() < 0.03, "ratio {ratio}");
    }

    #[test]
    fn test_round_state_machine() {
        let mut round = Round::new(vec![ItemKey::lower('a'), ItemKey::lower('b')], RoundMode::Adaptive);
        assert_eq!(round.state(), RoundState::NotStarted);
        assert_eq!(round.current_item(), None);
        assert!(!round.advance(true));

        round.start();
        assert_eq!(round.state(), RoundState::InProgress);
        assert_eq!(round.current_item(), Some(ItemKey::lower('a')));

        assert!(round.advance(true));
        assert_eq!(round.current_item(), Some(ItemKey::lower('b')));
        assert!(round.advance(false));

        assert!(round.is_complete());
        assert_eq!(round.current_item(), None);
        assert_eq!(round.score(), 1);
        assert_eq!(round.answers(), &[true, false]);
        assert!(!round.advance(true));
        assert_eq!(round.score(), 1);
    }

    #[tokio::test]
    async fn test_generator_bootstraps_fresh_profile() {
        let store = StatisticsStore::new(MemoryStorage::new());
        let params = WeightParams::default();
        let generator = RoundGenerator::new(&store, &params);
        let universe = ItemUniverse::new("test", letters());
        let mut rng = StdRng::seed_from_u64(1);

        let round = generator
            .start_round(
                &ProfileId::from("ada"),
                &universe,
                &RoundConfiguration::default(),
                &mut rng,
            )
            .await
            .unwrap();

        assert_eq!(round.mode(), RoundMode::Bootstrap);
        assert_eq!(round.state(), RoundState::InProgress);
        assert_eq!(round.items().len(), 26);
    }

    #[tokio::test]
    async fn test_generator_goes_adaptive_after_history() {
        let store = StatisticsStore::new(MemoryStorage::new());
        let profile = ProfileId::from("ada");
        store
            .record_answer_at(&profile, ItemKey::lower('c'), true, Utc::now() - Duration::days(1))
            .await
            .unwrap();
        let params = WeightParams::default();
        let generator = RoundGenerator::new(&store, &params);
        let universe = ItemUniverse::new("test", letters());
        let mut rng = StdRng::seed_from_u64(1);

        let round = generator
            .start_round(&profile, &universe, &RoundConfiguration::default(), &mut rng)
            .await
            .unwrap();
        assert_eq!(round.mode(), RoundMode::Adaptive);
        assert_eq!(round.items().len(), 10);

        let forced = RoundConfiguration {
            force_bootstrap: true,
            ..RoundConfiguration::default()
        };
        let round = generator
            .start_round(&profile, &universe, &forced, &mut rng)
            .await
            .unwrap();
        assert_eq!(round.mode(), RoundMode::Bootstrap);
    }

    #[tokio::test]
    async fn test_generator_reports_empty_pool() {
        let store = StatisticsStore::new(MemoryStorage::new());
        let params = WeightParams::default();
        let generator = RoundGenerator::new(&store, &params);
        let universe = ItemUniverse::new("test", letters());
        let config = RoundConfiguration {
            letters: Some(vec!['ß', '1']),
            ..RoundConfiguration::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let result = generator
            .start_round(&ProfileId::from("ada"), &universe, &config, &mut rng)
            .await;
        assert_matches!(result, Err(EngineError::EmptyCandidatePool));
    }

    #[tokio::test]
    async fn test_generator_fails_on_storage_error() {
        let store = StatisticsStore::new(MemoryStorage::new());
        store.storage().set_fail_reads(true);
        let params = WeightParams::default();
        let generator = RoundGenerator::new(&store, &params);
        let universe = ItemUniverse::new("test", letters());
        let mut rng = StdRng::seed_from_u64(1);

        let result = generator
            .start_round(
                &ProfileId::from("ada"),
                &universe,
                &RoundConfiguration::default(),
                &mut rng,
            )
            .await;
        assert_matches!(result, Err(EngineError::StorageUnavailable(_)));
    }
}
