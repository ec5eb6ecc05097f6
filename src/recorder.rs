use crate::error::{EngineError, Result};
use crate::item::{ItemKey, ProfileId};
use crate::round::Round;
use crate::stats::StatisticsStore;
use crate::storage::StatsStorage;

/// What happened to the round after an answer was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub item: ItemKey,
    pub was_correct: bool,
    pub advanced: bool,
    pub round_complete: bool,
}

/// The single write path for judged answers: persist first, then advance.
/// A failed write leaves the round on the same item, so retrying neither
/// skips it nor counts it twice.
#[derive(Debug)]
pub struct AnswerRecorder<'a, S> {
    store: &'a StatisticsStore<S>,
}

impl<'a, S: StatsStorage> AnswerRecorder<'a, S> {
    pub fn new(store: &'a StatisticsStore<S>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        profile: &ProfileId,
        round: &mut Round,
        was_correct: bool,
    ) -> Result<AnswerOutcome> {
        let item = round.current_item().ok_or(EngineError::NoRoundInProgress)?;

        if let Err(e) = self.store.record_answer(profile, item, was_correct).await {
            log::warn!("could not save answer for {item} in profile {profile}: {e}");
            return Err(e.into());
        }

        let advanced = round.advance(was_correct);
        let round_complete = round.is_complete();
        if round_complete {
            log::info!(
                "round complete for profile {profile}: {}/{}",
                round.score(),
                round.items().len()
            );
        }

        Ok(AnswerOutcome {
            item,
            was_correct,
            advanced,
            round_complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::RoundMode;
    use crate::storage::MemoryStorage;
    use assert_matches::assert_matches;

    fn started_round(items: &[char]) -> Round {
        let mut round = Round::new(
            items.iter().map(|&c| ItemKey::lower(c)).collect(),
            RoundMode::Adaptive,
        );
        round.start();
        round
    }

    #[tokio::test]
    async fn test_submit_records_and_advances() {
        let store = StatisticsStore::new(MemoryStorage::new());
        let recorder = AnswerRecorder::new(&store);
        let profile = ProfileId::from("ada");
        let mut round = started_round(&['a', 'b']);

        let first = recorder.submit(&profile, &mut round, true).await.unwrap();
        assert_eq!(first.item, ItemKey::lower('a'));
        assert!(first.advanced);
        assert!(!first.round_complete);

        let second = recorder.submit(&profile, &mut round, false).await.unwrap();
        assert_eq!(second.item, ItemKey::lower('b'));
        assert!(second.round_complete);
        assert_eq!(round.score(), 1);

        let stats = store.get_all(&profile).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.total_attempts() == 1));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_item_active() {
        let store = StatisticsStore::new(MemoryStorage::new());
        let recorder = AnswerRecorder::new(&store);
        let profile = ProfileId::from("ada");
        let mut round = started_round(&['a', 'b']);

        store.storage().set_fail_writes(true);
        let result = recorder.submit(&profile, &mut round, true).await;
        assert_matches!(result, Err(EngineError::StorageUnavailable(_)));
        assert_eq!(round.current_item(), Some(ItemKey::lower('a')));
        assert_eq!(round.position(), 0);

        store.storage().set_fail_writes(false);
        let retry = recorder.submit(&profile, &mut round, true).await.unwrap();
        assert_eq!(retry.item, ItemKey::lower('a'));
        assert_eq!(round.current_item(), Some(ItemKey::lower('b')));

        let stats = store.get_all(&profile).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_attempts(), 1);
    }

    #[tokio::test]
    async fn test_submit_on_finished_round() {
        let store = StatisticsStore::new(MemoryStorage::new());
        let recorder = AnswerRecorder::new(&store);
        let profile = ProfileId::from("ada");
        let mut round = started_round(&['a']);

        recorder.submit(&profile, &mut round, true).await.unwrap();
        let result = recorder.submit(&profile, &mut round, true).await;
        assert_matches!(result, Err(EngineError::NoRoundInProgress));
        assert_eq!(store.get_all(&profile).await.unwrap()[0].total_attempts(), 1);
    }
}
