use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_SCORE: u32 = 100;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Mastered,
}

impl ProgressStatus {
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed | Self::Mastered)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("score must be within 0..={MAX_SCORE}, got {0}")]
    ScoreOutOfRange(u32),
}

/// One progress-update request, already scope-resolved. Field semantics on
/// merge differ: `status`/`score` overwrite, `time_spent` accumulates,
/// `attempts` is a delta, never an absolute value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub score: Option<u32>,
    pub time_spent: Option<u32>,
    pub attempts: Option<u32>,
}

impl ProgressUpdate {
    pub fn validate(&self) -> Result<(), ProgressError> {
        if let Some(score) = self.score {
            if score > MAX_SCORE {
                return Err(ProgressError::ScoreOutOfRange(score));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: ProgressStatus,
    pub score: Option<u32>,
    pub time_spent: u32,
    pub attempts: u32,
    pub best_score: Option<u32>,
    pub xp_earned: u32,
    pub completed_at: Option<NaiveDateTime>,
}

impl ProgressRecord {
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Folds an update into the record. Returns true when this call is the
    /// first ever transition into a completed state; the caller turns that
    /// into the structural XP reward.
    pub fn apply(&mut self, update: &ProgressUpdate, now: NaiveDateTime) -> bool {
        self.attempts += update.attempts.unwrap_or(1).max(1);
        self.time_spent += update.time_spent.unwrap_or(0);
        if let Some(score) = update.score {
            self.score = Some(score);
            self.best_score = Some(self.best_score.map_or(score, |best| best.max(score)));
        }

        let was_completed = self.status.is_completed();
        if let Some(status) = update.status {
            self.status = status;
        }

        let first_completion =
            !was_completed && self.status.is_completed() && self.completed_at.is_none();
        if first_completion {
            self.completed_at = Some(now);
        }
        first_completion
    }

    pub fn credit_xp(&mut self, xp: u32) {
        self.xp_earned += xp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        chrono::DateTime::from_timestamp(1_724_544_000, 0)
            .unwrap()
            .naive_utc()
    }

    fn completed() -> ProgressUpdate {
        ProgressUpdate {
            status: Some(ProgressStatus::Completed),
            ..Default::default()
        }
    }

    #[test]
    fn attempts_count_every_submission() {
        let mut record = ProgressRecord::fresh();
        for _ in 0..5 {
            record.apply(&ProgressUpdate::default(), now());
        }
        assert_eq!(record.attempts, 5);

        record.apply(
            &ProgressUpdate {
                attempts: Some(3),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(record.attempts, 8);
    }

    #[test]
    fn best_score_is_the_max_of_all_scores() {
        let mut record = ProgressRecord::fresh();
        for score in [40, 90, 60] {
            record.apply(
                &ProgressUpdate {
                    score: Some(score),
                    ..Default::default()
                },
                now(),
            );
        }
        assert_eq!(record.score, Some(60));
        assert_eq!(record.best_score, Some(90));
    }

    #[test]
    fn time_spent_accumulates() {
        let mut record = ProgressRecord::fresh();
        for secs in [30, 45] {
            record.apply(
                &ProgressUpdate {
                    time_spent: Some(secs),
                    ..Default::default()
                },
                now(),
            );
        }
        assert_eq!(record.time_spent, 75);
    }

    #[test]
    fn completed_at_is_set_exactly_once() {
        let mut record = ProgressRecord::fresh();
        assert!(record.apply(&completed(), now()));
        let stamp = record.completed_at;
        assert!(stamp.is_some());

        // Re-submitting COMPLETED is not a transition.
        let later = now() + chrono::Duration::hours(1);
        assert!(!record.apply(&completed(), later));
        assert_eq!(record.completed_at, stamp);
    }

    #[test]
    fn explicit_regress_does_not_earn_a_second_completion() {
        let mut record = ProgressRecord::fresh();
        assert!(record.apply(&completed(), now()));
        let stamp = record.completed_at;

        record.apply(
            &ProgressUpdate {
                status: Some(ProgressStatus::InProgress),
                ..Default::default()
            },
            now(),
        );
        assert!(!record.apply(&completed(), now()));
        assert_eq!(record.completed_at, stamp);
    }

    #[test]
    fn mastered_counts_as_completed() {
        let mut record = ProgressRecord::fresh();
        assert!(record.apply(
            &ProgressUpdate {
                status: Some(ProgressStatus::Mastered),
                ..Default::default()
            },
            now(),
        ));
        // Moving from MASTERED down to COMPLETED is not a new completion.
        assert!(!record.apply(&completed(), now()));
    }

    #[test]
    fn score_validation() {
        let update = ProgressUpdate {
            score: Some(101),
            ..Default::default()
        };
        assert_eq!(update.validate(), Err(ProgressError::ScoreOutOfRange(101)));
        let update = ProgressUpdate {
            score: Some(100),
            ..Default::default()
        };
        assert_eq!(update.validate(), Ok(()));
    }

    #[test]
    fn xp_earned_is_monotone() {
        let mut record = ProgressRecord::fresh();
        record.credit_xp(50);
        record.credit_xp(0);
        record.credit_xp(10);
        assert_eq!(record.xp_earned, 60);
    }

    #[test]
    fn status_round_trips_through_wire_format() {
        let json = serde_json::to_string(&ProgressStatus::NotStarted).unwrap();
        assert_eq!(json, "\"NOT_STARTED\"");
        assert_eq!(
            "IN_PROGRESS".parse::<ProgressStatus>().unwrap(),
            ProgressStatus::InProgress
        );
    }
}
