use serde::{Deserialize, Serialize};

use crate::{ProgressRecord, ScopeDepth, ScopeKey, UserSummary};

/// Read-only summary derived from the progress ledger. `total_xp` comes from
/// the user row, which is the authoritative XP source; `ledger_xp` is the sum
/// of per-record credits, exposed as an audit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_modules: u32,
    pub completed_modules: u32,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub total_xp: u32,
    pub ledger_xp: u32,
    pub current_streak: u32,
    pub average_score: u32,
}

impl ProgressStats {
    pub fn collect(
        records: &[(ScopeKey, ProgressRecord)],
        total_modules: u32,
        total_lessons: u32,
        user: &UserSummary,
    ) -> Self {
        let completed_at = |depth: ScopeDepth| {
            records
                .iter()
                .filter(|(scope, record)| {
                    scope.deepest() == depth && record.status.is_completed()
                })
                .count() as u32
        };

        let scores: Vec<u32> = records
            .iter()
            .filter_map(|(_, record)| record.score)
            .collect();
        let average_score = if scores.is_empty() {
            0
        } else {
            let total: u32 = scores.iter().sum();
            (total as f64 / scores.len() as f64).round() as u32
        };

        Self {
            total_modules,
            completed_modules: completed_at(ScopeDepth::Module),
            total_lessons,
            completed_lessons: completed_at(ScopeDepth::Lesson),
            total_xp: user.total_xp,
            ledger_xp: records.iter().map(|(_, r)| r.xp_earned).sum(),
            current_streak: user.streak,
            average_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProgressStatus, ProgressUpdate};

    fn now() -> chrono::NaiveDateTime {
        chrono::DateTime::from_timestamp(1_724_544_000, 0)
            .unwrap()
            .naive_utc()
    }

    fn record(status: ProgressStatus, score: Option<u32>, xp: u32) -> ProgressRecord {
        let mut record = ProgressRecord::fresh();
        record.apply(
            &ProgressUpdate {
                status: Some(status),
                score,
                ..Default::default()
            },
            now(),
        );
        record.credit_xp(xp);
        record
    }

    fn lesson_scope(id: &str) -> ScopeKey {
        ScopeKey::resolve(None, Some("m1".to_string()), Some(id.to_string()), None).unwrap()
    }

    fn module_scope(id: &str) -> ScopeKey {
        ScopeKey::resolve(None, Some(id.to_string()), None, None).unwrap()
    }

    fn user() -> UserSummary {
        UserSummary {
            id: "u1".to_string(),
            level: "BEGINNER".to_string(),
            total_xp: 210,
            streak: 4,
            last_active: Some(now()),
        }
    }

    #[test]
    fn counts_completion_at_the_respective_scope() {
        let records = vec![
            (
                lesson_scope("l1"),
                record(ProgressStatus::Completed, Some(80), 50),
            ),
            (
                lesson_scope("l2"),
                record(ProgressStatus::InProgress, Some(40), 0),
            ),
            (
                module_scope("m1"),
                record(ProgressStatus::Completed, None, 100),
            ),
        ];

        let stats = ProgressStats::collect(&records, 8, 24, &user());
        assert_eq!(stats.completed_lessons, 1);
        assert_eq!(stats.completed_modules, 1);
        assert_eq!(stats.total_modules, 8);
        assert_eq!(stats.total_lessons, 24);
        assert_eq!(stats.average_score, 60);
        assert_eq!(stats.ledger_xp, 150);
        assert_eq!(stats.total_xp, 210);
        assert_eq!(stats.current_streak, 4);
    }

    #[test]
    fn average_score_ignores_scoreless_records_and_defaults_to_zero() {
        let records = vec![(
            module_scope("m1"),
            record(ProgressStatus::Completed, None, 100),
        )];
        let stats = ProgressStats::collect(&records, 1, 0, &user());
        assert_eq!(stats.average_score, 0);

        let stats = ProgressStats::collect(&[], 0, 0, &user());
        assert_eq!(stats.average_score, 0);
    }
}
