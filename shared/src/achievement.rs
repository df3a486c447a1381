use crate::SessionSummary;

/// Aggregate state an achievement condition is evaluated against. Built from
/// the user row, the progress ledger and the session that just closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSnapshot<'a> {
    pub total_xp: u32,
    pub streak: u32,
    pub completed_lessons: u32,
    pub completed_modules: u32,
    pub session: Option<&'a SessionSummary>,
}

/// Unlock condition, parsed from the achievement's stored condition string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementCondition {
    FirstLessonCompleted,
    LessonsCompleted(u32),
    ModuleCompleted,
    StreakDays(u32),
    TotalXpAtLeast(u32),
    PerfectSession,
}

impl AchievementCondition {
    /// `"first_lesson"`, `"lessons_completed:10"`, `"module_completed"`,
    /// `"streak_days:7"`, `"total_xp:1000"`, `"perfect_session"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, value) = match raw.split_once(':') {
            Some((kind, value)) => (kind, Some(value)),
            None => (raw, None),
        };
        let threshold = || value.and_then(|v| v.trim().parse::<u32>().ok());
        match kind.trim() {
            "first_lesson" => Some(Self::FirstLessonCompleted),
            "lessons_completed" => threshold().map(Self::LessonsCompleted),
            "module_completed" => Some(Self::ModuleCompleted),
            "streak_days" => threshold().map(Self::StreakDays),
            "total_xp" => threshold().map(Self::TotalXpAtLeast),
            "perfect_session" => Some(Self::PerfectSession),
            _ => None,
        }
    }

    /// Pure predicate; the one-time unlock guarantee lives in the store, not
    /// here.
    pub fn is_met(&self, snapshot: &ProgressSnapshot<'_>) -> bool {
        match self {
            Self::FirstLessonCompleted => snapshot.completed_lessons >= 1,
            Self::LessonsCompleted(n) => snapshot.completed_lessons >= *n,
            Self::ModuleCompleted => snapshot.completed_modules >= 1,
            Self::StreakDays(n) => snapshot.streak >= *n,
            Self::TotalXpAtLeast(n) => snapshot.total_xp >= *n,
            Self::PerfectSession => snapshot.session.is_some_and(|s| s.is_perfect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_condition_strings() {
        assert_eq!(
            AchievementCondition::parse("first_lesson"),
            Some(AchievementCondition::FirstLessonCompleted)
        );
        assert_eq!(
            AchievementCondition::parse("streak_days:7"),
            Some(AchievementCondition::StreakDays(7))
        );
        assert_eq!(
            AchievementCondition::parse("total_xp:1000"),
            Some(AchievementCondition::TotalXpAtLeast(1000))
        );
        assert_eq!(AchievementCondition::parse("streak_days"), None);
        assert_eq!(AchievementCondition::parse("unheard_of"), None);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let snapshot = ProgressSnapshot {
            total_xp: 1000,
            streak: 7,
            completed_lessons: 10,
            completed_modules: 1,
            session: None,
        };
        assert!(AchievementCondition::StreakDays(7).is_met(&snapshot));
        assert!(!AchievementCondition::StreakDays(8).is_met(&snapshot));
        assert!(AchievementCondition::TotalXpAtLeast(1000).is_met(&snapshot));
        assert!(AchievementCondition::LessonsCompleted(10).is_met(&snapshot));
        assert!(AchievementCondition::ModuleCompleted.is_met(&snapshot));
        assert!(AchievementCondition::FirstLessonCompleted.is_met(&snapshot));
    }

    #[test]
    fn perfect_session_needs_a_closed_perfect_session() {
        let summary = SessionSummary {
            xp_earned: 75,
            exercises_completed: 3,
            correct: 3,
            duration_secs: 60,
        };
        let snapshot = ProgressSnapshot {
            session: Some(&summary),
            ..Default::default()
        };
        assert!(AchievementCondition::PerfectSession.is_met(&snapshot));

        let imperfect = SessionSummary {
            correct: 2,
            ..summary
        };
        let snapshot = ProgressSnapshot {
            session: Some(&imperfect),
            ..Default::default()
        };
        assert!(!AchievementCondition::PerfectSession.is_met(&snapshot));
        assert!(!AchievementCondition::PerfectSession.is_met(&ProgressSnapshot::default()));
    }
}
