use crate::{ExerciseResponse, ScopeDepth};

/// Reward used when an exercise has no configured reward, or when the
/// referenced exercise no longer exists in the content store.
pub const EXERCISE_FALLBACK_XP: u32 = 10;
pub const LESSON_COMPLETION_XP: u32 = 50;
pub const MODULE_COMPLETION_XP: u32 = 100;

pub const RESPONSE_BASE_XP: u32 = 10;
pub const HINT_ALLOWANCE: u32 = 5;
pub const HINT_BONUS_STEP: u32 = 2;
pub const SPEED_BONUS_WINDOW_SECS: u32 = 60;

/// Fixed XP for finishing the deepest entity in the scope. Zero unless this
/// request is the first transition into a completed state.
pub fn structural_reward(
    depth: ScopeDepth,
    exercise_reward: Option<u32>,
    first_completion: bool,
) -> u32 {
    if !first_completion {
        return 0;
    }
    match depth {
        ScopeDepth::Exercise => exercise_reward.unwrap_or(EXERCISE_FALLBACK_XP),
        ScopeDepth::Lesson => LESSON_COMPLETION_XP,
        ScopeDepth::Module => MODULE_COMPLETION_XP,
        ScopeDepth::Level => 0,
    }
}

/// XP for a single answer: base for a correct one, plus a bonus for sparing
/// hints and a bonus for speed. Both bonuses clamp at zero.
pub fn response_xp(response: &ExerciseResponse) -> u32 {
    if !response.is_correct {
        return 0;
    }
    let hint_bonus = HINT_ALLOWANCE.saturating_sub(response.hints_used) * HINT_BONUS_STEP;
    let speed_bonus = SPEED_BONUS_WINDOW_SECS.saturating_sub(response.time_spent);
    RESPONSE_BASE_XP + hint_bonus + speed_bonus
}

/// Computed once over the full response list when a session closes. Responses
/// are append-only, so the total is stable for a given session.
pub fn session_xp(responses: &[ExerciseResponse]) -> u32 {
    responses.iter().map(response_xp).sum()
}

/// Case-insensitive, whitespace-trimmed comparison against the canonical
/// answer, or membership in the alternative answer set for multi-part
/// exercises.
pub fn grade(submitted: &str, canonical: &str, alternatives: &[String]) -> bool {
    let submitted = normalize(submitted);
    submitted == normalize(canonical)
        || alternatives
            .iter()
            .any(|answer| normalize(answer) == submitted)
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(is_correct: bool, hints_used: u32, time_spent: u32) -> ExerciseResponse {
        ExerciseResponse {
            exercise_id: "ex-1".to_string(),
            answer: "refactor".to_string(),
            is_correct,
            time_spent,
            hints_used,
            created_at: chrono::DateTime::from_timestamp(1_724_544_000, 0)
                .unwrap()
                .naive_utc(),
        }
    }

    #[test]
    fn fast_hintless_correct_answer() {
        // 10 base + 5 unused hints * 2 + (60 - 5) speed
        assert_eq!(response_xp(&response(true, 0, 5)), 75);
    }

    #[test]
    fn bonuses_clamp_at_zero() {
        assert_eq!(response_xp(&response(true, 6, 90)), 10);
    }

    #[test]
    fn incorrect_answer_earns_nothing() {
        assert_eq!(response_xp(&response(false, 0, 1)), 0);
    }

    #[test]
    fn session_total_sums_over_all_responses() {
        let responses = vec![
            response(true, 0, 5),
            response(false, 0, 5),
            response(true, 6, 90),
        ];
        assert_eq!(session_xp(&responses), 85);
    }

    #[test]
    fn structural_reward_by_depth() {
        assert_eq!(structural_reward(ScopeDepth::Exercise, Some(25), true), 25);
        assert_eq!(structural_reward(ScopeDepth::Exercise, None, true), 10);
        assert_eq!(structural_reward(ScopeDepth::Lesson, None, true), 50);
        assert_eq!(structural_reward(ScopeDepth::Module, None, true), 100);
        assert_eq!(structural_reward(ScopeDepth::Level, None, true), 0);
    }

    #[test]
    fn no_reward_without_a_completion_transition() {
        assert_eq!(structural_reward(ScopeDepth::Lesson, None, false), 0);
    }

    #[test]
    fn grading_is_trimmed_and_case_insensitive() {
        assert!(grade("  Pull Request ", "pull request", &[]));
        assert!(!grade("push request", "pull request", &[]));
    }

    #[test]
    fn grading_accepts_alternative_answers() {
        let alternatives = vec!["PR".to_string(), "merge request".to_string()];
        assert!(grade("pr", "pull request", &alternatives));
        assert!(grade("Merge Request", "pull request", &alternatives));
        assert!(!grade("issue", "pull request", &alternatives));
    }
}
