use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shared::{
    ExerciseResponse, ProgressRecord, ScopeKey, SessionSummary, UserSummary,
};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub level: String,
    pub total_xp: i32,
    pub streak: i32,
    pub last_active: Option<NaiveDateTime>,
}

impl UserRow {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            level: self.level.clone(),
            total_xp: self.total_xp.max(0) as u32,
            streak: self.streak.max(0) as u32,
            last_active: self.last_active,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProgressRow {
    pub id: i64,
    pub user_id: String,
    pub level_id: Option<String>,
    pub module_id: Option<String>,
    pub lesson_id: Option<String>,
    pub exercise_id: Option<String>,
    pub status: String,
    pub score: Option<i32>,
    pub time_spent: i32,
    pub attempts: i32,
    pub best_score: Option<i32>,
    pub xp_earned: i32,
    pub completed_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl ProgressRow {
    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            level_id: self.level_id.clone(),
            module_id: self.module_id.clone(),
            lesson_id: self.lesson_id.clone(),
            exercise_id: self.exercise_id.clone(),
        }
    }

    /// A row predates the merge rules, so an unknown status column falls back
    /// to NOT_STARTED instead of failing the whole read.
    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            status: self.status.parse().unwrap_or_default(),
            score: self.score.map(|s| s.max(0) as u32),
            time_spent: self.time_spent.max(0) as u32,
            attempts: self.attempts.max(0) as u32,
            best_score: self.best_score.map(|s| s.max(0) as u32),
            xp_earned: self.xp_earned.max(0) as u32,
            completed_at: self.completed_at,
        }
    }
}

/// Content-store view of an exercise: just what the calculators need.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExerciseMeta {
    pub xp_reward: Option<i32>,
    pub correct_answer: String,
    pub alternative_answers: Vec<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub user_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub xp_earned: i32,
    pub exercises_completed: i32,
    pub correct_answers: i32,
}

impl SessionRow {
    /// Summary as stored at close time; valid only for closed rows.
    pub fn stored_summary(&self) -> SessionSummary {
        let duration = self
            .ended_at
            .map(|end| (end - self.started_at).num_seconds().max(0) as u64)
            .unwrap_or_default();
        SessionSummary {
            xp_earned: self.xp_earned.max(0) as u32,
            exercises_completed: self.exercises_completed.max(0) as u32,
            correct: self.correct_answers.max(0) as u32,
            duration_secs: duration,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ResponseRow {
    pub id: i64,
    pub session_id: i64,
    pub exercise_id: String,
    pub answer: String,
    pub is_correct: bool,
    pub time_spent: i32,
    pub hints_used: i32,
    pub created_at: NaiveDateTime,
}

impl From<ResponseRow> for ExerciseResponse {
    fn from(row: ResponseRow) -> Self {
        Self {
            exercise_id: row.exercise_id,
            answer: row.answer,
            is_correct: row.is_correct,
            time_spent: row.time_spent.max(0) as u32,
            hints_used: row.hints_used.max(0) as u32,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AchievementRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub condition: String,
    pub xp_reward: i32,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserAchievementRow {
    pub achievement_id: String,
    pub unlocked_at: NaiveDateTime,
}
