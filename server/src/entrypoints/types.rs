use chrono::NaiveDateTime;
use devlingo_server::db::types::{AchievementRow, ProgressRow, SessionRow, UserRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    pub level_id: Option<String>,
    pub module_id: Option<String>,
    pub lesson_id: Option<String>,
    pub exercise_id: Option<String>,
    /// One of NOT_STARTED, IN_PROGRESS, COMPLETED, MASTERED.
    pub status: Option<String>,
    pub score: Option<u32>,
    pub time_spent: Option<u32>,
    pub attempts: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub id: i64,
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

impl From<ProgressRow> for ProgressResponse {
    fn from(row: ProgressRow) -> Self {
        Self {
            id: row.id,
            level_id: row.level_id,
            module_id: row.module_id,
            lesson_id: row.lesson_id,
            exercise_id: row.exercise_id,
            status: row.status,
            score: row.score,
            time_spent: row.time_spent,
            attempts: row.attempts,
            best_score: row.best_score,
            xp_earned: row.xp_earned,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressResponse {
    pub record: ProgressResponse,
    pub xp_earned: u32,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub level: String,
    pub total_xp: i32,
    pub streak: i32,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            level: row.level,
            total_xp: row.total_xp,
            streak: row.streak,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_modules: u32,
    pub completed_modules: u32,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub total_xp: u32,
    pub ledger_xp: u32,
    pub current_streak: u32,
    pub average_score: u32,
}

impl From<shared::ProgressStats> for StatsResponse {
    fn from(stats: shared::ProgressStats) -> Self {
        Self {
            total_modules: stats.total_modules,
            completed_modules: stats.completed_modules,
            total_lessons: stats.total_lessons,
            completed_lessons: stats.completed_lessons,
            total_xp: stats.total_xp,
            ledger_xp: stats.ledger_xp,
            current_streak: stats.current_streak,
            average_score: stats.average_score,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverviewResponse {
    pub records: Vec<ProgressResponse>,
    pub stats: StatsResponse,
    pub user: UserResponse,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: i64,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub xp_earned: i32,
    pub exercises_completed: i32,
    pub correct_answers: i32,
}

impl From<SessionRow> for SessionResponse {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            started_at: row.started_at,
            ended_at: row.ended_at,
            xp_earned: row.xp_earned,
            exercises_completed: row.exercises_completed,
            correct_answers: row.correct_answers,
        }
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub exercise_id: String,
    pub answer: String,
    pub time_spent: Option<u32>,
    pub hints_used: Option<u32>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub response_id: i64,
    pub exercise_id: String,
    pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResponse {
    pub session: SessionResponse,
    pub xp_earned: u32,
    pub unlocked: Vec<AchievementResponse>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AchievementResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub xp_reward: i32,
    pub unlocked_at: Option<NaiveDateTime>,
}

impl AchievementResponse {
    pub fn new(row: AchievementRow, unlocked_at: Option<NaiveDateTime>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            xp_reward: row.xp_reward,
            unlocked_at,
        }
    }
}

impl From<AchievementRow> for AchievementResponse {
    fn from(row: AchievementRow) -> Self {
        Self::new(row, None)
    }
}
