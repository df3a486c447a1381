use rocket::{
    fairing::{self, AdHoc},
    Build, Rocket,
};
use rocket_db_pools::Database;
use shared::{
    structural_reward, ExerciseResponse, LearningSession, ProgressRecord, ProgressUpdate,
    ScopeKey, SessionSummary,
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

pub mod types;

use types::{
    AchievementRow, ExerciseMeta, ProgressRow, ResponseRow, SessionRow, UserAchievementRow,
    UserRow,
};

#[derive(Database, Clone, Debug)]
#[database("devlingo")]
pub struct DB(PgPool);

/// Result of closing a session. `freshly_closed` is false when the session
/// was already closed and the stored totals were returned instead.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub session: SessionRow,
    pub summary: SessionSummary,
    pub freshly_closed: bool,
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505")
    )
}

impl DB {
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<UserRow>> {
        Ok(sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, level, total_xp, streak, last_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.0)
        .await?)
    }

    /// Upserts the progress record for (user, scope) and credits the user's
    /// XP in the same transaction when a structural reward applies. An insert
    /// race against the scope uniqueness index is retried once before the
    /// conflict surfaces to the caller.
    #[instrument(skip(self, update))]
    pub async fn upsert_progress(
        &self,
        user_id: &str,
        scope: &ScopeKey,
        update: &ProgressUpdate,
        exercise_reward: Option<u32>,
    ) -> anyhow::Result<(ProgressRow, u32)> {
        match self
            .try_upsert_progress(user_id, scope, update, exercise_reward)
            .await
        {
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!("progress insert raced for user {user_id}, retrying as update");
                self.try_upsert_progress(user_id, scope, update, exercise_reward)
                    .await
            }
            other => other,
        }
    }

    async fn try_upsert_progress(
        &self,
        user_id: &str,
        scope: &ScopeKey,
        update: &ProgressUpdate,
        exercise_reward: Option<u32>,
    ) -> anyhow::Result<(ProgressRow, u32)> {
        let mut tx = self.0.begin().await?;

        // Per-key serialization: concurrent upserts for the same scope queue
        // up on this row lock once the row exists.
        let existing = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT id, user_id, level_id, module_id, lesson_id, exercise_id,
                   status, score, time_spent, attempts, best_score, xp_earned,
                   completed_at, updated_at
            FROM progress
            WHERE user_id = $1
              AND level_id IS NOT DISTINCT FROM $2
              AND module_id IS NOT DISTINCT FROM $3
              AND lesson_id IS NOT DISTINCT FROM $4
              AND exercise_id IS NOT DISTINCT FROM $5
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(&scope.level_id)
        .bind(&scope.module_id)
        .bind(&scope.lesson_id)
        .bind(&scope.exercise_id)
        .fetch_optional(tx.as_mut())
        .await?;

        let now = chrono::Utc::now().naive_utc();
        let mut record = existing
            .as_ref()
            .map(ProgressRow::to_record)
            .unwrap_or_else(ProgressRecord::fresh);
        let first_completion = record.apply(update, now);
        let reward = structural_reward(scope.deepest(), exercise_reward, first_completion);
        record.credit_xp(reward);

        let row = match existing {
            Some(existing) => {
                sqlx::query_as::<_, ProgressRow>(
                    r#"
                    UPDATE progress
                    SET status = $2, score = $3, time_spent = $4, attempts = $5,
                        best_score = $6, xp_earned = $7, completed_at = $8, updated_at = now()
                    WHERE id = $1
                    RETURNING id, user_id, level_id, module_id, lesson_id, exercise_id,
                              status, score, time_spent, attempts, best_score, xp_earned,
                              completed_at, updated_at
                    "#,
                )
                .bind(existing.id)
                .bind(record.status.to_string())
                .bind(record.score.map(|s| s as i32))
                .bind(record.time_spent as i32)
                .bind(record.attempts as i32)
                .bind(record.best_score.map(|s| s as i32))
                .bind(record.xp_earned as i32)
                .bind(record.completed_at)
                .fetch_one(tx.as_mut())
                .await?
            }
            None => {
                sqlx::query_as::<_, ProgressRow>(
                    r#"
                    INSERT INTO progress (user_id, level_id, module_id, lesson_id, exercise_id,
                                          status, score, time_spent, attempts, best_score,
                                          xp_earned, completed_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    RETURNING id, user_id, level_id, module_id, lesson_id, exercise_id,
                              status, score, time_spent, attempts, best_score, xp_earned,
                              completed_at, updated_at
                    "#,
                )
                .bind(user_id)
                .bind(&scope.level_id)
                .bind(&scope.module_id)
                .bind(&scope.lesson_id)
                .bind(&scope.exercise_id)
                .bind(record.status.to_string())
                .bind(record.score.map(|s| s as i32))
                .bind(record.time_spent as i32)
                .bind(record.attempts as i32)
                .bind(record.best_score.map(|s| s as i32))
                .bind(record.xp_earned as i32)
                .bind(record.completed_at)
                .fetch_one(tx.as_mut())
                .await?
            }
        };

        if reward > 0 {
            Self::credit_user_xp(&mut tx, user_id, reward).await?;
        }
        tx.commit().await?;

        Ok((row, reward))
    }

    #[instrument(skip(self))]
    pub async fn list_progress(&self, user_id: &str) -> anyhow::Result<Vec<ProgressRow>> {
        Ok(sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT id, user_id, level_id, module_id, lesson_id, exercise_id,
                   status, score, time_spent, attempts, best_score, xp_earned,
                   completed_at, updated_at
            FROM progress
            WHERE user_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await?)
    }

    /// Completed (lesson, module) counts at the respective scope depth.
    pub async fn completed_counts(&self, user_id: &str) -> anyhow::Result<(u32, u32)> {
        let (lessons, modules) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE lesson_id IS NOT NULL AND exercise_id IS NULL),
                COUNT(*) FILTER (WHERE module_id IS NOT NULL
                                 AND lesson_id IS NULL AND exercise_id IS NULL)
            FROM progress
            WHERE user_id = $1 AND status IN ('COMPLETED', 'MASTERED')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.0)
        .await?;

        Ok((lessons.max(0) as u32, modules.max(0) as u32))
    }

    pub async fn count_active_modules(&self) -> anyhow::Result<u32> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM modules WHERE is_active")
                .fetch_one(&self.0)
                .await?;
        Ok(count.max(0) as u32)
    }

    pub async fn count_active_lessons(&self) -> anyhow::Result<u32> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons WHERE is_active")
                .fetch_one(&self.0)
                .await?;
        Ok(count.max(0) as u32)
    }

    /// Content-store lookup. A missing exercise is not an error here; the
    /// caller degrades to the fallback reward.
    #[instrument(skip(self))]
    pub async fn exercise_meta(&self, exercise_id: &str) -> anyhow::Result<Option<ExerciseMeta>> {
        Ok(sqlx::query_as::<_, ExerciseMeta>(
            r#"
            SELECT xp_reward, correct_answer, alternative_answers
            FROM exercises
            WHERE id = $1
            "#,
        )
        .bind(exercise_id)
        .fetch_optional(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn start_session(&self, user_id: &str) -> anyhow::Result<SessionRow> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO learning_sessions (user_id)
            VALUES ($1)
            RETURNING id, user_id, started_at, ended_at, xp_earned,
                      exercises_completed, correct_answers
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.0)
        .await?)
    }

    pub async fn get_session(
        &self,
        session_id: i64,
        user_id: &str,
    ) -> anyhow::Result<Option<SessionRow>> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, started_at, ended_at, xp_earned,
                   exercises_completed, correct_answers
            FROM learning_sessions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.0)
        .await?)
    }

    /// Appends a graded response. Returns None when the session does not
    /// belong to the user or is no longer accepting responses; the guard is
    /// part of the insert, so a concurrent close cannot slip a response in.
    #[instrument(skip(self, answer))]
    pub async fn record_response(
        &self,
        session_id: i64,
        user_id: &str,
        exercise_id: &str,
        answer: &str,
        is_correct: bool,
        time_spent: u32,
        hints_used: u32,
    ) -> anyhow::Result<Option<ResponseRow>> {
        Ok(sqlx::query_as::<_, ResponseRow>(
            r#"
            INSERT INTO exercise_responses (session_id, exercise_id, answer, is_correct,
                                            time_spent, hints_used)
            SELECT $1, $3, $4, $5, $6, $7
            WHERE EXISTS (
                SELECT 1 FROM learning_sessions
                WHERE id = $1 AND user_id = $2 AND ended_at IS NULL
            )
            RETURNING id, session_id, exercise_id, answer, is_correct,
                      time_spent, hints_used, created_at
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .bind(exercise_id)
        .bind(answer)
        .bind(is_correct)
        .bind(time_spent as i32)
        .bind(hints_used as i32)
        .fetch_optional(&self.0)
        .await?)
    }

    /// Finalizes a session: computes XP once over the recorded responses and
    /// credits the user atomically. Closing an already-closed session returns
    /// the stored totals without recomputing.
    #[instrument(skip(self))]
    pub async fn close_session(
        &self,
        session_id: i64,
        user_id: &str,
    ) -> anyhow::Result<Option<CloseOutcome>> {
        let mut tx = self.0.begin().await?;

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, started_at, ended_at, xp_earned,
                   exercises_completed, correct_answers
            FROM learning_sessions
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        if row.ended_at.is_some() {
            let summary = row.stored_summary();
            return Ok(Some(CloseOutcome {
                session: row,
                summary,
                freshly_closed: false,
            }));
        }

        let responses = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT id, session_id, exercise_id, answer, is_correct,
                   time_spent, hints_used, created_at
            FROM exercise_responses
            WHERE session_id = $1
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .fetch_all(tx.as_mut())
        .await?;

        let mut session = LearningSession::start(row.started_at);
        for response in responses {
            session.record(ExerciseResponse::from(response))?;
        }
        let now = chrono::Utc::now().naive_utc();
        let summary = session.close(now);

        let updated = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE learning_sessions
            SET ended_at = $2, xp_earned = $3, exercises_completed = $4, correct_answers = $5
            WHERE id = $1
            RETURNING id, user_id, started_at, ended_at, xp_earned,
                      exercises_completed, correct_answers
            "#,
        )
        .bind(session_id)
        .bind(now)
        .bind(summary.xp_earned as i32)
        .bind(summary.exercises_completed as i32)
        .bind(summary.correct as i32)
        .fetch_one(tx.as_mut())
        .await?;

        if summary.xp_earned > 0 {
            Self::credit_user_xp(&mut tx, user_id, summary.xp_earned).await?;
        }
        tx.commit().await?;

        Ok(Some(CloseOutcome {
            session: updated,
            summary,
            freshly_closed: true,
        }))
    }

    /// Force-closes sessions abandoned past the cutoff. They earn nothing:
    /// no partial credit for sessions that were never finalized.
    #[instrument(skip(self))]
    pub async fn sweep_stale_sessions(&self, max_age_secs: u64) -> anyhow::Result<u64> {
        let swept = sqlx::query(
            r#"
            UPDATE learning_sessions
            SET ended_at = now(), xp_earned = 0, exercises_completed = 0, correct_answers = 0
            WHERE ended_at IS NULL AND started_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(max_age_secs as f64)
        .execute(&self.0)
        .await?;

        Ok(swept.rows_affected())
    }

    pub async fn list_achievements(&self) -> anyhow::Result<Vec<AchievementRow>> {
        Ok(sqlx::query_as::<_, AchievementRow>(
            r#"
            SELECT id, title, description, condition, xp_reward
            FROM achievements
            ORDER BY id
            "#,
        )
        .fetch_all(&self.0)
        .await?)
    }

    pub async fn unlocked_achievements(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Vec<UserAchievementRow>> {
        Ok(sqlx::query_as::<_, UserAchievementRow>(
            r#"
            SELECT achievement_id, unlocked_at
            FROM user_achievements
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await?)
    }

    /// One-time unlock: the primary key on (user_id, achievement_id) makes
    /// this safe under concurrent triggers. Returns false when the
    /// achievement was already unlocked; nothing is credited twice.
    #[instrument(skip(self))]
    pub async fn try_unlock(
        &self,
        user_id: &str,
        achievement_id: &str,
        xp_reward: u32,
    ) -> anyhow::Result<bool> {
        let mut tx = self.0.begin().await?;

        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            RETURNING achievement_id
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(tx.as_mut())
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }
        if xp_reward > 0 {
            Self::credit_user_xp(&mut tx, user_id, xp_reward).await?;
        }
        tx.commit().await?;

        Ok(true)
    }

    /// Applies an XP credit plus the streak/last-active bookkeeping that
    /// accompanies any rewarded activity. Always runs inside the caller's
    /// transaction so the credit cannot drift from the write it belongs to.
    async fn credit_user_xp(
        tx: &mut Transaction<'static, Postgres>,
        user_id: &str,
        xp: u32,
    ) -> anyhow::Result<()> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, level, total_xp, streak, last_active
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} missing during XP credit"))?;

        let now = chrono::Utc::now().naive_utc();
        let streak = shared::advance_streak(
            user.streak.max(0) as u32,
            user.last_active.map(|t| t.date()),
            now.date(),
        );

        sqlx::query(
            r#"
            UPDATE users
            SET total_xp = total_xp + $2, streak = $3, last_active = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(xp as i32)
        .bind(streak as i32)
        .bind(now)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

async fn run_migrations(rocket: Rocket<Build>) -> fairing::Result {
    match DB::fetch(&rocket) {
        Some(db) => match sqlx::migrate!("./migrations").run(&**db).await {
            Ok(_) => Ok(rocket),
            Err(e) => {
                rocket::error!("Failed to initialize SQLx database: {}", e);
                Err(rocket)
            }
        },
        None => Err(rocket),
    }
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("SQLx Stage", |rocket| async {
        rocket
            .attach(DB::init())
            .attach(AdHoc::try_on_ignite("SQLx Migrations", run_migrations))
    })
}
