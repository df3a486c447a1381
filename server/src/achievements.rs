use std::collections::HashSet;

use shared::{AchievementCondition, ProgressSnapshot, SessionSummary};

use crate::db::{types::AchievementRow, DB};

/// Evaluates every locked achievement against the user's aggregate state and
/// unlocks the ones whose condition holds. Unlocking is best-effort from the
/// caller's perspective: the triggering progress write has already committed.
pub async fn evaluate_unlocks(
    db: &DB,
    user_id: &str,
    session: Option<&SessionSummary>,
) -> anyhow::Result<Vec<AchievementRow>> {
    let user = db
        .get_user(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} vanished during achievement check"))?;
    let (completed_lessons, completed_modules) = db.completed_counts(user_id).await?;
    let unlocked: HashSet<String> = db
        .unlocked_achievements(user_id)
        .await?
        .into_iter()
        .map(|u| u.achievement_id)
        .collect();

    let snapshot = ProgressSnapshot {
        total_xp: user.total_xp.max(0) as u32,
        streak: user.streak.max(0) as u32,
        completed_lessons,
        completed_modules,
        session,
    };

    let mut newly_unlocked = Vec::new();
    for achievement in db.list_achievements().await? {
        if unlocked.contains(&achievement.id) {
            continue;
        }
        let Some(condition) = AchievementCondition::parse(&achievement.condition) else {
            tracing::warn!(
                "achievement {} carries unknown condition {:?}, skipping",
                achievement.id,
                achievement.condition
            );
            continue;
        };
        if !condition.is_met(&snapshot) {
            continue;
        }
        // The store guards the (user, achievement) uniqueness; a concurrent
        // trigger unlocking first turns this into a no-op.
        if db
            .try_unlock(user_id, &achievement.id, achievement.xp_reward.max(0) as u32)
            .await?
        {
            tracing::info!("user {user_id} unlocked achievement {}", achievement.id);
            newly_unlocked.push(achievement);
        }
    }

    Ok(newly_unlocked)
}
