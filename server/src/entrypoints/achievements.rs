use std::collections::HashMap;

use devlingo_server::{db::DB, error::ApiError};
use rocket::{serde::json::Json, State};

use super::types::AchievementResponse;
use super::Learner;

#[utoipa::path(context_path = "/api/achievements", responses(
    (status = 200, description = "All achievements with the caller's unlock state", body = [AchievementResponse])
))]
#[get("/")]
pub(super) async fn get_achievements(
    learner: Learner,
    db: &State<DB>,
) -> Result<Json<Vec<AchievementResponse>>, ApiError> {
    let unlocked: HashMap<String, chrono::NaiveDateTime> = db
        .unlocked_achievements(&learner.0.id)
        .await?
        .into_iter()
        .map(|u| (u.achievement_id, u.unlocked_at))
        .collect();

    let achievements = db
        .list_achievements()
        .await?
        .into_iter()
        .map(|row| {
            let unlocked_at = unlocked.get(&row.id).copied();
            AchievementResponse::new(row, unlocked_at)
        })
        .collect();

    Ok(Json(achievements))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing achievement entrypoints", |rocket| async {
        rocket.mount("/api/achievements", rocket::routes![get_achievements])
    })
}
