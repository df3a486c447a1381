use devlingo_server::{
    db::DB,
    error::{map_upsert_error, ApiError},
};
use itertools::Itertools;
use rocket::{serde::json::Json, State};
use shared::{ProgressStats, ProgressStatus, ProgressUpdate, ScopeKey};

use super::types::{
    ProgressOverviewResponse, ProgressResponse, ProgressUpdateRequest, UpdateProgressResponse,
};
use super::Learner;

#[utoipa::path(context_path = "/api/progress", responses(
    (status = 200, description = "Progress records with derived statistics", body = ProgressOverviewResponse)
))]
#[get("/")]
pub(super) async fn get_progress(
    learner: Learner,
    db: &State<DB>,
) -> Result<Json<ProgressOverviewResponse>, ApiError> {
    let rows = db.list_progress(&learner.0.id).await?;
    let total_modules = db.count_active_modules().await?;
    let total_lessons = db.count_active_lessons().await?;

    let records = rows
        .iter()
        .map(|row| (row.scope(), row.to_record()))
        .collect_vec();
    let stats = ProgressStats::collect(&records, total_modules, total_lessons, &learner.0.summary());

    Ok(Json(ProgressOverviewResponse {
        records: rows.into_iter().map(ProgressResponse::from).collect(),
        stats: stats.into(),
        user: learner.0.into(),
    }))
}

#[utoipa::path(context_path = "/api/progress", request_body = ProgressUpdateRequest, responses(
    (status = 200, description = "Upserted progress record and the XP awarded", body = UpdateProgressResponse),
    (status = 400, description = "Malformed scope or out-of-range fields"),
    (status = 409, description = "Concurrent update conflict, retry"),
))]
#[post("/", data = "<request>")]
pub(super) async fn update_progress(
    learner: Learner,
    db: &State<DB>,
    request: Json<ProgressUpdateRequest>,
) -> Result<Json<UpdateProgressResponse>, ApiError> {
    let request = request.into_inner();

    let scope = ScopeKey::resolve(
        request.level_id,
        request.module_id,
        request.lesson_id,
        request.exercise_id,
    )
    .map_err(|e| ApiError::Validation(e.to_string()))?;

    let status = request
        .status
        .map(|raw| {
            raw.parse::<ProgressStatus>()
                .map_err(|_| ApiError::Validation(format!("unknown status {raw:?}")))
        })
        .transpose()?;
    let update = ProgressUpdate {
        status,
        score: request.score,
        time_spent: request.time_spent,
        attempts: request.attempts,
    };
    update
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    // The content store is consulted only when an exercise completion is
    // being recorded; an unresolvable id degrades to the fallback reward.
    let exercise_reward = match (&scope.exercise_id, update.status) {
        (Some(id), Some(status)) if status.is_completed() => match db.exercise_meta(id).await? {
            Some(meta) => meta.xp_reward.map(|xp| xp.max(0) as u32),
            None => {
                rocket::info!("exercise {id} not found, using the fallback reward");
                None
            }
        },
        _ => None,
    };

    let (row, xp_earned) = db
        .upsert_progress(&learner.0.id, &scope, &update, exercise_reward)
        .await
        .map_err(map_upsert_error)?;

    Ok(Json(UpdateProgressResponse {
        record: row.into(),
        xp_earned,
    }))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing progress entrypoints", |rocket| async {
        rocket.mount("/api/progress", rocket::routes![get_progress, update_progress])
    })
}
