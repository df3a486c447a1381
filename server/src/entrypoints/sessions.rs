use devlingo_server::{achievements, db::DB, error::ApiError};
use rocket::{serde::json::Json, State};

use super::types::{
    CloseSessionResponse, SessionResponse, SubmitAnswerRequest, SubmitAnswerResponse,
};
use super::Learner;

#[utoipa::path(context_path = "/api/sessions", responses(
    (status = 200, description = "Newly opened learning session", body = SessionResponse)
))]
#[post("/")]
pub(super) async fn start_session(
    learner: Learner,
    db: &State<DB>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = db.start_session(&learner.0.id).await?;
    Ok(Json(session.into()))
}

#[utoipa::path(context_path = "/api/sessions", request_body = SubmitAnswerRequest, responses(
    (status = 200, description = "Graded answer appended to the session", body = SubmitAnswerResponse),
    (status = 400, description = "Session is already closed"),
    (status = 404, description = "Unknown session or exercise"),
))]
#[post("/<id>/responses", data = "<request>")]
pub(super) async fn submit_answer(
    learner: Learner,
    db: &State<DB>,
    id: i64,
    request: Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, ApiError> {
    let request = request.into_inner();

    // Grading needs the canonical answer; unlike the reward lookup, a missing
    // exercise is fatal here.
    let meta = db
        .exercise_meta(&request.exercise_id)
        .await?
        .ok_or(ApiError::NotFound("exercise"))?;
    let is_correct = shared::grade(&request.answer, &meta.correct_answer, &meta.alternative_answers);

    let recorded = db
        .record_response(
            id,
            &learner.0.id,
            &request.exercise_id,
            &request.answer,
            is_correct,
            request.time_spent.unwrap_or(0),
            request.hints_used.unwrap_or(0),
        )
        .await?;

    match recorded {
        Some(row) => Ok(Json(SubmitAnswerResponse {
            response_id: row.id,
            exercise_id: row.exercise_id,
            is_correct: row.is_correct,
        })),
        None => match db.get_session(id, &learner.0.id).await? {
            Some(_) => Err(ApiError::Validation(
                "session is already closed".to_string(),
            )),
            None => Err(ApiError::NotFound("session")),
        },
    }
}

#[utoipa::path(context_path = "/api/sessions", responses(
    (status = 200, description = "Finalized session totals; idempotent", body = CloseSessionResponse),
    (status = 404, description = "Unknown session"),
))]
#[post("/<id>/close")]
pub(super) async fn close_session(
    learner: Learner,
    db: &State<DB>,
    id: i64,
) -> Result<Json<CloseSessionResponse>, ApiError> {
    let outcome = db
        .close_session(id, &learner.0.id)
        .await?
        .ok_or(ApiError::NotFound("session"))?;

    // Achievement unlocking is best-effort: the close has already committed
    // and a failed evaluation must not undo it.
    let unlocked = if outcome.freshly_closed {
        match achievements::evaluate_unlocks(db, &learner.0.id, Some(&outcome.summary)).await {
            Ok(unlocked) => unlocked,
            Err(e) => {
                rocket::error!(
                    "achievement evaluation failed for {}: {e:#}",
                    learner.0.id
                );
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok(Json(CloseSessionResponse {
        session: outcome.session.into(),
        xp_earned: outcome.summary.xp_earned,
        unlocked: unlocked.into_iter().map(Into::into).collect(),
    }))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing session entrypoints", |rocket| async {
        rocket.mount(
            "/api/sessions",
            rocket::routes![start_session, submit_answer, close_session],
        )
    })
}
