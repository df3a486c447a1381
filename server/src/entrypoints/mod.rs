use devlingo_server::db::{types::UserRow, DB};
use rocket::{
    fairing::AdHoc,
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod achievements;
pub mod progress;
pub mod sessions;
pub mod types;

/// Header set by the identity proxy in front of this service. The core
/// trusts it as read-only input and never mints identities itself.
pub const USER_HEADER: &str = "x-devlingo-user";

/// Request guard resolving the calling learner through the identity
/// boundary. Unknown or missing identity fails the request with 401.
pub struct Learner(pub UserRow);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Learner {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(user_id) = req.headers().get_one(USER_HEADER) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };
        let Some(db) = req.rocket().state::<DB>() else {
            rocket::error!("database is not attached, cannot resolve identity");
            return Outcome::Error((Status::InternalServerError, ()));
        };
        match db.get_user(user_id).await {
            Ok(Some(user)) => Outcome::Success(Learner(user)),
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(e) => {
                rocket::error!("failed to resolve user {user_id}: {e:#}");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        progress::get_progress,
        progress::update_progress,
        sessions::start_session,
        sessions::submit_answer,
        sessions::close_session,
        achievements::get_achievements,
    ),
    components(schemas(
        types::ProgressUpdateRequest,
        types::ProgressResponse,
        types::UpdateProgressResponse,
        types::ProgressOverviewResponse,
        types::StatsResponse,
        types::UserResponse,
        types::SessionResponse,
        types::SubmitAnswerRequest,
        types::SubmitAnswerResponse,
        types::CloseSessionResponse,
        types::AchievementResponse,
    ))
)]
struct ApiDoc;

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket
            .attach(progress::stage())
            .attach(sessions::stage())
            .attach(achievements::stage())
            .mount(
                "/",
                SwaggerUi::new("/swagger-ui/<_..>").url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
}
