use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::db::is_unique_violation;

/// API-facing error taxonomy. Validation failures are raised before any
/// persistence access; conflicts mean the caller should retry the request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("concurrent update detected, retry the request")]
    Conflict,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::Conflict => Status::Conflict,
            Self::NotFound(_) => Status::NotFound,
            Self::Persistence(_) => Status::InternalServerError,
        }
    }
}

/// Maps a failed ledger upsert: a uniqueness violation that survived the
/// transparent retry surfaces as a conflict, everything else as a
/// persistence failure.
pub fn map_upsert_error(err: anyhow::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Conflict
    } else {
        ApiError::Persistence(err)
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let error = match &self {
            Self::Persistence(e) => {
                rocket::error!("persistence failure: {e:#}");
                "transient persistence failure".to_string()
            }
            other => other.to_string(),
        };
        let mut response = Json(ErrorBody {
            success: false,
            error,
        })
        .respond_to(req)?;
        response.set_status(status);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_the_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad scope".into()).status(),
            Status::BadRequest
        );
        assert_eq!(ApiError::Conflict.status(), Status::Conflict);
        assert_eq!(ApiError::NotFound("exercise").status(), Status::NotFound);
        assert_eq!(
            ApiError::Persistence(anyhow::anyhow!("down")).status(),
            Status::InternalServerError
        );
    }
}
