// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{
    authoring::{AuthoringError, FieldError},
    models::{draft::EditError, question_type::RegistryError},
    participation::ParticipationError,
    store::StoreError,
};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 400 with the full list of authoring problems
    Validation(Vec<FieldError>),

    // 400, the draft names a question type nobody registered
    UnknownQuestionType(String),

    // Status depends on the variant
    Participation(ParticipationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

fn participation_status(err: &ParticipationError) -> StatusCode {
    match err {
        ParticipationError::RequiredAnswerMissing { .. }
        | ParticipationError::ConditionalChildRequiredMissing { .. }
        | ParticipationError::MatrixExplanationRequired { .. }
        | ParticipationError::MatrixRowsIncomplete { .. }
        | ParticipationError::InvalidOption { .. }
        | ParticipationError::InvalidScaleValue { .. }
        | ParticipationError::TooManySelections { .. }
        | ParticipationError::InvalidAttachment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ParticipationError::UnknownQuestion(_) | ParticipationError::Malformed(_) => {
            StatusCode::BAD_REQUEST
        }
        ParticipationError::AlreadyCompleted { .. } => StatusCode::CONFLICT,
        ParticipationError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
        ParticipationError::InvitationRequired
        | ParticipationError::SurveyInactive
        | ParticipationError::InvitationCancelled => StatusCode::FORBIDDEN,
        ParticipationError::SurveyNotFound
        | ParticipationError::ParticipationNotFound
        | ParticipationError::InvitationNotFound => StatusCode::NOT_FOUND,
        ParticipationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Survey is invalid",
                    "code": "validation_failed",
                    "errors": errors,
                }),
            ),
            AppError::UnknownQuestionType(tag) => {
                tracing::error!("Rejected unknown question type '{}'", tag);
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": format!("Unknown question type '{}'", tag),
                        "code": "unknown_question_type",
                    }),
                )
            }
            AppError::Participation(err) => {
                let status = participation_status(&err);
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Participation failed: {:?}", err);
                    "Internal Server Error".to_string()
                } else {
                    err.to_string()
                };
                let mut body = json!({ "error": message, "code": err.code() });
                if let Some(details) = err.details() {
                    body["details"] = details;
                }
                (status, body)
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownQuestionType(tag) => AppError::UnknownQuestionType(tag),
        }
    }
}

impl From<AuthoringError> for AppError {
    fn from(err: AuthoringError) -> Self {
        match err {
            AuthoringError::Registry(e) => e.into(),
            AuthoringError::Invalid(errors) => AppError::Validation(errors),
            AuthoringError::Store(e) => e.into(),
        }
    }
}

impl From<EditError> for AppError {
    fn from(err: EditError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<ParticipationError> for AppError {
    fn from(err: ParticipationError) -> Self {
        AppError::Participation(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participation_errors_map_to_their_status() {
        let cases = [
            (
                ParticipationError::RequiredAnswerMissing { question_id: 1 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ParticipationError::AlreadyCompleted {
                    completed_at: chrono::Utc::now(),
                },
                StatusCode::CONFLICT,
            ),
            (ParticipationError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
            (ParticipationError::InvitationRequired, StatusCode::FORBIDDEN),
            (ParticipationError::UnknownQuestion(9), StatusCode::BAD_REQUEST),
            (ParticipationError::ParticipationNotFound, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn invalid_drafts_become_bad_requests() {
        let err: AppError = AuthoringError::Invalid(vec![FieldError::new("title", "Title is required.")]).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err: AppError = RegistryError::UnknownQuestionType("Ranking".into()).into();
        assert!(matches!(err, AppError::UnknownQuestionType(ref tag) if tag == "Ranking"));
    }
}
