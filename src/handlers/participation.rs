// src/handlers/participation.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        answer::{SubmitAnswerRequest, SubmitOutcome},
        participation::{
            Participation, ParticipationStatus, StartParticipationRequest, StartParticipationResponse,
        },
    },
    participation::ParticipationService,
    utils::jwt::Viewer,
};

/// Start (or resume) taking a survey by its slug.
#[utoipa::path(
    post,
    path = "/api/participations/start",
    request_body = StartParticipationRequest,
    responses(
        (status = 201, description = "Participation started", body = StartParticipationResponse),
        (status = 200, description = "In-progress participation resumed", body = StartParticipationResponse),
        (status = 401, description = "Survey is internal and the caller is anonymous"),
        (status = 403, description = "Invitation required or survey inactive"),
        (status = 409, description = "Caller already completed the survey")
    ),
    tag = "participation"
)]
pub async fn start_participation(
    State(service): State<ParticipationService>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Json(payload): Json<StartParticipationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let started = service.start_by_slug(&payload.slug, viewer.as_ref()).await?;
    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}

/// Whether the caller already took a survey.
#[utoipa::path(
    get,
    path = "/api/participations/status/{slug}",
    params(("slug" = String, Path, description = "Public survey slug")),
    responses(
        (status = 200, description = "Participation status of the caller", body = ParticipationStatus),
        (status = 404, description = "Survey not found")
    ),
    tag = "participation"
)]
pub async fn participation_status(
    State(service): State<ParticipationService>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.status(&slug, viewer.as_ref()).await?))
}

/// Current state of one participation.
#[utoipa::path(
    get,
    path = "/api/participations/{id}",
    params(("id" = Uuid, Path, description = "Participation id")),
    responses((status = 200, description = "Participation state")),
    tag = "participation"
)]
pub async fn participation_state(
    State(service): State<ParticipationService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let state = service.participation_state(id).await?;
    Ok(Json(json!({ "participationId": id, "state": state })))
}

/// Submit the answer to one question (and, for conditional questions, its branch).
/// Repeating a submission overwrites the earlier answer.
#[utoipa::path(
    post,
    path = "/api/participations/{id}/answers",
    params(("id" = Uuid, Path, description = "Participation id")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer accepted", body = SubmitOutcome),
        (status = 400, description = "Malformed request or unknown question"),
        (status = 404, description = "Participation not found"),
        (status = 409, description = "Participation already completed"),
        (status = 422, description = "Answer violates the question's rules")
    ),
    tag = "participation"
)]
pub async fn submit_answer(
    State(service): State<ParticipationService>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.submit_answer(id, &payload).await?))
}

/// Complete a participation. Only the first call succeeds.
#[utoipa::path(
    patch,
    path = "/api/participations/{id}/complete",
    params(("id" = Uuid, Path, description = "Participation id")),
    responses(
        (status = 200, description = "Participation completed", body = Participation),
        (status = 404, description = "Participation not found"),
        (status = 409, description = "Participation already completed")
    ),
    tag = "participation"
)]
pub async fn complete_participation(
    State(service): State<ParticipationService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.complete(id).await?))
}
