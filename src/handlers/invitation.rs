// src/handlers/invitation.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        invitation::{
            CreateInvitationRequest, Invitation, InvitationResponse, InvitationStatus, NewInvitation,
        },
        participation::StartParticipationResponse,
        survey::AccessType,
    },
    participation::ParticipationService,
    store::SurveyStore,
};

/// Participant link for a token, e.g. `https://surveys.example.org/s/<token>`.
fn invitation_url(base: Option<&str>, token: &str) -> Option<String> {
    let base = base?;
    let base = if base.ends_with('/') {
        Url::parse(base)
    } else {
        Url::parse(&format!("{}/", base))
    };
    match base.and_then(|url| url.join(&format!("s/{}", token))) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            tracing::warn!("PUBLIC_BASE_URL is not a usable URL: {}", e);
            None
        }
    }
}

fn with_url(invitation: Invitation, config: &Config) -> InvitationResponse {
    let invitation_url = invitation_url(config.public_base_url.as_deref(), &invitation.token);
    InvitationResponse {
        invitation,
        invitation_url,
    }
}

/// Invite one person to an invitation-only survey.
/// Requires: Login + Admin Role. Delivery happens elsewhere.
#[utoipa::path(
    post,
    path = "/api/invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created", body = InvitationResponse),
        (status = 400, description = "Invalid payload or survey is not invitation-only"),
        (status = 404, description = "Survey not found")
    ),
    tag = "invitations"
)]
pub async fn create_invitation(
    State(store): State<Arc<dyn SurveyStore>>,
    State(config): State<Config>,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let survey = store
        .survey(payload.survey_id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;
    if survey.access_type != AccessType::InvitationOnly {
        return Err(AppError::BadRequest(
            "Invitations can only be created for invitation-only surveys".to_string(),
        ));
    }

    let invitation = store
        .create_invitation(NewInvitation {
            survey_id: survey.id,
            token: Uuid::new_v4().simple().to_string(),
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            email: payload.email,
            phone: payload.phone,
            delivery_method: payload.delivery_method,
        })
        .await?;
    tracing::info!("Invitation {} created for survey {}", invitation.id, survey.id);

    Ok((StatusCode::CREATED, Json(with_url(invitation, &config))))
}

/// All invitations of one survey.
#[utoipa::path(
    get,
    path = "/api/invitations/surveys/{survey_id}",
    params(("survey_id" = i64, Path, description = "Survey id")),
    responses((status = 200, description = "Invitations", body = [InvitationResponse])),
    tag = "invitations"
)]
pub async fn list_invitations(
    State(store): State<Arc<dyn SurveyStore>>,
    State(config): State<Config>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let invitations = store.list_invitations(survey_id).await?;
    let responses: Vec<InvitationResponse> = invitations
        .into_iter()
        .map(|invitation| with_url(invitation, &config))
        .collect();
    Ok(Json(responses))
}

/// Withdraw an invitation. Its link stops working; completed invitations stay as they are.
/// Requires: Login + Admin Role.
#[utoipa::path(
    delete,
    path = "/api/invitations/{id}",
    params(("id" = i64, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Invitation cancelled", body = InvitationResponse),
        (status = 404, description = "Invitation not found"),
        (status = 409, description = "Invitation was already used to complete the survey")
    ),
    tag = "invitations"
)]
pub async fn cancel_invitation(
    State(store): State<Arc<dyn SurveyStore>>,
    State(config): State<Config>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = store
        .invitation(id)
        .await?
        .ok_or(AppError::NotFound("Invitation not found".to_string()))?;
    if invitation.status == InvitationStatus::Completed {
        return Err(AppError::Conflict(
            "A completed invitation cannot be cancelled".to_string(),
        ));
    }
    if invitation.status == InvitationStatus::Cancelled {
        return Ok(Json(with_url(invitation, &config)));
    }

    let cancelled = store
        .update_invitation(id, InvitationStatus::Cancelled, None)
        .await?
        .ok_or(AppError::NotFound("Invitation not found".to_string()))?;
    tracing::info!("Invitation {} cancelled", id);

    Ok(Json(with_url(cancelled, &config)))
}

/// Survey behind an invitation link, with the invitee's name and progress.
#[utoipa::path(
    get,
    path = "/api/s/{token}",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Survey for the invitee"),
        (status = 403, description = "Invitation cancelled or survey inactive"),
        (status = 404, description = "Invitation not found")
    ),
    tag = "invitations"
)]
pub async fn open_invitation(
    State(service): State<ParticipationService>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.open_invitation(&token).await?))
}

/// Start (or resume) the participation that belongs to an invitation.
#[utoipa::path(
    post,
    path = "/api/s/{token}/start",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 201, description = "Participation started", body = StartParticipationResponse),
        (status = 200, description = "Participation resumed", body = StartParticipationResponse),
        (status = 409, description = "Invitation already used to complete the survey")
    ),
    tag = "invitations"
)]
pub async fn start_from_invitation(
    State(service): State<ParticipationService>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let started = service.start_by_token(&token).await?;
    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}
