// src/handlers/surveys.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    authoring::{self, FieldError},
    config::Config,
    error::AppError,
    models::{
        draft::{DraftCheck, EditDraftRequest, SurveyDraft, apply_edit},
        question_type::QuestionTypeRegistry,
        survey::{CreateSurveyResponse, SetActiveRequest, SurveySummary},
    },
    participation::ParticipationService,
    store::SurveyStore,
    utils::jwt::{Claims, Viewer},
};

fn check(
    draft: &SurveyDraft,
    registry: &QuestionTypeRegistry,
    max_attachment_bytes: usize,
) -> Result<Vec<FieldError>, AppError> {
    let mut errors = authoring::validate_survey(draft, registry)?;
    errors.extend(authoring::validate_attachments(draft, max_attachment_bytes));
    Ok(errors)
}

/// Create a survey from a draft.
/// Requires: Login + Admin Role. All problems are reported together.
#[utoipa::path(
    post,
    path = "/api/surveys",
    responses(
        (status = 201, description = "Survey created", body = CreateSurveyResponse),
        (status = 400, description = "Draft is invalid or names an unknown question type")
    ),
    tag = "surveys"
)]
pub async fn create_survey(
    State(store): State<Arc<dyn SurveyStore>>,
    State(registry): State<Arc<QuestionTypeRegistry>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(draft): Json<SurveyDraft>,
) -> Result<impl IntoResponse, AppError> {
    let survey = authoring::create_survey(
        &draft,
        Some(claims.sub.clone()),
        &registry,
        store.as_ref(),
        config.max_attachment_bytes,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSurveyResponse {
            id: survey.id,
            slug: survey.slug,
        }),
    ))
}

/// Validate a draft without saving it.
#[utoipa::path(
    post,
    path = "/api/surveys/validate",
    responses((status = 200, description = "Validation result with every field error")),
    tag = "surveys"
)]
pub async fn validate_draft(
    State(registry): State<Arc<QuestionTypeRegistry>>,
    State(config): State<Config>,
    Json(draft): Json<SurveyDraft>,
) -> Result<impl IntoResponse, AppError> {
    let errors = check(&draft, &registry, config.max_attachment_bytes)?;
    Ok(Json(DraftCheck {
        valid: errors.is_empty(),
        errors,
        draft: None,
    }))
}

/// Apply edits to a draft and validate the result.
/// The submitted draft is never modified in place.
#[utoipa::path(
    post,
    path = "/api/surveys/draft/edit",
    responses(
        (status = 200, description = "Edited draft and its validation result"),
        (status = 400, description = "An edit path does not exist")
    ),
    tag = "surveys"
)]
pub async fn edit_draft(
    State(registry): State<Arc<QuestionTypeRegistry>>,
    State(config): State<Config>,
    Json(request): Json<EditDraftRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut draft = request.draft;
    for edit in &request.edits {
        draft = apply_edit(&draft, edit)?;
    }

    let errors = check(&draft, &registry, config.max_attachment_bytes)?;
    Ok(Json(DraftCheck {
        valid: errors.is_empty(),
        errors,
        draft: Some(draft),
    }))
}

/// List surveys, newest first.
#[utoipa::path(
    get,
    path = "/api/surveys",
    responses((status = 200, description = "All surveys", body = [SurveySummary])),
    tag = "surveys"
)]
pub async fn list_surveys(
    State(store): State<Arc<dyn SurveyStore>>,
) -> Result<impl IntoResponse, AppError> {
    let surveys = store.list_surveys().await?;
    let summaries: Vec<SurveySummary> = surveys.iter().map(SurveySummary::from).collect();
    Ok(Json(summaries))
}

/// Full survey definition for authors.
#[utoipa::path(
    get,
    path = "/api/surveys/{id}",
    params(("id" = i64, Path, description = "Survey id")),
    responses(
        (status = 200, description = "Survey definition"),
        (status = 404, description = "Survey not found")
    ),
    tag = "surveys"
)]
pub async fn get_survey(
    State(store): State<Arc<dyn SurveyStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = store
        .survey(id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;
    Ok(Json(survey))
}

/// Open or close a survey. Closed surveys cannot be opened or started by participants.
/// Requires: Login + Admin Role.
#[utoipa::path(
    patch,
    path = "/api/surveys/{id}/active",
    params(("id" = i64, Path, description = "Survey id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Updated survey", body = SurveySummary),
        (status = 404, description = "Survey not found")
    ),
    tag = "surveys"
)]
pub async fn set_survey_active(
    State(store): State<Arc<dyn SurveyStore>>,
    Path(id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let survey = store
        .set_survey_active(id, payload.is_active)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;
    tracing::info!("Survey {} is_active set to {}", id, survey.is_active);
    Ok(Json(SurveySummary::from(&survey)))
}

/// Survey as a participant sees it.
/// Internal surveys need a signed-in caller; invitation-only ones are only
/// reachable through `/api/s/{token}`.
#[utoipa::path(
    get,
    path = "/api/surveys/by-slug/{slug}",
    params(("slug" = String, Path, description = "Public survey slug")),
    responses(
        (status = 200, description = "Survey definition"),
        (status = 401, description = "Sign-in required"),
        (status = 403, description = "Invitation required or survey inactive"),
        (status = 404, description = "Survey not found")
    ),
    tag = "surveys"
)]
pub async fn get_survey_by_slug(
    State(service): State<ParticipationService>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let survey = service.survey_for_viewer(&slug, viewer.as_ref()).await?;
    Ok(Json(survey))
}

/// Question types and what each of them supports.
#[utoipa::path(
    get,
    path = "/api/question-types",
    responses((status = 200, description = "Registered question types")),
    tag = "surveys"
)]
pub async fn list_question_types(
    State(registry): State<Arc<QuestionTypeRegistry>>,
) -> impl IntoResponse {
    Json(registry.all().into_iter().cloned().collect::<Vec<_>>())
}
