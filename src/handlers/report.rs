// src/handlers/report.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::AppError,
    models::{
        participation::Participation,
        report::{ReportParams, SurveyReport},
        survey::Survey,
    },
    report,
    store::SurveyStore,
};

async fn load(
    store: &dyn SurveyStore,
    survey_id: i64,
) -> Result<(Survey, Vec<Participation>), AppError> {
    let survey = store
        .survey(survey_id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;
    let participations = store.list_participations(survey_id).await?;
    Ok((survey, participations))
}

async fn build(
    store: &dyn SurveyStore,
    survey_id: i64,
    include_partial: bool,
) -> Result<SurveyReport, AppError> {
    let (survey, participations) = load(store, survey_id).await?;
    let answers = store.answers_for_survey(survey_id, !include_partial).await?;
    Ok(report::build_report(&survey, &participations, &answers, include_partial))
}

/// Aggregated results of a survey.
/// Only completed participations count unless `includePartial=true`.
#[utoipa::path(
    get,
    path = "/api/surveys/{id}/report",
    params(
        ("id" = i64, Path, description = "Survey id"),
        ("includePartial" = Option<bool>, Query, description = "Also analyse unfinished participations")
    ),
    responses(
        (status = 200, description = "Survey report"),
        (status = 404, description = "Survey not found")
    ),
    tag = "reports"
)]
pub async fn survey_report(
    State(store): State<Arc<dyn SurveyStore>>,
    Path(id): Path<i64>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(build(store.as_ref(), id, params.include_partial).await?))
}

/// The same report as rounded plain text.
#[utoipa::path(
    get,
    path = "/api/surveys/{id}/report/summary",
    params(
        ("id" = i64, Path, description = "Survey id"),
        ("includePartial" = Option<bool>, Query, description = "Also analyse unfinished participations")
    ),
    responses((status = 200, description = "Plain-text summary")),
    tag = "reports"
)]
pub async fn survey_report_summary(
    State(store): State<Arc<dyn SurveyStore>>,
    Path(id): Path<i64>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let report = build(store.as_ref(), id, params.include_partial).await?;
    Ok(report::render_summary(&report))
}

/// Paged text and file responses of one question.
#[utoipa::path(
    get,
    path = "/api/surveys/{id}/report/questions/{question_id}/responses",
    params(
        ("id" = i64, Path, description = "Survey id"),
        ("question_id" = i64, Path, description = "Question id, branch questions included"),
        ("page" = Option<usize>, Query, description = "1-based page"),
        ("pageSize" = Option<usize>, Query, description = "Items per page"),
        ("includePartial" = Option<bool>, Query, description = "Also include unfinished participations")
    ),
    responses(
        (status = 200, description = "One page of responses"),
        (status = 404, description = "Survey or question not found")
    ),
    tag = "reports"
)]
pub async fn question_responses(
    State(store): State<Arc<dyn SurveyStore>>,
    Path((id, question_id)): Path<(i64, i64)>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let (survey, participations) = load(store.as_ref(), id).await?;
    let answers = store.answers_for_survey(id, !params.include_partial).await?;

    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = report::question_responses(
        &survey,
        &participations,
        &answers,
        question_id,
        params.include_partial,
        params.page.unwrap_or(1),
        page_size,
    )
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(page))
}

/// Everything one participant answered.
#[utoipa::path(
    get,
    path = "/api/surveys/{id}/participations/{participation_id}",
    params(
        ("id" = i64, Path, description = "Survey id"),
        ("participation_id" = Uuid, Path, description = "Participation id")
    ),
    responses(
        (status = 200, description = "Answers of one participant"),
        (status = 404, description = "Survey or participation not found")
    ),
    tag = "reports"
)]
pub async fn participant_responses(
    State(store): State<Arc<dyn SurveyStore>>,
    Path((id, participation_id)): Path<(i64, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let survey = store
        .survey(id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;
    let participation = store
        .participation(participation_id)
        .await?
        .filter(|p| p.survey_id == survey.id)
        .ok_or(AppError::NotFound("Participation not found".to_string()))?;
    let answers = store.answers_for_participation(participation.id).await?;

    Ok(Json(report::participant_responses(&survey, &participation, &answers)))
}
