// src/routes.rs

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    handlers::{invitation, participation, report, surveys},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, identify_middleware},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        surveys::create_survey,
        surveys::validate_draft,
        surveys::edit_draft,
        surveys::list_surveys,
        surveys::get_survey,
        surveys::set_survey_active,
        surveys::get_survey_by_slug,
        surveys::list_question_types,
        participation::start_participation,
        participation::participation_status,
        participation::participation_state,
        participation::submit_answer,
        participation::complete_participation,
        invitation::create_invitation,
        invitation::list_invitations,
        invitation::cancel_invitation,
        invitation::open_invitation,
        invitation::start_from_invitation,
        report::survey_report,
        report::survey_report_summary,
        report::question_responses,
        report::participant_responses,
    ),
    tags(
        (name = "surveys", description = "Survey authoring"),
        (name = "participation", description = "Taking a survey"),
        (name = "invitations", description = "Personal invitation links"),
        (name = "reports", description = "Aggregated results")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Assembles the main application router.
///
/// * Authoring, invitation management and reports: Auth + Admin.
/// * Participant routes: optional identity.
/// * Global middleware: Trace, CORS, body limit sized for attachments.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Double middleware protection: Auth first, then Admin check
    let author_routes = Router::new()
        .route("/surveys", get(surveys::list_surveys).post(surveys::create_survey))
        .route("/surveys/validate", post(surveys::validate_draft))
        .route("/surveys/draft/edit", post(surveys::edit_draft))
        .route("/surveys/{id}", get(surveys::get_survey))
        .route("/surveys/{id}/active", patch(surveys::set_survey_active))
        .route("/surveys/{id}/report", get(report::survey_report))
        .route("/surveys/{id}/report/summary", get(report::survey_report_summary))
        .route(
            "/surveys/{id}/report/questions/{question_id}/responses",
            get(report::question_responses),
        )
        .route(
            "/surveys/{id}/participations/{participation_id}",
            get(report::participant_responses),
        )
        .route("/invitations", post(invitation::create_invitation))
        .route("/invitations/{id}", delete(invitation::cancel_invitation))
        .route("/invitations/surveys/{survey_id}", get(invitation::list_invitations))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let participant_routes = Router::new()
        .route("/surveys/by-slug/{slug}", get(surveys::get_survey_by_slug))
        .route("/participations/start", post(participation::start_participation))
        .route("/participations/status/{slug}", get(participation::participation_status))
        .layer(middleware::from_fn_with_state(state.clone(), identify_middleware));

    // The participation id / invitation token is the credential here.
    let open_routes = Router::new()
        .route("/question-types", get(surveys::list_question_types))
        .route("/participations/{id}", get(participation::participation_state))
        .route("/participations/{id}/answers", post(participation::submit_answer))
        .route(
            "/participations/{id}/complete",
            patch(participation::complete_participation),
        )
        .route("/s/{token}", get(invitation::open_invitation))
        .route("/s/{token}/start", post(invitation::start_from_invitation));

    let api = Router::new()
        .merge(author_routes)
        .merge(participant_routes)
        .merge(open_routes);

    Router::new()
        .nest("/api", api)
        .route("/api-docs/openapi.json", get(openapi_json))
        // Global Middleware (applied from outside in)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
