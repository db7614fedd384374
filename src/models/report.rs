// src/models/report.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    attachment::AttachmentRef, question_type::QuestionType, survey::AccessType,
};

/// Aggregated results of one survey.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyReport {
    pub survey_id: i64,
    pub title: String,
    pub description: String,
    pub intro_text: Option<String>,
    pub outro_text: Option<String>,
    pub access_type: AccessType,
    pub is_active: bool,
    pub total_participations: usize,
    pub completed_participations: usize,
    /// Percentage of participations that reached Completed.
    pub completion_rate: f64,
    /// Size of the population the question statistics are computed over.
    pub analyzed_participations: usize,
    pub participants: Vec<ParticipantSummary>,
    pub questions: Vec<QuestionReport>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub participation_id: Uuid,
    pub participant_name: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub answered_questions: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReport {
    pub question_id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub order: i32,
    pub is_required: bool,
    /// Participations in scope that answered this question.
    pub total_responses: usize,
    pub response_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_results: Option<Vec<OptionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_responses: Option<Vec<TextResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_responses: Option<Vec<FileResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_results: Option<Vec<ConditionalBranchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_scale_labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_results: Option<Vec<MatrixRowResult>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    pub option_id: i64,
    pub text: String,
    pub order: i32,
    pub value: f64,
    pub selection_count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextResponse {
    pub participation_id: Uuid,
    pub participant_name: Option<String>,
    pub text_value: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub answer_id: i64,
    pub attachment_id: i64,
    pub participation_id: Uuid,
    pub participant_name: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Statistics of the branch opened by one option of a Conditional question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBranchResult {
    pub parent_option_id: i64,
    pub parent_option_text: String,
    /// Participations that chose the option.
    pub participant_count: usize,
    pub child_questions: Vec<QuestionReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRowResult {
    pub option_id: i64,
    pub text: String,
    pub order: i32,
    pub total_responses: usize,
    pub average_score: f64,
    /// Count per scale point, index 0 is score 1.
    pub scale_distribution: Vec<usize>,
    pub explanations: Vec<MatrixRowExplanation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRowExplanation {
    pub participation_id: Uuid,
    pub participant_name: Option<String>,
    pub scale_value: u8,
    pub explanation: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Free-form responses of one question, either kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseItem {
    Text(TextResponse),
    File(FileResponse),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

impl<T> PaginatedResponse<T> {
    /// Cuts `page` (1-based) out of `all`.
    pub fn paginate(all: Vec<T>, page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_count = all.len();
        let total_pages = total_count.div_ceil(page_size);
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Self {
            items,
            page,
            page_size,
            total_count,
            total_pages,
        }
    }
}

/// Everything one participant answered, with option texts resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub participation_id: Uuid,
    pub participant_name: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub answers: Vec<ParticipantAnswer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantAnswer {
    pub question_id: i64,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Set for branch questions: the Conditional question they belong to.
    pub parent_question_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selected_options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matrix_answers: Vec<ParticipantMatrixAnswer>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMatrixAnswer {
    pub row_text: String,
    pub scale_value: u8,
    pub scale_label: Option<String>,
    pub explanation: Option<String>,
}

/// Query string of the report endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    #[serde(default)]
    pub include_partial: bool,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}
