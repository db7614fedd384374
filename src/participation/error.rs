// src/participation/error.rs

use serde_json::{Value, json};

use crate::{models::attachment::AttachmentError, store::StoreError};

/// Everything that can stop a participant from starting, answering or completing.
#[derive(Debug, thiserror::Error)]
pub enum ParticipationError {
    #[error("question {question_id} is required")]
    RequiredAnswerMissing { question_id: i64 },

    #[error("question {question_id} under the selected option of question {parent_question_id} is required")]
    ConditionalChildRequiredMissing {
        parent_question_id: i64,
        question_id: i64,
    },

    #[error("row '{row_text}' of question {question_id} needs an explanation for low scores")]
    MatrixExplanationRequired {
        question_id: i64,
        option_id: i64,
        row_text: String,
    },

    #[error("every row of question {question_id} must be scored")]
    MatrixRowsIncomplete {
        question_id: i64,
        missing_option_ids: Vec<i64>,
    },

    #[error("option {option_id} does not belong to question {question_id}")]
    InvalidOption { question_id: i64, option_id: i64 },

    #[error("scale value {value} of row {option_id} is outside the 1-5 scale")]
    InvalidScaleValue {
        question_id: i64,
        option_id: i64,
        value: u8,
    },

    #[error("question {question_id} accepts exactly one option")]
    TooManySelections { question_id: i64 },

    #[error("attachment for question {question_id} was rejected: {source}")]
    InvalidAttachment {
        question_id: i64,
        #[source]
        source: AttachmentError,
    },

    #[error("question {0} is not part of this survey")]
    UnknownQuestion(i64),

    #[error("participation was already completed at {completed_at}")]
    AlreadyCompleted {
        completed_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("this survey requires you to sign in")]
    AuthenticationRequired,

    #[error("this survey can only be taken through a personal invitation link")]
    InvitationRequired,

    #[error("this survey is not active")]
    SurveyInactive,

    #[error("this invitation was cancelled")]
    InvitationCancelled,

    #[error("survey not found")]
    SurveyNotFound,

    #[error("participation not found")]
    ParticipationNotFound,

    #[error("invitation not found")]
    InvitationNotFound,

    #[error("{0}")]
    Malformed(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ParticipationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ParticipationClosed { completed_at } => {
                ParticipationError::AlreadyCompleted { completed_at }
            }
            StoreError::ParticipationMissing(_) => ParticipationError::ParticipationNotFound,
            other => ParticipationError::Store(other),
        }
    }
}

impl ParticipationError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            ParticipationError::RequiredAnswerMissing { .. } => "required_answer_missing",
            ParticipationError::ConditionalChildRequiredMissing { .. } => {
                "conditional_child_required_missing"
            }
            ParticipationError::MatrixExplanationRequired { .. } => "matrix_explanation_required",
            ParticipationError::MatrixRowsIncomplete { .. } => "matrix_rows_incomplete",
            ParticipationError::InvalidOption { .. } => "invalid_option",
            ParticipationError::InvalidScaleValue { .. } => "invalid_scale_value",
            ParticipationError::TooManySelections { .. } => "too_many_selections",
            ParticipationError::InvalidAttachment { .. } => "invalid_attachment",
            ParticipationError::UnknownQuestion(_) => "unknown_question",
            ParticipationError::AlreadyCompleted { .. } => "already_completed",
            ParticipationError::AuthenticationRequired => "authentication_required",
            ParticipationError::InvitationRequired => "invitation_required",
            ParticipationError::SurveyInactive => "survey_inactive",
            ParticipationError::InvitationCancelled => "invitation_cancelled",
            ParticipationError::SurveyNotFound => "survey_not_found",
            ParticipationError::ParticipationNotFound => "participation_not_found",
            ParticipationError::InvitationNotFound => "invitation_not_found",
            ParticipationError::Malformed(_) => "malformed_answer",
            ParticipationError::Store(_) => "internal_error",
        }
    }

    /// Identifies the offending question / row so clients can point at it.
    pub fn details(&self) -> Option<Value> {
        let details = match self {
            ParticipationError::RequiredAnswerMissing { question_id }
            | ParticipationError::TooManySelections { question_id }
            | ParticipationError::InvalidAttachment { question_id, .. } => {
                json!({ "questionId": question_id })
            }
            ParticipationError::ConditionalChildRequiredMissing {
                parent_question_id,
                question_id,
            } => json!({ "parentQuestionId": parent_question_id, "questionId": question_id }),
            ParticipationError::MatrixExplanationRequired {
                question_id,
                option_id,
                row_text,
            } => json!({ "questionId": question_id, "optionId": option_id, "rowText": row_text }),
            ParticipationError::MatrixRowsIncomplete {
                question_id,
                missing_option_ids,
            } => json!({ "questionId": question_id, "missingOptionIds": missing_option_ids }),
            ParticipationError::InvalidOption {
                question_id,
                option_id,
            }
            | ParticipationError::InvalidScaleValue {
                question_id,
                option_id,
                ..
            } => json!({ "questionId": question_id, "optionId": option_id }),
            ParticipationError::UnknownQuestion(question_id) => json!({ "questionId": question_id }),
            ParticipationError::AlreadyCompleted { completed_at } => {
                json!({ "completedAt": completed_at })
            }
            _ => return None,
        };
        Some(details)
    }
}
