// src/models/answer.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    attachment::{AttachmentRef, AttachmentUpload},
    null_as_default,
    survey::QuestionKind,
};

/// Body of `POST /api/participations/{id}/answers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    #[serde(default)]
    #[validate(length(max = 10000, message = "Answer text must be at most 10000 characters."))]
    pub text_value: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub option_ids: Vec<i64>,
    #[serde(default)]
    pub attachment: Option<AttachmentUpload>,
    #[serde(default)]
    #[validate(nested)]
    pub matrix_answers: Option<Vec<MatrixAnswerItem>>,
    /// Answers to the branch questions opened by the chosen option of a Conditional question.
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(nested)]
    #[schema(no_recursion)]
    pub child_answers: Vec<SubmitAnswerRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatrixAnswerItem {
    pub option_id: i64,
    /// Unscored rows may be sent as `null`/`0`; they are dropped on normalisation.
    #[serde(default)]
    pub scale_value: Option<u8>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl SubmitAnswerRequest {
    pub fn empty(question_id: i64) -> Self {
        Self {
            question_id,
            ..Default::default()
        }
    }

    pub fn text(question_id: i64, text: &str) -> Self {
        Self {
            question_id,
            text_value: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn options(question_id: i64, option_ids: &[i64]) -> Self {
        Self {
            question_id,
            option_ids: option_ids.to_vec(),
            ..Default::default()
        }
    }

    pub fn matrix(question_id: i64, rows: Vec<MatrixAnswerItem>) -> Self {
        Self {
            question_id,
            matrix_answers: Some(rows),
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: SubmitAnswerRequest) -> Self {
        self.child_answers.push(child);
        self
    }

    /// Rows that actually carry a score.
    pub fn scored_rows(&self) -> impl Iterator<Item = (&MatrixAnswerItem, u8)> {
        self.matrix_answers
            .iter()
            .flatten()
            .filter_map(|item| match item.scale_value {
                Some(value) if value > 0 => Some((item, value)),
                _ => None,
            })
    }
}

/// The one place that decides whether a submission says anything at all.
/// Skip logic and required checks both go through here.
pub fn is_empty_answer(kind: &QuestionKind, request: &SubmitAnswerRequest) -> bool {
    match kind {
        QuestionKind::OpenText => request
            .text_value
            .as_deref()
            .is_none_or(|text| text.trim().is_empty()),
        QuestionKind::SingleSelect { .. }
        | QuestionKind::MultiSelect { .. }
        | QuestionKind::Conditional { .. } => request.option_ids.is_empty(),
        QuestionKind::FileUpload { .. } => request
            .attachment
            .as_ref()
            .is_none_or(|file| !file.has_content()),
        QuestionKind::Matrix { .. } => request.scored_rows().next().is_none(),
    }
}

/// One scored Matrix row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRowAnswer {
    pub option_id: i64,
    pub scale_value: u8,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Normalised answer content, persisted as JSON using the submission field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    Text {
        #[serde(rename = "textValue")]
        text_value: String,
    },
    Options {
        #[serde(rename = "optionIds")]
        option_ids: Vec<i64>,
    },
    File {
        attachment: AttachmentRef,
    },
    Matrix {
        #[serde(rename = "matrixAnswers")]
        matrix_answers: Vec<MatrixRowAnswer>,
    },
}

impl AnswerPayload {
    pub fn option_ids(&self) -> Option<&[i64]> {
        match self {
            AnswerPayload::Options { option_ids } => Some(option_ids),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            AnswerPayload::Text { text_value } => Some(text_value),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&AttachmentRef> {
        match self {
            AnswerPayload::File { attachment } => Some(attachment),
            _ => None,
        }
    }

    pub fn matrix_rows(&self) -> Option<&[MatrixRowAnswer]> {
        match self {
            AnswerPayload::Matrix { matrix_answers } => Some(matrix_answers),
            _ => None,
        }
    }
}

/// The single stored answer of one participation to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnswer {
    pub id: i64,
    pub participation_id: Uuid,
    pub question_id: i64,
    pub payload: AnswerPayload,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Answer about to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnswer {
    pub question_id: i64,
    pub payload: AnswerPayload,
}

/// Result of one accepted submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    /// Question ids that received an answer, parent first.
    pub stored_question_ids: Vec<i64>,
    /// True when an optional question was left blank and nothing was stored.
    pub skipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::survey::fixtures::option;

    #[test]
    fn emptiness_is_decided_per_variant() {
        let text = QuestionKind::OpenText;
        assert!(is_empty_answer(&text, &SubmitAnswerRequest::empty(1)));
        assert!(is_empty_answer(&text, &SubmitAnswerRequest::text(1, "   ")));
        assert!(!is_empty_answer(&text, &SubmitAnswerRequest::text(1, "ok")));

        let multi = QuestionKind::MultiSelect {
            options: vec![option(1, 1, "a"), option(2, 2, "b")],
        };
        assert!(is_empty_answer(&multi, &SubmitAnswerRequest::options(1, &[])));
        assert!(!is_empty_answer(&multi, &SubmitAnswerRequest::options(1, &[2])));

        let matrix = QuestionKind::Matrix {
            rows: vec![option(1, 1, "a")],
            scale_labels: vec![],
            explanation_label: None,
        };
        let unscored = SubmitAnswerRequest::matrix(
            1,
            vec![MatrixAnswerItem {
                option_id: 1,
                scale_value: Some(0),
                explanation: Some("x".into()),
            }],
        );
        assert!(is_empty_answer(&matrix, &unscored));
    }

    #[test]
    fn file_without_bytes_counts_as_unanswered() {
        let kind = QuestionKind::FileUpload {
            allowed_content_types: vec![],
        };
        let wrapper_only = SubmitAnswerRequest {
            question_id: 1,
            attachment: Some(AttachmentUpload::default()),
            ..Default::default()
        };
        let named_but_empty = SubmitAnswerRequest {
            question_id: 1,
            attachment: Some(AttachmentUpload {
                file_name: "a.txt".into(),
                content_type: "text/plain".into(),
                base64_content: String::new(),
            }),
            ..Default::default()
        };
        assert!(is_empty_answer(&kind, &SubmitAnswerRequest::empty(1)));
        assert!(is_empty_answer(&kind, &wrapper_only));
        assert!(is_empty_answer(&kind, &named_but_empty));
    }

    #[test]
    fn payload_keeps_submission_field_names() {
        let payload = AnswerPayload::Matrix {
            matrix_answers: vec![MatrixRowAnswer {
                option_id: 7,
                scale_value: 2,
                explanation: Some("slow".into()),
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["matrixAnswers"][0]["optionId"], 7);
        assert_eq!(json["matrixAnswers"][0]["scaleValue"], 2);

        let back: AnswerPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);

        let options: AnswerPayload = serde_json::from_value(serde_json::json!({"optionIds": [3]})).unwrap();
        assert_eq!(options.option_ids(), Some(&[3][..]));
    }
}
