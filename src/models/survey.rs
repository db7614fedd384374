// src/models/survey.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{attachment::AttachmentRef, question_type::QuestionType};

/// Who may take a survey.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AccessType {
    /// Authenticated members only.
    #[default]
    Internal,
    /// Anyone with the link.
    Public,
    /// Only holders of a personal invitation token.
    InvitationOnly,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Internal => "Internal",
            AccessType::Public => "Public",
            AccessType::InvitationOnly => "InvitationOnly",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Internal" => Ok(AccessType::Internal),
            "Public" => Ok(AccessType::Public),
            "InvitationOnly" => Ok(AccessType::InvitationOnly),
            other => Err(format!("unknown access type '{}'", other)),
        }
    }
}

/// A persisted, validated survey definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub intro_text: Option<String>,
    pub consent_text: Option<String>,
    pub outro_text: Option<String>,
    pub access_type: AccessType,
    pub is_active: bool,
    pub attachment: Option<AttachmentRef>,
    pub questions: Vec<Question>,
    pub created_by: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A scored/selectable option. Matrix questions use the same shape for their rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: i64,
    pub text: String,
    pub order: i32,
    /// Free-form scoring weight.
    pub value: f64,
    #[serde(default)]
    pub attachment: Option<AttachmentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    pub order: i32,
    pub is_required: bool,
    #[serde(default)]
    pub attachment: Option<AttachmentRef>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Variant-specific payload. Serialized flat next to the question fields,
/// discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionKind {
    SingleSelect {
        options: Vec<ChoiceOption>,
    },
    MultiSelect {
        options: Vec<ChoiceOption>,
    },
    OpenText,
    FileUpload {
        #[serde(rename = "allowedAttachmentContentTypes", default)]
        allowed_content_types: Vec<String>,
    },
    Conditional {
        options: Vec<ChoiceOption>,
        #[serde(rename = "childQuestions", default)]
        child_questions: Vec<ChildQuestion>,
    },
    Matrix {
        rows: Vec<ChoiceOption>,
        #[serde(rename = "scaleLabels")]
        scale_labels: Vec<String>,
        /// Present when low scores must be justified; holds the prompt shown to participants.
        #[serde(rename = "explanationLabel", default)]
        explanation_label: Option<String>,
    },
}

/// A question that is only asked when a given option of its Conditional parent is chosen.
/// Linked to the option by its `order`, not by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildQuestion {
    pub parent_option_order: i32,
    #[serde(flatten)]
    pub question: Question,
}

/// Where a question sits inside a survey.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub question: &'a Question,
    /// For branch questions: the Conditional parent and the option that opens the branch.
    pub branch: Option<(&'a Question, &'a ChoiceOption)>,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::SingleSelect { .. } => QuestionType::SingleSelect,
            QuestionKind::MultiSelect { .. } => QuestionType::MultiSelect,
            QuestionKind::OpenText => QuestionType::OpenText,
            QuestionKind::FileUpload { .. } => QuestionType::FileUpload,
            QuestionKind::Conditional { .. } => QuestionType::Conditional,
            QuestionKind::Matrix { .. } => QuestionType::Matrix,
        }
    }

    /// Options, or rows for Matrix questions. Empty for free-form variants.
    pub fn options(&self) -> &[ChoiceOption] {
        match &self.kind {
            QuestionKind::SingleSelect { options }
            | QuestionKind::MultiSelect { options }
            | QuestionKind::Conditional { options, .. } => options,
            QuestionKind::Matrix { rows, .. } => rows,
            QuestionKind::OpenText | QuestionKind::FileUpload { .. } => &[],
        }
    }

    pub fn option(&self, option_id: i64) -> Option<&ChoiceOption> {
        self.options().iter().find(|o| o.id == option_id)
    }

    /// Child questions opened by the option with the given order, in question order.
    pub fn children_of(&self, option_order: i32) -> Vec<&Question> {
        let QuestionKind::Conditional { child_questions, .. } = &self.kind else {
            return Vec::new();
        };
        let mut children: Vec<&Question> = child_questions
            .iter()
            .filter(|child| child.parent_option_order == option_order)
            .map(|child| &child.question)
            .collect();
        children.sort_by_key(|q| q.order);
        children
    }

    /// Every branch question, whatever option opens it.
    pub fn child_questions(&self) -> impl Iterator<Item = &ChildQuestion> {
        let children: &[ChildQuestion] = match &self.kind {
            QuestionKind::Conditional { child_questions, .. } => child_questions,
            _ => &[],
        };
        children.iter()
    }
}

impl Survey {
    /// Finds a top-level or branch question by id.
    pub fn locate(&self, question_id: i64) -> Option<Located<'_>> {
        for question in &self.questions {
            if question.id == question_id {
                return Some(Located {
                    question,
                    branch: None,
                });
            }
            for child in question.child_questions() {
                if child.question.id == question_id {
                    let option = question
                        .options()
                        .iter()
                        .find(|o| o.order == child.parent_option_order)?;
                    return Some(Located {
                        question: &child.question,
                        branch: Some((question, option)),
                    });
                }
            }
        }
        None
    }

    /// Every question including branch questions, parents first.
    pub fn all_questions(&self) -> Vec<&Question> {
        let mut all = Vec::new();
        for question in &self.questions {
            all.push(question);
            all.extend(question.child_questions().map(|child| &child.question));
        }
        all
    }
}

/// Body of `PATCH /api/surveys/{id}/active`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Row of the survey list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveySummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub access_type: AccessType,
    pub is_active: bool,
    pub question_count: usize,
    pub created_by: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Survey> for SurveySummary {
    fn from(survey: &Survey) -> Self {
        Self {
            id: survey.id,
            slug: survey.slug.clone(),
            title: survey.title.clone(),
            description: survey.description.clone(),
            access_type: survey.access_type,
            is_active: survey.is_active,
            question_count: survey.questions.len(),
            created_by: survey.created_by.clone(),
            created_at: survey.created_at,
        }
    }
}

/// A survey ready to be persisted; the store assigns id and slug.
#[derive(Debug, Clone)]
pub struct NewSurvey {
    /// Slug prefix derived from the title; the store appends the survey number.
    pub slug_base: String,
    pub title: String,
    pub description: String,
    pub intro_text: Option<String>,
    pub consent_text: Option<String>,
    pub outro_text: Option<String>,
    pub access_type: AccessType,
    pub attachment: Option<AttachmentRef>,
    pub questions: Vec<Question>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurveyResponse {
    pub id: i64,
    pub slug: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built schemas shared by unit tests.

    use super::*;

    pub fn option(id: i64, order: i32, text: &str) -> ChoiceOption {
        ChoiceOption {
            id,
            text: text.to_string(),
            order,
            value: order as f64,
            attachment: None,
        }
    }

    pub fn question(id: i64, order: i32, text: &str, is_required: bool, kind: QuestionKind) -> Question {
        Question {
            id,
            text: text.to_string(),
            description: None,
            order,
            is_required,
            attachment: None,
            kind,
        }
    }

    pub fn single_select(id: i64, order: i32, is_required: bool, options: Vec<ChoiceOption>) -> Question {
        question(id, order, "Pick one", is_required, QuestionKind::SingleSelect { options })
    }

    pub fn matrix(id: i64, order: i32, is_required: bool, rows: Vec<ChoiceOption>, explain: bool) -> Question {
        question(
            id,
            order,
            "Rate these",
            is_required,
            QuestionKind::Matrix {
                rows,
                scale_labels: ["1", "2", "3", "4", "5"].map(String::from).to_vec(),
                explanation_label: explain.then(|| "Why?".to_string()),
            },
        )
    }

    pub fn survey(access_type: AccessType, questions: Vec<Question>) -> Survey {
        Survey {
            id: 1,
            slug: "test-survey-1".to_string(),
            title: "Test survey".to_string(),
            description: "For tests".to_string(),
            intro_text: None,
            consent_text: None,
            outro_text: None,
            access_type,
            is_active: true,
            attachment: None,
            questions,
            created_by: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Q1 SingleSelect (required), Q2 Conditional "Yes"(->Q3 required OpenText) / "No",
    /// Q4 optional OpenText, Q5 Matrix with 3 rows asking for explanations.
    pub fn sample_survey() -> Survey {
        let conditional = question(
            20,
            2,
            "Do you use the cafeteria?",
            true,
            QuestionKind::Conditional {
                options: vec![option(21, 1, "Yes"), option(22, 2, "No")],
                child_questions: vec![ChildQuestion {
                    parent_option_order: 1,
                    question: question(30, 1, "Why?", true, QuestionKind::OpenText),
                }],
            },
        );
        survey(
            AccessType::Public,
            vec![
                single_select(10, 1, true, vec![option(11, 1, "Red"), option(12, 2, "Blue")]),
                conditional,
                question(40, 3, "Anything else?", false, QuestionKind::OpenText),
                matrix(
                    50,
                    4,
                    false,
                    vec![option(51, 1, "Food"), option(52, 2, "Price"), option(53, 3, "Service")],
                    true,
                ),
            ],
        )
    }
}
