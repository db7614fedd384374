// src/models/question_type.rs

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    authoring::{self, FieldError},
    models::draft::QuestionDraft,
};

/// The closed set of question variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum QuestionType {
    SingleSelect,
    MultiSelect,
    OpenText,
    FileUpload,
    Conditional,
    Matrix,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = [
        QuestionType::SingleSelect,
        QuestionType::MultiSelect,
        QuestionType::OpenText,
        QuestionType::FileUpload,
        QuestionType::Conditional,
        QuestionType::Matrix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleSelect => "SingleSelect",
            QuestionType::MultiSelect => "MultiSelect",
            QuestionType::OpenText => "OpenText",
            QuestionType::FileUpload => "FileUpload",
            QuestionType::Conditional => "Conditional",
            QuestionType::Matrix => "Matrix",
        }
    }

    /// Variants whose answer is a set of option ids.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleSelect | QuestionType::MultiSelect | QuestionType::Conditional
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = RegistryError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        QuestionType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == tag)
            .ok_or_else(|| RegistryError::UnknownQuestionType(tag.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown question type '{0}'")]
    UnknownQuestionType(String),
}

type ValidateFn = fn(&QuestionDraft) -> Vec<FieldError>;

/// Capability metadata plus validation rules of one question variant.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTypeDescriptor {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub label: &'static str,
    pub description: &'static str,
    pub requires_options: bool,
    pub supports_question_attachment: bool,
    pub supports_option_attachment: bool,
    pub supports_child_questions: bool,
    pub supports_allowed_content_types: bool,
    pub supports_matrix: bool,
    #[serde(skip)]
    validate: ValidateFn,
}

impl fmt::Debug for QuestionTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestionTypeDescriptor")
            .field("question_type", &self.question_type)
            .finish_non_exhaustive()
    }
}

impl QuestionTypeDescriptor {
    pub fn validate(&self, draft: &QuestionDraft) -> Vec<FieldError> {
        (self.validate)(draft)
    }
}

/// Lookup table from variant tag to descriptor.
/// Filled once at startup and only read afterwards.
#[derive(Debug, Default)]
pub struct QuestionTypeRegistry {
    descriptors: HashMap<QuestionType, QuestionTypeDescriptor>,
}

impl QuestionTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the six built-in variants.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors() {
            registry.register(descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: QuestionTypeDescriptor) {
        self.descriptors.insert(descriptor.question_type, descriptor);
    }

    pub fn get(&self, tag: &str) -> Result<&QuestionTypeDescriptor, RegistryError> {
        let question_type = tag.parse::<QuestionType>()?;
        self.descriptor(question_type)
    }

    pub fn descriptor(
        &self,
        question_type: QuestionType,
    ) -> Result<&QuestionTypeDescriptor, RegistryError> {
        self.descriptors
            .get(&question_type)
            .ok_or_else(|| RegistryError::UnknownQuestionType(question_type.to_string()))
    }

    pub fn validate(&self, tag: &str, draft: &QuestionDraft) -> Result<Vec<FieldError>, RegistryError> {
        Ok(self.get(tag)?.validate(draft))
    }

    /// All descriptors in declaration order.
    pub fn all(&self) -> Vec<&QuestionTypeDescriptor> {
        QuestionType::ALL
            .iter()
            .filter_map(|ty| self.descriptors.get(ty))
            .collect()
    }
}

fn builtin_descriptors() -> Vec<QuestionTypeDescriptor> {
    vec![
        QuestionTypeDescriptor {
            question_type: QuestionType::SingleSelect,
            label: "Single select",
            description: "Pick exactly one option",
            requires_options: true,
            supports_question_attachment: true,
            supports_option_attachment: true,
            supports_child_questions: false,
            supports_allowed_content_types: false,
            supports_matrix: false,
            validate: authoring::validate_choice_question,
        },
        QuestionTypeDescriptor {
            question_type: QuestionType::MultiSelect,
            label: "Multi select",
            description: "Pick any number of options",
            requires_options: true,
            supports_question_attachment: true,
            supports_option_attachment: true,
            supports_child_questions: false,
            supports_allowed_content_types: false,
            supports_matrix: false,
            validate: authoring::validate_choice_question,
        },
        QuestionTypeDescriptor {
            question_type: QuestionType::OpenText,
            label: "Open text",
            description: "Free-form written answer",
            requires_options: false,
            supports_question_attachment: true,
            supports_option_attachment: false,
            supports_child_questions: false,
            supports_allowed_content_types: false,
            supports_matrix: false,
            validate: authoring::validate_text_question,
        },
        QuestionTypeDescriptor {
            question_type: QuestionType::FileUpload,
            label: "File upload",
            description: "Participant uploads a file",
            requires_options: false,
            supports_question_attachment: true,
            supports_option_attachment: false,
            supports_child_questions: false,
            supports_allowed_content_types: true,
            supports_matrix: false,
            validate: authoring::validate_text_question,
        },
        QuestionTypeDescriptor {
            question_type: QuestionType::Conditional,
            label: "Conditional",
            description: "Shows follow-up questions depending on the chosen option",
            requires_options: true,
            supports_question_attachment: true,
            supports_option_attachment: true,
            supports_child_questions: true,
            supports_allowed_content_types: false,
            supports_matrix: false,
            validate: authoring::validate_conditional_question,
        },
        QuestionTypeDescriptor {
            question_type: QuestionType::Matrix,
            label: "Matrix / Likert",
            description: "Rate several items on a 1-5 scale",
            requires_options: true,
            supports_question_attachment: true,
            supports_option_attachment: false,
            supports_child_questions: false,
            supports_allowed_content_types: false,
            supports_matrix: true,
            validate: authoring::validate_matrix_question,
        },
    ]
}
