// src/models/draft.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    authoring::FieldError,
    models::{attachment::AttachmentUpload, null_as_default, survey::AccessType},
};

/// An unsaved survey as the authoring UI sends it.
/// Nothing here is trusted; `authoring::validate_survey` decides whether it can be saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDraft {
    #[serde(default)]
    #[validate(length(max = 200, message = "Title must be at most 200 characters."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 4000, message = "Description must be at most 4000 characters."))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub intro_text: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub consent_text: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub outro_text: Option<String>,
    #[serde(default)]
    pub access_type: AccessType,
    #[serde(default)]
    pub attachment: Option<AttachmentUpload>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Variant tag, resolved through the question type registry.
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub attachment: Option<AttachmentUpload>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<OptionDraft>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_attachment_content_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(no_recursion)]
    pub child_questions: Vec<ChildQuestionDraft>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matrix_scale_labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matrix_show_explanation: bool,
    #[serde(default)]
    pub matrix_explanation_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub attachment: Option<AttachmentUpload>,
}

/// Branch question of a Conditional draft, tied to its option by `parentOptionOrder`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChildQuestionDraft {
    pub parent_option_order: i32,
    #[serde(flatten)]
    pub question: QuestionDraft,
}

impl QuestionDraft {
    pub fn new(question_type: &str, text: &str) -> Self {
        Self {
            text: text.to_string(),
            question_type: question_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, texts: &[&str]) -> Self {
        self.options = texts
            .iter()
            .enumerate()
            .map(|(i, text)| OptionDraft {
                text: text.to_string(),
                order: i as i32 + 1,
                ..Default::default()
            })
            .collect();
        self
    }
}

/// One change to a draft. Paths use the same syntax as validation error fields,
/// e.g. `questions[0].options[1].text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DraftEdit {
    /// Replaces the value at `path`. Using the array length as index appends.
    Set { path: String, value: Value },
    /// Removes an object key or an array element.
    Remove { path: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("edit path is empty")]
    EmptyPath,

    #[error("invalid edit path '{0}'")]
    InvalidPath(String),

    #[error("nothing to edit at '{0}'")]
    NotFound(String),

    #[error("index {index} is out of bounds at '{path}'")]
    IndexOutOfBounds { path: String, index: usize },

    #[error("edit produces an invalid draft: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>, EditError> {
    if path.trim().is_empty() {
        return Err(EditError::EmptyPath);
    }
    let invalid = || EditError::InvalidPath(path.to_string());

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if name.is_empty() {
            return Err(invalid());
        }
        segments.push(Segment::Key(name.to_string()));

        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(invalid)?;
            if !rest.starts_with('[') {
                return Err(invalid());
            }
            let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }
    Ok(segments)
}

/// Walks to the container holding the last segment, creating empty
/// arrays/objects in place of `null`.
fn container<'v>(mut node: &'v mut Value, parents: &[Segment], next: &Segment, path: &str) -> Result<&'v mut Value, EditError> {
    let lookahead: Vec<&Segment> = parents.iter().skip(1).chain(std::iter::once(next)).collect();
    for (segment, following) in parents.iter().zip(lookahead) {
        node = match segment {
            Segment::Key(key) => {
                let object = node
                    .as_object_mut()
                    .ok_or_else(|| EditError::NotFound(path.to_string()))?;
                let child = object.entry(key.clone()).or_insert(Value::Null);
                if child.is_null() {
                    *child = empty_for(following);
                }
                child
            }
            Segment::Index(index) => {
                let array = node
                    .as_array_mut()
                    .ok_or_else(|| EditError::NotFound(path.to_string()))?;
                let child = array.get_mut(*index).ok_or(EditError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                })?;
                if child.is_null() {
                    *child = empty_for(following);
                }
                child
            }
        };
    }
    Ok(node)
}

fn empty_for(segment: &Segment) -> Value {
    match segment {
        Segment::Key(_) => Value::Object(Default::default()),
        Segment::Index(_) => Value::Array(Vec::new()),
    }
}

/// Returns a new draft with `edit` applied. The input draft is left untouched,
/// so validation can run against every intermediate state.
pub fn apply_edit(draft: &SurveyDraft, edit: &DraftEdit) -> Result<SurveyDraft, EditError> {
    let mut document = serde_json::to_value(draft).map_err(|e| EditError::Invalid(e.to_string()))?;

    let path = match edit {
        DraftEdit::Set { path, .. } | DraftEdit::Remove { path } => path.as_str(),
    };
    let segments = parse_path(path)?;
    let (last, parents) = segments.split_last().ok_or(EditError::EmptyPath)?;
    let target = container(&mut document, parents, last, path)?;

    match (edit, last) {
        (DraftEdit::Set { value, .. }, Segment::Key(key)) => {
            let object = target
                .as_object_mut()
                .ok_or_else(|| EditError::NotFound(path.to_string()))?;
            object.insert(key.clone(), value.clone());
        }
        (DraftEdit::Set { value, .. }, Segment::Index(index)) => {
            let array = target
                .as_array_mut()
                .ok_or_else(|| EditError::NotFound(path.to_string()))?;
            if *index == array.len() {
                array.push(value.clone());
            } else if let Some(slot) = array.get_mut(*index) {
                *slot = value.clone();
            } else {
                return Err(EditError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                });
            }
        }
        (DraftEdit::Remove { .. }, Segment::Key(key)) => {
            let object = target
                .as_object_mut()
                .ok_or_else(|| EditError::NotFound(path.to_string()))?;
            object
                .remove(key)
                .ok_or_else(|| EditError::NotFound(path.to_string()))?;
        }
        (DraftEdit::Remove { .. }, Segment::Index(index)) => {
            let array = target
                .as_array_mut()
                .ok_or_else(|| EditError::NotFound(path.to_string()))?;
            if *index >= array.len() {
                return Err(EditError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                });
            }
            array.remove(*index);
        }
    }

    serde_json::from_value(document).map_err(|e| EditError::Invalid(e.to_string()))
}

/// Body of `POST /api/surveys/draft/edit`: edits are applied in order.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditDraftRequest {
    pub draft: SurveyDraft,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edits: Vec<DraftEdit>,
}

/// A draft together with everything that still keeps it from being saved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftCheck {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<SurveyDraft>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> SurveyDraft {
        SurveyDraft {
            title: "Canteen".to_string(),
            description: "Lunch feedback".to_string(),
            questions: vec![QuestionDraft::new("SingleSelect", "Favourite?").with_options(&["Soup", "Salad"])],
            ..Default::default()
        }
    }

    #[test]
    fn parses_nested_paths() {
        assert_eq!(
            parse_path("questions[0].options[12].text").unwrap(),
            vec![
                Segment::Key("questions".into()),
                Segment::Index(0),
                Segment::Key("options".into()),
                Segment::Index(12),
                Segment::Key("text".into()),
            ]
        );
        assert!(parse_path("questions[x]").is_err());
        assert!(parse_path("questions..text").is_err());
        assert_eq!(parse_path(""), Err(EditError::EmptyPath));
    }

    #[test]
    fn set_replaces_a_nested_field_without_touching_the_input() {
        let original = draft();
        let edit = DraftEdit::Set {
            path: "questions[0].options[1].text".into(),
            value: json!("Pasta"),
        };
        let next = apply_edit(&original, &edit).unwrap();

        assert_eq!(next.questions[0].options[1].text, "Pasta");
        assert_eq!(original.questions[0].options[1].text, "Salad");
    }

    #[test]
    fn set_at_length_appends() {
        let edit = DraftEdit::Set {
            path: "questions[0].options[2]".into(),
            value: json!({"text": "Curry", "order": 3}),
        };
        let next = apply_edit(&draft(), &edit).unwrap();
        assert_eq!(next.questions[0].options.len(), 3);
        assert_eq!(next.questions[0].options[2].text, "Curry");

        let too_far = DraftEdit::Set {
            path: "questions[0].options[7]".into(),
            value: json!({"text": "?"}),
        };
        assert!(matches!(
            apply_edit(&draft(), &too_far),
            Err(EditError::IndexOutOfBounds { index: 7, .. })
        ));
    }

    #[test]
    fn set_creates_missing_optional_fields() {
        let edit = DraftEdit::Set {
            path: "questions[0].matrixExplanationLabel".into(),
            value: json!("Tell us more"),
        };
        let next = apply_edit(&draft(), &edit).unwrap();
        assert_eq!(
            next.questions[0].matrix_explanation_label.as_deref(),
            Some("Tell us more")
        );
    }

    #[test]
    fn remove_drops_array_elements() {
        let edit = DraftEdit::Remove {
            path: "questions[0].options[0]".into(),
        };
        let next = apply_edit(&draft(), &edit).unwrap();
        assert_eq!(next.questions[0].options.len(), 1);
        assert_eq!(next.questions[0].options[0].text, "Salad");
    }

    #[test]
    fn type_mismatch_is_reported() {
        let edit = DraftEdit::Set {
            path: "questions[0].isRequired".into(),
            value: json!("yes please"),
        };
        assert!(matches!(apply_edit(&draft(), &edit), Err(EditError::Invalid(_))));
    }

    #[test]
    fn accepts_null_lists_from_the_wire() {
        let draft: SurveyDraft = serde_json::from_value(json!({
            "title": "t",
            "description": "d",
            "accessType": "Public",
            "questions": [{"text": "Why?", "type": "OpenText", "order": 1, "isRequired": true, "options": null}]
        }))
        .unwrap();
        assert!(draft.questions[0].options.is_empty());
        assert_eq!(draft.access_type, AccessType::Public);
    }
}
