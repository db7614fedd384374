// src/authoring.rs

//! Draft validation and the step that turns a valid draft into a stored survey.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    config::{
        CONDITIONAL_MAX_OPTIONS, CONDITIONAL_MIN_OPTIONS, MATRIX_MAX_ROWS, MATRIX_MIN_ROWS,
        MATRIX_SCALE_POINTS, MIN_CHOICE_OPTIONS,
    },
    models::{
        attachment::{AttachmentRef, AttachmentUpload},
        draft::{ChildQuestionDraft, OptionDraft, QuestionDraft, SurveyDraft},
        question_type::{QuestionType, QuestionTypeRegistry, RegistryError},
        survey::{ChildQuestion, ChoiceOption, NewSurvey, Question, QuestionKind, Survey},
    },
    store::{StoreError, SurveyStore},
    utils::{html::clean_html, slug::slugify},
};

/// One problem found in a draft. `field` is a path into the draft,
/// e.g. `questions[2].options[0].text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Re-roots an error reported by a question validator under `questions[index]`.
    fn within_question(self, index: usize) -> Self {
        Self {
            field: format!("questions[{}].{}", index, self.field),
            message: format!("Question {}: {}", index + 1, self.message),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthoringError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("survey draft is invalid ({} errors)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn check_text(draft: &QuestionDraft, errors: &mut Vec<FieldError>) {
    if is_blank(&draft.text) {
        errors.push(FieldError::new("text", "Question text is required."));
    }
}

fn check_option_texts(options: &[OptionDraft], noun: &str, errors: &mut Vec<FieldError>) {
    for (j, option) in options.iter().enumerate() {
        if is_blank(&option.text) {
            errors.push(FieldError::new(
                format!("options[{}].text", j),
                format!("{} {} text is required.", noun, j + 1),
            ));
        }
    }
}

/// SingleSelect / MultiSelect.
pub fn validate_choice_question(draft: &QuestionDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_text(draft, &mut errors);
    if draft.options.len() < MIN_CHOICE_OPTIONS {
        errors.push(FieldError::new(
            "options",
            format!("At least {} options are required.", MIN_CHOICE_OPTIONS),
        ));
    }
    check_option_texts(&draft.options, "Option", &mut errors);
    errors
}

/// OpenText / FileUpload: only the text is checked.
pub fn validate_text_question(draft: &QuestionDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_text(draft, &mut errors);
    errors
}

pub fn validate_conditional_question(draft: &QuestionDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_text(draft, &mut errors);

    let count = draft.options.len();
    if !(CONDITIONAL_MIN_OPTIONS..=CONDITIONAL_MAX_OPTIONS).contains(&count) {
        errors.push(FieldError::new(
            "options",
            format!(
                "Conditional questions need between {} and {} options.",
                CONDITIONAL_MIN_OPTIONS, CONDITIONAL_MAX_OPTIONS
            ),
        ));
    }
    check_option_texts(&draft.options, "Option", &mut errors);

    // Branches reference their option by order, so orders must be unique.
    for (j, option) in draft.options.iter().enumerate() {
        if draft.options[..j].iter().any(|earlier| earlier.order == option.order) {
            errors.push(FieldError::new(
                format!("options[{}].order", j),
                format!("Option {} repeats order {}.", j + 1, option.order),
            ));
        }
    }

    for (k, child) in draft.child_questions.iter().enumerate() {
        let prefix = format!("childQuestions[{}]", k);
        let label = format!("Child question {}", k + 1);
        let question = &child.question;

        if is_blank(&question.text) {
            errors.push(FieldError::new(
                format!("{}.text", prefix),
                format!("{}: text is required.", label),
            ));
        }

        if !draft
            .options
            .iter()
            .any(|option| option.order == child.parent_option_order)
        {
            errors.push(FieldError::new(
                format!("{}.parentOptionOrder", prefix),
                format!(
                    "{}: there is no option with order {}.",
                    label, child.parent_option_order
                ),
            ));
        }

        // Unknown tags were already rejected by `validate_survey`.
        let Ok(child_type) = question.question_type.parse::<QuestionType>() else {
            continue;
        };
        match child_type {
            QuestionType::Conditional => errors.push(FieldError::new(
                format!("{}.type", prefix),
                format!("{}: conditional questions cannot be nested.", label),
            )),
            QuestionType::SingleSelect | QuestionType::MultiSelect => {
                let valid = question.options.iter().filter(|o| !is_blank(&o.text)).count();
                if question.options.len() < MIN_CHOICE_OPTIONS || valid < question.options.len() {
                    errors.push(FieldError::new(
                        format!("{}.options", prefix),
                        format!(
                            "{}: at least {} options are required and none may be empty.",
                            label, MIN_CHOICE_OPTIONS
                        ),
                    ));
                }
            }
            QuestionType::Matrix => {
                errors.extend(
                    validate_matrix_shape(question)
                        .into_iter()
                        .map(|e| FieldError::new(format!("{}.{}", prefix, e.field), format!("{}: {}", label, e.message))),
                );
            }
            QuestionType::OpenText | QuestionType::FileUpload => {}
        }
    }

    errors
}

pub fn validate_matrix_question(draft: &QuestionDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_text(draft, &mut errors);
    errors.extend(validate_matrix_shape(draft));
    errors
}

/// Rows, scale labels and explanation label of a Matrix draft.
fn validate_matrix_shape(draft: &QuestionDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let rows = draft.options.len();
    if !(MATRIX_MIN_ROWS..=MATRIX_MAX_ROWS).contains(&rows) {
        errors.push(FieldError::new(
            "options",
            format!(
                "Matrix questions need between {} and {} rows.",
                MATRIX_MIN_ROWS, MATRIX_MAX_ROWS
            ),
        ));
    }
    check_option_texts(&draft.options, "Row", &mut errors);

    let points = MATRIX_SCALE_POINTS as usize;
    if draft.matrix_scale_labels.len() != points {
        errors.push(FieldError::new(
            "matrixScaleLabels",
            format!("Exactly {} scale labels are required.", points),
        ));
    }
    for (j, label) in draft.matrix_scale_labels.iter().enumerate() {
        if is_blank(label) {
            errors.push(FieldError::new(
                format!("matrixScaleLabels[{}]", j),
                format!("Scale label {} is required.", j + 1),
            ));
        }
    }

    if draft.matrix_show_explanation
        && draft
            .matrix_explanation_label
            .as_deref()
            .is_none_or(is_blank)
    {
        errors.push(FieldError::new(
            "matrixExplanationLabel",
            "An explanation label is required when low scores must be explained.",
        ));
    }

    errors
}

/// Runs every check on a draft and returns all problems at once, in order:
/// survey fields first, then each question.
///
/// An unregistered question type is not a validation problem but a fault and
/// comes back as `Err`.
pub fn validate_survey(
    draft: &SurveyDraft,
    registry: &QuestionTypeRegistry,
) -> Result<Vec<FieldError>, RegistryError> {
    let mut errors = Vec::new();

    if is_blank(&draft.title) {
        errors.push(FieldError::new("title", "Title is required."));
    }
    if is_blank(&draft.description) {
        errors.push(FieldError::new("description", "Description is required."));
    }
    if draft.questions.is_empty() {
        errors.push(FieldError::new("questions", "At least one question is required."));
    }
    if let Err(limits) = draft.validate() {
        errors.extend(limit_errors(&limits));
    }

    for (index, question) in draft.questions.iter().enumerate() {
        let descriptor = registry.get(&question.question_type).inspect_err(|e| {
            tracing::error!("Question {} of draft '{}': {}", index + 1, draft.title, e);
        })?;

        if descriptor.supports_child_questions {
            for child in &question.child_questions {
                registry.get(&child.question.question_type).inspect_err(|e| {
                    tracing::error!("Child question of question {}: {}", index + 1, e);
                })?;
            }
        }

        errors.extend(
            descriptor
                .validate(question)
                .into_iter()
                .map(|error| error.within_question(index)),
        );
    }

    Ok(errors)
}

/// Length limits declared on the draft with `validator`, sorted by field.
fn limit_errors(limits: &ValidationErrors) -> Vec<FieldError> {
    let mut errors: Vec<FieldError> = limits
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            let field = camel_case(&field.to_string());
            failures.iter().map(move |failure| {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is too long.", field));
                FieldError::new(field.clone(), message)
            })
        })
        .collect();
    errors.sort_by(|a, b| a.field.cmp(&b.field));
    errors
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Every upload carried by the draft, with the field it sits at.
fn uploads(draft: &SurveyDraft) -> Vec<(String, &AttachmentUpload)> {
    fn question_uploads<'d>(prefix: &str, question: &'d QuestionDraft, out: &mut Vec<(String, &'d AttachmentUpload)>) {
        if let Some(upload) = &question.attachment {
            out.push((format!("{}.attachment", prefix), upload));
        }
        for (j, option) in question.options.iter().enumerate() {
            if let Some(upload) = &option.attachment {
                out.push((format!("{}.options[{}].attachment", prefix, j), upload));
            }
        }
        for (k, child) in question.child_questions.iter().enumerate() {
            question_uploads(&format!("{}.childQuestions[{}]", prefix, k), &child.question, out);
        }
    }

    let mut out = Vec::new();
    if let Some(upload) = &draft.attachment {
        out.push(("attachment".to_string(), upload));
    }
    for (i, question) in draft.questions.iter().enumerate() {
        question_uploads(&format!("questions[{}]", i), question, &mut out);
    }
    out.retain(|(_, upload)| upload.has_content());
    out
}

/// Decodes every upload up front so a bad file rejects the draft before
/// anything is written.
pub fn validate_attachments(draft: &SurveyDraft, max_bytes: usize) -> Vec<FieldError> {
    uploads(draft)
        .into_iter()
        .filter_map(|(field, upload)| {
            upload
                .decode(max_bytes)
                .err()
                .map(|e| FieldError::new(field, e.to_string()))
        })
        .collect()
}

/// Sorts by the author-given order, keeping submission order for ties.
/// Each item comes with its index in `items`.
fn by_order<T>(items: &[T], order: impl Fn(&T) -> i32) -> Vec<(usize, &T)> {
    let mut sorted: Vec<(usize, &T)> = items.iter().enumerate().collect();
    sorted.sort_by_key(|&(position, item)| (order(item), position));
    sorted
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

/// Turns a validated draft into a storable survey: dense orders, fresh ids,
/// stored attachments and sanitised rich text.
pub struct SchemaBuilder<'a> {
    store: &'a dyn SurveyStore,
    registry: &'a QuestionTypeRegistry,
    max_attachment_bytes: usize,
    next_id: i64,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(store: &'a dyn SurveyStore, registry: &'a QuestionTypeRegistry, max_attachment_bytes: usize) -> Self {
        Self {
            store,
            registry,
            max_attachment_bytes,
            next_id: 0,
        }
    }

    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    async fn store_upload(
        &self,
        upload: Option<&AttachmentUpload>,
        field: &str,
    ) -> Result<Option<AttachmentRef>, AuthoringError> {
        let Some(upload) = upload.filter(|u| u.has_content()) else {
            return Ok(None);
        };
        let decoded = upload
            .decode(self.max_attachment_bytes)
            .map_err(|e| AuthoringError::Invalid(vec![FieldError::new(field, e.to_string())]))?;
        Ok(Some(self.store.save_attachment(decoded).await?))
    }

    async fn build_options(
        &mut self,
        options: &[OptionDraft],
        field: &str,
        with_attachments: bool,
    ) -> Result<Vec<ChoiceOption>, AuthoringError> {
        let mut built = Vec::with_capacity(options.len());
        for (position, (index, option)) in by_order(options, |o| o.order).into_iter().enumerate() {
            let order = position as i32 + 1;
            let attachment = if with_attachments {
                self.store_upload(
                    option.attachment.as_ref(),
                    &format!("{}.options[{}].attachment", field, index),
                )
                .await?
            } else {
                None
            };
            built.push(ChoiceOption {
                id: self.allocate(),
                text: option.text.trim().to_string(),
                order,
                value: option.value.unwrap_or(order as f64),
                attachment,
            });
        }
        Ok(built)
    }

    /// Builds one question without its branch questions.
    async fn build_plain(
        &mut self,
        draft: &QuestionDraft,
        order: i32,
        field: &str,
    ) -> Result<Question, AuthoringError> {
        let descriptor = self.registry.get(&draft.question_type)?;
        let question_type = descriptor.question_type;
        let with_option_attachments = descriptor.supports_option_attachment;

        let attachment = if descriptor.supports_question_attachment {
            self.store_upload(draft.attachment.as_ref(), &format!("{}.attachment", field))
                .await?
        } else {
            None
        };
        let id = self.allocate();

        let kind = match question_type {
            QuestionType::SingleSelect => QuestionKind::SingleSelect {
                options: self.build_options(&draft.options, field, with_option_attachments).await?,
            },
            QuestionType::MultiSelect => QuestionKind::MultiSelect {
                options: self.build_options(&draft.options, field, with_option_attachments).await?,
            },
            QuestionType::OpenText => QuestionKind::OpenText,
            QuestionType::FileUpload => QuestionKind::FileUpload {
                allowed_content_types: draft
                    .allowed_attachment_content_types
                    .iter()
                    .map(|ct| ct.trim().to_ascii_lowercase())
                    .filter(|ct| !ct.is_empty())
                    .collect(),
            },
            QuestionType::Conditional => QuestionKind::Conditional {
                options: self.build_options(&draft.options, field, with_option_attachments).await?,
                child_questions: Vec::new(),
            },
            QuestionType::Matrix => QuestionKind::Matrix {
                rows: self.build_options(&draft.options, field, with_option_attachments).await?,
                scale_labels: draft
                    .matrix_scale_labels
                    .iter()
                    .map(|label| label.trim().to_string())
                    .collect(),
                explanation_label: if draft.matrix_show_explanation {
                    non_blank(draft.matrix_explanation_label.as_deref())
                } else {
                    None
                },
            },
        };

        Ok(Question {
            id,
            text: draft.text.trim().to_string(),
            description: non_blank(draft.description.as_deref()),
            order,
            is_required: draft.is_required,
            attachment,
            kind,
        })
    }

    async fn build_question(
        &mut self,
        draft: &QuestionDraft,
        order: i32,
        field: &str,
    ) -> Result<Question, AuthoringError> {
        let mut question = self.build_plain(draft, order, field).await?;
        if let QuestionKind::Conditional {
            options,
            child_questions,
        } = &mut question.kind
        {
            *child_questions = self.build_children(draft, options, field).await?;
        }
        Ok(question)
    }

    /// Children keep pointing at their option by order; the draft's orders are
    /// remapped to the renumbered ones and each branch is numbered from 1.
    async fn build_children(
        &mut self,
        draft: &QuestionDraft,
        options: &[ChoiceOption],
        field: &str,
    ) -> Result<Vec<ChildQuestion>, AuthoringError> {
        let mut renumbered: HashMap<i32, i32> = HashMap::new();
        for (position, (_, option)) in by_order(&draft.options, |o| o.order).into_iter().enumerate() {
            renumbered.entry(option.order).or_insert(position as i32 + 1);
        }

        let mut children = Vec::new();
        for option in options {
            let in_branch: Vec<&ChildQuestionDraft> = draft
                .child_questions
                .iter()
                .filter(|child| renumbered.get(&child.parent_option_order) == Some(&option.order))
                .collect();

            for (position, (_, child)) in by_order(&in_branch, |c| c.question.order).into_iter().enumerate() {
                let index = draft
                    .child_questions
                    .iter()
                    .position(|c| std::ptr::eq(c, *child))
                    .unwrap_or(position);
                let question = self
                    .build_plain(
                        &child.question,
                        position as i32 + 1,
                        &format!("{}.childQuestions[{}]", field, index),
                    )
                    .await?;
                children.push(ChildQuestion {
                    parent_option_order: option.order,
                    question,
                });
            }
        }
        Ok(children)
    }

    pub async fn build(mut self, draft: &SurveyDraft, created_by: Option<String>) -> Result<NewSurvey, AuthoringError> {
        let attachment = self.store_upload(draft.attachment.as_ref(), "attachment").await?;

        let mut questions = Vec::with_capacity(draft.questions.len());
        for (position, (index, question)) in by_order(&draft.questions, |q| q.order).into_iter().enumerate() {
            questions.push(
                self.build_question(question, position as i32 + 1, &format!("questions[{}]", index))
                    .await?,
            );
        }

        let sanitized = |text: &Option<String>| non_blank(text.as_deref()).map(|t| clean_html(&t));

        Ok(NewSurvey {
            slug_base: slugify(&draft.title),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            intro_text: sanitized(&draft.intro_text),
            consent_text: sanitized(&draft.consent_text),
            outro_text: sanitized(&draft.outro_text),
            access_type: draft.access_type,
            attachment,
            questions,
            created_by,
        })
    }
}

/// Validates and persists a draft in one go. Nothing is written unless the
/// whole draft is valid.
pub async fn create_survey(
    draft: &SurveyDraft,
    created_by: Option<String>,
    registry: &QuestionTypeRegistry,
    store: &dyn SurveyStore,
    max_attachment_bytes: usize,
) -> Result<Survey, AuthoringError> {
    let mut errors = validate_survey(draft, registry)?;
    errors.extend(validate_attachments(draft, max_attachment_bytes));
    if !errors.is_empty() {
        return Err(AuthoringError::Invalid(errors));
    }

    let survey = SchemaBuilder::new(store, registry, max_attachment_bytes)
        .build(draft, created_by)
        .await?;
    let stored = store.insert_survey(survey).await?;
    tracing::info!(
        "Survey {} '{}' created with {} questions",
        stored.id,
        stored.slug,
        stored.questions.len()
    );
    Ok(stored)
}
