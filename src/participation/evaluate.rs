// src/participation/evaluate.rs

//! Pure part of `submitAnswer`: decides skip vs. store and normalises the
//! payload. Nothing here touches the store, so a rejected submission never
//! leaves a trace.

use crate::{
    config::{MATRIX_EXPLANATION_THRESHOLD, MATRIX_SCALE_POINTS},
    models::{
        answer::{AnswerPayload, MatrixRowAnswer, SubmitAnswerRequest, is_empty_answer},
        attachment::{AttachmentError, DecodedAttachment, content_type_allowed},
        survey::{Located, Question, QuestionKind},
    },
    participation::ParticipationError,
};

/// Normalised content waiting to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingContent {
    Ready(AnswerPayload),
    /// The file still has to go to the attachment store.
    Upload(DecodedAttachment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnswer {
    pub question_id: i64,
    pub content: PendingContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Optional question left blank: advance without storing anything.
    Skip,
    /// Answers to upsert, the submitted question first, then its branch questions.
    Store(Vec<PendingAnswer>),
}

/// Evaluates one submission against the question it targets.
pub fn evaluate(
    located: Located<'_>,
    request: &SubmitAnswerRequest,
    max_attachment_bytes: usize,
) -> Result<Evaluation, ParticipationError> {
    let question = located.question;

    if is_empty_answer(&question.kind, request) {
        if !question.is_required {
            return Ok(Evaluation::Skip);
        }
        return Err(match located.branch {
            Some((parent, _)) => ParticipationError::ConditionalChildRequiredMissing {
                parent_question_id: parent.id,
                question_id: question.id,
            },
            None => ParticipationError::RequiredAnswerMissing {
                question_id: question.id,
            },
        });
    }

    let payload = normalize(question, request, max_attachment_bytes)?;
    let mut pending = Vec::new();

    if let (QuestionKind::Conditional { .. }, PendingContent::Ready(AnswerPayload::Options { option_ids })) =
        (&question.kind, &payload)
    {
        // normalize() guarantees exactly one valid id here.
        let selected = option_ids
            .first()
            .and_then(|id| question.option(*id))
            .ok_or(ParticipationError::UnknownQuestion(question.id))?;

        for child in question.children_of(selected.order) {
            let child_request = request
                .child_answers
                .iter()
                .find(|answer| answer.question_id == child.id);

            match child_request {
                Some(answer) if !is_empty_answer(&child.kind, answer) => {
                    pending.push(PendingAnswer {
                        question_id: child.id,
                        content: normalize(child, answer, max_attachment_bytes)?,
                    });
                }
                _ if child.is_required => {
                    return Err(ParticipationError::ConditionalChildRequiredMissing {
                        parent_question_id: question.id,
                        question_id: child.id,
                    });
                }
                _ => {}
            }
        }
    }

    pending.insert(
        0,
        PendingAnswer {
            question_id: question.id,
            content: payload,
        },
    );
    Ok(Evaluation::Store(pending))
}

/// Turns a non-empty request into the stored shape of its variant.
fn normalize(
    question: &Question,
    request: &SubmitAnswerRequest,
    max_attachment_bytes: usize,
) -> Result<PendingContent, ParticipationError> {
    let question_id = question.id;
    let check_option = |option_id: i64| {
        question
            .option(option_id)
            .map(|_| option_id)
            .ok_or(ParticipationError::InvalidOption {
                question_id,
                option_id,
            })
    };

    let payload = match &question.kind {
        QuestionKind::OpenText => AnswerPayload::Text {
            text_value: request
                .text_value
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
        },
        QuestionKind::SingleSelect { .. } | QuestionKind::Conditional { .. } => {
            let mut ids = request.option_ids.clone();
            ids.dedup();
            if ids.len() > 1 {
                return Err(ParticipationError::TooManySelections { question_id });
            }
            AnswerPayload::Options {
                option_ids: ids.into_iter().map(check_option).collect::<Result<_, _>>()?,
            }
        }
        QuestionKind::MultiSelect { .. } => {
            let mut option_ids = Vec::with_capacity(request.option_ids.len());
            for &id in &request.option_ids {
                if !option_ids.contains(&id) {
                    option_ids.push(check_option(id)?);
                }
            }
            AnswerPayload::Options { option_ids }
        }
        QuestionKind::FileUpload {
            allowed_content_types,
        } => {
            let rejected = |source: AttachmentError| ParticipationError::InvalidAttachment {
                question_id,
                source,
            };
            let upload = request
                .attachment
                .as_ref()
                .ok_or_else(|| rejected(AttachmentError::InvalidEncoding))?;
            let decoded = upload.decode(max_attachment_bytes).map_err(rejected)?;
            if !content_type_allowed(&decoded.content_type, allowed_content_types) {
                return Err(rejected(AttachmentError::ContentTypeNotAllowed(
                    decoded.content_type,
                )));
            }
            return Ok(PendingContent::Upload(decoded));
        }
        QuestionKind::Matrix {
            rows,
            explanation_label,
            ..
        } => {
            let mut answered: Vec<MatrixRowAnswer> = Vec::new();
            for (item, value) in request.scored_rows() {
                let row = question
                    .option(item.option_id)
                    .ok_or(ParticipationError::InvalidOption {
                        question_id,
                        option_id: item.option_id,
                    })?;
                if value > MATRIX_SCALE_POINTS {
                    return Err(ParticipationError::InvalidScaleValue {
                        question_id,
                        option_id: row.id,
                        value,
                    });
                }
                let explanation = item
                    .explanation
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string);
                if explanation_label.is_some()
                    && value < MATRIX_EXPLANATION_THRESHOLD
                    && explanation.is_none()
                {
                    return Err(ParticipationError::MatrixExplanationRequired {
                        question_id,
                        option_id: row.id,
                        row_text: row.text.clone(),
                    });
                }
                if answered.iter().any(|a| a.option_id == row.id) {
                    continue;
                }
                answered.push(MatrixRowAnswer {
                    option_id: row.id,
                    scale_value: value,
                    explanation,
                });
            }

            if question.is_required {
                let missing_option_ids: Vec<i64> = rows
                    .iter()
                    .filter(|row| !answered.iter().any(|a| a.option_id == row.id))
                    .map(|row| row.id)
                    .collect();
                if !missing_option_ids.is_empty() {
                    return Err(ParticipationError::MatrixRowsIncomplete {
                        question_id,
                        missing_option_ids,
                    });
                }
            }
            AnswerPayload::Matrix {
                matrix_answers: answered,
            }
        }
    };
    Ok(PendingContent::Ready(payload))
}
