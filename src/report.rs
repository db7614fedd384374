// src/report.rs

//! Turns stored answers back into per-question statistics.
//!
//! Values are kept at full precision; only [`render_summary`] rounds.

use std::{
    collections::{HashMap, HashSet},
    fmt::Write,
};

use uuid::Uuid;

use crate::{
    config::MATRIX_SCALE_POINTS,
    models::{
        answer::{AnswerPayload, StoredAnswer},
        participation::Participation,
        report::{
            ConditionalBranchResult, FileResponse, MatrixRowExplanation, MatrixRowResult, OptionResult,
            PaginatedResponse, ParticipantAnswer, ParticipantMatrixAnswer, ParticipantResponse,
            ParticipantSummary, QuestionReport, ResponseItem, SurveyReport, TextResponse,
        },
        survey::{ChoiceOption, Question, QuestionKind, Survey},
    },
};

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn payload_fits(kind: &QuestionKind, payload: &AnswerPayload) -> bool {
    matches!(
        (kind, payload),
        (QuestionKind::OpenText, AnswerPayload::Text { .. })
            | (
                QuestionKind::SingleSelect { .. }
                    | QuestionKind::MultiSelect { .. }
                    | QuestionKind::Conditional { .. },
                AnswerPayload::Options { .. }
            )
            | (QuestionKind::FileUpload { .. }, AnswerPayload::File { .. })
            | (QuestionKind::Matrix { .. }, AnswerPayload::Matrix { .. })
    )
}

fn sorted_by_order(options: &[ChoiceOption]) -> Vec<&ChoiceOption> {
    let mut sorted: Vec<&ChoiceOption> = options.iter().collect();
    sorted.sort_by_key(|o| o.order);
    sorted
}

/// Drops branch answers whose participant has since picked another option on the
/// parent question. Answers to unknown questions are left for the caller to judge.
fn current_answers<'a>(survey: &Survey, answers: &'a [StoredAnswer]) -> Vec<&'a StoredAnswer> {
    let mut selected: HashMap<(Uuid, i64), &[i64]> = HashMap::new();
    for answer in answers {
        let is_conditional = survey
            .locate(answer.question_id)
            .is_some_and(|located| matches!(located.question.kind, QuestionKind::Conditional { .. }));
        if let (true, Some(ids)) = (is_conditional, answer.payload.option_ids()) {
            selected.insert((answer.participation_id, answer.question_id), ids);
        }
    }

    answers
        .iter()
        .filter(|answer| match survey.locate(answer.question_id).and_then(|l| l.branch) {
            Some((parent, option)) => selected
                .get(&(answer.participation_id, parent.id))
                .is_some_and(|ids| ids.contains(&option.id)),
            None => true,
        })
        .collect()
}

/// Answers of the population under analysis, indexed by question.
struct Aggregator<'a> {
    participants: HashMap<Uuid, &'a Participation>,
    by_question: HashMap<i64, Vec<&'a StoredAnswer>>,
}

impl<'a> Aggregator<'a> {
    fn new(
        survey: &'a Survey,
        population: &[&'a Participation],
        answers: &'a [StoredAnswer],
    ) -> Self {
        let participants: HashMap<Uuid, &Participation> =
            population.iter().map(|p| (p.id, *p)).collect();
        let mut by_question: HashMap<i64, Vec<&StoredAnswer>> = HashMap::new();
        let mut skipped = 0usize;

        for answer in current_answers(survey, answers) {
            if !participants.contains_key(&answer.participation_id) {
                continue;
            }
            match survey.locate(answer.question_id) {
                Some(located) if payload_fits(&located.question.kind, &answer.payload) => {
                    by_question.entry(answer.question_id).or_default().push(answer);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                "Skipped {} answers on survey {} that do not match its questions",
                skipped,
                survey.id
            );
        }
        for bucket in by_question.values_mut() {
            bucket.sort_by_key(|a| a.submitted_at);
        }

        Self {
            participants,
            by_question,
        }
    }

    fn name_of(&self, participation_id: Uuid) -> Option<String> {
        self.participants
            .get(&participation_id)
            .and_then(|p| p.participant_name.clone())
    }

    fn answers_in(&self, question_id: i64, scope: &HashSet<Uuid>) -> Vec<&'a StoredAnswer> {
        self.by_question
            .get(&question_id)
            .map(|answers| {
                answers
                    .iter()
                    .copied()
                    .filter(|a| scope.contains(&a.participation_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn option_results(&self, options: &[ChoiceOption], answers: &[&StoredAnswer]) -> Vec<OptionResult> {
        sorted_by_order(options)
            .into_iter()
            .map(|option| {
                let selection_count = answers
                    .iter()
                    .filter(|a| a.payload.option_ids().is_some_and(|ids| ids.contains(&option.id)))
                    .count();
                OptionResult {
                    option_id: option.id,
                    text: option.text.clone(),
                    order: option.order,
                    value: option.value,
                    selection_count,
                    percentage: percentage(selection_count, answers.len()),
                }
            })
            .collect()
    }

    fn text_responses(&self, answers: &[&StoredAnswer]) -> Vec<TextResponse> {
        answers
            .iter()
            .filter_map(|a| {
                Some(TextResponse {
                    participation_id: a.participation_id,
                    participant_name: self.name_of(a.participation_id),
                    text_value: a.payload.text()?.to_string(),
                    submitted_at: a.submitted_at,
                })
            })
            .collect()
    }

    fn file_responses(&self, answers: &[&StoredAnswer]) -> Vec<FileResponse> {
        answers
            .iter()
            .filter_map(|a| {
                let file = a.payload.file()?;
                Some(FileResponse {
                    answer_id: a.id,
                    attachment_id: file.attachment_id,
                    participation_id: a.participation_id,
                    participant_name: self.name_of(a.participation_id),
                    file_name: file.file_name.clone(),
                    content_type: file.content_type.clone(),
                    size_bytes: file.size_bytes,
                    submitted_at: a.submitted_at,
                })
            })
            .collect()
    }

    fn matrix_results(&self, rows: &[ChoiceOption], answers: &[&StoredAnswer]) -> Vec<MatrixRowResult> {
        sorted_by_order(rows)
            .into_iter()
            .map(|row| {
                let mut scale_distribution = vec![0usize; MATRIX_SCALE_POINTS as usize];
                let mut explanations = Vec::new();
                let mut total = 0usize;
                let mut sum = 0u64;

                for answer in answers {
                    let Some(scored) = answer
                        .payload
                        .matrix_rows()
                        .and_then(|items| items.iter().find(|item| item.option_id == row.id))
                    else {
                        continue;
                    };
                    if !(1..=MATRIX_SCALE_POINTS).contains(&scored.scale_value) {
                        continue;
                    }
                    total += 1;
                    sum += u64::from(scored.scale_value);
                    scale_distribution[usize::from(scored.scale_value - 1)] += 1;

                    let explanation = scored.explanation.as_deref().map(str::trim).unwrap_or_default();
                    if !explanation.is_empty() {
                        explanations.push(MatrixRowExplanation {
                            participation_id: answer.participation_id,
                            participant_name: self.name_of(answer.participation_id),
                            scale_value: scored.scale_value,
                            explanation: explanation.to_string(),
                            submitted_at: answer.submitted_at,
                        });
                    }
                }

                MatrixRowResult {
                    option_id: row.id,
                    text: row.text.clone(),
                    order: row.order,
                    total_responses: total,
                    average_score: if total == 0 { 0.0 } else { sum as f64 / total as f64 },
                    scale_distribution,
                    explanations,
                }
            })
            .collect()
    }

    /// Statistics of one question over the participations in `scope`.
    fn question(&self, question: &Question, scope: &HashSet<Uuid>) -> QuestionReport {
        let answers = self.answers_in(question.id, scope);
        let mut report = QuestionReport {
            question_id: question.id,
            text: question.text.clone(),
            question_type: question.question_type(),
            order: question.order,
            is_required: question.is_required,
            total_responses: answers.len(),
            response_rate: percentage(answers.len(), scope.len()),
            attachment: question.attachment.clone(),
            option_results: None,
            text_responses: None,
            file_responses: None,
            conditional_results: None,
            matrix_scale_labels: None,
            matrix_results: None,
        };

        match &question.kind {
            QuestionKind::SingleSelect { options } | QuestionKind::MultiSelect { options } => {
                report.option_results = Some(self.option_results(options, &answers));
            }
            QuestionKind::OpenText => report.text_responses = Some(self.text_responses(&answers)),
            QuestionKind::FileUpload { .. } => {
                report.file_responses = Some(self.file_responses(&answers))
            }
            QuestionKind::Conditional { options, .. } => {
                report.option_results = Some(self.option_results(options, &answers));
                let branches = sorted_by_order(options)
                    .into_iter()
                    .map(|option| {
                        let chosen: HashSet<Uuid> = answers
                            .iter()
                            .filter(|a| a.payload.option_ids().is_some_and(|ids| ids.contains(&option.id)))
                            .map(|a| a.participation_id)
                            .collect();
                        ConditionalBranchResult {
                            parent_option_id: option.id,
                            parent_option_text: option.text.clone(),
                            participant_count: chosen.len(),
                            child_questions: question
                                .children_of(option.order)
                                .into_iter()
                                .map(|child| self.question(child, &chosen))
                                .collect(),
                        }
                    })
                    .collect();
                report.conditional_results = Some(branches);
            }
            QuestionKind::Matrix {
                rows, scale_labels, ..
            } => {
                report.matrix_scale_labels = Some(scale_labels.clone());
                report.matrix_results = Some(self.matrix_results(rows, &answers));
            }
        }
        report
    }
}

fn population(participations: &[Participation], include_partial: bool) -> Vec<&Participation> {
    participations
        .iter()
        .filter(|p| include_partial || p.is_completed())
        .collect()
}

/// Aggregates every top-level question of `survey`. Without `include_partial`
/// only completed participations are analysed.
pub fn build_report(
    survey: &Survey,
    participations: &[Participation],
    answers: &[StoredAnswer],
    include_partial: bool,
) -> SurveyReport {
    let population = population(participations, include_partial);
    let aggregator = Aggregator::new(survey, &population, answers);
    let scope: HashSet<Uuid> = population.iter().map(|p| p.id).collect();

    let mut answered: HashMap<Uuid, usize> = HashMap::new();
    for answer in current_answers(survey, answers) {
        *answered.entry(answer.participation_id).or_default() += 1;
    }

    let mut participants: Vec<ParticipantSummary> = population
        .iter()
        .map(|p| ParticipantSummary {
            participation_id: p.id,
            participant_name: p.participant_name.clone(),
            started_at: p.started_at,
            completed_at: p.completed_at,
            answered_questions: answered.get(&p.id).copied().unwrap_or(0),
        })
        .collect();
    participants.sort_by_key(|p| p.started_at);

    let mut questions: Vec<&Question> = survey.questions.iter().collect();
    questions.sort_by_key(|q| q.order);

    let completed_participations = participations.iter().filter(|p| p.is_completed()).count();

    SurveyReport {
        survey_id: survey.id,
        title: survey.title.clone(),
        description: survey.description.clone(),
        intro_text: survey.intro_text.clone(),
        outro_text: survey.outro_text.clone(),
        access_type: survey.access_type,
        is_active: survey.is_active,
        total_participations: participations.len(),
        completed_participations,
        completion_rate: percentage(completed_participations, participations.len()),
        analyzed_participations: scope.len(),
        participants,
        questions: questions
            .into_iter()
            .map(|q| aggregator.question(q, &scope))
            .collect(),
    }
}

/// Text and file responses of one question (top-level or branch), oldest first.
/// `None` when the survey has no such question.
pub fn question_responses(
    survey: &Survey,
    participations: &[Participation],
    answers: &[StoredAnswer],
    question_id: i64,
    include_partial: bool,
    page: usize,
    page_size: usize,
) -> Option<PaginatedResponse<ResponseItem>> {
    let located = survey.locate(question_id)?;
    let population = population(participations, include_partial);
    let aggregator = Aggregator::new(survey, &population, answers);
    let scope: HashSet<Uuid> = population.iter().map(|p| p.id).collect();
    let scoped = aggregator.answers_in(question_id, &scope);

    let items: Vec<ResponseItem> = match located.question.kind {
        QuestionKind::OpenText => aggregator
            .text_responses(&scoped)
            .into_iter()
            .map(ResponseItem::Text)
            .collect(),
        QuestionKind::FileUpload { .. } => aggregator
            .file_responses(&scoped)
            .into_iter()
            .map(ResponseItem::File)
            .collect(),
        _ => Vec::new(),
    };
    Some(PaginatedResponse::paginate(items, page, page_size))
}

/// Everything one participant answered, in survey order, with option texts resolved.
pub fn participant_responses(
    survey: &Survey,
    participation: &Participation,
    answers: &[StoredAnswer],
) -> ParticipantResponse {
    let position: HashMap<i64, usize> = survey
        .all_questions()
        .into_iter()
        .enumerate()
        .map(|(i, q)| (q.id, i))
        .collect();

    let mut own: Vec<&StoredAnswer> = current_answers(survey, answers)
        .into_iter()
        .filter(|a| a.participation_id == participation.id)
        .collect();
    own.sort_by_key(|a| position.get(&a.question_id).copied().unwrap_or(usize::MAX));

    let mut resolved = Vec::with_capacity(own.len());
    for answer in own {
        let Some(located) = survey.locate(answer.question_id) else {
            tracing::warn!(
                "Answer {} references question {} missing from survey {}",
                answer.id,
                answer.question_id,
                survey.id
            );
            continue;
        };
        let question = located.question;

        let selected_options = answer
            .payload
            .option_ids()
            .unwrap_or_default()
            .iter()
            .filter_map(|id| question.option(*id).map(|o| o.text.clone()))
            .collect();

        let matrix_answers = match (&question.kind, answer.payload.matrix_rows()) {
            (QuestionKind::Matrix { scale_labels, .. }, Some(rows)) => rows
                .iter()
                .filter_map(|row| {
                    Some(ParticipantMatrixAnswer {
                        row_text: question.option(row.option_id)?.text.clone(),
                        scale_value: row.scale_value,
                        scale_label: usize::from(row.scale_value)
                            .checked_sub(1)
                            .and_then(|i| scale_labels.get(i))
                            .cloned(),
                        explanation: row.explanation.clone(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };

        resolved.push(ParticipantAnswer {
            question_id: question.id,
            question_text: question.text.clone(),
            question_type: question.question_type(),
            parent_question_id: located.branch.map(|(parent, _)| parent.id),
            text_value: answer.payload.text().map(str::to_string),
            selected_options,
            attachment: answer.payload.file().cloned(),
            matrix_answers,
            submitted_at: answer.submitted_at,
        });
    }

    ParticipantResponse {
        participation_id: participation.id,
        participant_name: participation.participant_name.clone(),
        started_at: participation.started_at,
        completed_at: participation.completed_at,
        answers: resolved,
    }
}

fn render_question(out: &mut String, question: &QuestionReport, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{}{}. {} [{}] {} responses ({:.1}%)",
        indent,
        question.order,
        question.text,
        question.question_type,
        question.total_responses,
        question.response_rate
    );
    for option in question.option_results.iter().flatten() {
        let _ = writeln!(
            out,
            "{}  - {}: {} ({:.1}%)",
            indent, option.text, option.selection_count, option.percentage
        );
    }
    for row in question.matrix_results.iter().flatten() {
        let _ = writeln!(
            out,
            "{}  - {}: average {:.2} over {} ratings",
            indent, row.text, row.average_score, row.total_responses
        );
    }
    for branch in question.conditional_results.iter().flatten() {
        if branch.child_questions.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "{}  when '{}' ({} participants):",
            indent, branch.parent_option_text, branch.participant_count
        );
        for child in &branch.child_questions {
            render_question(out, child, depth + 2);
        }
    }
}

/// Plain-text rendering, rounded for display.
pub fn render_summary(report: &SurveyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.title);
    let _ = writeln!(
        out,
        "{} participations, {} completed ({:.1}%), {} analysed",
        report.total_participations,
        report.completed_participations,
        report.completion_rate,
        report.analyzed_participations
    );
    for question in &report.questions {
        render_question(&mut out, question, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        answer::MatrixRowAnswer,
        attachment::AttachmentRef,
        survey::{
            AccessType,
            fixtures::{option, question, sample_survey, single_select, survey},
        },
    };

    struct Responses {
        participations: Vec<Participation>,
        answers: Vec<StoredAnswer>,
    }

    impl Responses {
        fn new() -> Self {
            Self {
                participations: Vec::new(),
                answers: Vec::new(),
            }
        }

        fn participant(&mut self, name: &str, completed: bool) -> Uuid {
            let id = Uuid::new_v4();
            let now = chrono::Utc::now();
            self.participations.push(Participation {
                id,
                survey_id: 1,
                participant_key: format!("user:{}", name),
                participant_name: Some(name.to_string()),
                invitation_id: None,
                started_at: now,
                completed_at: completed.then_some(now),
            });
            id
        }

        fn answer(&mut self, participation_id: Uuid, question_id: i64, payload: AnswerPayload) {
            self.answers.push(StoredAnswer {
                id: self.answers.len() as i64 + 1,
                participation_id,
                question_id,
                payload,
                submitted_at: chrono::Utc::now(),
            });
        }

        fn pick(&mut self, participation_id: Uuid, question_id: i64, option_ids: &[i64]) {
            self.answer(
                participation_id,
                question_id,
                AnswerPayload::Options {
                    option_ids: option_ids.to_vec(),
                },
            );
        }

        fn rate(&mut self, participation_id: Uuid, question_id: i64, rows: &[(i64, u8, Option<&str>)]) {
            let matrix_answers = rows
                .iter()
                .map(|(option_id, scale_value, explanation)| MatrixRowAnswer {
                    option_id: *option_id,
                    scale_value: *scale_value,
                    explanation: explanation.map(str::to_string),
                })
                .collect();
            self.answer(participation_id, question_id, AnswerPayload::Matrix { matrix_answers });
        }
    }

    #[test]
    fn two_participants_split_a_single_select() {
        let survey = survey(
            AccessType::Public,
            vec![single_select(1, 1, true, vec![option(11, 1, "A"), option(12, 2, "B")])],
        );
        let mut r = Responses::new();
        let a = r.participant("a", true);
        let b = r.participant("b", true);
        r.pick(a, 1, &[11]);
        r.pick(b, 1, &[12]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let q = &report.questions[0];
        assert_eq!(q.total_responses, 2);
        let results = q.option_results.as_ref().unwrap();
        assert_eq!(
            results.iter().map(|o| o.selection_count).collect::<Vec<_>>(),
            vec![1, 1]
        );
        assert_eq!(
            results.iter().map(|o| o.percentage).collect::<Vec<_>>(),
            vec![50.0, 50.0]
        );
    }

    #[test]
    fn multi_select_percentages_use_respondents_not_selections() {
        let multi = question(
            1,
            1,
            "Pick any",
            false,
            QuestionKind::MultiSelect {
                options: vec![option(11, 1, "A"), option(12, 2, "B"), option(13, 3, "C")],
            },
        );
        let survey = survey(AccessType::Public, vec![multi]);
        let mut r = Responses::new();
        let a = r.participant("a", true);
        let b = r.participant("b", true);
        let c = r.participant("c", true);
        r.pick(a, 1, &[11, 12]);
        r.pick(b, 1, &[11, 12, 13]);
        r.pick(c, 1, &[11]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let q = &report.questions[0];
        let results = q.option_results.as_ref().unwrap();
        let selections: usize = results.iter().map(|o| o.selection_count).sum();
        assert!(selections > q.total_responses);
        assert_eq!(results[0].percentage, 100.0);
        assert!((results[1].percentage - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn matrix_averages_stay_on_the_scale() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let a = r.participant("a", true);
        let b = r.participant("b", true);
        r.rate(a, 50, &[(51, 1, Some("cold")), (52, 4, None)]);
        r.rate(b, 50, &[(51, 4, Some("better lately")), (52, 5, None)]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let rows = report.questions[3].matrix_results.as_ref().unwrap();
        let (food, price, service) = (&rows[0], &rows[1], &rows[2]);

        assert_eq!(food.average_score, 2.5);
        assert_eq!(food.scale_distribution, vec![1, 0, 0, 1, 0]);
        assert_eq!(food.explanations.len(), 2);
        assert_eq!(food.explanations[1].scale_value, 4);
        assert_eq!(price.average_score, 4.5);
        assert_eq!(service.total_responses, 0);
        assert_eq!(service.average_score, 0.0);

        for row in rows.iter().filter(|row| row.total_responses > 0) {
            assert!((1.0..=5.0).contains(&row.average_score));
        }
    }

    #[test]
    fn branches_are_scoped_to_the_participants_who_chose_them() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let yes = r.participant("yes", true);
        let no = r.participant("no", true);
        r.pick(yes, 20, &[21]);
        r.answer(yes, 30, AnswerPayload::Text { text_value: "Close by".into() });
        r.pick(no, 20, &[22]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let branches = report.questions[1].conditional_results.as_ref().unwrap();
        assert_eq!(branches.len(), 2);

        let yes_branch = &branches[0];
        assert_eq!(yes_branch.parent_option_text, "Yes");
        assert_eq!(yes_branch.participant_count, 1);
        let child = &yes_branch.child_questions[0];
        assert_eq!(child.question_id, 30);
        assert_eq!(child.total_responses, 1);
        assert_eq!(child.response_rate, 100.0);
        assert_eq!(child.text_responses.as_ref().unwrap()[0].text_value, "Close by");

        assert_eq!(branches[1].participant_count, 1);
        assert!(branches[1].child_questions.is_empty());
    }

    #[test]
    fn skipped_optional_question_lowers_its_response_rate() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let a = r.participant("a", true);
        r.participant("b", true);
        r.answer(a, 40, AnswerPayload::Text { text_value: "More salad".into() });

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let q = &report.questions[2];
        assert_eq!(q.total_responses, 1);
        assert_eq!(q.response_rate, 50.0);
    }

    #[test]
    fn partial_participations_only_count_when_asked() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let done = r.participant("done", true);
        let partial = r.participant("partial", false);
        r.pick(done, 10, &[11]);
        r.pick(partial, 10, &[12]);

        let completed_only = build_report(&survey, &r.participations, &r.answers, false);
        assert_eq!(completed_only.total_participations, 2);
        assert_eq!(completed_only.completed_participations, 1);
        assert_eq!(completed_only.completion_rate, 50.0);
        assert_eq!(completed_only.analyzed_participations, 1);
        assert_eq!(completed_only.questions[0].total_responses, 1);

        let everyone = build_report(&survey, &r.participations, &r.answers, true);
        assert_eq!(everyone.analyzed_participations, 2);
        assert_eq!(everyone.questions[0].total_responses, 2);
        assert_eq!(everyone.participants.len(), 2);
    }

    #[test]
    fn mismatched_answers_are_skipped() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let a = r.participant("a", true);
        r.answer(a, 10, AnswerPayload::Text { text_value: "not an option".into() });
        r.pick(a, 999, &[1]);
        r.pick(a, 10, &[11]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        assert_eq!(report.questions[0].total_responses, 1);
    }

    #[test]
    fn summary_rounds_for_display_only() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let ids: Vec<Uuid> = (0..3).map(|i| r.participant(&format!("p{}", i), true)).collect();
        r.pick(ids[0], 10, &[11]);
        r.pick(ids[1], 10, &[12]);
        r.pick(ids[2], 10, &[12]);
        r.rate(ids[0], 50, &[(51, 1, Some("x")), (52, 2, Some("y"))]);
        r.rate(ids[1], 50, &[(51, 2, Some("z"))]);
        r.rate(ids[2], 50, &[(51, 2, Some("w"))]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let red = &report.questions[0].option_results.as_ref().unwrap()[0];
        assert!((red.percentage - 100.0 / 3.0).abs() < 1e-9);

        let summary = render_summary(&report);
        assert!(summary.contains("Red: 1 (33.3%)"));
        assert!(summary.contains("Blue: 2 (66.7%)"));
        assert!(summary.contains("Food: average 1.67 over 3 ratings"));
        assert!(summary.contains("when 'Yes' (0 participants)"));
    }

    #[test]
    fn responses_of_one_question_are_paged() {
        let survey = sample_survey();
        let mut r = Responses::new();
        for i in 0..5 {
            let p = r.participant(&format!("p{}", i), true);
            r.answer(p, 40, AnswerPayload::Text { text_value: format!("note {}", i) });
        }

        let page = question_responses(&survey, &r.participations, &r.answers, 40, false, 2, 2).unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);
        assert!(question_responses(&survey, &r.participations, &r.answers, 404, false, 1, 2).is_none());
    }

    #[test]
    fn participant_view_resolves_option_texts() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let p = r.participant("ada", false);
        r.rate(p, 50, &[(52, 2, Some("pricey"))]);
        r.answer(p, 30, AnswerPayload::Text { text_value: "Close by".into() });
        r.pick(p, 20, &[21]);
        r.pick(p, 10, &[12]);

        let view = participant_responses(&survey, &r.participations[0], &r.answers);
        let order: Vec<i64> = view.answers.iter().map(|a| a.question_id).collect();
        assert_eq!(order, vec![10, 20, 30, 50]);
        assert_eq!(view.answers[0].selected_options, vec!["Blue".to_string()]);
        assert_eq!(view.answers[2].parent_question_id, Some(20));
        let row = &view.answers[3].matrix_answers[0];
        assert_eq!(row.row_text, "Price");
        assert_eq!(row.scale_label.as_deref(), Some("2"));
    }

    #[test]
    fn switching_the_branch_option_hides_old_branch_answers() {
        let survey = sample_survey();
        let mut r = Responses::new();
        let p = r.participant("ada", true);
        r.pick(p, 20, &[21]);
        r.answer(p, 30, AnswerPayload::Text { text_value: "Close by".into() });
        // The parent answer is later overwritten with the other option.
        r.answers.retain(|a| a.question_id != 20);
        r.pick(p, 20, &[22]);

        let view = participant_responses(&survey, &r.participations[0], &r.answers);
        let order: Vec<i64> = view.answers.iter().map(|a| a.question_id).collect();
        assert_eq!(order, vec![20]);

        let report = build_report(&survey, &r.participations, &r.answers, false);
        assert_eq!(report.participants[0].answered_questions, 1);
        let branches = report.questions[1].conditional_results.as_ref().unwrap();
        assert_eq!(branches[0].participant_count, 0);
        assert_eq!(branches[0].child_questions[0].total_responses, 0);

        let page = question_responses(&survey, &r.participations, &r.answers, 30, false, 1, 10).unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn file_responses_carry_attachment_metadata() {
        let upload = question(
            1,
            1,
            "Receipt",
            false,
            QuestionKind::FileUpload {
                allowed_content_types: vec![],
            },
        );
        let survey = survey(AccessType::Public, vec![upload]);
        let mut r = Responses::new();
        let p = r.participant("a", true);
        r.answer(
            p,
            1,
            AnswerPayload::File {
                attachment: AttachmentRef {
                    attachment_id: 9,
                    file_name: "receipt.pdf".into(),
                    content_type: "application/pdf".into(),
                    size_bytes: 1200,
                },
            },
        );

        let report = build_report(&survey, &r.participations, &r.answers, false);
        let files = report.questions[0].file_responses.as_ref().unwrap();
        assert_eq!(files[0].attachment_id, 9);
        assert_eq!(files[0].participant_name.as_deref(), Some("a"));
    }
}
