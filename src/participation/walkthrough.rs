// src/participation/walkthrough.rs

//! Client-side survey stepper. The pointer only moves once the server has
//! acknowledged the answer for the current question.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    models::{
        answer::{SubmitAnswerRequest, SubmitOutcome, is_empty_answer},
        participation::Participation,
        survey::{Question, Survey},
    },
    participation::ParticipationError,
};

/// Where answers are sent. The server-side service implements it directly;
/// an HTTP client would implement it over the participation endpoints.
#[async_trait]
pub trait AnswerTransport: Send + Sync {
    async fn submit_answer(
        &self,
        participation_id: Uuid,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitOutcome, ParticipationError>;

    async fn complete(&self, participation_id: Uuid) -> Result<Participation, ParticipationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Index of the question now shown.
    Question(usize),
    Completed,
}

pub struct Walkthrough<'s, T: AnswerTransport> {
    survey: &'s Survey,
    participation_id: Uuid,
    transport: &'s T,
    questions: Vec<&'s Question>,
    current: usize,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl<'s, T: AnswerTransport> Walkthrough<'s, T> {
    pub fn new(survey: &'s Survey, participation_id: Uuid, transport: &'s T) -> Self {
        let mut questions: Vec<&Question> = survey.questions.iter().collect();
        questions.sort_by_key(|q| q.order);
        Self {
            survey,
            participation_id,
            transport,
            questions,
            current: 0,
            completed_at: None,
        }
    }

    pub fn survey(&self) -> &Survey {
        self.survey
    }

    pub fn current(&self) -> Option<&Question> {
        if self.is_completed() {
            return None;
        }
        self.questions.get(self.current).copied()
    }

    pub fn position(&self) -> usize {
        self.current
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn completed_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.completed_at
    }

    /// Submits the answer for the current question and advances. On the last
    /// question the participation is completed as well. Any failure leaves
    /// the pointer where it was.
    pub async fn next(&mut self, request: &SubmitAnswerRequest) -> Result<Step, ParticipationError> {
        if let Some(completed_at) = self.completed_at {
            return Err(ParticipationError::AlreadyCompleted { completed_at });
        }
        let Some(question) = self.questions.get(self.current).copied() else {
            return Err(ParticipationError::Malformed("survey has no questions".into()));
        };
        if request.question_id != question.id {
            return Err(ParticipationError::Malformed(format!(
                "expected an answer to question {}, got {}",
                question.id, request.question_id
            )));
        }

        if is_empty_answer(&question.kind, request) {
            if question.is_required {
                return Err(ParticipationError::RequiredAnswerMissing {
                    question_id: question.id,
                });
            }
        } else {
            self.transport.submit_answer(self.participation_id, request).await?;
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            return Ok(Step::Question(self.current));
        }

        let participation = self.transport.complete(self.participation_id).await?;
        self.completed_at = Some(participation.completed_at.unwrap_or_else(chrono::Utc::now));
        Ok(Step::Completed)
    }

    /// Steps back one question. Nothing is sent.
    pub fn previous(&mut self) -> Step {
        if !self.is_completed() && self.current > 0 {
            self.current -= 1;
        }
        match self.completed_at {
            Some(_) => Step::Completed,
            None => Step::Question(self.current),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        models::survey::{AccessType, NewSurvey, fixtures::sample_survey},
        participation::ParticipationService,
        store::{MemoryStore, StoreError, SurveyStore},
    };

    /// Counts calls and can be told to fail like a dropped connection.
    #[derive(Default)]
    struct FlakyTransport {
        fail: AtomicBool,
        submits: AtomicUsize,
    }

    #[async_trait]
    impl AnswerTransport for FlakyTransport {
        async fn submit_answer(
            &self,
            _participation_id: Uuid,
            request: &SubmitAnswerRequest,
        ) -> Result<SubmitOutcome, ParticipationError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ParticipationError::Store(StoreError::Corrupt("connection reset".into())));
            }
            self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(SubmitOutcome {
                stored_question_ids: vec![request.question_id],
                skipped: false,
            })
        }

        async fn complete(&self, participation_id: Uuid) -> Result<Participation, ParticipationError> {
            Ok(Participation {
                id: participation_id,
                survey_id: 1,
                participant_key: "test".into(),
                participant_name: None,
                invitation_id: None,
                started_at: chrono::Utc::now(),
                completed_at: Some(chrono::Utc::now()),
            })
        }
    }

    #[tokio::test]
    async fn pointer_waits_for_acknowledgement() {
        let survey = sample_survey();
        let transport = FlakyTransport::default();
        let mut walk = Walkthrough::new(&survey, Uuid::new_v4(), &transport);

        transport.fail.store(true, Ordering::SeqCst);
        let answer = SubmitAnswerRequest::options(10, &[11]);
        assert!(walk.next(&answer).await.is_err());
        assert_eq!(walk.position(), 0);

        transport.fail.store(false, Ordering::SeqCst);
        assert_eq!(walk.next(&answer).await.unwrap(), Step::Question(1));
        assert_eq!(walk.current().unwrap().id, 20);
    }

    #[tokio::test]
    async fn blank_required_answers_never_reach_the_transport() {
        let survey = sample_survey();
        let transport = FlakyTransport::default();
        let mut walk = Walkthrough::new(&survey, Uuid::new_v4(), &transport);

        assert!(matches!(
            walk.next(&SubmitAnswerRequest::empty(10)).await,
            Err(ParticipationError::RequiredAnswerMissing { question_id: 10 })
        ));
        assert!(matches!(
            walk.next(&SubmitAnswerRequest::options(20, &[21])).await,
            Err(ParticipationError::Malformed(_))
        ));
        assert_eq!(transport.submits.load(Ordering::SeqCst), 0);
        assert_eq!(walk.position(), 0);
    }

    #[tokio::test]
    async fn previous_stops_at_the_first_question() {
        let survey = sample_survey();
        let transport = FlakyTransport::default();
        let mut walk = Walkthrough::new(&survey, Uuid::new_v4(), &transport);

        assert_eq!(walk.previous(), Step::Question(0));
        walk.next(&SubmitAnswerRequest::options(10, &[12])).await.unwrap();
        assert_eq!(walk.previous(), Step::Question(0));
    }

    #[tokio::test]
    async fn full_walk_against_the_service() {
        let store = Arc::new(MemoryStore::new());
        let template = sample_survey();
        let survey = store
            .insert_survey(NewSurvey {
                slug_base: "walk".into(),
                title: template.title,
                description: template.description,
                intro_text: None,
                consent_text: None,
                outro_text: None,
                access_type: AccessType::Public,
                attachment: None,
                questions: template.questions,
                created_by: None,
            })
            .await
            .unwrap();
        let service = ParticipationService::new(store.clone(), 1024);
        let id = service.start_by_slug(&survey.slug, None).await.unwrap().participation_id;

        let mut walk = Walkthrough::new(&survey, id, &service);
        walk.next(&SubmitAnswerRequest::options(10, &[11])).await.unwrap();

        // The branch question under "Yes" is required.
        let without_reason = SubmitAnswerRequest::options(20, &[21]);
        assert!(matches!(
            walk.next(&without_reason).await,
            Err(ParticipationError::ConditionalChildRequiredMissing {
                parent_question_id: 20,
                question_id: 30
            })
        ));
        let with_reason = without_reason.with_child(SubmitAnswerRequest::text(30, "Close by"));
        walk.next(&with_reason).await.unwrap();

        walk.next(&SubmitAnswerRequest::text(40, "")).await.unwrap();
        assert_eq!(
            walk.next(&SubmitAnswerRequest::empty(50)).await.unwrap(),
            Step::Completed
        );
        assert!(walk.is_completed());

        let answers = store.answers_for_participation(id).await.unwrap();
        let mut answered: Vec<i64> = answers.iter().map(|a| a.question_id).collect();
        answered.sort();
        assert_eq!(answered, vec![10, 20, 30]);

        let stored = store.participation(id).await.unwrap().unwrap();
        assert_eq!(stored.completed_at, walk.completed_at());
    }
}
