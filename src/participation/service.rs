// src/participation/service.rs

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRef;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        answer::{AnswerPayload, NewAnswer, SubmitAnswerRequest, SubmitOutcome},
        invitation::{Invitation, InvitationStatus, TokenSurveyResponse},
        participation::{
            Completion, NewParticipation, Participation, ParticipationState, ParticipationStatus,
            StartParticipationResponse,
        },
        survey::{AccessType, Survey},
    },
    participation::{
        ParticipationError,
        evaluate::{Evaluation, PendingContent, evaluate},
        walkthrough::AnswerTransport,
    },
    state::AppState,
    store::{StoreError, SurveyStore},
    utils::jwt::Claims,
};

fn user_key(claims: &Claims) -> String {
    format!("user:{}", claims.sub)
}

fn invitation_key(invitation: &Invitation) -> String {
    format!("invitation:{}", invitation.id)
}

/// Server side of the participation state machine.
#[derive(Clone)]
pub struct ParticipationService {
    store: Arc<dyn SurveyStore>,
    max_attachment_bytes: usize,
}

impl FromRef<AppState> for ParticipationService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.config.max_attachment_bytes)
    }
}

impl ParticipationService {
    pub fn new(store: Arc<dyn SurveyStore>, max_attachment_bytes: usize) -> Self {
        Self {
            store,
            max_attachment_bytes,
        }
    }

    async fn active_survey_by_slug(&self, slug: &str) -> Result<Survey, ParticipationError> {
        let survey = self
            .store
            .survey_by_slug(slug)
            .await?
            .ok_or(ParticipationError::SurveyNotFound)?;
        if !survey.is_active {
            return Err(ParticipationError::SurveyInactive);
        }
        Ok(survey)
    }

    /// Checks who may see a survey by its public slug.
    pub async fn survey_for_viewer(
        &self,
        slug: &str,
        viewer: Option<&Claims>,
    ) -> Result<Survey, ParticipationError> {
        let survey = self.active_survey_by_slug(slug).await?;
        match survey.access_type {
            AccessType::InvitationOnly => Err(ParticipationError::InvitationRequired),
            AccessType::Internal if viewer.is_none() => Err(ParticipationError::AuthenticationRequired),
            _ => Ok(survey),
        }
    }

    async fn enter(
        &self,
        participation: NewParticipation,
    ) -> Result<(Participation, bool), ParticipationError> {
        let started = self.store.start_participation(participation).await?;
        if let Some(completed_at) = started.participation.completed_at {
            return Err(ParticipationError::AlreadyCompleted { completed_at });
        }
        Ok((started.participation, started.created))
    }

    /// `start` by slug. Internal surveys need a signed-in caller; public ones
    /// key signed-in callers by user and everyone else anonymously.
    pub async fn start_by_slug(
        &self,
        slug: &str,
        viewer: Option<&Claims>,
    ) -> Result<StartParticipationResponse, ParticipationError> {
        let survey = self.survey_for_viewer(slug, viewer).await?;

        let (participant_key, participant_name) = match viewer {
            Some(claims) => (user_key(claims), Some(claims.display_name())),
            None => (format!("anon:{}", Uuid::new_v4().simple()), None),
        };

        let (participation, created) = self
            .enter(NewParticipation {
                survey_id: survey.id,
                participant_key,
                participant_name,
                invitation_id: None,
            })
            .await?;

        if created {
            tracing::info!("Participation {} started on survey {}", participation.id, survey.id);
        }
        Ok(StartParticipationResponse {
            participation_id: participation.id,
            state: participation.state(),
            resumed: !created,
        })
    }

    async fn usable_invitation(&self, token: &str) -> Result<(Invitation, Survey), ParticipationError> {
        let invitation = self
            .store
            .invitation_by_token(token)
            .await?
            .ok_or(ParticipationError::InvitationNotFound)?;
        if invitation.status == InvitationStatus::Cancelled {
            return Err(ParticipationError::InvitationCancelled);
        }
        let survey = self
            .store
            .survey(invitation.survey_id)
            .await?
            .ok_or(ParticipationError::SurveyNotFound)?;
        if !survey.is_active {
            return Err(ParticipationError::SurveyInactive);
        }
        Ok((invitation, survey))
    }

    /// What the invitee sees when opening their link. A pending or sent
    /// invitation becomes `Viewed`.
    pub async fn open_invitation(&self, token: &str) -> Result<TokenSurveyResponse, ParticipationError> {
        let (mut invitation, survey) = self.usable_invitation(token).await?;

        if matches!(invitation.status, InvitationStatus::Pending | InvitationStatus::Sent) {
            if let Some(updated) = self
                .store
                .update_invitation(invitation.id, InvitationStatus::Viewed, None)
                .await?
            {
                invitation = updated;
            }
        }

        let participation = self
            .store
            .find_participation(survey.id, &invitation_key(&invitation))
            .await?;
        let status = ParticipationStatus::of(participation.as_ref());

        Ok(TokenSurveyResponse {
            survey_id: survey.id,
            slug: survey.slug,
            title: survey.title,
            description: survey.description,
            intro_text: survey.intro_text,
            consent_text: survey.consent_text,
            outro_text: survey.outro_text,
            first_name: invitation.first_name,
            last_name: invitation.last_name,
            has_participated: status.has_participated,
            is_completed: status.is_completed,
            completed_at: status.completed_at,
            participation_id: participation.map(|p| p.id),
            attachment: survey.attachment,
            questions: survey.questions,
        })
    }

    /// `start` by invitation token. Idempotent: the invitation always maps to
    /// the same participation.
    pub async fn start_by_token(&self, token: &str) -> Result<StartParticipationResponse, ParticipationError> {
        let (invitation, survey) = self.usable_invitation(token).await?;

        let (participation, created) = self
            .enter(NewParticipation {
                survey_id: survey.id,
                participant_key: invitation_key(&invitation),
                participant_name: Some(invitation.full_name()),
                invitation_id: Some(invitation.id),
            })
            .await?;

        if invitation.participation_id != Some(participation.id) {
            let status = match invitation.status {
                InvitationStatus::Pending | InvitationStatus::Sent => InvitationStatus::Viewed,
                other => other,
            };
            self.store
                .update_invitation(invitation.id, status, Some(participation.id))
                .await?;
        }

        if created {
            tracing::info!(
                "Participation {} started from invitation {}",
                participation.id,
                invitation.id
            );
        }
        Ok(StartParticipationResponse {
            participation_id: participation.id,
            state: participation.state(),
            resumed: !created,
        })
    }

    /// Whether the caller already took the survey. Anonymous callers never have.
    pub async fn status(
        &self,
        slug: &str,
        viewer: Option<&Claims>,
    ) -> Result<ParticipationStatus, ParticipationError> {
        let survey = self
            .store
            .survey_by_slug(slug)
            .await?
            .ok_or(ParticipationError::SurveyNotFound)?;
        let participation = match viewer {
            Some(claims) => self.store.find_participation(survey.id, &user_key(claims)).await?,
            None => None,
        };
        Ok(ParticipationStatus::of(participation.as_ref()))
    }

    pub async fn participation_state(&self, id: Uuid) -> Result<ParticipationState, ParticipationError> {
        Ok(self
            .store
            .participation(id)
            .await?
            .map(|p| p.state())
            .unwrap_or(ParticipationState::NotStarted))
    }

    /// `submitAnswer`. Every check runs before the first write; the answers of
    /// the question and its branch are then upserted together.
    pub async fn submit_answer(
        &self,
        participation_id: Uuid,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitOutcome, ParticipationError> {
        request
            .validate()
            .map_err(|e| ParticipationError::Malformed(e.to_string()))?;

        let participation = self
            .store
            .participation(participation_id)
            .await?
            .ok_or(ParticipationError::ParticipationNotFound)?;
        if let Some(completed_at) = participation.completed_at {
            return Err(ParticipationError::AlreadyCompleted { completed_at });
        }

        let survey = self
            .store
            .survey(participation.survey_id)
            .await?
            .ok_or(ParticipationError::SurveyNotFound)?;
        let located = survey
            .locate(request.question_id)
            .ok_or(ParticipationError::UnknownQuestion(request.question_id))?;

        let pending = match evaluate(located, request, self.max_attachment_bytes)? {
            Evaluation::Skip => {
                tracing::debug!(
                    "Participation {} skipped optional question {}",
                    participation_id,
                    request.question_id
                );
                return Ok(SubmitOutcome {
                    stored_question_ids: Vec::new(),
                    skipped: true,
                });
            }
            Evaluation::Store(pending) => pending,
        };

        let mut answers = Vec::with_capacity(pending.len());
        for answer in pending {
            let payload = match answer.content {
                PendingContent::Ready(payload) => payload,
                PendingContent::Upload(file) => AnswerPayload::File {
                    attachment: self.store.save_attachment(file).await?,
                },
            };
            answers.push(NewAnswer {
                question_id: answer.question_id,
                payload,
            });
        }

        let stored = self.store.upsert_answers(participation_id, answers).await?;
        let stored_question_ids: Vec<i64> = stored.iter().map(|a| a.question_id).collect();
        tracing::debug!(
            "Participation {} stored answers for questions {:?}",
            participation_id,
            stored_question_ids
        );
        Ok(SubmitOutcome {
            stored_question_ids,
            skipped: false,
        })
    }

    /// `complete`. Only the first call succeeds; later calls report the
    /// original completion time.
    pub async fn complete(&self, participation_id: Uuid) -> Result<Participation, ParticipationError> {
        let participation = match self
            .store
            .complete_participation(participation_id, chrono::Utc::now())
            .await?
        {
            Completion::Completed(participation) => participation,
            Completion::NotFound => return Err(ParticipationError::ParticipationNotFound),
            Completion::AlreadyCompleted(existing) => {
                return Err(match existing.completed_at {
                    Some(completed_at) => ParticipationError::AlreadyCompleted { completed_at },
                    None => StoreError::Corrupt(format!(
                        "participation {} refused completion without a timestamp",
                        existing.id
                    ))
                    .into(),
                });
            }
        };

        if let Some(invitation_id) = participation.invitation_id {
            // Completion already happened; a stale invitation status is not worth failing for.
            if let Err(e) = self
                .store
                .update_invitation(invitation_id, InvitationStatus::Completed, Some(participation.id))
                .await
            {
                tracing::error!("Failed to mark invitation {} completed: {:?}", invitation_id, e);
            }
        }

        tracing::info!("Participation {} completed", participation.id);
        Ok(participation)
    }
}

#[async_trait]
impl AnswerTransport for ParticipationService {
    async fn submit_answer(
        &self,
        participation_id: Uuid,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitOutcome, ParticipationError> {
        ParticipationService::submit_answer(self, participation_id, request).await
    }

    async fn complete(&self, participation_id: Uuid) -> Result<Participation, ParticipationError> {
        ParticipationService::complete(self, participation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            answer::MatrixAnswerItem,
            invitation::{DeliveryMethod, NewInvitation},
            survey::{NewSurvey, fixtures::sample_survey},
        },
        store::MemoryStore,
    };

    async fn seeded(access_type: AccessType) -> (ParticipationService, Arc<MemoryStore>, Survey) {
        let store = Arc::new(MemoryStore::new());
        let template = sample_survey();
        let survey = store
            .insert_survey(NewSurvey {
                slug_base: "canteen".into(),
                title: template.title,
                description: template.description,
                intro_text: None,
                consent_text: None,
                outro_text: None,
                access_type,
                attachment: None,
                questions: template.questions,
                created_by: None,
            })
            .await
            .unwrap();
        (ParticipationService::new(store.clone(), 1024), store, survey)
    }

    fn claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            name: Some(format!("User {}", sub)),
            role: "user".to_string(),
            exp: usize::MAX,
        }
    }

    #[tokio::test]
    async fn internal_surveys_need_a_signed_in_caller() {
        let (service, _, survey) = seeded(AccessType::Internal).await;
        assert!(matches!(
            service.start_by_slug(&survey.slug, None).await,
            Err(ParticipationError::AuthenticationRequired)
        ));

        let alice = claims("7");
        let first = service.start_by_slug(&survey.slug, Some(&alice)).await.unwrap();
        let again = service.start_by_slug(&survey.slug, Some(&alice)).await.unwrap();
        assert!(!first.resumed);
        assert!(again.resumed);
        assert_eq!(first.participation_id, again.participation_id);
    }

    #[tokio::test]
    async fn invitation_only_surveys_refuse_slug_access() {
        let (service, _, survey) = seeded(AccessType::InvitationOnly).await;
        assert!(matches!(
            service.start_by_slug(&survey.slug, Some(&claims("1"))).await,
            Err(ParticipationError::InvitationRequired)
        ));
    }

    #[tokio::test]
    async fn repeated_submissions_overwrite() {
        let (service, store, survey) = seeded(AccessType::Public).await;
        let started = service.start_by_slug(&survey.slug, None).await.unwrap();
        let id = started.participation_id;

        service.submit_answer(id, &SubmitAnswerRequest::options(10, &[11])).await.unwrap();
        service.submit_answer(id, &SubmitAnswerRequest::options(10, &[12])).await.unwrap();

        let answers = store.answers_for_participation(id).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].payload.option_ids(), Some(&[12][..]));
    }

    #[tokio::test]
    async fn skipped_and_rejected_answers_store_nothing() {
        let (service, store, survey) = seeded(AccessType::Public).await;
        let id = service.start_by_slug(&survey.slug, None).await.unwrap().participation_id;

        let outcome = service.submit_answer(id, &SubmitAnswerRequest::text(40, "")).await.unwrap();
        assert!(outcome.skipped);

        let explained_later = SubmitAnswerRequest::matrix(
            50,
            vec![MatrixAnswerItem {
                option_id: 51,
                scale_value: Some(1),
                explanation: None,
            }],
        );
        assert!(service.submit_answer(id, &explained_later).await.is_err());
        assert!(service.submit_answer(id, &SubmitAnswerRequest::empty(10)).await.is_err());
        assert!(store.answers_for_participation(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_is_terminal() {
        let (service, _, survey) = seeded(AccessType::Internal).await;
        let alice = claims("3");
        let id = service.start_by_slug(&survey.slug, Some(&alice)).await.unwrap().participation_id;

        let done = service.complete(id).await.unwrap();
        let first_at = done.completed_at.unwrap();

        match service.complete(id).await {
            Err(ParticipationError::AlreadyCompleted { completed_at }) => assert_eq!(completed_at, first_at),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            service.submit_answer(id, &SubmitAnswerRequest::options(10, &[11])).await,
            Err(ParticipationError::AlreadyCompleted { .. })
        ));
        assert!(matches!(
            service.start_by_slug(&survey.slug, Some(&alice)).await,
            Err(ParticipationError::AlreadyCompleted { .. })
        ));
        assert_eq!(
            service.participation_state(id).await.unwrap(),
            ParticipationState::Completed
        );
    }

    #[tokio::test]
    async fn invitations_supply_identity_and_track_progress() {
        let (service, store, survey) = seeded(AccessType::InvitationOnly).await;
        let invitation = store
            .create_invitation(NewInvitation {
                survey_id: survey.id,
                token: "tok123".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: None,
                phone: None,
                delivery_method: DeliveryMethod::Email,
            })
            .await
            .unwrap();

        let view = service.open_invitation("tok123").await.unwrap();
        assert!(!view.has_participated);

        let first = service.start_by_token("tok123").await.unwrap();
        let second = service.start_by_token("tok123").await.unwrap();
        assert_eq!(first.participation_id, second.participation_id);

        let participation = store.participation(first.participation_id).await.unwrap().unwrap();
        assert_eq!(participation.participant_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(participation.invitation_id, Some(invitation.id));

        service.complete(first.participation_id).await.unwrap();
        let stored = store.invitation_by_token("tok123").await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Completed);
        assert_eq!(stored.participation_id, Some(first.participation_id));
        assert!(stored.completed_at.is_some());

        store
            .update_invitation(invitation.id, InvitationStatus::Cancelled, None)
            .await
            .unwrap();
        assert!(matches!(
            service.start_by_token("tok123").await,
            Err(ParticipationError::InvitationCancelled)
        ));
    }
}
