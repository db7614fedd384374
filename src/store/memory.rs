// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        answer::{NewAnswer, StoredAnswer},
        attachment::{AttachmentRef, DecodedAttachment},
        invitation::{Invitation, InvitationStatus, NewInvitation},
        participation::{Completion, NewParticipation, Participation, StartedParticipation},
        survey::{NewSurvey, Survey},
    },
    store::{StoreError, SurveyStore},
    utils::slug::survey_slug,
};

#[derive(Default)]
struct Tables {
    surveys: Vec<Survey>,
    attachments: HashMap<i64, DecodedAttachment>,
    invitations: Vec<Invitation>,
    participations: Vec<Participation>,
    answers: Vec<StoredAnswer>,
    next_survey_id: i64,
    next_attachment_id: i64,
    next_invitation_id: i64,
    next_answer_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Process-local store used when no database is configured, and by tests.
/// A single lock makes every trait method atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, StoreError> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.next_survey_id);
        let stored = Survey {
            id,
            slug: survey_slug(&survey.slug_base, id),
            title: survey.title,
            description: survey.description,
            intro_text: survey.intro_text,
            consent_text: survey.consent_text,
            outro_text: survey.outro_text,
            access_type: survey.access_type,
            is_active: true,
            attachment: survey.attachment,
            questions: survey.questions,
            created_by: survey.created_by,
            created_at: chrono::Utc::now(),
        };
        tables.surveys.push(stored.clone());
        Ok(stored)
    }

    async fn survey(&self, id: i64) -> Result<Option<Survey>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.surveys.iter().find(|s| s.id == id).cloned())
    }

    async fn survey_by_slug(&self, slug: &str) -> Result<Option<Survey>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.surveys.iter().find(|s| s.slug == slug).cloned())
    }

    async fn set_survey_active(&self, id: i64, is_active: bool) -> Result<Option<Survey>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(survey) = tables.surveys.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        survey.is_active = is_active;
        Ok(Some(survey.clone()))
    }

    async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.surveys.iter().rev().cloned().collect())
    }

    async fn save_attachment(&self, attachment: DecodedAttachment) -> Result<AttachmentRef, StoreError> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.next_attachment_id);
        let reference = AttachmentRef {
            attachment_id: id,
            file_name: attachment.file_name.clone(),
            content_type: attachment.content_type.clone(),
            size_bytes: attachment.bytes.len() as i64,
        };
        tables.attachments.insert(id, attachment);
        Ok(reference)
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation, StoreError> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.next_invitation_id);
        let stored = Invitation {
            id,
            survey_id: invitation.survey_id,
            token: invitation.token,
            first_name: invitation.first_name,
            last_name: invitation.last_name,
            email: invitation.email,
            phone: invitation.phone,
            delivery_method: invitation.delivery_method,
            status: InvitationStatus::Pending,
            participation_id: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        };
        tables.invitations.push(stored.clone());
        Ok(stored)
    }

    async fn invitation(&self, id: i64) -> Result<Option<Invitation>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.invitations.iter().find(|i| i.id == id).cloned())
    }

    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.invitations.iter().find(|i| i.token == token).cloned())
    }

    async fn list_invitations(&self, survey_id: i64) -> Result<Vec<Invitation>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invitations
            .iter()
            .filter(|i| i.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn update_invitation(
        &self,
        id: i64,
        status: InvitationStatus,
        participation_id: Option<Uuid>,
    ) -> Result<Option<Invitation>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(invitation) = tables.invitations.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        invitation.status = status;
        if participation_id.is_some() {
            invitation.participation_id = participation_id;
        }
        if status == InvitationStatus::Completed && invitation.completed_at.is_none() {
            invitation.completed_at = Some(chrono::Utc::now());
        }
        Ok(Some(invitation.clone()))
    }

    async fn start_participation(
        &self,
        participation: NewParticipation,
    ) -> Result<StartedParticipation, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.participations.iter().find(|p| {
            p.survey_id == participation.survey_id && p.participant_key == participation.participant_key
        }) {
            return Ok(StartedParticipation {
                participation: existing.clone(),
                created: false,
            });
        }

        let created = Participation {
            id: Uuid::new_v4(),
            survey_id: participation.survey_id,
            participant_key: participation.participant_key,
            participant_name: participation.participant_name,
            invitation_id: participation.invitation_id,
            started_at: chrono::Utc::now(),
            completed_at: None,
        };
        tables.participations.push(created.clone());
        Ok(StartedParticipation {
            participation: created,
            created: true,
        })
    }

    async fn participation(&self, id: Uuid) -> Result<Option<Participation>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.participations.iter().find(|p| p.id == id).cloned())
    }

    async fn find_participation(
        &self,
        survey_id: i64,
        participant_key: &str,
    ) -> Result<Option<Participation>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participations
            .iter()
            .find(|p| p.survey_id == survey_id && p.participant_key == participant_key)
            .cloned())
    }

    async fn list_participations(&self, survey_id: i64) -> Result<Vec<Participation>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participations
            .iter()
            .filter(|p| p.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn complete_participation(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Completion, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(participation) = tables.participations.iter_mut().find(|p| p.id == id) else {
            return Ok(Completion::NotFound);
        };
        if participation.completed_at.is_some() {
            return Ok(Completion::AlreadyCompleted(participation.clone()));
        }
        participation.completed_at = Some(at);
        Ok(Completion::Completed(participation.clone()))
    }

    async fn upsert_answers(
        &self,
        participation_id: Uuid,
        answers: Vec<NewAnswer>,
    ) -> Result<Vec<StoredAnswer>, StoreError> {
        let mut tables = self.tables.lock().await;
        let participation = tables
            .participations
            .iter()
            .find(|p| p.id == participation_id)
            .ok_or(StoreError::ParticipationMissing(participation_id))?;
        if let Some(completed_at) = participation.completed_at {
            return Err(StoreError::ParticipationClosed { completed_at });
        }

        let now = chrono::Utc::now();
        let mut stored = Vec::with_capacity(answers.len());
        for answer in answers {
            let existing = tables
                .answers
                .iter()
                .position(|a| a.participation_id == participation_id && a.question_id == answer.question_id);
            let row = match existing {
                Some(index) => {
                    let row = &mut tables.answers[index];
                    row.payload = answer.payload;
                    row.submitted_at = now;
                    row.clone()
                }
                None => {
                    let row = StoredAnswer {
                        id: next(&mut tables.next_answer_id),
                        participation_id,
                        question_id: answer.question_id,
                        payload: answer.payload,
                        submitted_at: now,
                    };
                    tables.answers.push(row.clone());
                    row
                }
            };
            stored.push(row);
        }
        Ok(stored)
    }

    async fn answers_for_participation(
        &self,
        participation_id: Uuid,
    ) -> Result<Vec<StoredAnswer>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .answers
            .iter()
            .filter(|a| a.participation_id == participation_id)
            .cloned()
            .collect())
    }

    async fn answers_for_survey(
        &self,
        survey_id: i64,
        completed_only: bool,
    ) -> Result<Vec<StoredAnswer>, StoreError> {
        let tables = self.tables.lock().await;
        let included: Vec<Uuid> = tables
            .participations
            .iter()
            .filter(|p| p.survey_id == survey_id && (!completed_only || p.is_completed()))
            .map(|p| p.id)
            .collect();
        Ok(tables
            .answers
            .iter()
            .filter(|a| included.contains(&a.participation_id))
            .cloned()
            .collect())
    }
}
