// src/store/mod.rs

//! Persistence collaborator. Everything the core reads or writes goes through
//! [`SurveyStore`]; Postgres and an in-memory map implement it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    answer::{NewAnswer, StoredAnswer},
    attachment::{AttachmentRef, DecodedAttachment},
    invitation::{Invitation, InvitationStatus, NewInvitation},
    participation::{Completion, NewParticipation, Participation, StartedParticipation},
    survey::{NewSurvey, Survey},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored data could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The participation reached Completed before the write could happen.
    #[error("participation was completed at {completed_at}")]
    ParticipationClosed {
        completed_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("participation {0} does not exist")]
    ParticipationMissing(Uuid),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Persists a validated survey. The store assigns the id and appends it to the slug.
    async fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, StoreError>;

    async fn survey(&self, id: i64) -> Result<Option<Survey>, StoreError>;

    async fn survey_by_slug(&self, slug: &str) -> Result<Option<Survey>, StoreError>;

    /// Opens or closes a survey for new participations and answers.
    async fn set_survey_active(&self, id: i64, is_active: bool) -> Result<Option<Survey>, StoreError>;

    /// All surveys, newest first.
    async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError>;

    async fn save_attachment(&self, attachment: DecodedAttachment) -> Result<AttachmentRef, StoreError>;

    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation, StoreError>;

    async fn invitation(&self, id: i64) -> Result<Option<Invitation>, StoreError>;

    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError>;

    async fn list_invitations(&self, survey_id: i64) -> Result<Vec<Invitation>, StoreError>;

    /// Sets the status and, when given, links the participation.
    /// `Completed` also stamps the invitation's completion time.
    async fn update_invitation(
        &self,
        id: i64,
        status: InvitationStatus,
        participation_id: Option<Uuid>,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Atomic insert-or-get keyed by (survey, participant key).
    async fn start_participation(
        &self,
        participation: NewParticipation,
    ) -> Result<StartedParticipation, StoreError>;

    async fn participation(&self, id: Uuid) -> Result<Option<Participation>, StoreError>;

    async fn find_participation(
        &self,
        survey_id: i64,
        participant_key: &str,
    ) -> Result<Option<Participation>, StoreError>;

    async fn list_participations(&self, survey_id: i64) -> Result<Vec<Participation>, StoreError>;

    /// Stamps `completed_at` unless it is already set.
    async fn complete_participation(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Completion, StoreError>;

    /// Inserts or replaces the answers keyed by (participation, question) in one step.
    /// Refuses with [`StoreError::ParticipationClosed`] once the participation is completed.
    async fn upsert_answers(
        &self,
        participation_id: Uuid,
        answers: Vec<NewAnswer>,
    ) -> Result<Vec<StoredAnswer>, StoreError>;

    async fn answers_for_participation(
        &self,
        participation_id: Uuid,
    ) -> Result<Vec<StoredAnswer>, StoreError>;

    async fn answers_for_survey(
        &self,
        survey_id: i64,
        completed_only: bool,
    ) -> Result<Vec<StoredAnswer>, StoreError>;
}
