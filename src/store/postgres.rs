// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row, types::Json};
use uuid::Uuid;

use crate::{
    models::{
        answer::{AnswerPayload, NewAnswer, StoredAnswer},
        attachment::{AttachmentRef, DecodedAttachment},
        invitation::{Invitation, InvitationStatus, NewInvitation},
        participation::{Completion, NewParticipation, Participation, StartedParticipation},
        survey::{NewSurvey, Question, Survey},
    },
    store::{StoreError, SurveyStore},
    utils::slug::survey_slug,
};

const SURVEY_COLUMNS: &str = "id, slug, title, description, intro_text, consent_text, outro_text, \
     access_type, is_active, attachment, questions, created_by, created_at";

const INVITATION_COLUMNS: &str = "id, survey_id, token, first_name, last_name, email, phone, \
     delivery_method, status, participation_id, created_at, completed_at";

const PARTICIPATION_COLUMNS: &str =
    "id, survey_id, participant_key, participant_name, invitation_id, started_at, completed_at";

/// Helper row for the `surveys` table; enums travel as TEXT.
#[derive(FromRow)]
struct SurveyRow {
    id: i64,
    slug: String,
    title: String,
    description: String,
    intro_text: Option<String>,
    consent_text: Option<String>,
    outro_text: Option<String>,
    access_type: String,
    is_active: bool,
    attachment: Option<Json<AttachmentRef>>,
    questions: Json<Vec<Question>>,
    created_by: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<SurveyRow> for Survey {
    type Error = StoreError;

    fn try_from(row: SurveyRow) -> Result<Self, Self::Error> {
        Ok(Survey {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            intro_text: row.intro_text,
            consent_text: row.consent_text,
            outro_text: row.outro_text,
            access_type: row.access_type.parse().map_err(StoreError::Corrupt)?,
            is_active: row.is_active,
            attachment: row.attachment.map(|Json(a)| a),
            questions: row.questions.0,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct InvitationRow {
    id: i64,
    survey_id: i64,
    token: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    delivery_method: String,
    status: String,
    participation_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: row.id,
            survey_id: row.survey_id,
            token: row.token,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            delivery_method: row.delivery_method.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            participation_id: row.participation_id,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: i64,
    participation_id: Uuid,
    question_id: i64,
    payload: Json<AnswerPayload>,
    submitted_at: chrono::DateTime<chrono::Utc>,
}

impl From<AnswerRow> for StoredAnswer {
    fn from(row: AnswerRow) -> Self {
        StoredAnswer {
            id: row.id,
            participation_id: row.participation_id,
            question_id: row.question_id,
            payload: row.payload.0,
            submitted_at: row.submitted_at,
        }
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl SurveyStore for PgStore {
    async fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, StoreError> {
        // The slug carries the id, so reserve it first.
        let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('surveys', 'id'))")
            .fetch_one(&self.pool)
            .await?;

        let row: SurveyRow = sqlx::query_as(&format!(
            "INSERT INTO surveys (id, slug, title, description, intro_text, consent_text, outro_text, \
             access_type, attachment, questions, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {SURVEY_COLUMNS}"
        ))
        .bind(id)
        .bind(survey_slug(&survey.slug_base, id))
        .bind(&survey.title)
        .bind(&survey.description)
        .bind(&survey.intro_text)
        .bind(&survey.consent_text)
        .bind(&survey.outro_text)
        .bind(survey.access_type.as_str())
        .bind(survey.attachment.map(Json))
        .bind(Json(&survey.questions))
        .bind(&survey.created_by)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn survey(&self, id: i64) -> Result<Option<Survey>, StoreError> {
        let row: Option<SurveyRow> =
            sqlx::query_as(&format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Survey::try_from).transpose()
    }

    async fn set_survey_active(&self, id: i64, is_active: bool) -> Result<Option<Survey>, StoreError> {
        let row: Option<SurveyRow> = sqlx::query_as(&format!(
            "UPDATE surveys SET is_active = $2 WHERE id = $1 RETURNING {SURVEY_COLUMNS}"
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Survey::try_from).transpose()
    }

    async fn survey_by_slug(&self, slug: &str) -> Result<Option<Survey>, StoreError> {
        let row: Option<SurveyRow> =
            sqlx::query_as(&format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE slug = $1"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Survey::try_from).transpose()
    }

    async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError> {
        let rows: Vec<SurveyRow> = sqlx::query_as(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Survey::try_from).collect()
    }

    async fn save_attachment(&self, attachment: DecodedAttachment) -> Result<AttachmentRef, StoreError> {
        let size_bytes = attachment.bytes.len() as i64;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO attachments (file_name, content_type, size_bytes, content) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&attachment.file_name)
        .bind(&attachment.content_type)
        .bind(size_bytes)
        .bind(&attachment.bytes)
        .fetch_one(&self.pool)
        .await?;

        Ok(AttachmentRef {
            attachment_id: id,
            file_name: attachment.file_name,
            content_type: attachment.content_type,
            size_bytes,
        })
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation, StoreError> {
        let row: InvitationRow = sqlx::query_as(&format!(
            "INSERT INTO invitations (survey_id, token, first_name, last_name, email, phone, delivery_method, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation.survey_id)
        .bind(&invitation.token)
        .bind(&invitation.first_name)
        .bind(&invitation.last_name)
        .bind(&invitation.email)
        .bind(&invitation.phone)
        .bind(invitation.delivery_method.as_str())
        .bind(InvitationStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn invitation(&self, id: i64) -> Result<Option<Invitation>, StoreError> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invitation::try_from).transpose()
    }

    async fn invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invitation::try_from).transpose()
    }

    async fn list_invitations(&self, survey_id: i64) -> Result<Vec<Invitation>, StoreError> {
        let rows: Vec<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE survey_id = $1 ORDER BY id"
        ))
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Invitation::try_from).collect()
    }

    async fn update_invitation(
        &self,
        id: i64,
        status: InvitationStatus,
        participation_id: Option<Uuid>,
    ) -> Result<Option<Invitation>, StoreError> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            "UPDATE invitations SET \
                 status = $2, \
                 participation_id = COALESCE($3, participation_id), \
                 completed_at = CASE WHEN $2 = 'Completed' THEN COALESCE(completed_at, NOW()) ELSE completed_at END \
             WHERE id = $1 \
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(participation_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invitation::try_from).transpose()
    }

    async fn start_participation(
        &self,
        participation: NewParticipation,
    ) -> Result<StartedParticipation, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict;
        // xmax = 0 only holds for freshly inserted tuples.
        let row = sqlx::query(&format!(
            "INSERT INTO participations (id, survey_id, participant_key, participant_name, invitation_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (survey_id, participant_key) \
             DO UPDATE SET participant_key = EXCLUDED.participant_key \
             RETURNING {PARTICIPATION_COLUMNS}, (xmax = 0) AS created"
        ))
        .bind(Uuid::new_v4())
        .bind(participation.survey_id)
        .bind(&participation.participant_key)
        .bind(&participation.participant_name)
        .bind(participation.invitation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(StartedParticipation {
            participation: Participation::from_row(&row)?,
            created: row.try_get("created")?,
        })
    }

    async fn participation(&self, id: Uuid) -> Result<Option<Participation>, StoreError> {
        let participation = sqlx::query_as(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participation)
    }

    async fn find_participation(
        &self,
        survey_id: i64,
        participant_key: &str,
    ) -> Result<Option<Participation>, StoreError> {
        let participation = sqlx::query_as(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE survey_id = $1 AND participant_key = $2"
        ))
        .bind(survey_id)
        .bind(participant_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participation)
    }

    async fn list_participations(&self, survey_id: i64) -> Result<Vec<Participation>, StoreError> {
        let participations = sqlx::query_as(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE survey_id = $1 ORDER BY started_at"
        ))
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participations)
    }

    async fn complete_participation(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Completion, StoreError> {
        let completed: Option<Participation> = sqlx::query_as(&format!(
            "UPDATE participations SET completed_at = $2 \
             WHERE id = $1 AND completed_at IS NULL \
             RETURNING {PARTICIPATION_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(participation) = completed {
            return Ok(Completion::Completed(participation));
        }
        Ok(match self.participation(id).await? {
            Some(existing) => Completion::AlreadyCompleted(existing),
            None => Completion::NotFound,
        })
    }

    async fn upsert_answers(
        &self,
        participation_id: Uuid,
        answers: Vec<NewAnswer>,
    ) -> Result<Vec<StoredAnswer>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises against a concurrent complete.
        let state: Option<(Option<chrono::DateTime<chrono::Utc>>,)> =
            sqlx::query_as("SELECT completed_at FROM participations WHERE id = $1 FOR UPDATE")
                .bind(participation_id)
                .fetch_optional(&mut *tx)
                .await?;
        match state {
            None => return Err(StoreError::ParticipationMissing(participation_id)),
            Some((Some(completed_at),)) => return Err(StoreError::ParticipationClosed { completed_at }),
            Some((None,)) => {}
        }

        let mut stored = Vec::with_capacity(answers.len());
        for answer in answers {
            let row: AnswerRow = sqlx::query_as(
                "INSERT INTO answers (participation_id, question_id, payload, submitted_at) \
                 VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (participation_id, question_id) \
                 DO UPDATE SET payload = EXCLUDED.payload, submitted_at = EXCLUDED.submitted_at \
                 RETURNING id, participation_id, question_id, payload, submitted_at",
            )
            .bind(participation_id)
            .bind(answer.question_id)
            .bind(Json(&answer.payload))
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row.into());
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn answers_for_participation(
        &self,
        participation_id: Uuid,
    ) -> Result<Vec<StoredAnswer>, StoreError> {
        let rows: Vec<AnswerRow> = sqlx::query_as(
            "SELECT id, participation_id, question_id, payload, submitted_at \
             FROM answers WHERE participation_id = $1 ORDER BY id",
        )
        .bind(participation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredAnswer::from).collect())
    }

    async fn answers_for_survey(
        &self,
        survey_id: i64,
        completed_only: bool,
    ) -> Result<Vec<StoredAnswer>, StoreError> {
        let rows: Vec<AnswerRow> = sqlx::query_as(
            "SELECT a.id, a.participation_id, a.question_id, a.payload, a.submitted_at \
             FROM answers a \
             JOIN participations p ON p.id = a.participation_id \
             WHERE p.survey_id = $1 AND ($2 = FALSE OR p.completed_at IS NOT NULL) \
             ORDER BY a.id",
        )
        .bind(survey_id)
        .bind(completed_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredAnswer::from).collect())
    }
}
