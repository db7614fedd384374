// src/models/participation.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ParticipationState {
    NotStarted,
    InProgress,
    Completed,
}

/// One participant's attempt at a survey.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub id: Uuid,
    pub survey_id: i64,
    /// Stable identity the participation is keyed by (`user:..`, `invitation:..`, `anon:..`).
    #[serde(skip_serializing)]
    pub participant_key: String,
    pub participant_name: Option<String>,
    pub invitation_id: Option<i64>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Participation {
    pub fn state(&self) -> ParticipationState {
        match self.completed_at {
            Some(_) => ParticipationState::Completed,
            None => ParticipationState::InProgress,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Participation about to be created (or looked up if it already exists).
#[derive(Debug, Clone)]
pub struct NewParticipation {
    pub survey_id: i64,
    pub participant_key: String,
    pub participant_name: Option<String>,
    pub invitation_id: Option<i64>,
}

/// Outcome of the atomic insert-or-get.
#[derive(Debug, Clone)]
pub struct StartedParticipation {
    pub participation: Participation,
    pub created: bool,
}

/// Outcome of the conditional completion.
#[derive(Debug, Clone)]
pub enum Completion {
    Completed(Participation),
    AlreadyCompleted(Participation),
    NotFound,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartParticipationRequest {
    #[serde(alias = "Slug")]
    pub slug: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartParticipationResponse {
    pub participation_id: Uuid,
    pub state: ParticipationState,
    /// True when an in-progress participation was picked up again.
    pub resumed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationStatus {
    pub has_participated: bool,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ParticipationStatus {
    pub fn of(participation: Option<&Participation>) -> Self {
        Self {
            has_participated: participation.is_some(),
            is_completed: participation.is_some_and(Participation::is_completed),
            completed_at: participation.and_then(|p| p.completed_at),
        }
    }
}
