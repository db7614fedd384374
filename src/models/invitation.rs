// src/models/invitation.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{attachment::AttachmentRef, survey::Question};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DeliveryMethod {
    #[default]
    Email,
    Sms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum InvitationStatus {
    Pending,
    Sent,
    Viewed,
    Completed,
    Cancelled,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "Pending",
            InvitationStatus::Sent => "Sent",
            InvitationStatus::Viewed => "Viewed",
            InvitationStatus::Completed => "Completed",
            InvitationStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(InvitationStatus::Pending),
            "Sent" => Ok(InvitationStatus::Sent),
            "Viewed" => Ok(InvitationStatus::Viewed),
            "Completed" => Ok(InvitationStatus::Completed),
            "Cancelled" => Ok(InvitationStatus::Cancelled),
            other => Err(format!("unknown invitation status '{}'", other)),
        }
    }
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Email => "Email",
            DeliveryMethod::Sms => "Sms",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Email" => Ok(DeliveryMethod::Email),
            "Sms" => Ok(DeliveryMethod::Sms),
            other => Err(format!("unknown delivery method '{}'", other)),
        }
    }
}

/// Personal invitation to an `InvitationOnly` survey.
/// Supplies the participant identity instead of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: i64,
    pub survey_id: i64,
    pub token: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub status: InvitationStatus,
    pub participation_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Invitation {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// DTO for creating an invitation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub survey_id: i64,
    #[validate(length(min = 1, max = 100, message = "First name is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required."))]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub survey_id: i64,
    pub token: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub delivery_method: DeliveryMethod,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    #[serde(flatten)]
    pub invitation: Invitation,
    /// Participant link, when a public base URL is configured.
    pub invitation_url: Option<String>,
}

/// What an invitee sees when opening their link.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSurveyResponse {
    pub survey_id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub intro_text: Option<String>,
    pub consent_text: Option<String>,
    pub outro_text: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub has_participated: bool,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub participation_id: Option<Uuid>,
    pub attachment: Option<AttachmentRef>,
    pub questions: Vec<Question>,
}
