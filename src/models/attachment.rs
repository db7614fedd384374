// src/models/attachment.rs

use base64::Engine;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Raw upload as sent by clients: the file travels base64-encoded inside JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub base64_content: String,
}

/// Reference to a blob held by the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub attachment_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// An upload after base64 decoding and size checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment content is not valid base64")]
    InvalidEncoding,

    #[error("attachment is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("attachment has no file name")]
    MissingFileName,

    #[error("content type '{0}' is not allowed for this question")]
    ContentTypeNotAllowed(String),
}

impl AttachmentUpload {
    /// `{}` and `{ base64Content: "" }` both count as "no file".
    pub fn has_content(&self) -> bool {
        !self.base64_content.trim().is_empty()
    }

    pub fn decode(&self, max_bytes: usize) -> Result<DecodedAttachment, AttachmentError> {
        if self.file_name.trim().is_empty() {
            return Err(AttachmentError::MissingFileName);
        }

        // Tolerate data URLs ("data:image/png;base64,....").
        let encoded = match self.base64_content.split_once(";base64,") {
            Some((_, data)) => data,
            None => self.base64_content.as_str(),
        };

        // Cheap upper bound before allocating.
        let estimated = encoded.len() / 4 * 3;
        if estimated > max_bytes + 3 {
            return Err(AttachmentError::TooLarge {
                size: estimated,
                limit: max_bytes,
            });
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| AttachmentError::InvalidEncoding)?;

        if bytes.len() > max_bytes {
            return Err(AttachmentError::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let content_type = if self.content_type.trim().is_empty() {
            "application/octet-stream".to_string()
        } else {
            self.content_type.trim().to_ascii_lowercase()
        };

        Ok(DecodedAttachment {
            file_name: self.file_name.trim().to_string(),
            content_type,
            bytes,
        })
    }
}

/// Matches a content type against an allow-list that may contain `type/*` wildcards.
/// An empty list allows everything.
pub fn content_type_allowed(content_type: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let content_type = content_type.to_ascii_lowercase();
    allowed.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        match pattern.strip_suffix("/*") {
            Some(prefix) => content_type
                .split_once('/')
                .is_some_and(|(major, _)| major == prefix),
            None => pattern == content_type,
        }
    })
}
