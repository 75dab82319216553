//! Uploaded media and ownership claims

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::ids::PhotoSectionId;

/// Claimer type recorded when a photo intake section takes ownership of media.
pub const CLAIMER_PHOTO_INTAKE_SECTION: &str = "patient_intake_photo_section";

/// A unique identifier for uploaded media, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(Uuid);

impl MediaId {
    /// Create a new unique media ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MediaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The record that owns a piece of media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimer {
    pub claimer_type: String,
    pub claimer_id: i64,
}

impl Claimer {
    pub fn photo_section(section_id: PhotoSectionId) -> Self {
        Self {
            claimer_type: CLAIMER_PHOTO_INTAKE_SECTION.to_string(),
            claimer_id: section_id.get(),
        }
    }
}

/// Media uploaded ahead of the record that will reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    /// Account that uploaded the media
    pub uploader_id: i64,
    /// Storage location of the object
    pub url: String,
    pub mime_type: String,
    /// Upload timestamp (Unix ms)
    pub uploaded_at: i64,
    /// Current owner, if claimed
    pub claimer: Option<Claimer>,
}

impl Media {
    /// Create unclaimed media metadata.
    pub fn new(uploader_id: i64, url: impl Into<String>, mime_type: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        let mime_type = mime_type.into().trim().to_string();

        if url.is_empty() {
            return Err(Error::InvalidInput("Media url cannot be empty".to_string()));
        }
        if mime_type.is_empty() {
            return Err(Error::InvalidInput(
                "Media mime_type cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: MediaId::new(),
            uploader_id,
            url,
            mime_type,
            uploaded_at: chrono::Utc::now().timestamp_millis(),
            claimer: None,
        })
    }
}
