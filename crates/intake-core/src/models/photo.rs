//! Photo intake sections

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::ids::{PhotoSectionId, PhotoSlotId, QuestionId};
use super::media::MediaId;

/// A photo slot as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhotoSlot {
    /// Layout slot the photo fills
    pub slot_id: i64,
    /// Previously uploaded media to claim
    pub photo_id: MediaId,
    pub name: String,
}

/// A named set of photos answering a photo question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhotoSection {
    pub name: String,
    #[serde(default)]
    pub photos: Vec<NewPhotoSlot>,
}

impl NewPhotoSection {
    pub fn new(name: impl Into<String>, photos: Vec<NewPhotoSlot>) -> Self {
        Self {
            name: name.into(),
            photos,
        }
    }

    /// Each media object may fill at most one slot of a submission.
    pub fn validate_all(sections: &[Self]) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for slot in sections.iter().flat_map(|section| &section.photos) {
            if !seen.insert(slot.photo_id) {
                return Err(Error::InvalidInput(format!(
                    "photo {} is used in more than one slot",
                    slot.photo_id
                )));
            }
        }
        Ok(())
    }
}

/// Stored photo section with its slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoIntakeSection {
    pub id: PhotoSectionId,
    pub question_id: QuestionId,
    pub question_type: String,
    pub name: String,
    pub photos: Vec<PhotoIntakeSlot>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

/// Stored photo slot referencing claimed media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoIntakeSlot {
    pub id: PhotoSlotId,
    pub slot_id: i64,
    pub photo_id: MediaId,
    pub name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}
