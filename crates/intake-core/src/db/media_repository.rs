//! Media repository: uploaded objects and their ownership claims

use crate::error::{Error, Result};
use crate::models::{Claimer, Media, MediaId};
use crate::util::placeholders;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

/// Trait for media storage operations
pub trait MediaRepository {
    /// Record an uploaded, still unclaimed media object
    fn register(&self, uploader_id: i64, url: &str, mime_type: &str) -> Result<Media>;

    /// Get media by ID
    fn get(&self, id: &MediaId) -> Result<Option<Media>>;

    /// Transfer ownership of unclaimed media to `claimer`
    ///
    /// Re-claiming by the current owner succeeds; media owned by anyone else,
    /// or missing media, fails with [`Error::MediaClaim`].
    fn claim(&self, id: &MediaId, claimer: &Claimer) -> Result<()>;

    /// Release every claim held by the given claimers, returning how many
    /// media objects became unclaimed
    fn release_claims(&self, claimer_type: &str, claimer_ids: &[i64]) -> Result<usize>;

    /// Check whether `claimer` currently owns the media
    fn has_claim(&self, id: &MediaId, claimer: &Claimer) -> Result<bool>;
}

/// `SQLite` implementation of `MediaRepository`
///
/// Works on a plain connection or on an open transaction.
pub struct SqliteMediaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMediaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<Media> {
        let id: String = row.get(0)?;
        let claimer_type: Option<String> = row.get(5)?;
        let claimer_id: Option<i64> = row.get(6)?;

        Ok(Media {
            id: id.parse().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(error))
            })?,
            uploader_id: row.get(1)?,
            url: row.get(2)?,
            mime_type: row.get(3)?,
            uploaded_at: row.get(4)?,
            claimer: claimer_type
                .zip(claimer_id)
                .map(|(claimer_type, claimer_id)| Claimer {
                    claimer_type,
                    claimer_id,
                }),
        })
    }
}

impl MediaRepository for SqliteMediaRepository<'_> {
    fn register(&self, uploader_id: i64, url: &str, mime_type: &str) -> Result<Media> {
        let media = Media::new(uploader_id, url, mime_type)?;

        self.conn.execute(
            "INSERT INTO media (id, uploader_id, url, mime_type, uploaded_at) VALUES (?, ?, ?, ?, ?)",
            params![
                media.id.as_str(),
                media.uploader_id,
                media.url,
                media.mime_type,
                media.uploaded_at
            ],
        )?;

        Ok(media)
    }

    fn get(&self, id: &MediaId) -> Result<Option<Media>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, uploader_id, url, mime_type, uploaded_at, claimer_type, claimer_id
                 FROM media WHERE id = ?",
                params![id.as_str()],
                Self::parse_media,
            )
            .optional()?)
    }

    fn claim(&self, id: &MediaId, claimer: &Claimer) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE media SET claimer_type = ?1, claimer_id = ?2
             WHERE id = ?3
             AND (claimer_type IS NULL OR (claimer_type = ?1 AND claimer_id = ?2))",
            params![claimer.claimer_type, claimer.claimer_id, id.as_str()],
        )?;
        if rows > 0 {
            return Ok(());
        }

        let reason = match self.get(id)? {
            None => "media not found".to_string(),
            Some(Media {
                claimer: Some(owner),
                ..
            }) => format!(
                "already claimed by {} {}",
                owner.claimer_type, owner.claimer_id
            ),
            Some(_) => "claim was not recorded".to_string(),
        };
        Err(Error::MediaClaim {
            media_id: id.to_string(),
            reason,
        })
    }

    fn release_claims(&self, claimer_type: &str, claimer_ids: &[i64]) -> Result<usize> {
        if claimer_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE media SET claimer_type = NULL, claimer_id = NULL
             WHERE claimer_type = ? AND claimer_id IN ({})",
            placeholders(claimer_ids.len())
        );
        let values = std::iter::once(rusqlite::types::Value::from(claimer_type.to_string()))
            .chain(claimer_ids.iter().map(|id| rusqlite::types::Value::from(*id)));
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    fn has_claim(&self, id: &MediaId, claimer: &Claimer) -> Result<bool> {
        Ok(self
            .get(id)?
            .and_then(|media| media.claimer)
            .is_some_and(|owner| &owner == claimer))
    }
}
