//! Photo intake repository
//!
//! Photo answers are whole sections of slots, each slot pointing at uploaded
//! media. A write replaces every section of a question for a patient visit,
//! gated by the same client clock rule as text answers, and moves media
//! ownership from the old sections to the new ones.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::{
    accept, Claimer, LogicalClock, NewPhotoSection, PatientVisit, PhotoIntakeSection,
    PhotoIntakeSlot, PhotoSectionId, QuestionId, WriteOutcome, CLAIMER_PHOTO_INTAKE_SECTION,
};
use crate::util::{placeholders, unix_millis_now};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection};

use super::clock_store::{read_clock, write_clock, ClockKey, SELECT_CLOCK, UPSERT_CLOCK};
use super::connection::write_transaction;
use super::media_repository::{MediaRepository, SqliteMediaRepository};

/// Trait for photo intake storage operations
pub trait PhotoRepository {
    /// Replace the photo sections answering `question_id` in a patient visit
    ///
    /// Returns [`WriteOutcome::Stale`] without touching anything when the
    /// stored clock is not older than `clock`. Failing to claim any photo
    /// aborts the whole write.
    fn store_photo_sections(
        &self,
        question_id: QuestionId,
        visit: PatientVisit,
        clock: &LogicalClock,
        sections: &[NewPhotoSection],
    ) -> Result<WriteOutcome>;

    /// Load photo sections for the given questions in a patient visit
    fn load_photo_sections(
        &self,
        question_ids: &[QuestionId],
        visit: PatientVisit,
    ) -> Result<HashMap<QuestionId, Vec<PhotoIntakeSection>>>;
}

/// `SQLite` implementation of `PhotoRepository`
pub struct SqlitePhotoRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePhotoRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn stored_clock(conn: &Connection, key: &ClockKey) -> Result<Option<LogicalClock>> {
    let mut stmt = conn.prepare(SELECT_CLOCK)?;
    read_clock(&mut stmt, key)
}

fn save_clock(conn: &Connection, key: &ClockKey, clock: &LogicalClock, updated_at: i64) -> Result<()> {
    let mut stmt = conn.prepare(UPSERT_CLOCK)?;
    write_clock(&mut stmt, key, clock, updated_at)
}

fn section_ids(
    conn: &Connection,
    question_id: QuestionId,
    visit: PatientVisit,
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM photo_intake_section
         WHERE question_id = ? AND patient_visit_id = ? AND patient_id = ?",
    )?;
    let ids = stmt
        .query_map(
            params![question_id, visit.visit_id, visit.patient_id],
            |row| row.get(0),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

fn replace_sections(
    conn: &Connection,
    question_id: QuestionId,
    visit: PatientVisit,
    clock: &LogicalClock,
    sections: &[NewPhotoSection],
) -> Result<()> {
    let media = SqliteMediaRepository::new(conn);
    let created_at = unix_millis_now();

    let old_sections = section_ids(conn, question_id, visit)?;
    let released = media.release_claims(CLAIMER_PHOTO_INTAKE_SECTION, &old_sections)?;
    // Slots cascade with their sections
    conn.execute(
        "DELETE FROM photo_intake_section
         WHERE question_id = ? AND patient_visit_id = ? AND patient_id = ?",
        params![question_id, visit.visit_id, visit.patient_id],
    )?;
    tracing::debug!(
        "Removed {} photo sections of question {question_id}, released {released} photos",
        old_sections.len()
    );

    let clock = clock.to_string();
    let mut insert_section = conn.prepare(
        "INSERT INTO photo_intake_section (
            section_name, question_id, patient_id, patient_visit_id, client_clock, creation_date
        ) VALUES (?, ?, ?, ?, ?, ?)",
    )?;
    let mut insert_slot = conn.prepare(
        "INSERT INTO photo_intake_slot (
            photo_slot_id, photo_id, photo_slot_name, photo_intake_section_id, creation_date
        ) VALUES (?, ?, ?, ?, ?)",
    )?;

    for section in sections {
        let section_id = PhotoSectionId::new(insert_section.insert(params![
            section.name,
            question_id,
            visit.patient_id,
            visit.visit_id,
            clock,
            created_at
        ])?);
        let claimer = Claimer::photo_section(section_id);

        for slot in &section.photos {
            media.claim(&slot.photo_id, &claimer)?;
            insert_slot.execute(params![
                slot.slot_id,
                slot.photo_id.as_str(),
                slot.name,
                section_id,
                created_at
            ])?;
        }
    }

    Ok(())
}

/// One row of the section/slot join.
struct SectionRow {
    section: PhotoIntakeSection,
    slot: Option<PhotoIntakeSlot>,
    slot_claimed: bool,
}

fn parse_section_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SectionRow> {
    let section = PhotoIntakeSection {
        id: row.get(0)?,
        question_id: row.get(1)?,
        question_type: row.get(2)?,
        name: row.get(3)?,
        photos: Vec::new(),
        created_at: row.get(4)?,
    };

    let slot_row_id: Option<i64> = row.get(5)?;
    let slot = match slot_row_id {
        Some(id) => {
            let photo_id: String = row.get(7)?;
            Some(PhotoIntakeSlot {
                id: id.into(),
                slot_id: row.get(6)?,
                photo_id: photo_id.parse().map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(error))
                })?,
                name: row.get(8)?,
                created_at: row.get(9)?,
            })
        }
        None => None,
    };

    let claimer_type: Option<String> = row.get(10)?;
    let claimer_id: Option<i64> = row.get(11)?;
    let slot_claimed = claimer_type.as_deref() == Some(CLAIMER_PHOTO_INTAKE_SECTION)
        && claimer_id == Some(section.id.get());

    Ok(SectionRow {
        section,
        slot,
        slot_claimed,
    })
}

impl PhotoRepository for SqlitePhotoRepository<'_> {
    fn store_photo_sections(
        &self,
        question_id: QuestionId,
        visit: PatientVisit,
        clock: &LogicalClock,
        sections: &[NewPhotoSection],
    ) -> Result<WriteOutcome> {
        NewPhotoSection::validate_all(sections)?;

        let key = ClockKey::photos(visit, question_id);
        let tx = write_transaction(self.conn)?;
        if let Some(stored) =
            stored_clock(&tx, &key)?.filter(|stored| !accept(Some(stored), clock))
        {
            tracing::debug!(
                "Skipping stale photo write to question {question_id}: stored {stored}, incoming {clock}"
            );
            return Ok(WriteOutcome::Stale { stored });
        }

        save_clock(&tx, &key, clock, unix_millis_now())?;
        replace_sections(&tx, question_id, visit, clock, sections)?;
        tx.commit()?;

        tracing::debug!(
            "Stored {} photo sections for question {question_id} at {clock}",
            sections.len()
        );
        Ok(WriteOutcome::Applied)
    }

    fn load_photo_sections(
        &self,
        question_ids: &[QuestionId],
        visit: PatientVisit,
    ) -> Result<HashMap<QuestionId, Vec<PhotoIntakeSection>>> {
        if question_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT s.id, s.question_id, q.question_type, s.section_name, s.creation_date,
                sl.id, sl.photo_slot_id, sl.photo_id, sl.photo_slot_name, sl.creation_date,
                m.claimer_type, m.claimer_id
             FROM photo_intake_section AS s
             INNER JOIN question AS q ON q.id = s.question_id
             LEFT OUTER JOIN photo_intake_slot AS sl ON sl.photo_intake_section_id = s.id
             LEFT OUTER JOIN media AS m ON m.id = sl.photo_id
             WHERE s.question_id IN ({})
             AND s.patient_visit_id = ? AND s.patient_id = ?
             ORDER BY s.id, sl.id",
            placeholders(question_ids.len())
        );
        let values = question_ids
            .iter()
            .map(|id| Value::from(id.get()))
            .chain([
                Value::from(visit.visit_id.get()),
                Value::from(visit.patient_id.get()),
            ]);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), parse_section_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut sections: HashMap<QuestionId, Vec<PhotoIntakeSection>> = HashMap::new();
        for SectionRow {
            section,
            slot,
            slot_claimed,
        } in rows
        {
            let bucket = sections.entry(section.question_id).or_default();
            if bucket.last().is_none_or(|last| last.id != section.id) {
                bucket.push(section);
            }

            let Some(slot) = slot else {
                continue;
            };
            if !slot_claimed {
                tracing::warn!(
                    "Skipping photo {} in slot {}: not claimed by its section",
                    slot.photo_id,
                    slot.id
                );
                continue;
            }
            if let Some(section) = bucket.last_mut() {
                section.photos.push(slot);
            }
        }

        Ok(sections)
    }
}
