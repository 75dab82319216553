//! Per-question client clocks
//!
//! The winning clock of every accepted write is kept in `intake_clock`, keyed
//! by answer table, question, role and context. It outlives the answer rows,
//! so a write that clears a question still blocks older writes afterwards.

use crate::error::Result;
use crate::models::{AnswerContext, LogicalClock, PatientVisit, QuestionId};
use rusqlite::{params, Statement};

/// Read the stored clock of one key; run inside the write transaction.
pub(crate) const SELECT_CLOCK: &str = "SELECT client_clock FROM intake_clock
     WHERE answer_table = ?1 AND question_id = ?2 AND role_id = ?3 AND context_id = ?4";

/// Insert or replace the clock of one key.
pub(crate) const UPSERT_CLOCK: &str = "INSERT INTO intake_clock (
        answer_table, question_id, role_id, context_id, client_clock, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (answer_table, question_id, role_id, context_id)
    DO UPDATE SET client_clock = excluded.client_clock, updated_at = excluded.updated_at";

/// Identifies the answers a single clock guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClockKey {
    pub table: &'static str,
    pub question_id: QuestionId,
    pub role_value: i64,
    pub context_value: i64,
}

impl ClockKey {
    pub(crate) const fn answers(context: &AnswerContext, question_id: QuestionId) -> Self {
        Self {
            table: context.schema().table,
            question_id,
            role_value: context.role_value(),
            context_value: context.context_value(),
        }
    }

    pub(crate) const fn photos(visit: PatientVisit, question_id: QuestionId) -> Self {
        Self {
            table: "photo_intake_section",
            question_id,
            role_value: visit.patient_id.get(),
            context_value: visit.visit_id.get(),
        }
    }
}

/// Run a prepared [`SELECT_CLOCK`] for `key`.
pub(crate) fn read_clock(stmt: &mut Statement<'_>, key: &ClockKey) -> Result<Option<LogicalClock>> {
    let mut rows = stmt.query(params![
        key.table,
        key.question_id,
        key.role_value,
        key.context_value
    ])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let raw: String = row.get(0)?;
    Ok(Some(raw.parse()?))
}

/// Run a prepared [`UPSERT_CLOCK`] for `key`.
pub(crate) fn write_clock(
    stmt: &mut Statement<'_>,
    key: &ClockKey,
    clock: &LogicalClock,
    updated_at: i64,
) -> Result<()> {
    stmt.execute(params![
        key.table,
        key.question_id,
        key.role_value,
        key.context_value,
        clock.to_string(),
        updated_at
    ])?;
    Ok(())
}
