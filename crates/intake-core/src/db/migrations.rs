//! Database migrations

use crate::error::Result;
use crate::models::{AnswerSchema, ANSWER_SCHEMAS};
use rusqlite::Connection;

use super::connection::write_transaction;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
///
/// The version is read under the write lock, so concurrent openers of a
/// fresh file apply each migration once.
pub fn run(conn: &Connection) -> Result<()> {
    let tx = write_transaction(conn)?;
    let version = get_version(&tx)?;
    if version >= CURRENT_VERSION {
        return Ok(());
    }

    if version < 1 {
        migrate_v1(&tx)?;
    }
    if version < 2 {
        migrate_v2(&tx)?;
    }
    if version < 3 {
        migrate_v3(&tx)?;
    }
    tx.commit()?;

    tracing::info!("Migrated database from version {version} to {CURRENT_VERSION}");
    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// DDL for one answer table family.
///
/// Sub-answer rows reference their parent row, so deleting a parent also
/// removes its sub-answers.
fn answer_table_ddl(schema: &AnswerSchema) -> String {
    let AnswerSchema {
        table,
        role_column,
        context_column,
    } = schema;

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {role_column} INTEGER NOT NULL,
            {context_column} INTEGER NOT NULL,
            question_id INTEGER NOT NULL REFERENCES question(id),
            potential_answer_id INTEGER REFERENCES potential_answer(id),
            answer_text TEXT,
            layout_version_id INTEGER NOT NULL,
            client_clock TEXT,
            parent_question_id INTEGER REFERENCES question(id),
            parent_info_intake_id INTEGER REFERENCES {table}(id) ON DELETE CASCADE,
            answered_date INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_question
            ON {table}(question_id, {context_column}, {role_column});
        CREATE INDEX IF NOT EXISTS idx_{table}_parent_question
            ON {table}(parent_question_id, {context_column}, {role_column});
        CREATE INDEX IF NOT EXISTS idx_{table}_parent
            ON {table}(parent_info_intake_id);"
    )
}

/// Migration to version 1: question catalog and answer tables
fn migrate_v1(tx: &Connection) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS question (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_tag TEXT NOT NULL UNIQUE,
            question_type TEXT NOT NULL,
            parent_question_id INTEGER REFERENCES question(id)
        );
        CREATE TABLE IF NOT EXISTS potential_answer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id INTEGER NOT NULL REFERENCES question(id),
            answer_text TEXT NOT NULL,
            answer_summary_text TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_potential_answer_question ON potential_answer(question_id);",
    )?;

    for schema in &ANSWER_SCHEMAS {
        tx.execute_batch(&answer_table_ddl(schema))?;
    }
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_info_intake_history
            ON info_intake(patient_id, question_id, answered_date)",
        [],
    )?;
    tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    Ok(())
}

/// Migration to version 2: uploaded media and photo intake sections
fn migrate_v2(tx: &Connection) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS media (
            id TEXT PRIMARY KEY,
            uploader_id INTEGER NOT NULL,
            url TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL,
            claimer_type TEXT,
            claimer_id INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_media_claimer ON media(claimer_type, claimer_id);
        CREATE TABLE IF NOT EXISTS photo_intake_section (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            section_name TEXT NOT NULL,
            question_id INTEGER NOT NULL REFERENCES question(id),
            patient_id INTEGER NOT NULL,
            patient_visit_id INTEGER NOT NULL,
            client_clock TEXT,
            creation_date INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_photo_intake_section_question
            ON photo_intake_section(question_id, patient_visit_id, patient_id);
        CREATE TABLE IF NOT EXISTS photo_intake_slot (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            photo_slot_id INTEGER NOT NULL,
            photo_id TEXT NOT NULL REFERENCES media(id),
            photo_slot_name TEXT NOT NULL,
            photo_intake_section_id INTEGER NOT NULL
                REFERENCES photo_intake_section(id) ON DELETE CASCADE,
            creation_date INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_photo_intake_slot_section
            ON photo_intake_slot(photo_intake_section_id);
        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    Ok(())
}

/// Migration to version 3: per-question clocks, seeded from existing rows
fn migrate_v3(tx: &Connection) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS intake_clock (
            answer_table TEXT NOT NULL,
            question_id INTEGER NOT NULL,
            role_id INTEGER NOT NULL,
            context_id INTEGER NOT NULL,
            client_clock TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (answer_table, question_id, role_id, context_id)
        );",
    )?;

    for AnswerSchema {
        table,
        role_column,
        context_column,
    } in &ANSWER_SCHEMAS
    {
        tx.execute_batch(&format!(
            "INSERT OR IGNORE INTO intake_clock
             SELECT '{table}', question_id, {role_column}, {context_column},
                 client_clock, MAX(answered_date)
             FROM {table}
             WHERE parent_question_id IS NULL AND client_clock IS NOT NULL
             GROUP BY question_id, {role_column}, {context_column};"
        ))?;
    }
    tx.execute_batch(
        "INSERT OR IGNORE INTO intake_clock
         SELECT 'photo_intake_section', question_id, patient_id, patient_visit_id,
             client_clock, MAX(creation_date)
         FROM photo_intake_section
         WHERE client_clock IS NOT NULL
         GROUP BY question_id, patient_id, patient_visit_id;
         INSERT INTO schema_version (version) VALUES (3);",
    )?;
    Ok(())
}
