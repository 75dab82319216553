//! Question catalog repository

use crate::error::{Error, Result};
use crate::models::{PotentialAnswer, Question, QuestionId};
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for question catalog operations
pub trait QuestionRepository {
    /// Create a question, optionally nested under a parent question
    fn create_question(
        &self,
        tag: &str,
        question_type: &str,
        parent_question_id: Option<QuestionId>,
    ) -> Result<Question>;

    /// Add a selectable option to a question
    fn create_potential_answer(
        &self,
        question_id: QuestionId,
        answer_text: &str,
        answer_summary: Option<&str>,
    ) -> Result<PotentialAnswer>;

    /// Get a question by ID
    fn get_question(&self, id: QuestionId) -> Result<Option<Question>>;

    /// Get a question by tag
    fn question_by_tag(&self, tag: &str) -> Result<Option<Question>>;
}

/// `SQLite` implementation of `QuestionRepository`
pub struct SqliteQuestionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteQuestionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_question(row: &rusqlite::Row<'_>) -> rusqlite::Result<Question> {
        Ok(Question {
            id: row.get(0)?,
            tag: row.get(1)?,
            question_type: row.get(2)?,
            parent_question_id: row.get(3)?,
        })
    }
}

impl QuestionRepository for SqliteQuestionRepository<'_> {
    fn create_question(
        &self,
        tag: &str,
        question_type: &str,
        parent_question_id: Option<QuestionId>,
    ) -> Result<Question> {
        let tag = tag.trim();
        let question_type = question_type.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("Question tag cannot be empty".into()));
        }
        if question_type.is_empty() {
            return Err(Error::InvalidInput("Question type cannot be empty".into()));
        }
        if let Some(parent) = parent_question_id {
            if self.get_question(parent)?.is_none() {
                return Err(Error::NotFound(format!("question {parent}")));
            }
        }

        self.conn.execute(
            "INSERT INTO question (question_tag, question_type, parent_question_id) VALUES (?, ?, ?)",
            params![tag, question_type, parent_question_id],
        )?;

        Ok(Question {
            id: QuestionId::new(self.conn.last_insert_rowid()),
            tag: tag.to_string(),
            question_type: question_type.to_string(),
            parent_question_id,
        })
    }

    fn create_potential_answer(
        &self,
        question_id: QuestionId,
        answer_text: &str,
        answer_summary: Option<&str>,
    ) -> Result<PotentialAnswer> {
        if self.get_question(question_id)?.is_none() {
            return Err(Error::NotFound(format!("question {question_id}")));
        }

        self.conn.execute(
            "INSERT INTO potential_answer (question_id, answer_text, answer_summary_text) VALUES (?, ?, ?)",
            params![question_id, answer_text, answer_summary],
        )?;

        Ok(PotentialAnswer {
            id: self.conn.last_insert_rowid().into(),
            question_id,
            answer_text: answer_text.to_string(),
            answer_summary: answer_summary.map(str::to_string),
        })
    }

    fn get_question(&self, id: QuestionId) -> Result<Option<Question>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, question_tag, question_type, parent_question_id FROM question WHERE id = ?",
                params![id],
                Self::parse_question,
            )
            .optional()?)
    }

    fn question_by_tag(&self, tag: &str) -> Result<Option<Question>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, question_tag, question_type, parent_question_id FROM question WHERE question_tag = ?",
                params![tag.trim()],
                Self::parse_question,
            )
            .optional()?)
    }
}
