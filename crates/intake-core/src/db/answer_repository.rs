//! Intake answer repository
//!
//! Writes are clock-gated per question: inside one write transaction the
//! stored client clock of each question (kept in `intake_clock`, so it
//! survives an empty write) is read under the write lock and compared with
//! the submission's clock. Only a newer clock replaces the
//! stored answers (delete + insert); an older one is skipped without error.
//!
//! Reads fetch answers and sub-answers in a single flat query and rebuild
//! the two-level answer tree in memory.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::models::{
    accept, Answer, AnswerContext, AnswerId, AnswerSchema, IntakeSubmission, LogicalClock,
    NewAnswer, PatientId, QuestionId, QuestionOutcome, StoreReport, VisitId, WriteOutcome,
};
use crate::util::{placeholders, unix_millis_now};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Statement};

use super::clock_store::{read_clock, write_clock, ClockKey, SELECT_CLOCK, UPSERT_CLOCK};
use super::connection::write_transaction;

/// Trait for intake answer storage operations
pub trait AnswerRepository {
    /// Apply a batch of submissions atomically
    ///
    /// Each question is replaced only if the submission's clock is newer than
    /// the stored one. Any storage error rolls back the whole batch.
    fn store_answers(&self, batch: &[IntakeSubmission]) -> Result<StoreReport>;

    /// Load answers (with sub-answers) to the given questions in a context
    fn load_answers(
        &self,
        question_ids: &[QuestionId],
        context: &AnswerContext,
    ) -> Result<HashMap<QuestionId, Vec<Answer>>>;

    /// Load a patient's answers from their most recent visit before `before_ms`,
    /// resolved independently for each question tag
    fn load_previous_answers(
        &self,
        question_tags: &[String],
        patient_id: PatientId,
        before_ms: i64,
    ) -> Result<HashMap<String, Vec<Answer>>>;
}

/// `SQLite` implementation of `AnswerRepository`
pub struct SqliteAnswerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAnswerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

/// Statements used per question while writing one answer schema.
struct SchemaStatements<'conn> {
    delete_question: Statement<'conn>,
    insert_answer: Statement<'conn>,
}

impl<'conn> SchemaStatements<'conn> {
    fn prepare(conn: &'conn Connection, schema: &AnswerSchema) -> Result<Self> {
        let AnswerSchema {
            table,
            role_column,
            context_column,
        } = schema;
        tracing::debug!("Preparing answer statements for {table}");

        let delete_question = conn.prepare(&format!(
            "DELETE FROM {table}
             WHERE {context_column} = ?1 AND {role_column} = ?2
             AND (question_id = ?3 OR parent_question_id = ?3)"
        ))?;
        let insert_answer = conn.prepare(&format!(
            "INSERT INTO {table} (
                {role_column}, {context_column}, question_id, answer_text,
                layout_version_id, client_clock, potential_answer_id, answered_date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))?;

        Ok(Self {
            delete_question,
            insert_answer,
        })
    }

    fn delete_question(&mut self, question_id: QuestionId, context: &AnswerContext) -> Result<usize> {
        Ok(self.delete_question.execute(params![
            context.context_value(),
            context.role_value(),
            question_id
        ])?)
    }

    fn insert_answer(
        &mut self,
        context: &AnswerContext,
        answer: &NewAnswer,
        clock: &str,
        answered_date: i64,
    ) -> Result<AnswerId> {
        let id = self.insert_answer.insert(params![
            context.role_value(),
            context.context_value(),
            answer.question_id,
            answer.answer_text,
            answer.layout_version_id,
            clock,
            answer.potential_answer_id,
            answered_date
        ])?;
        Ok(AnswerId::new(id))
    }
}

/// Prepared statements owned by a single write transaction.
///
/// Clock statements are prepared up front, answer statements lazily once per
/// answer schema. All are finalized when the set is dropped, which happens
/// before the transaction commits or rolls back.
struct StatementSet<'conn> {
    conn: &'conn Connection,
    read_clock: Statement<'conn>,
    save_clock: Statement<'conn>,
    by_schema: HashMap<AnswerSchema, SchemaStatements<'conn>>,
}

impl<'conn> StatementSet<'conn> {
    fn new(conn: &'conn Connection) -> Result<Self> {
        Ok(Self {
            conn,
            read_clock: conn.prepare(SELECT_CLOCK)?,
            save_clock: conn.prepare(UPSERT_CLOCK)?,
            by_schema: HashMap::new(),
        })
    }

    /// Read the stored clock of a question; the caller holds the write lock.
    fn stored_clock(&mut self, key: &ClockKey) -> Result<Option<LogicalClock>> {
        read_clock(&mut self.read_clock, key)
    }

    fn save_clock(&mut self, key: &ClockKey, clock: &LogicalClock, updated_at: i64) -> Result<()> {
        write_clock(&mut self.save_clock, key, clock, updated_at)
    }

    fn for_schema(&mut self, schema: AnswerSchema) -> Result<&mut SchemaStatements<'conn>> {
        let conn = self.conn;
        match self.by_schema.entry(schema) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(SchemaStatements::prepare(conn, &schema)?)),
        }
    }
}

/// One question of one submission, in lock acquisition order.
struct WorkItem<'b> {
    submission: &'b IntakeSubmission,
    question_id: QuestionId,
    answers: &'b [NewAnswer],
}

impl WorkItem<'_> {
    fn lock_key(&self) -> (&'static str, i64, i64, QuestionId) {
        let context = &self.submission.context;
        (
            context.schema().table,
            context.context_value(),
            context.role_value(),
            self.question_id,
        )
    }
}

/// Flatten a batch into per-question work, sorted so that every batch takes
/// question locks in the same order. The sort is stable, so repeated writes
/// to one question keep their batch order.
fn lock_order(batch: &[IntakeSubmission]) -> Vec<WorkItem<'_>> {
    let mut items: Vec<WorkItem<'_>> = batch
        .iter()
        .flat_map(|submission| {
            submission
                .answers
                .iter()
                .map(move |(question_id, answers)| WorkItem {
                    submission,
                    question_id: *question_id,
                    answers,
                })
        })
        .collect();
    items.sort_by(|a, b| a.lock_key().cmp(&b.lock_key()));
    items
}

fn apply_batch(conn: &Connection, batch: &[IntakeSubmission]) -> Result<StoreReport> {
    let mut statements = StatementSet::new(conn)?;
    let answered_date = unix_millis_now();
    let mut report = StoreReport::default();

    for item in lock_order(batch) {
        let submission = item.submission;
        let context = &submission.context;
        let key = ClockKey::answers(context, item.question_id);

        let stored = statements.stored_clock(&key)?;
        if let Some(stored) = stored.filter(|stored| !accept(Some(stored), &submission.clock)) {
            tracing::debug!(
                "Skipping stale write to question {} in {context}: stored {stored}, incoming {}",
                item.question_id,
                submission.clock
            );
            report.outcomes.push(QuestionOutcome {
                context: *context,
                question_id: item.question_id,
                incoming: submission.clock.clone(),
                outcome: WriteOutcome::Stale { stored },
            });
            continue;
        }

        statements.save_clock(&key, &submission.clock, answered_date)?;
        let stmts = statements.for_schema(context.schema())?;
        stmts.delete_question(item.question_id, context)?;

        let clock = submission.clock.to_string();
        let mut parents = Vec::new();
        for answer in item.answers {
            let answer_id = stmts.insert_answer(context, answer, &clock, answered_date)?;
            if !answer.sub_answers.is_empty() {
                parents.push((answer_id, answer));
            }
        }
        for (parent_answer_id, answer) in parents {
            insert_sub_answers(
                conn,
                context,
                parent_answer_id,
                answer.question_id,
                &answer.sub_answers,
                answered_date,
            )?;
        }

        tracing::debug!(
            "Stored {} answers for question {} in {context} at {clock}",
            item.answers.len(),
            item.question_id
        );
        report.outcomes.push(QuestionOutcome {
            context: *context,
            question_id: item.question_id,
            incoming: submission.clock.clone(),
            outcome: WriteOutcome::Applied,
        });
    }

    Ok(report)
}

/// Insert all sub-answers of one parent answer in a single statement.
fn insert_sub_answers(
    conn: &Connection,
    context: &AnswerContext,
    parent_answer_id: AnswerId,
    parent_question_id: QuestionId,
    sub_answers: &[NewAnswer],
    answered_date: i64,
) -> Result<()> {
    const COLUMNS: usize = 9;
    if sub_answers.is_empty() {
        return Ok(());
    }

    let AnswerSchema {
        table,
        role_column,
        context_column,
    } = context.schema();
    let row = format!("({})", placeholders(COLUMNS));
    let sql = format!(
        "INSERT INTO {table} (
            {role_column}, {context_column}, parent_info_intake_id, parent_question_id,
            question_id, answer_text, layout_version_id, potential_answer_id, answered_date
        ) VALUES {}",
        vec![row; sub_answers.len()].join(", ")
    );

    let mut values = Vec::with_capacity(sub_answers.len() * COLUMNS);
    for answer in sub_answers {
        values.extend([
            Value::from(context.role_value()),
            Value::from(context.context_value()),
            Value::from(parent_answer_id.get()),
            Value::from(parent_question_id.get()),
            Value::from(answer.question_id.get()),
            Value::from(answer.answer_text.clone()),
            Value::from(answer.layout_version_id.get()),
            Value::from(answer.potential_answer_id.map(|id| id.get())),
            Value::from(answered_date),
        ]);
    }

    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

fn parse_answer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: row.get(0)?,
        question_id: row.get(1)?,
        question_type: row.get(2)?,
        potential_answer_id: row.get(3)?,
        potential_answer: row.get(4)?,
        answer_summary: row.get(5)?,
        answer_text: row.get(6)?,
        layout_version_id: row.get(7)?,
        parent_question_id: row.get(8)?,
        parent_answer_id: row.get(9)?,
        sub_answers: Vec::new(),
    })
}

/// Flat query over one answer table, scoped to a role and context.
fn query_answers(
    conn: &Connection,
    schema: &AnswerSchema,
    question_ids: &[QuestionId],
    role_value: i64,
    context_value: i64,
    before_ms: Option<i64>,
) -> Result<Vec<Answer>> {
    let AnswerSchema {
        table,
        role_column,
        context_column,
    } = schema;
    let ids = placeholders(question_ids.len());
    let cutoff = if before_ms.is_some() {
        "AND i.answered_date < ?"
    } else {
        ""
    };

    let sql = format!(
        "SELECT i.id, i.question_id, q.question_type, i.potential_answer_id,
            pa.answer_text, pa.answer_summary_text, i.answer_text,
            i.layout_version_id, i.parent_question_id, i.parent_info_intake_id
         FROM {table} AS i
         INNER JOIN question AS q ON q.id = i.question_id
         LEFT OUTER JOIN potential_answer AS pa ON pa.id = i.potential_answer_id
         WHERE (i.question_id IN ({ids}) OR i.parent_question_id IN ({ids}))
         AND i.{role_column} = ? AND i.{context_column} = ?
         {cutoff}
         ORDER BY i.id"
    );

    let values = question_ids
        .iter()
        .chain(question_ids)
        .map(|id| Value::from(id.get()))
        .chain([Value::from(role_value), Value::from(context_value)])
        .chain(before_ms.map(Value::from));

    let mut stmt = conn.prepare(&sql)?;
    let answers = stmt
        .query_map(params_from_iter(values), parse_answer)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(answers)
}

/// Rebuild answer trees from flat rows.
///
/// Pass one buckets top-level answers by question; pass two attaches each
/// sub-answer to the top-level answer it references. Sub-answers whose parent
/// is not among the rows are dropped.
pub fn assemble_answer_trees(rows: Vec<Answer>) -> HashMap<QuestionId, Vec<Answer>> {
    let (top_level, sub_answers): (Vec<Answer>, Vec<Answer>) =
        rows.into_iter().partition(|answer| !answer.is_sub_answer());

    let mut answers: HashMap<QuestionId, Vec<Answer>> = HashMap::new();
    let mut positions: HashMap<AnswerId, (QuestionId, usize)> = HashMap::new();
    for answer in top_level {
        let bucket = answers.entry(answer.question_id).or_default();
        positions.insert(answer.id, (answer.question_id, bucket.len()));
        bucket.push(answer);
    }

    for sub_answer in sub_answers {
        let parent = sub_answer
            .parent_answer_id
            .and_then(|parent_id| positions.get(&parent_id).copied())
            .filter(|(question_id, _)| Some(*question_id) == sub_answer.parent_question_id);

        match parent {
            Some((question_id, index)) => {
                if let Some(parent) = answers
                    .get_mut(&question_id)
                    .and_then(|bucket| bucket.get_mut(index))
                {
                    parent.sub_answers.push(sub_answer);
                }
            }
            None => tracing::warn!(
                "Dropping sub-answer {} of question {}: parent answer {:?} not loaded",
                sub_answer.id,
                sub_answer.question_id,
                sub_answer.parent_answer_id
            ),
        }
    }

    answers
}

impl AnswerRepository for SqliteAnswerRepository<'_> {
    fn store_answers(&self, batch: &[IntakeSubmission]) -> Result<StoreReport> {
        if batch.is_empty() {
            return Ok(StoreReport::default());
        }
        for submission in batch {
            submission.validate()?;
        }

        let tx = write_transaction(self.conn)?;
        // Dropping `tx` on error rolls the whole batch back
        let report = apply_batch(&tx, batch)?;
        tx.commit()?;

        tracing::debug!(
            "Committed intake batch: {} applied, {} stale",
            report.applied_count(),
            report.stale().count()
        );
        Ok(report)
    }

    fn load_answers(
        &self,
        question_ids: &[QuestionId],
        context: &AnswerContext,
    ) -> Result<HashMap<QuestionId, Vec<Answer>>> {
        if question_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = query_answers(
            self.conn,
            &context.schema(),
            question_ids,
            context.role_value(),
            context.context_value(),
            None,
        )?;
        Ok(assemble_answer_trees(rows))
    }

    fn load_previous_answers(
        &self,
        question_tags: &[String],
        patient_id: PatientId,
        before_ms: i64,
    ) -> Result<HashMap<String, Vec<Answer>>> {
        let tags: BTreeSet<&str> = question_tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect();

        let mut latest_stmt = self.conn.prepare(
            "SELECT i.question_id, i.patient_visit_id
             FROM info_intake AS i
             INNER JOIN question AS q ON q.id = i.question_id
             WHERE q.question_tag = ?
             AND i.patient_id = ?
             AND i.answered_date < ?
             AND i.parent_question_id IS NULL
             ORDER BY i.patient_visit_id DESC
             LIMIT 1",
        )?;

        let mut previous = HashMap::new();
        for tag in tags {
            let latest: Option<(QuestionId, VisitId)> = latest_stmt
                .query_row(params![tag, patient_id, before_ms], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;
            let Some((question_id, visit_id)) = latest else {
                continue;
            };

            let context = AnswerContext::Patient {
                patient_id,
                visit_id,
            };
            let rows = query_answers(
                self.conn,
                &context.schema(),
                &[question_id],
                context.role_value(),
                context.context_value(),
                Some(before_ms),
            )?;
            if let Some(answers) = assemble_answer_trees(rows).remove(&question_id) {
                previous.insert(tag.to_string(), answers);
            }
        }

        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, QuestionRepository, SqliteQuestionRepository};
    use crate::error::Error;
    use crate::models::{CaseId, DoctorId, LayoutVersionId, PotentialAnswerId, Question};
    use pretty_assertions::assert_eq;

    struct Fixture {
        db: Database,
        single: Question,
        yes: PotentialAnswerId,
        no: PotentialAnswerId,
        symptoms: Question,
        severity: Question,
        duration: Question,
    }

    const LAYOUT: LayoutVersionId = LayoutVersionId::new(1);

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let catalog = SqliteQuestionRepository::new(db.connection());

        let single = catalog
            .create_question("q_allergic_to_meds", "q_type_single_select", None)
            .unwrap();
        let yes = catalog
            .create_potential_answer(single.id, "Yes", Some("allergic"))
            .unwrap()
            .id;
        let no = catalog.create_potential_answer(single.id, "No", None).unwrap().id;
        let symptoms = catalog
            .create_question("q_symptoms", "q_type_autocomplete", None)
            .unwrap();
        let severity = catalog
            .create_question("q_symptom_severity", "q_type_segmented_control", Some(symptoms.id))
            .unwrap();
        let duration = catalog
            .create_question("q_symptom_duration", "q_type_free_text", Some(symptoms.id))
            .unwrap();

        Fixture {
            db,
            single,
            yes,
            no,
            symptoms,
            severity,
            duration,
        }
    }

    fn visit(patient: i64, visit: i64) -> AnswerContext {
        AnswerContext::Patient {
            patient_id: PatientId::new(patient),
            visit_id: VisitId::new(visit),
        }
    }

    fn text_submission(
        context: AnswerContext,
        session: &str,
        counter: u64,
        question_id: QuestionId,
        text: &str,
    ) -> IntakeSubmission {
        IntakeSubmission::new(context, LogicalClock::new(session, counter)).answer(
            question_id,
            vec![NewAnswer::text(question_id, LAYOUT, text)],
        )
    }

    fn stored_texts(
        repo: &SqliteAnswerRepository<'_>,
        question_id: QuestionId,
        context: &AnswerContext,
    ) -> Vec<String> {
        repo.load_answers(&[question_id], context)
            .unwrap()
            .remove(&question_id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|answer| answer.answer_text)
            .collect()
    }

    fn row_ids(db: &Database, table: &str) -> Vec<i64> {
        let mut stmt = db
            .connection()
            .prepare(&format!("SELECT id FROM {table} ORDER BY id"))
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_first_write_is_accepted() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        let report = repo
            .store_answers(&[IntakeSubmission::new(context, LogicalClock::new("s1", 1)).answer(
                fx.single.id,
                vec![NewAnswer::choice(fx.single.id, LAYOUT, fx.yes)],
            )])
            .unwrap();
        assert_eq!(report.applied_count(), 1);

        let answers = repo.load_answers(&[fx.single.id], &context).unwrap();
        let answer = &answers[&fx.single.id][0];
        assert_eq!(answer.potential_answer_id, Some(fx.yes));
        assert_eq!(answer.potential_answer.as_deref(), Some("Yes"));
        assert_eq!(answer.answer_summary.as_deref(), Some("allergic"));
        assert_eq!(answer.question_type, "q_type_single_select");
    }

    #[test]
    fn test_newer_session_wins_and_duplicate_retry_is_noop() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);
        let q1 = fx.single.id;

        repo.store_answers(&[text_submission(context, "s1", 1, q1, "Yes")])
            .unwrap();
        repo.store_answers(&[text_submission(context, "s2", 5, q1, "No")])
            .unwrap();
        let report = repo
            .store_answers(&[text_submission(context, "s1", 1, q1, "Yes")])
            .unwrap();

        assert_eq!(report.applied_count(), 0);
        let stale: Vec<_> = report.stale().collect();
        assert_eq!(
            stale[0].outcome,
            WriteOutcome::Stale {
                stored: LogicalClock::new("s2", 5)
            }
        );
        assert_eq!(stored_texts(&repo, q1, &context), vec!["No".to_string()]);
    }

    #[test]
    fn test_result_is_independent_of_arrival_order() {
        let older = |context| text_submission(context, "phone", 2, QuestionId::new(1), "older");
        let newer = |context| text_submission(context, "web", 3, QuestionId::new(1), "newer");

        for forward in [true, false] {
            let fx = setup();
            let repo = SqliteAnswerRepository::new(fx.db.connection());
            let context = visit(1, 1);
            assert_eq!(fx.single.id, QuestionId::new(1));

            if forward {
                repo.store_answers(&[older(context)]).unwrap();
                repo.store_answers(&[newer(context)]).unwrap();
            } else {
                repo.store_answers(&[newer(context)]).unwrap();
                repo.store_answers(&[older(context)]).unwrap();
            }

            assert_eq!(
                stored_texts(&repo, fx.single.id, &context),
                vec!["newer".to_string()]
            );
        }
    }

    #[test]
    fn test_stale_write_leaves_rows_untouched() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[text_submission(context, "s1", 9, fx.single.id, "kept")])
            .unwrap();
        let before = row_ids(&fx.db, "info_intake");

        let report = repo
            .store_answers(&[text_submission(context, "s1", 8, fx.single.id, "lost")])
            .unwrap();
        assert_eq!(report.stale().count(), 1);
        assert_eq!(row_ids(&fx.db, "info_intake"), before);
    }

    #[test]
    fn test_equal_clock_is_stale() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[text_submission(context, "s1", 4, fx.single.id, "first")])
            .unwrap();
        repo.store_answers(&[text_submission(context, "s1", 4, fx.single.id, "again")])
            .unwrap();
        assert_eq!(
            stored_texts(&repo, fx.single.id, &context),
            vec!["first".to_string()]
        );
    }

    #[test]
    fn test_sub_answers_are_attached_to_their_parent() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        let submission = IntakeSubmission::new(context, LogicalClock::new("s1", 1)).answer(
            fx.symptoms.id,
            vec![
                NewAnswer::text(fx.symptoms.id, LAYOUT, "Itching").with_sub_answers(vec![
                    NewAnswer::text(fx.severity.id, LAYOUT, "Mild"),
                    NewAnswer::text(fx.duration.id, LAYOUT, "2 weeks"),
                ]),
                NewAnswer::text(fx.symptoms.id, LAYOUT, "Redness")
                    .with_sub_answers(vec![NewAnswer::text(fx.severity.id, LAYOUT, "Severe")]),
            ],
        );
        repo.store_answers(&[submission]).unwrap();

        let answers = repo.load_answers(&[fx.symptoms.id], &context).unwrap();
        assert_eq!(answers.len(), 1);
        let symptoms = &answers[&fx.symptoms.id];
        assert_eq!(symptoms.len(), 2);

        let itching = &symptoms[0];
        assert_eq!(itching.answer_text.as_deref(), Some("Itching"));
        assert_eq!(itching.sub_answers.len(), 2);
        for sub in &itching.sub_answers {
            assert_eq!(sub.parent_answer_id, Some(itching.id));
            assert_eq!(sub.parent_question_id, Some(fx.symptoms.id));
        }
        assert_eq!(
            symptoms[1].sub_answers[0].answer_text.as_deref(),
            Some("Severe")
        );
    }

    #[test]
    fn test_superseded_sub_answers_do_not_survive() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[IntakeSubmission::new(context, LogicalClock::new("s1", 1)).answer(
            fx.symptoms.id,
            vec![NewAnswer::text(fx.symptoms.id, LAYOUT, "Itching").with_sub_answers(vec![
                NewAnswer::text(fx.severity.id, LAYOUT, "Mild"),
                NewAnswer::text(fx.duration.id, LAYOUT, "2 weeks"),
            ])],
        )])
        .unwrap();
        repo.store_answers(&[IntakeSubmission::new(context, LogicalClock::new("s1", 2)).answer(
            fx.symptoms.id,
            vec![NewAnswer::text(fx.symptoms.id, LAYOUT, "None")],
        )])
        .unwrap();

        let answers = repo.load_answers(&[fx.symptoms.id], &context).unwrap();
        assert_eq!(answers[&fx.symptoms.id].len(), 1);
        assert!(answers[&fx.symptoms.id][0].sub_answers.is_empty());
        assert_eq!(row_ids(&fx.db, "info_intake").len(), 1);
    }

    #[test]
    fn test_contexts_are_isolated() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let patient_visit = visit(1, 1);
        let other_visit = visit(1, 2);
        let diagnosis = AnswerContext::Diagnosis {
            doctor_id: DoctorId::new(1),
            visit_id: VisitId::new(1),
        };
        let case_review = AnswerContext::CaseReview {
            doctor_id: DoctorId::new(1),
            case_id: CaseId::new(1),
        };

        repo.store_answers(&[
            text_submission(patient_visit, "s1", 5, fx.single.id, "patient"),
            text_submission(diagnosis, "d1", 1, fx.single.id, "doctor"),
        ])
        .unwrap();

        assert_eq!(
            stored_texts(&repo, fx.single.id, &patient_visit),
            vec!["patient".to_string()]
        );
        assert_eq!(
            stored_texts(&repo, fx.single.id, &diagnosis),
            vec!["doctor".to_string()]
        );
        assert!(stored_texts(&repo, fx.single.id, &other_visit).is_empty());
        assert!(stored_texts(&repo, fx.single.id, &case_review).is_empty());

        // A low clock in another context is a first write there, not stale
        let report = repo
            .store_answers(&[text_submission(other_visit, "s1", 1, fx.single.id, "second visit")])
            .unwrap();
        assert_eq!(report.applied_count(), 1);
        assert_eq!(
            stored_texts(&repo, fx.single.id, &patient_visit),
            vec!["patient".to_string()]
        );
    }

    #[test]
    fn test_stale_question_does_not_block_siblings() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[text_submission(context, "s1", 10, fx.single.id, "fresh")])
            .unwrap();

        let submission = IntakeSubmission::new(context, LogicalClock::new("s1", 5))
            .answer(
                fx.single.id,
                vec![NewAnswer::choice(fx.single.id, LAYOUT, fx.no)],
            )
            .answer(
                fx.symptoms.id,
                vec![NewAnswer::text(fx.symptoms.id, LAYOUT, "Dryness")],
            );
        let report = repo.store_answers(&[submission]).unwrap();

        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.stale().next().unwrap().question_id, fx.single.id);
        assert_eq!(
            stored_texts(&repo, fx.single.id, &context),
            vec!["fresh".to_string()]
        );
        assert_eq!(
            stored_texts(&repo, fx.symptoms.id, &context),
            vec!["Dryness".to_string()]
        );
    }

    #[test]
    fn test_storage_failure_rolls_back_batch() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);
        let unknown = QuestionId::new(999);

        let result = repo.store_answers(&[
            text_submission(context, "s1", 1, fx.single.id, "would be stored"),
            text_submission(context, "s1", 1, unknown, "unknown question"),
        ]);

        assert!(matches!(result, Err(Error::Sqlite(_))));
        assert!(row_ids(&fx.db, "info_intake").is_empty());
    }

    #[test]
    fn test_invalid_stored_clock_aborts_batch() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[text_submission(context, "s1", 1, fx.single.id, "x")])
            .unwrap();
        fx.db
            .connection()
            .execute("UPDATE intake_clock SET client_clock = 'garbage'", [])
            .unwrap();

        let result = repo.store_answers(&[text_submission(context, "s1", 2, fx.single.id, "y")]);
        assert!(matches!(result, Err(Error::InvalidClock(_))));
        assert_eq!(stored_texts(&repo, fx.single.id, &context), vec!["x".to_string()]);
    }

    #[test]
    fn test_cleared_question_still_rejects_older_retry() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[text_submission(context, "s1", 1, fx.single.id, "Yes")])
            .unwrap();
        let cleared = repo
            .store_answers(&[
                IntakeSubmission::new(context, LogicalClock::new("s2", 5)).answer(fx.single.id, vec![]),
            ])
            .unwrap();
        assert_eq!(cleared.applied_count(), 1);
        assert!(stored_texts(&repo, fx.single.id, &context).is_empty());

        let retry = repo
            .store_answers(&[text_submission(context, "s1", 1, fx.single.id, "Yes")])
            .unwrap();

        assert_eq!(
            retry.outcomes[0].outcome,
            WriteOutcome::Stale {
                stored: LogicalClock::new("s2", 5)
            }
        );
        assert!(stored_texts(&repo, fx.single.id, &context).is_empty());
        assert!(row_ids(&fx.db, "info_intake").is_empty());
    }

    #[test]
    fn test_empty_first_write_then_newer_write() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        repo.store_answers(&[
            IntakeSubmission::new(context, LogicalClock::new("s1", 2)).answer(fx.symptoms.id, vec![]),
        ])
        .unwrap();

        let older = repo
            .store_answers(&[text_submission(context, "s1", 1, fx.symptoms.id, "Cough")])
            .unwrap();
        assert_eq!(older.applied_count(), 0);

        let newer = repo
            .store_answers(&[text_submission(context, "s1", 3, fx.symptoms.id, "Cough")])
            .unwrap();
        assert_eq!(newer.applied_count(), 1);
        assert_eq!(
            stored_texts(&repo, fx.symptoms.id, &context),
            vec!["Cough".to_string()]
        );
    }

    #[test]
    fn test_answer_for_other_question_is_rejected() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);
        let submission = IntakeSubmission::new(context, LogicalClock::new("s1", 1)).answer(
            fx.single.id,
            vec![NewAnswer::text(fx.symptoms.id, LAYOUT, "Cough")],
        );

        let result = repo.store_answers(&[submission]);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(row_ids(&fx.db, "info_intake").is_empty());
        assert!(stored_texts(&repo, fx.symptoms.id, &context).is_empty());
    }

    #[test]
    fn test_repeated_question_in_batch_keeps_newest() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);

        let report = repo
            .store_answers(&[
                text_submission(context, "s1", 7, fx.single.id, "seven"),
                text_submission(context, "s1", 3, fx.single.id, "three"),
            ])
            .unwrap();

        assert_eq!(report.applied_count(), 1);
        assert_eq!(
            stored_texts(&repo, fx.single.id, &context),
            vec!["seven".to_string()]
        );
    }

    #[test]
    fn test_lock_order_is_sorted() {
        let a = visit(1, 2);
        let b = visit(1, 1);
        let batch = vec![
            IntakeSubmission::new(a, LogicalClock::new("s", 1))
                .answer(QuestionId::new(5), vec![])
                .answer(QuestionId::new(2), vec![]),
            IntakeSubmission::new(b, LogicalClock::new("s", 1)).answer(QuestionId::new(9), vec![]),
        ];

        let keys: Vec<_> = lock_order(&batch)
            .iter()
            .map(|item| (item.submission.context.context_value(), item.question_id.get()))
            .collect();
        assert_eq!(keys, vec![(1, 9), (2, 2), (2, 5)]);
    }

    #[test]
    fn test_orphaned_sub_answers_are_dropped() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let context = visit(1, 1);
        let elsewhere = visit(1, 2);

        repo.store_answers(&[text_submission(elsewhere, "s1", 1, fx.symptoms.id, "Itching")])
            .unwrap();
        let foreign_parent = row_ids(&fx.db, "info_intake")[0];

        // A sub-answer in this visit pointing at a parent stored in another visit
        fx.db
            .connection()
            .execute(
                "INSERT INTO info_intake (patient_id, patient_visit_id, question_id, answer_text,
                    layout_version_id, parent_question_id, parent_info_intake_id, answered_date)
                 VALUES (1, 1, ?, 'Mild', 1, ?, ?, 0)",
                params![fx.severity.id, fx.symptoms.id, foreign_parent],
            )
            .unwrap();

        let answers = repo.load_answers(&[fx.symptoms.id], &context).unwrap();
        assert!(answers.is_empty());
    }

    #[test]
    fn test_load_with_no_questions() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        assert!(repo.load_answers(&[], &visit(1, 1)).unwrap().is_empty());
        assert_eq!(repo.store_answers(&[]).unwrap(), StoreReport::default());
    }

    #[test]
    fn test_assemble_drops_sub_answer_with_mismatched_parent_question() {
        let answer = |id: i64, question: i64, parent: Option<(i64, i64)>| Answer {
            id: AnswerId::new(id),
            question_id: QuestionId::new(question),
            question_type: "q_type_free_text".into(),
            potential_answer_id: None,
            potential_answer: None,
            answer_summary: None,
            answer_text: None,
            layout_version_id: LAYOUT,
            parent_question_id: parent.map(|(question, _)| QuestionId::new(question)),
            parent_answer_id: parent.map(|(_, answer)| AnswerId::new(answer)),
            sub_answers: Vec::new(),
        };

        let trees = assemble_answer_trees(vec![
            answer(1, 10, None),
            answer(2, 11, Some((10, 1))),
            answer(3, 12, Some((99, 1))),
            answer(4, 13, Some((10, 77))),
        ]);

        let parent = &trees[&QuestionId::new(10)][0];
        assert_eq!(parent.sub_answers.len(), 1);
        assert_eq!(parent.sub_answers[0].id, AnswerId::new(2));
        assert_eq!(trees.len(), 1);
    }

    #[test]
    fn test_previous_answers_use_latest_visit_before_cutoff() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());
        let patient = PatientId::new(3);

        repo.store_answers(&[
            text_submission(visit(3, 1), "s1", 1, fx.single.id, "first visit"),
            text_submission(visit(3, 2), "s1", 1, fx.single.id, "second visit"),
            text_submission(visit(4, 9), "s1", 1, fx.single.id, "other patient"),
        ])
        .unwrap();
        fx.db
            .connection()
            .execute(
                "UPDATE info_intake SET answered_date = patient_visit_id * 1000",
                [],
            )
            .unwrap();
        let tags = vec![
            "q_allergic_to_meds".to_string(),
            "q_symptoms".to_string(),
            "q_unknown".to_string(),
        ];

        let latest = repo.load_previous_answers(&tags, patient, 5_000).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(
            latest["q_allergic_to_meds"][0].answer_text.as_deref(),
            Some("second visit")
        );

        let earlier = repo.load_previous_answers(&tags, patient, 2_000).unwrap();
        assert_eq!(
            earlier["q_allergic_to_meds"][0].answer_text.as_deref(),
            Some("first visit")
        );

        assert!(repo
            .load_previous_answers(&tags, patient, 1_000)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_previous_answers_include_sub_answers() {
        let fx = setup();
        let repo = SqliteAnswerRepository::new(fx.db.connection());

        repo.store_answers(&[IntakeSubmission::new(visit(3, 1), LogicalClock::new("s1", 1))
            .answer(
                fx.symptoms.id,
                vec![NewAnswer::text(fx.symptoms.id, LAYOUT, "Itching")
                    .with_sub_answers(vec![NewAnswer::text(fx.severity.id, LAYOUT, "Mild")])],
            )])
        .unwrap();

        let previous = repo
            .load_previous_answers(&["q_symptoms".to_string()], PatientId::new(3), i64::MAX)
            .unwrap();
        assert_eq!(previous["q_symptoms"][0].sub_answers.len(), 1);
    }
}
