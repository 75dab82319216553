//! Async service wrapper shared by intake clients.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::db::{
    AnswerRepository, Database, MediaRepository, PhotoRepository, QuestionRepository,
    SqliteAnswerRepository, SqliteMediaRepository, SqlitePhotoRepository,
    SqliteQuestionRepository,
};
use crate::models::{
    Answer, AnswerContext, IntakeSubmission, LogicalClock, Media, NewPhotoSection, PatientId,
    PatientVisit, PhotoIntakeSection, PotentialAnswer, Question, QuestionId, StoreReport,
    WriteOutcome,
};
use crate::Result;

/// Thread-safe service for intake storage operations.
///
/// Every operation opens its own connection on a blocking thread, so
/// concurrent callers contend only on the database write lock.
#[derive(Clone)]
pub struct IntakeService {
    config: Arc<StoreConfig>,
    db_path: PathBuf,
}

impl IntakeService {
    /// Open the database named by `config`, creating and migrating it.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let db_path = config.resolve_database_path()?;
        Self::open_path(db_path, config).await
    }

    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let service = Self {
            config: Arc::new(config),
            db_path,
        };
        let path = service.db_path.clone();
        let config = Arc::clone(&service.config);
        tokio::task::spawn_blocking(move || Database::open(&path, &config).map(drop)).await??;

        tracing::info!("Opened intake database at {}", service.db_path.display());
        Ok(service)
    }

    /// Database file backing this service.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn with_database<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            let db = Database::connect(&path, &config)?;
            op(&db)
        })
        .await?
    }

    /// Apply a batch of answer submissions atomically.
    pub async fn store_answers(&self, batch: Vec<IntakeSubmission>) -> Result<StoreReport> {
        self.with_database(move |db| {
            SqliteAnswerRepository::new(db.connection()).store_answers(&batch)
        })
        .await
    }

    /// Load answer trees for questions in one context.
    pub async fn load_answers(
        &self,
        question_ids: Vec<QuestionId>,
        context: AnswerContext,
    ) -> Result<HashMap<QuestionId, Vec<Answer>>> {
        self.with_database(move |db| {
            SqliteAnswerRepository::new(db.connection()).load_answers(&question_ids, &context)
        })
        .await
    }

    /// Load a patient's most recent answers before a cutoff, keyed by tag.
    pub async fn load_previous_answers(
        &self,
        question_tags: Vec<String>,
        patient_id: PatientId,
        before_ms: i64,
    ) -> Result<HashMap<String, Vec<Answer>>> {
        self.with_database(move |db| {
            SqliteAnswerRepository::new(db.connection()).load_previous_answers(
                &question_tags,
                patient_id,
                before_ms,
            )
        })
        .await
    }

    /// Replace the photo sections answering a question.
    pub async fn store_photo_sections(
        &self,
        question_id: QuestionId,
        visit: PatientVisit,
        clock: LogicalClock,
        sections: Vec<NewPhotoSection>,
    ) -> Result<WriteOutcome> {
        self.with_database(move |db| {
            SqlitePhotoRepository::new(db.connection()).store_photo_sections(
                question_id,
                visit,
                &clock,
                &sections,
            )
        })
        .await
    }

    /// Load photo sections for questions in a patient visit.
    pub async fn load_photo_sections(
        &self,
        question_ids: Vec<QuestionId>,
        visit: PatientVisit,
    ) -> Result<HashMap<QuestionId, Vec<PhotoIntakeSection>>> {
        self.with_database(move |db| {
            SqlitePhotoRepository::new(db.connection()).load_photo_sections(&question_ids, visit)
        })
        .await
    }

    /// Record uploaded media so a later photo write can claim it.
    pub async fn register_media(
        &self,
        uploader_id: i64,
        url: String,
        mime_type: String,
    ) -> Result<Media> {
        self.with_database(move |db| {
            SqliteMediaRepository::new(db.connection()).register(uploader_id, &url, &mime_type)
        })
        .await
    }

    /// Add a question to the catalog.
    pub async fn create_question(
        &self,
        tag: String,
        question_type: String,
        parent_question_id: Option<QuestionId>,
    ) -> Result<Question> {
        self.with_database(move |db| {
            SqliteQuestionRepository::new(db.connection()).create_question(
                &tag,
                &question_type,
                parent_question_id,
            )
        })
        .await
    }

    /// Add a selectable option to a question.
    pub async fn create_potential_answer(
        &self,
        question_id: QuestionId,
        answer_text: String,
        answer_summary: Option<String>,
    ) -> Result<PotentialAnswer> {
        self.with_database(move |db| {
            SqliteQuestionRepository::new(db.connection()).create_potential_answer(
                question_id,
                &answer_text,
                answer_summary.as_deref(),
            )
        })
        .await
    }

    /// Look up a question by tag.
    pub async fn question_by_tag(&self, tag: String) -> Result<Option<Question>> {
        self.with_database(move |db| {
            SqliteQuestionRepository::new(db.connection()).question_by_tag(&tag)
        })
        .await
    }
}
