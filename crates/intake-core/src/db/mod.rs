//! Database layer for Intake

mod answer_repository;
mod catalog_repository;
mod clock_store;
mod connection;
mod media_repository;
mod migrations;
mod photo_repository;

pub use answer_repository::{assemble_answer_trees, AnswerRepository, SqliteAnswerRepository};
pub use catalog_repository::{QuestionRepository, SqliteQuestionRepository};
pub use connection::Database;
pub use media_repository::{MediaRepository, SqliteMediaRepository};
pub use photo_repository::{PhotoRepository, SqlitePhotoRepository};
