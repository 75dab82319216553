//! intake-core - Core library for Intake
//!
//! This crate contains the models, database layer, and clock-gated write
//! logic used to store visit intake answers from any client.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod util;

pub use error::{Error, Result};
pub use models::{AnswerContext, IntakeSubmission, LogicalClock, StoreReport};
