//! Shared service layer used by intake clients.

mod intake;

pub use intake::IntakeService;
