//! Data models for Intake

mod answer;
mod clock;
mod context;
mod ids;
mod media;
mod photo;
mod question;

pub use answer::{Answer, IntakeSubmission, NewAnswer, QuestionOutcome, StoreReport, WriteOutcome};
pub use clock::{accept, LogicalClock};
pub use context::{
    AnswerContext, AnswerSchema, PatientVisit, ANSWER_SCHEMAS, CASE_REVIEW_INTAKE,
    DIAGNOSIS_INTAKE, PATIENT_INTAKE,
};
pub use ids::{
    AnswerId, CaseId, DoctorId, LayoutVersionId, PatientId, PhotoSectionId, PhotoSlotId,
    PotentialAnswerId, QuestionId, VisitId,
};
pub use media::{Claimer, Media, MediaId, CLAIMER_PHOTO_INTAKE_SECTION};
pub use photo::{NewPhotoSection, NewPhotoSlot, PhotoIntakeSection, PhotoIntakeSlot};
pub use question::{PotentialAnswer, Question};
