//! Answer storage contexts
//!
//! An [`AnswerContext`] says who is answering and for which visit or case.
//! Each variant maps to a fixed [`AnswerSchema`], so every SQL statement is
//! assembled from static table and column names only.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CaseId, DoctorId, PatientId, VisitId};

/// Table and column names of one answer table family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerSchema {
    /// Answer table
    pub table: &'static str,
    /// Column holding the identity of whoever answered
    pub role_column: &'static str,
    /// Column holding the visit or case the answer belongs to
    pub context_column: &'static str,
}

/// Patient answers to their own visit intake.
pub const PATIENT_INTAKE: AnswerSchema = AnswerSchema {
    table: "info_intake",
    role_column: "patient_id",
    context_column: "patient_visit_id",
};

/// Doctor diagnosis answers for a patient visit.
pub const DIAGNOSIS_INTAKE: AnswerSchema = AnswerSchema {
    table: "diagnosis_intake",
    role_column: "doctor_id",
    context_column: "patient_visit_id",
};

/// Doctor answers recorded on behalf of a patient case.
pub const CASE_REVIEW_INTAKE: AnswerSchema = AnswerSchema {
    table: "case_review_intake",
    role_column: "doctor_id",
    context_column: "patient_case_id",
};

/// Every answer table family, in migration order.
pub const ANSWER_SCHEMAS: [AnswerSchema; 3] = [PATIENT_INTAKE, DIAGNOSIS_INTAKE, CASE_REVIEW_INTAKE];

/// A patient answering for one of their visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientVisit {
    pub patient_id: PatientId,
    pub visit_id: VisitId,
}

impl PatientVisit {
    pub const fn new(patient_id: PatientId, visit_id: VisitId) -> Self {
        Self {
            patient_id,
            visit_id,
        }
    }
}

/// Who is answering and where the answer is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerContext {
    /// Patient answering their visit intake
    Patient {
        patient_id: PatientId,
        visit_id: VisitId,
    },
    /// Doctor diagnosing a visit
    Diagnosis {
        doctor_id: DoctorId,
        visit_id: VisitId,
    },
    /// Doctor answering on behalf of a case
    CaseReview { doctor_id: DoctorId, case_id: CaseId },
}

impl AnswerContext {
    /// Storage schema for this context
    #[must_use]
    pub const fn schema(&self) -> AnswerSchema {
        match self {
            Self::Patient { .. } => PATIENT_INTAKE,
            Self::Diagnosis { .. } => DIAGNOSIS_INTAKE,
            Self::CaseReview { .. } => CASE_REVIEW_INTAKE,
        }
    }

    /// Value stored in the schema's role column
    #[must_use]
    pub const fn role_value(&self) -> i64 {
        match self {
            Self::Patient { patient_id, .. } => patient_id.get(),
            Self::Diagnosis { doctor_id, .. } | Self::CaseReview { doctor_id, .. } => {
                doctor_id.get()
            }
        }
    }

    /// Value stored in the schema's context column
    #[must_use]
    pub const fn context_value(&self) -> i64 {
        match self {
            Self::Patient { visit_id, .. } | Self::Diagnosis { visit_id, .. } => visit_id.get(),
            Self::CaseReview { case_id, .. } => case_id.get(),
        }
    }
}

impl From<PatientVisit> for AnswerContext {
    fn from(visit: PatientVisit) -> Self {
        Self::Patient {
            patient_id: visit.patient_id,
            visit_id: visit.visit_id,
        }
    }
}

impl fmt::Display for AnswerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.schema();
        write!(
            f,
            "{}({}={}, {}={})",
            schema.table,
            schema.role_column,
            self.role_value(),
            schema.context_column,
            self.context_value()
        )
    }
}
