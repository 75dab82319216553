//! Integer row identifiers

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row identifier
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Raw row identifier
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

row_id!(
    /// Intake question identifier
    QuestionId
);
row_id!(
    /// Stored answer row identifier
    AnswerId
);
row_id!(
    /// Selectable option of a multiple-choice question
    PotentialAnswerId
);
row_id!(
    /// Layout version the answer was given against
    LayoutVersionId
);
row_id!(PatientId);
row_id!(DoctorId);
row_id!(
    /// Patient visit identifier
    VisitId
);
row_id!(
    /// Patient case identifier
    CaseId
);
row_id!(PhotoSectionId);
row_id!(PhotoSlotId);
