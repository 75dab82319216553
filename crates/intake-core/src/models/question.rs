//! Question catalog entries

use serde::{Deserialize, Serialize};

use super::ids::{PotentialAnswerId, QuestionId};

/// An intake question answers are stored against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// Stable tag shared by the same question across layout versions
    pub tag: String,
    /// Presentation type, e.g. `q_type_single_select`
    pub question_type: String,
    pub parent_question_id: Option<QuestionId>,
}

/// A selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialAnswer {
    pub id: PotentialAnswerId,
    pub question_id: QuestionId,
    pub answer_text: String,
    pub answer_summary: Option<String>,
}
