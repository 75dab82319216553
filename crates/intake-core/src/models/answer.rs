//! Intake answers, submissions and write outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

use super::clock::LogicalClock;
use super::context::AnswerContext;
use super::ids::{AnswerId, LayoutVersionId, PotentialAnswerId, QuestionId};

/// An answer as submitted by a client, possibly with answers to sub-questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnswer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub potential_answer_id: Option<PotentialAnswerId>,
    #[serde(default)]
    pub answer_text: Option<String>,
    pub layout_version_id: LayoutVersionId,
    /// Answers to child questions, attached to this answer
    #[serde(default)]
    pub sub_answers: Vec<NewAnswer>,
}

impl NewAnswer {
    /// Free-text answer
    pub fn text(
        question_id: QuestionId,
        layout_version_id: LayoutVersionId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            question_id,
            potential_answer_id: None,
            answer_text: Some(text.into()),
            layout_version_id,
            sub_answers: Vec::new(),
        }
    }

    /// Answer selecting one of the question's potential answers
    pub const fn choice(
        question_id: QuestionId,
        layout_version_id: LayoutVersionId,
        potential_answer_id: PotentialAnswerId,
    ) -> Self {
        Self {
            question_id,
            potential_answer_id: Some(potential_answer_id),
            answer_text: None,
            layout_version_id,
            sub_answers: Vec::new(),
        }
    }

    /// Attach answers to sub-questions
    #[must_use]
    pub fn with_sub_answers(mut self, sub_answers: Vec<Self>) -> Self {
        self.sub_answers = sub_answers;
        self
    }
}

/// A stored answer, reassembled with its sub-answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub question_type: String,
    pub potential_answer_id: Option<PotentialAnswerId>,
    /// Text of the selected potential answer
    pub potential_answer: Option<String>,
    /// Summary text of the selected potential answer
    pub answer_summary: Option<String>,
    pub answer_text: Option<String>,
    pub layout_version_id: LayoutVersionId,
    pub parent_question_id: Option<QuestionId>,
    pub parent_answer_id: Option<AnswerId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_answers: Vec<Answer>,
}

impl Answer {
    pub const fn is_sub_answer(&self) -> bool {
        self.parent_question_id.is_some()
    }
}

/// A set of answers written together under one context and clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSubmission {
    pub context: AnswerContext,
    pub clock: LogicalClock,
    /// Answers keyed by top-level question; iteration is in question order
    pub answers: BTreeMap<QuestionId, Vec<NewAnswer>>,
}

impl IntakeSubmission {
    pub fn new(context: AnswerContext, clock: LogicalClock) -> Self {
        Self {
            context,
            clock,
            answers: BTreeMap::new(),
        }
    }

    /// Replace the answers for a question
    #[must_use]
    pub fn answer(mut self, question_id: QuestionId, answers: Vec<NewAnswer>) -> Self {
        self.answers.insert(question_id, answers);
        self
    }

    /// Reject trees deeper than answer + sub-answer, and top-level answers
    /// filed under a question they do not answer.
    pub fn validate(&self) -> Result<()> {
        for (question_id, answers) in &self.answers {
            for answer in answers {
                if answer.question_id != *question_id {
                    return Err(Error::InvalidInput(format!(
                        "question {question_id}: answer names question {}",
                        answer.question_id
                    )));
                }
                if answer.sub_answers.iter().any(|sub| !sub.sub_answers.is_empty()) {
                    return Err(Error::InvalidInput(format!(
                        "question {question_id}: sub-answers cannot have sub-answers"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Result of applying a clock-gated write to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Stored answers were replaced
    Applied,
    /// The stored clock was not older; nothing changed
    Stale { stored: LogicalClock },
}

impl WriteOutcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Outcome for one question of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub context: AnswerContext,
    pub question_id: QuestionId,
    pub incoming: LogicalClock,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

/// Per-question outcomes of a committed batch, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReport {
    pub outcomes: Vec<QuestionOutcome>,
}

impl StoreReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.outcome.is_applied())
            .count()
    }

    /// Questions skipped because a newer clock was already stored
    pub fn stale(&self) -> impl Iterator<Item = &QuestionOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.outcome.is_applied())
    }
}
