//! The standardized trivia question record shared by every source.

pub mod html;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A standardized question that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub category: String,
    pub difficulty: String,
    /// Question type (`multiple`, `boolean`, `text_choice`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Upstream name (`OpenTDB`, `TheTriviaAPI`).
    pub source: String,
}

impl NewQuestion {
    /// Decode HTML entities in the question text and answers.
    pub fn unescaped(mut self) -> Self {
        self.question = html::unescape(&self.question);
        self.correct_answer = html::unescape(&self.correct_answer);
        self.incorrect_answers = self
            .incorrect_answers
            .iter()
            .map(|a| html::unescape(a))
            .collect();
        self.category = html::unescape(&self.category);
        self
    }
}

/// A question row from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub category: String,
    pub difficulty: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Correct answer first, then the distractors.
    pub fn answers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.correct_answer.as_str())
            .chain(self.incorrect_answers.iter().map(String::as_str))
    }
}
