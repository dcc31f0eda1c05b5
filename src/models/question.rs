// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
/// Questions are immutable once their exam is published.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub exam_id: i64,

    /// The text content of the question.
    pub content: String,

    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    /// The correct option key: 'A', 'B', 'C' or 'D'.
    pub answer: String,

    /// Explanation or analysis of the correct answer.
    pub analysis: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to students (excludes answer and analysis).
#[derive(Debug, Serialize, FromRow)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
}

/// DTO for creating a question inside a new exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(length(min = 1, max = 500))]
    pub option_a: String,
    #[validate(length(min = 1, max = 500))]
    pub option_b: String,
    #[validate(length(min = 1, max = 500))]
    pub option_c: String,
    #[validate(length(min = 1, max = 500))]
    pub option_d: String,
    #[validate(custom(function = validate_answer_key))]
    pub answer: String,
    #[validate(length(max = 2000))]
    pub analysis: Option<String>,
}

fn validate_answer_key(answer: &str) -> Result<(), validator::ValidationError> {
    match answer {
        "A" | "B" | "C" | "D" => Ok(()),
        _ => Err(validator::ValidationError::new("answer_must_be_a_to_d")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_key_accepts_abcd() {
        for key in ["A", "B", "C", "D"] {
            assert!(validate_answer_key(key).is_ok());
        }
    }

    #[test]
    fn answer_key_rejects_other() {
        assert!(validate_answer_key("E").is_err());
        assert!(validate_answer_key("a").is_err());
        assert!(validate_answer_key("").is_err());
    }
}
