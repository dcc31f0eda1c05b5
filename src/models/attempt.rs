// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Lifecycle of one student's attempt at one exam.
///
/// NOT_STARTED is virtual (no row exists). Transitions are forward-only:
/// IN_PROGRESS -> EVALUATING -> COMPLETED, and COMPLETED is terminal.
/// Both transitions are enforced with conditional UPDATEs on the expected
/// prior status, never with read-modify-write pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Evaluating,
    Completed,
}

/// One answer as submitted by the student. Persisted raw (JSONB) at submit
/// time so the recovery sweep can requeue a stuck attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_option: String,
}

/// Per-question correctness record, produced once by the evaluator at
/// grading time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: i64,
    pub question_text: String,
    /// None when the student left the question unanswered.
    pub selected_option: Option<String>,
    pub correct_answer: String,
    pub correct: bool,
    pub analysis: Option<String>,
}

/// Represents the 'exam_attempts' table in the database.
/// At most one row per (exam_id, student_email), enforced by a unique index.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamAttempt {
    pub id: i64,
    pub exam_id: i64,
    pub exam_name: String,
    pub student_email: String,
    pub student_name: String,
    pub status: AttemptStatus,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<i64>,

    /// Raw answers as submitted, set when the attempt flips to EVALUATING.
    #[serde(skip)]
    pub submitted_answers: Option<Json<Vec<SubmittedAnswer>>>,

    /// Graded answer detail, set when the attempt flips to COMPLETED.
    pub answers: Option<Json<Vec<AnswerRecord>>>,

    pub total_questions: Option<i64>,
    pub correct_count: Option<i64>,
    pub wrong_count: Option<i64>,
    pub percentage: Option<f64>,
    pub score: Option<i64>,
}

/// DTO for starting an exam.
#[derive(Debug, Deserialize)]
pub struct StartExamRequest {
    pub student_email: String,
}

/// DTO returned when an attempt is started (or re-fetched while IN_PROGRESS).
#[derive(Debug, Serialize)]
pub struct StartExamResponse {
    pub exam_id: i64,
    pub exam_name: String,
    pub duration_minutes: i32,
    pub total_questions: i64,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting answers.
#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    pub student_email: String,
    pub answers: Vec<SubmittedAnswer>,
}

/// Full result detail, returned once the attempt is COMPLETED.
#[derive(Debug, Serialize)]
pub struct ExamResultResponse {
    pub exam_id: i64,
    pub exam_name: String,
    pub student_email: String,
    pub student_name: String,
    pub status: AttemptStatus,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: i64,
    pub total_questions: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub percentage: f64,
    pub score: i64,
    pub answers: Vec<AnswerRecord>,
}

impl ExamResultResponse {
    pub fn from_attempt(attempt: ExamAttempt) -> Self {
        Self {
            exam_id: attempt.exam_id,
            exam_name: attempt.exam_name,
            student_email: attempt.student_email,
            student_name: attempt.student_name,
            status: attempt.status,
            start_time: attempt.start_time,
            submitted_at: attempt.submitted_at,
            duration_seconds: attempt.duration_seconds.unwrap_or(0),
            total_questions: attempt.total_questions.unwrap_or(0),
            correct_count: attempt.correct_count.unwrap_or(0),
            wrong_count: attempt.wrong_count.unwrap_or(0),
            percentage: attempt.percentage.unwrap_or(0.0),
            score: attempt.score.unwrap_or(0),
            answers: attempt.answers.map(|a| a.0).unwrap_or_default(),
        }
    }
}

/// A ranked row of the leaderboard. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub email: String,
    pub name: String,
    pub percentage: f64,
    pub rank: i64,
}
