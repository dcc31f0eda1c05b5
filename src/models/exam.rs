// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,

    pub name: String,

    /// Exam category, e.g. 'MOCK' or 'FINAL'. Free-form.
    pub exam_type: Option<String>,

    pub language: Option<String>,

    /// Students may only start the exam inside [start_date, end_date].
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,

    pub duration_minutes: i32,

    /// Unpublished exams are invisible to students.
    pub published: bool,

    pub created_by: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Exam {
    /// An exam accepts new attempts only while the current time is inside
    /// its scheduled window.
    pub fn is_open(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.start_date && now <= self.end_date
    }
}
