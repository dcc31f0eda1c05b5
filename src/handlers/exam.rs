// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    grading::GradingJob,
    models::{
        attempt::{
            AttemptStatus, ExamAttempt, ExamResultResponse, StartExamRequest, StartExamResponse,
            SubmitExamRequest,
        },
        exam::Exam,
        question::PublicQuestion,
        user::User,
    },
    state::AppState,
};

/// Loads an exam that is visible to students: it must exist, be published,
/// and the current time must be inside its scheduled window.
async fn fetch_open_exam(pool: &PgPool, exam_id: i64) -> Result<Exam, AppError> {
    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = $1")
        .bind(exam_id)
        .fetch_optional(pool)
        .await?
        .filter(|e| e.published)
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if !exam.is_open(chrono::Utc::now()) {
        return Err(AppError::NotActive(
            "Exam is not currently active".to_string(),
        ));
    }

    Ok(exam)
}

async fn fetch_attempt(
    pool: &PgPool,
    exam_id: i64,
    student_email: &str,
) -> Result<Option<ExamAttempt>, AppError> {
    let attempt = sqlx::query_as::<_, ExamAttempt>(
        "SELECT * FROM exam_attempts WHERE exam_id = $1 AND student_email = $2",
    )
    .bind(exam_id)
    .bind(student_email)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

async fn count_questions(pool: &PgPool, exam_id: i64) -> Result<i64, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE exam_id = $1")
            .bind(exam_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Starts (or resumes) an attempt.
///
/// Idempotent while IN_PROGRESS: a repeated call returns the existing attempt
/// with its original start_time. A COMPLETED or EVALUATING attempt is
/// rejected; there is at most one attempt per (exam, student), ever.
pub async fn start_exam(
    State(pool): State<PgPool>,
    Path(exam_id): Path<i64>,
    Json(req): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_open_exam(&pool, exam_id).await?;

    // Resolve the display name. The account service owns users; a missing row
    // falls back to the email so grading is never blocked on it.
    let student_name = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&req.student_email)
        .fetch_optional(&pool)
        .await?
        .map(|u| u.name)
        .unwrap_or_else(|| {
            tracing::warn!("No user record for {}, using email as name", req.student_email);
            req.student_email.clone()
        });

    // Insert-if-absent: concurrent starts race on the unique index, and the
    // loser simply reads the winner's row below.
    sqlx::query(
        r#"
        INSERT INTO exam_attempts (exam_id, exam_name, student_email, student_name, status, start_time)
        VALUES ($1, $2, $3, $4, 'IN_PROGRESS', NOW())
        ON CONFLICT (exam_id, student_email) DO NOTHING
        "#,
    )
    .bind(exam_id)
    .bind(&exam.name)
    .bind(&req.student_email)
    .bind(&student_name)
    .execute(&pool)
    .await?;

    let attempt = fetch_attempt(&pool, exam_id, &req.student_email)
        .await?
        .ok_or(AppError::InternalServerError(
            "Attempt missing after insert".to_string(),
        ))?;

    match attempt.status {
        AttemptStatus::Completed => Err(AppError::Conflict(
            "You have already completed this exam".to_string(),
        )),
        AttemptStatus::Evaluating => Err(AppError::Conflict(
            "Your submission is already being evaluated".to_string(),
        )),
        AttemptStatus::InProgress => {
            let total_questions = count_questions(&pool, exam_id).await?;
            Ok(Json(StartExamResponse {
                exam_id,
                exam_name: exam.name,
                duration_minutes: exam.duration_minutes,
                total_questions,
                start_time: attempt.start_time,
            }))
        }
    }
}

/// Returns the exam's questions in randomized order, with the correct answer
/// and analysis withheld.
pub async fn get_questions(
    State(pool): State<PgPool>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_open_exam(&pool, exam_id).await?;

    let questions = sqlx::query_as::<_, PublicQuestion>(
        r#"
        SELECT id, content, option_a, option_b, option_c, option_d
        FROM questions
        WHERE exam_id = $1
        ORDER BY RANDOM()
        "#,
    )
    .bind(exam_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions for exam {}: {:?}", exam_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(questions))
}

/// Submits answers and returns immediately with a PROCESSING response.
///
/// The IN_PROGRESS -> EVALUATING flip is one conditional UPDATE, so of any
/// number of concurrent submits exactly one wins the row and enqueues exactly
/// one grading job. Grading itself happens on the worker pool; the final
/// score is never part of this response.
pub async fn submit_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
    Json(req): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&state.pool, exam_id, &req.student_email)
        .await?
        .ok_or(AppError::NotFound(
            "No attempt found; start the exam first".to_string(),
        ))?;

    let updated = sqlx::query_as::<_, ExamAttempt>(
        r#"
        UPDATE exam_attempts
        SET status = 'EVALUATING', submitted_at = NOW(), submitted_answers = $3
        WHERE exam_id = $1 AND student_email = $2 AND status = 'IN_PROGRESS'
        RETURNING *
        "#,
    )
    .bind(exam_id)
    .bind(&req.student_email)
    .bind(sqlx::types::Json(&req.answers))
    .fetch_optional(&state.pool)
    .await?;

    let Some(attempt) = updated else {
        // The row existed but was no longer IN_PROGRESS (or a concurrent
        // submit won the conditional update). Reject, never regrade.
        tracing::info!(
            "Rejected duplicate submit for attempt {} ({:?})",
            attempt.id,
            attempt.status
        );
        return Err(AppError::Conflict(
            "Exam has already been submitted".to_string(),
        ));
    };

    state
        .grader
        .enqueue(GradingJob {
            attempt_id: attempt.id,
            exam_id,
        })
        .await;

    Ok(Json(serde_json::json!({
        "status": "PROCESSING",
        "message": "Your answers are being evaluated. Poll the result endpoint for the final score."
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub email: String,
}

/// Fetches the current state of an attempt. Returns a processing placeholder
/// until the grading worker has flipped the attempt to COMPLETED.
pub async fn get_result(
    State(pool): State<PgPool>,
    Path(exam_id): Path<i64>,
    Query(query): Query<ResultQuery>,
) -> Result<Response, AppError> {
    let attempt = fetch_attempt(&pool, exam_id, &query.email)
        .await?
        .ok_or(AppError::NotFound("No attempt found".to_string()))?;

    if attempt.status == AttemptStatus::Completed {
        Ok(Json(ExamResultResponse::from_attempt(attempt)).into_response())
    } else {
        Ok(Json(serde_json::json!({
            "status": attempt.status,
            "message": "Result is still being processed. Try again shortly."
        }))
        .into_response())
    }
}

/// Returns the ranked leaderboard for one exam, recomputed on demand from
/// all COMPLETED attempts.
pub async fn get_leaderboard(
    State(pool): State<PgPool>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM exams WHERE id = $1")
        .bind(exam_id)
        .fetch_optional(&pool)
        .await?;

    if exists.is_none() {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    let entries = crate::leaderboard::recompute(&pool, exam_id).await?;
    Ok(Json(entries))
}
