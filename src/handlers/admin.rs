// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{error::AppError, models::question::CreateQuestionRequest};

/// DTO for creating an exam together with its question bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub exam_type: Option<String>,
    pub language: Option<String>,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i32,
    pub created_by: Option<String>,
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// Creates an exam and its questions in one transaction.
/// Exams are created unpublished; students cannot see them until publish.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.start_date >= payload.end_date {
        return Err(AppError::BadRequest(
            "start_date must be before end_date".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let exam_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO exams (name, exam_type, language, start_date, end_date, duration_minutes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.exam_type)
    .bind(&payload.language)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.duration_minutes)
    .bind(&payload.created_by)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for question in &payload.questions {
        sqlx::query(
            r#"
            INSERT INTO questions (exam_id, content, option_a, option_b, option_c, option_d, answer, analysis)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(exam_id)
        .bind(&question.content)
        .bind(&question.option_a)
        .bind(&question.option_b)
        .bind(&question.option_c)
        .bind(&question.option_d)
        .bind(&question.answer)
        .bind(&question.analysis)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": exam_id })),
    ))
}

/// Publishes an exam, making it visible to students inside its window.
pub async fn publish_exam(
    State(pool): State<PgPool>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let updated: Option<i64> =
        sqlx::query_scalar("UPDATE exams SET published = TRUE WHERE id = $1 RETURNING id")
            .bind(exam_id)
            .fetch_optional(&pool)
            .await?;

    if updated.is_none() {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "id": exam_id, "published": true })))
}
