// src/grading.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::{Mutex, mpsc};

use crate::error::AppError;
use crate::evaluator;
use crate::leaderboard;
use crate::models::attempt::{AttemptStatus, ExamAttempt};
use crate::models::question::Question;

/// A unit of grading work. Carries only identifiers; the worker reloads the
/// attempt (including its persisted submitted answers) from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingJob {
    pub attempt_id: i64,
    pub exam_id: i64,
}

/// Seam between the queue and the actual grading logic. Lets the queue be
/// tested without a database.
#[async_trait]
pub trait GradeJobHandler: Send + Sync + 'static {
    async fn grade(&self, job: GradingJob);
}

/// Bounded in-process queue feeding a pool of grading workers.
///
/// Enqueueing is decoupled from evaluation: the submit handler returns as
/// soon as the job is queued, never waiting for a worker to pick it up.
#[derive(Clone)]
pub struct GradingQueue {
    tx: mpsc::Sender<GradingJob>,
}

impl GradingQueue {
    /// Spawns `workers` background tasks draining a shared channel.
    /// Must be called from within a Tokio runtime.
    pub fn start(handler: Arc<dyn GradeJobHandler>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<GradingJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    // Hold the lock only while waiting for the next job so
                    // other workers can grade concurrently.
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => handler.grade(job).await,
                        None => break,
                    }
                }
                tracing::debug!("Grading worker {} stopped", worker_id);
            });
        }

        Self { tx }
    }

    /// Enqueues a job. A full or closed queue is logged; the attempt then
    /// stays EVALUATING until the recovery sweep requeues it.
    pub async fn enqueue(&self, job: GradingJob) {
        if let Err(e) = self.tx.try_send(job) {
            tracing::error!("Failed to enqueue grading job: {}", e);
        }
    }
}

/// Production handler: grades against Postgres.
pub struct PgGrader {
    pool: PgPool,
}

impl PgGrader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradeJobHandler for PgGrader {
    async fn grade(&self, job: GradingJob) {
        if let Err(e) = finalize_attempt(&self.pool, &job).await {
            // The attempt stays EVALUATING; the recovery sweep will retry it.
            tracing::error!("Grading failed for attempt {}: {}", job.attempt_id, e);
            return;
        }

        // Best-effort: a leaderboard failure never affects the grading result.
        if let Err(e) = leaderboard::recompute(&self.pool, job.exam_id).await {
            tracing::warn!("Leaderboard recompute failed for exam {}: {}", job.exam_id, e);
        }
    }
}

/// Evaluates the submission and flips the attempt EVALUATING -> COMPLETED.
/// This is the only place in the system that performs that transition.
async fn finalize_attempt(pool: &PgPool, job: &GradingJob) -> Result<(), AppError> {
    let attempt = sqlx::query_as::<_, ExamAttempt>("SELECT * FROM exam_attempts WHERE id = $1")
        .bind(job.attempt_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "Attempt {} not found",
            job.attempt_id
        )))?;

    if attempt.status != AttemptStatus::Evaluating {
        tracing::warn!(
            "Attempt {} is {:?}, not EVALUATING; skipping grading",
            job.attempt_id,
            attempt.status
        );
        return Ok(());
    }

    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE exam_id = $1 ORDER BY id",
    )
    .bind(job.exam_id)
    .fetch_all(pool)
    .await?;

    let submitted = attempt.submitted_answers.map(|a| a.0).unwrap_or_default();
    let result = evaluator::evaluate(&questions, &submitted);

    let duration_seconds = match (attempt.start_time, attempt.submitted_at) {
        (Some(start), Some(end)) => (end - start).num_seconds().max(0),
        _ => 0,
    };

    // Conditional update keyed on the expected prior status. Zero rows means
    // another worker finalized this attempt first.
    let updated = sqlx::query(
        r#"
        UPDATE exam_attempts
        SET status = 'COMPLETED',
            answers = $2,
            total_questions = $3,
            correct_count = $4,
            wrong_count = $5,
            percentage = $6,
            score = $7,
            duration_seconds = $8
        WHERE id = $1 AND status = 'EVALUATING'
        "#,
    )
    .bind(job.attempt_id)
    .bind(Json(&result.answer_records))
    .bind(result.total_questions)
    .bind(result.correct_count)
    .bind(result.wrong_count)
    .bind(result.percentage)
    .bind(result.correct_count) // score: one point per correct answer
    .bind(duration_seconds)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        tracing::warn!("Attempt {} was already finalized elsewhere", job.attempt_id);
    } else {
        tracing::info!(
            "Attempt {} completed: {}/{} correct ({}%)",
            job.attempt_id,
            result.correct_count,
            result.total_questions,
            result.percentage
        );
    }

    Ok(())
}

/// Periodically requeues attempts stuck in EVALUATING, e.g. after a worker
/// crash or a dropped queue entry. The raw submitted answers are persisted at
/// submit time, so requeueing loses nothing.
pub fn start_recovery_sweep(
    pool: PgPool,
    queue: GradingQueue,
    interval: Duration,
    stuck_after_secs: i64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = requeue_stuck_attempts(&pool, &queue, stuck_after_secs).await {
                tracing::error!("Recovery sweep failed: {}", e);
            }
        }
    });
}

async fn requeue_stuck_attempts(
    pool: &PgPool,
    queue: &GradingQueue,
    stuck_after_secs: i64,
) -> Result<(), AppError> {
    let cutoff = chrono::Utc::now() - chrono::Duration::seconds(stuck_after_secs);

    let stuck: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT id, exam_id
        FROM exam_attempts
        WHERE status = 'EVALUATING' AND submitted_at < $1
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    for (attempt_id, exam_id) in stuck {
        tracing::warn!("Requeueing stuck attempt {} for exam {}", attempt_id, exam_id);
        queue
            .enqueue(GradingJob {
                attempt_id,
                exam_id,
            })
            .await;
    }

    Ok(())
}
