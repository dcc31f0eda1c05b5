// src/leaderboard.rs

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::attempt::LeaderboardEntry;

/// Row shape for ranking. Fetched ORDER BY id so the final tie-break is the
/// order attempts were created in.
#[derive(Debug, sqlx::FromRow)]
struct CompletedAttempt {
    student_email: String,
    student_name: String,
    percentage: f64,
}

/// Recomputes the full leaderboard for one exam from its COMPLETED attempts.
///
/// Pure read + compute: only COMPLETED rows are read, and those are immutable,
/// so no locking is needed while other attempts are still transitioning.
pub async fn recompute(pool: &PgPool, exam_id: i64) -> Result<Vec<LeaderboardEntry>, AppError> {
    let rows = sqlx::query_as::<_, CompletedAttempt>(
        r#"
        SELECT student_email, student_name, COALESCE(percentage, 0) AS percentage
        FROM exam_attempts
        WHERE exam_id = $1 AND status = 'COMPLETED'
        ORDER BY id
        "#,
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch completed attempts for exam {}: {:?}", exam_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(rank(rows))
}

/// Sorts by percentage descending, then name ascending (case-insensitive);
/// the stable sort preserves creation order for full ties. Ranks are
/// sequential 1..N with no gap-filling for equal percentages.
fn rank(rows: Vec<CompletedAttempt>) -> Vec<LeaderboardEntry> {
    let mut rows = rows;
    rows.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.student_name.to_lowercase().cmp(&b.student_name.to_lowercase()))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            email: row.student_email,
            name: row.student_name,
            percentage: row.percentage,
            rank: (i + 1) as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(email: &str, name: &str, percentage: f64) -> CompletedAttempt {
        CompletedAttempt {
            student_email: email.to_string(),
            student_name: name.to_string(),
            percentage,
        }
    }

    #[test]
    fn orders_by_percentage_desc() {
        let entries = rank(vec![
            attempt("low@test.com", "Low", 40.0),
            attempt("high@test.com", "High", 90.0),
            attempt("mid@test.com", "Mid", 60.0),
        ]);

        let emails: Vec<&str> = entries.iter().map(|e| e.email.as_str()).collect();
        assert_eq!(emails, ["high@test.com", "mid@test.com", "low@test.com"]);
        let ranks: Vec<i64> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn ties_break_by_name_case_insensitive() {
        let entries = rank(vec![
            attempt("zara@test.com", "zara", 80.0),
            attempt("alice@test.com", "Alice", 80.0),
        ]);

        // Equal percentage: distinct consecutive ranks, name ascending.
        assert_eq!(entries[0].name, "Alice");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].name, "zara");
        assert_eq!(entries[1].rank, 2);
    }

    #[test]
    fn full_ties_keep_original_order() {
        let entries = rank(vec![
            attempt("first@test.com", "Sam", 70.0),
            attempt("second@test.com", "Sam", 70.0),
        ]);

        assert_eq!(entries[0].email, "first@test.com");
        assert_eq!(entries[1].email, "second@test.com");
        assert_eq!(entries[1].rank, 2);
    }

    #[test]
    fn empty_input_yields_empty_board() {
        assert!(rank(Vec::new()).is_empty());
    }
}
