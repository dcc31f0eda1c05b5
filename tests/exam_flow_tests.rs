// tests/exam_flow_tests.rs

use std::sync::Arc;
use std::time::Duration;

use exam_service::{
    config::Config,
    grading::{GradingQueue, PgGrader},
    routes,
    state::AppState,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper to spawn the app on a random port for testing.
/// Returns None (test is skipped) when DATABASE_URL is not set, so the suite
/// can run without a Postgres instance.
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        rust_log: "error".to_string(),
        grading_workers: 2,
        grading_queue_capacity: 16,
        sweep_interval_secs: 3600,
        stuck_after_secs: 3600,
    };

    let grader = GradingQueue::start(
        Arc::new(PgGrader::new(pool.clone())),
        config.grading_workers,
        config.grading_queue_capacity,
    );

    let state = AppState {
        pool: pool.clone(),
        config,
        grader,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some((address, pool))
}

fn unique_email() -> String {
    format!("s_{}@test.com", &uuid::Uuid::new_v4().to_string()[..8])
}

/// Creates and publishes a 3-question exam (answers A, B, C) via the admin
/// API. Returns the exam id.
async fn seed_exam(client: &reqwest::Client, address: &str) -> i64 {
    let now = chrono::Utc::now();
    let create_resp = client
        .post(format!("{}/api/admin/exams", address))
        .json(&serde_json::json!({
            "name": "Java Basics",
            "exam_type": "MOCK",
            "language": "en",
            "start_date": now - chrono::Duration::hours(1),
            "end_date": now + chrono::Duration::hours(1),
            "duration_minutes": 30,
            "questions": [
                {
                    "content": "Q1", "option_a": "a1", "option_b": "b1",
                    "option_c": "c1", "option_d": "d1", "answer": "A",
                    "analysis": "because"
                },
                {
                    "content": "Q2", "option_a": "a2", "option_b": "b2",
                    "option_c": "c2", "option_d": "d2", "answer": "B"
                },
                {
                    "content": "Q3", "option_a": "a3", "option_b": "b3",
                    "option_c": "c3", "option_d": "d3", "answer": "C"
                }
            ]
        }))
        .send()
        .await
        .expect("Create exam failed");
    assert_eq!(create_resp.status().as_u16(), 201);

    let exam_id = create_resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let publish_resp = client
        .post(format!("{}/api/admin/exams/{}/publish", address, exam_id))
        .send()
        .await
        .expect("Publish failed");
    assert_eq!(publish_resp.status().as_u16(), 200);

    exam_id
}

async fn start_attempt(
    client: &reqwest::Client,
    address: &str,
    exam_id: i64,
    email: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/exams/{}/start", address, exam_id))
        .json(&serde_json::json!({ "student_email": email }))
        .send()
        .await
        .expect("Start failed")
}

async fn submit_attempt(
    client: &reqwest::Client,
    address: &str,
    exam_id: i64,
    email: &str,
    answers: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .json(&serde_json::json!({ "student_email": email, "answers": answers }))
        .send()
        .await
        .expect("Submit failed")
}

/// Polls the result endpoint until the attempt is COMPLETED.
async fn poll_result(
    client: &reqwest::Client,
    address: &str,
    exam_id: i64,
    email: &str,
) -> serde_json::Value {
    for _ in 0..50 {
        let result = client
            .get(format!(
                "{}/api/exams/{}/result?email={}",
                address, exam_id, email
            ))
            .send()
            .await
            .expect("Fetch result failed")
            .json::<serde_json::Value>()
            .await
            .expect("Failed to parse result json");

        if result["status"] == "COMPLETED" {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Attempt never reached COMPLETED");
}

#[tokio::test]
async fn full_grading_flow() {
    let Some((address, pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let email = unique_email();

    // Seed a user so the attempt gets a display name.
    sqlx::query("INSERT INTO users (email, name) VALUES ($1, $2)")
        .bind(&email)
        .bind("Ada")
        .execute(&pool)
        .await
        .unwrap();

    let exam_id = seed_exam(&client, &address).await;

    // Start
    let start_resp = start_attempt(&client, &address, exam_id, &email).await;
    assert_eq!(start_resp.status().as_u16(), 200);
    let start_body: serde_json::Value = start_resp.json().await.unwrap();
    assert_eq!(start_body["total_questions"], 3);
    assert_eq!(start_body["exam_name"], "Java Basics");

    // Questions are served without the answer key
    let questions: Vec<serde_json::Value> = client
        .get(format!("{}/api/exams/{}/questions", address, exam_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions[0].get("answer").is_none());
    assert!(questions[0].get("analysis").is_none());

    // Map content -> id so we can answer 2 of 3 correctly
    let id_of = |content: &str| -> i64 {
        questions
            .iter()
            .find(|q| q["content"] == content)
            .and_then(|q| q["id"].as_i64())
            .unwrap()
    };

    let answers = serde_json::json!([
        { "question_id": id_of("Q1"), "selected_option": "A" },
        { "question_id": id_of("Q2"), "selected_option": "X" },
        { "question_id": id_of("Q3"), "selected_option": "C" }
    ]);

    // Submit returns immediately with a processing response
    let submit_resp = submit_attempt(&client, &address, exam_id, &email, answers).await;
    assert_eq!(submit_resp.status().as_u16(), 200);
    let submit_body: serde_json::Value = submit_resp.json().await.unwrap();
    assert_eq!(submit_body["status"], "PROCESSING");

    // Poll until graded
    let result = poll_result(&client, &address, exam_id, &email).await;
    assert_eq!(result["correct_count"], 2);
    assert_eq!(result["wrong_count"], 1);
    assert_eq!(result["total_questions"], 3);
    assert_eq!(result["score"], 2);
    assert!((result["percentage"].as_f64().unwrap() - 66.67).abs() < 1e-9);
    assert_eq!(result["answers"].as_array().unwrap().len(), 3);

    // The student now appears on the leaderboard
    let leaderboard: Vec<serde_json::Value> = client
        .get(format!("{}/api/exams/{}/leaderboard", address, exam_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = leaderboard
        .iter()
        .find(|e| e["email"] == email.as_str())
        .expect("Student missing from leaderboard");
    assert_eq!(entry["name"], "Ada");
    assert!(entry["rank"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn start_is_idempotent_while_in_progress() {
    let Some((address, _pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let email = unique_email();
    let exam_id = seed_exam(&client, &address).await;

    let first: serde_json::Value = start_attempt(&client, &address, exam_id, &email)
        .await
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = start_attempt(&client, &address, exam_id, &email)
        .await
        .json()
        .await
        .unwrap();

    // Same attempt, unchanged start_time
    assert_eq!(first["start_time"], second["start_time"]);
}

#[tokio::test]
async fn completed_attempt_blocks_restart() {
    let Some((address, _pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let email = unique_email();
    let exam_id = seed_exam(&client, &address).await;

    start_attempt(&client, &address, exam_id, &email).await;
    submit_attempt(&client, &address, exam_id, &email, serde_json::json!([])).await;
    poll_result(&client, &address, exam_id, &email).await;

    let restart = start_attempt(&client, &address, exam_id, &email).await;
    assert_eq!(restart.status().as_u16(), 409);
}

#[tokio::test]
async fn double_submit_is_rejected() {
    let Some((address, _pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let email = unique_email();
    let exam_id = seed_exam(&client, &address).await;

    start_attempt(&client, &address, exam_id, &email).await;

    let first = submit_attempt(&client, &address, exam_id, &email, serde_json::json!([])).await;
    assert_eq!(first.status().as_u16(), 200);

    let second = submit_attempt(&client, &address, exam_id, &email, serde_json::json!([])).await;
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn submit_without_start_is_not_found() {
    let Some((address, _pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let exam_id = seed_exam(&client, &address).await;

    let resp = submit_attempt(
        &client,
        &address,
        exam_id,
        &unique_email(),
        serde_json::json!([]),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn unknown_exam_is_not_found() {
    let Some((address, _pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let resp = start_attempt(&client, &address, 999_999_999, &unique_email()).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn unpublished_exam_is_hidden() {
    let Some((address, pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let now = chrono::Utc::now();

    // Created but never published
    let exam_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO exams (name, start_date, end_date, duration_minutes)
        VALUES ('Hidden', $1, $2, 30)
        RETURNING id
        "#,
    )
    .bind(now - chrono::Duration::hours(1))
    .bind(now + chrono::Duration::hours(1))
    .fetch_one(&pool)
    .await
    .unwrap();

    let resp = start_attempt(&client, &address, exam_id, &unique_email()).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn exam_outside_window_is_not_active() {
    let Some((address, pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let now = chrono::Utc::now();

    let exam_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO exams (name, start_date, end_date, duration_minutes, published)
        VALUES ('Expired', $1, $2, 30, TRUE)
        RETURNING id
        "#,
    )
    .bind(now - chrono::Duration::hours(2))
    .bind(now - chrono::Duration::hours(1))
    .fetch_one(&pool)
    .await
    .unwrap();

    let resp = start_attempt(&client, &address, exam_id, &unique_email()).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn zero_question_exam_grades_to_zero() {
    let Some((address, pool)) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let email = unique_email();
    let now = chrono::Utc::now();

    let exam_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO exams (name, start_date, end_date, duration_minutes, published)
        VALUES ('Empty', $1, $2, 30, TRUE)
        RETURNING id
        "#,
    )
    .bind(now - chrono::Duration::hours(1))
    .bind(now + chrono::Duration::hours(1))
    .fetch_one(&pool)
    .await
    .unwrap();

    start_attempt(&client, &address, exam_id, &email).await;
    submit_attempt(&client, &address, exam_id, &email, serde_json::json!([])).await;
    let result = poll_result(&client, &address, exam_id, &email).await;

    assert_eq!(result["total_questions"], 0);
    assert_eq!(result["percentage"], 0.0);
}
