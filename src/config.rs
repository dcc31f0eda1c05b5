// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,

    /// Number of background grading workers draining the job queue.
    pub grading_workers: usize,

    /// Capacity of the bounded grading job queue.
    pub grading_queue_capacity: usize,

    /// How often the recovery sweep looks for stuck EVALUATING attempts.
    pub sweep_interval_secs: u64,

    /// Age after which an EVALUATING attempt is considered stuck and requeued.
    pub stuck_after_secs: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let grading_workers = env::var("GRADING_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        let grading_queue_capacity = env::var("GRADING_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(256);

        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let stuck_after_secs = env::var("STUCK_AFTER_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        Self {
            database_url,
            rust_log,
            grading_workers,
            grading_queue_capacity,
            sweep_interval_secs,
            stuck_after_secs,
        }
    }
}
