//! Runs one market pulse orchestration end to end and prints the resulting
//! report as JSON on stdout.
//!
//! Accepts an optional user id as its first argument (default `"user-1"`)
//! and a comma-separated index list as its second (default `"NIFTY 50"`).
//! Everything else — model, cache, tool, and agent wiring — comes from
//! `Config::from_env`.

use chrono::Utc;
use pulse::{init_tracing, Config};
use pulse_types::{Request, UserId};

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(&config);

    let singletons = match pulse::build(&config) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to assemble orchestrator: {err}");
            std::process::exit(1);
        }
    };

    let mut args = std::env::args().skip(1);
    let user_id = args.next().unwrap_or_else(|| "user-1".to_string());
    let indices = args
        .next()
        .map(|raw| raw.split(',').map(str::trim).map(str::to_string).collect())
        .unwrap_or_else(|| vec!["NIFTY 50".to_string()]);

    let request = Request {
        user_id: UserId::new(user_id),
        selected_indices: indices,
        timestamp: Utc::now(),
        force_refresh: false,
        preferences: None,
    };

    let report = singletons.orchestrator.orchestrate(request).await;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to serialize report: {err}");
            std::process::exit(1);
        }
    }

    if report.degraded_mode {
        std::process::exit(2);
    }
}
