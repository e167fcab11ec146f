use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tokio::signal;
use tracing::{info, warn, Level};

use floodgate::config::FloodgateConfig;
use floodgate::http::{enforce, RateLimitGuard};
use floodgate::ratelimit::RateLimiter;
use floodgate::store::MemoryStore;

/// Sliding-window admission control in front of a voting API.
#[derive(Parser, Debug)]
#[command(name = "floodgate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    info!("Starting Floodgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = FloodgateConfig::load(args.config.as_deref())?;
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    // Build the store handle once and inject it; no ambient singletons.
    let limiter = match &config.limiter.store_url {
        Some(url) => {
            // The in-process store is the only adapter shipped with the
            // crate; networked adapters plug in behind the same trait.
            info!(store = %url, "Rate limiting enabled");
            Arc::new(
                RateLimiter::new(Arc::new(MemoryStore::new()))
                    .with_retry(config.limiter.retry()),
            )
        }
        None => {
            warn!("No store configured, rate limiting is inert");
            Arc::new(RateLimiter::disabled())
        }
    };

    let vote_guard = RateLimitGuard::new(
        limiter.clone(),
        config.limiter.vote.to_policy("vote"),
        config.limiter.failure_mode,
    );
    let numbers_guard = RateLimitGuard::new(
        limiter,
        config.limiter.numbers.to_policy("numbers"),
        config.limiter.failure_mode,
    );

    let app = Router::new()
        .route("/vote", post(submit_vote))
        .route_layer(from_fn_with_state(vote_guard, enforce))
        .merge(
            Router::new()
                .route("/numbers", get(fetch_numbers))
                .route_layer(from_fn_with_state(numbers_guard, enforce)),
        );

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr)
        .await
        .context("binding listen address")?;
    info!("Listening on {}", config.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Floodgate stopped");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct VoteSubmission {
    number1: i64,
    number2: i64,
    winner: i64,
}

/// Accept a vote once the guard has admitted it. Persisting the vote is
/// the surrounding application's job; this service only validates shape.
async fn submit_vote(Json(vote): Json<VoteSubmission>) -> Response {
    if vote.winner != vote.number1 && vote.winner != vote.number2 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Winner must be one of the two numbers" })),
        )
            .into_response();
    }
    Json(json!({ "success": true })).into_response()
}

/// Hand out a fresh pair of distinct numbers to vote on.
async fn fetch_numbers() -> Json<serde_json::Value> {
    let mut rng = rand::thread_rng();
    let number1: u32 = rng.gen_range(1..=100);
    let mut number2: u32 = rng.gen_range(1..=100);
    while number2 == number1 {
        number2 = rng.gen_range(1..=100);
    }
    Json(json!({ "number1": number1, "number2": number2 }))
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
