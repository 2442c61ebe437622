//! HTTP control service.
//!
//! | route     | does                                         |
//! |-----------|----------------------------------------------|
//! | `/start`  | open the browser and wait for the login      |
//! | `/ready`  | login done, begin monitoring                 |
//! | `/stop`   | stop monitoring and close the browser        |
//! | `/status` | `running` / `stopped` plus the precise state |
//! | `/config` | read (GET) or replace (POST) the settings    |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::config::BotConfig;
use crate::lifecycle::LifecycleState;
use crate::registry::{BotRegistry, ControlError};

#[derive(Debug, Serialize)]
struct Reply {
    status: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct StatusReply {
    status: &'static str,
    state: LifecycleState,
}

fn success(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(Reply {
            status: "success",
            message: message.into(),
        }),
    )
        .into_response()
}

fn failure(code: StatusCode, err: ControlError) -> Response {
    (
        code,
        Json(Reply {
            status: "error",
            message: err.to_string(),
        }),
    )
        .into_response()
}

pub fn router(registry: Arc<BotRegistry>) -> Router {
    Router::new()
        .route("/start", get(start).post(start))
        .route("/ready", get(ready).post(ready))
        .route("/stop", get(stop).post(stop))
        .route("/status", get(status))
        .route("/config", get(get_config).post(post_config))
        .with_state(registry)
}

async fn start(State(registry): State<Arc<BotRegistry>>) -> Response {
    match registry.start().await {
        Ok(()) => success("Browser opened. Log in, open the channel, then call /ready."),
        Err(e @ ControlError::AlreadyRunning) => failure(StatusCode::BAD_REQUEST, e),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn ready(State(registry): State<Arc<BotRegistry>>) -> Response {
    match registry.signal_ready().await {
        Ok(()) => success("Monitoring started."),
        Err(e) => failure(StatusCode::BAD_REQUEST, e),
    }
}

async fn stop(State(registry): State<Arc<BotRegistry>>) -> Response {
    match registry.stop().await {
        Ok(()) => success("Bot shutdown initiated."),
        Err(e) => failure(StatusCode::BAD_REQUEST, e),
    }
}

async fn status(State(registry): State<Arc<BotRegistry>>) -> Json<StatusReply> {
    let state = registry.status().await;
    Json(StatusReply {
        status: if state.is_running() {
            "running"
        } else {
            "stopped"
        },
        state,
    })
}

async fn get_config(State(registry): State<Arc<BotRegistry>>) -> Json<BotConfig> {
    Json(registry.config().await)
}

async fn post_config(
    State(registry): State<Arc<BotRegistry>>,
    Json(config): Json<BotConfig>,
) -> Response {
    match registry.reconfigure(config).await {
        Ok(()) => (StatusCode::OK, Json(registry.config().await)).into_response(),
        Err(e @ ControlError::Busy) => failure(StatusCode::CONFLICT, e),
        Err(e @ ControlError::InvalidConfig(_)) => failure(StatusCode::UNPROCESSABLE_ENTITY, e),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Serve until Ctrl+C, then stop the bot.
pub async fn serve(registry: Arc<BotRegistry>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind to {addr}, is another instance running?"))?;

    info!("serving control API at http://{addr}");
    info!("call http://{addr}/start to open the browser");

    axum::serve(listener, router(Arc::clone(&registry)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("server shutting down");
        })
        .await
        .context("server error")?;

    registry.shutdown().await;
    Ok(())
}
