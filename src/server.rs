//! HTTP surface: health, the consolidated report, and the raw data directory
//!
//! Unknown paths fall through to the data directory, so `GET /errors.json`
//! and the per-target `/<orgKey>/<connectorName>/errors.json` files are
//! served as-is. Dot-prefixed names (temporary files) are never served.

use crate::events::to_iso;
use crate::monitoring::CycleMonitor;
use crate::output::ReportWriter;
use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::{debug, info};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

const INDEX_TEXT: &str = "Datadog Errors Monitor\n\n\
Consolidated errors: /errors\n\
Health check: /health\n\
Raw data folder: / (data directory)\n\
Per-integration logs: /<orgKey>/<connectorName>/errors.json\n\n\
The /errors endpoint provides a single JSON file with all errors\n\
and summary statistics for easy monitoring and integration.\n";

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub writer: ReportWriter,
    pub monitor: CycleMonitor,
}

/// Build the router over `state`
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.writer.data_dir());

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/errors", get(errors))
        .fallback_service(static_files)
        .layer(middleware::from_fn(hide_dotfiles))
        .with_state(state)
}

/// Answer 404 for any path with a dot-prefixed segment, decoded or not
async fn hide_dotfiles(request: Request, next: Next) -> Response {
    let hidden = match urlencoding::decode(request.uri().path()) {
        Ok(path) => path.split('/').any(|segment| segment.starts_with('.')),
        Err(_) => true,
    };

    if hidden {
        debug!("Refusing hidden path {}", request.uri().path());
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

/// Bind `0.0.0.0:port` and serve until `shutdown` is cancelled
pub async fn serve(port: u16, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        "Serving {} at http://localhost:{}",
        state.writer.data_dir().display(),
        port
    );
    serve_on(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is cancelled
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn index() -> &'static str {
    INDEX_TEXT
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.monitor.snapshot();

    Json(json!({
        "ok": true,
        "now": to_iso(&Utc::now()),
        "lastCycle": snapshot.last_cycle,
        "cycles": {
            "completed": snapshot.completed_cycles,
            "failed": snapshot.failed_cycles,
            "skipped": snapshot.skipped_cycles,
            "consecutiveFailures": snapshot.consecutive_failures,
        },
    }))
}

async fn errors(State(state): State<AppState>) -> Response {
    let path = state.writer.report_path();

    match tokio::fs::read(&path).await {
        Ok(contents) => ([(header::CONTENT_TYPE, "application/json")], contents).into_response(),
        Err(e) => {
            debug!("Report not readable at {}: {}", path.display(), e);
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No errors data available yet" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{ConsolidatedReport, LinkResult, Summary};
    use crate::events::TimeWindow;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(dir: &TempDir) -> AppState {
        AppState {
            writer: ReportWriter::new(dir.path()),
            monitor: CycleMonitor::new(),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|value| value.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, content_type, body)
    }

    #[tokio::test]
    async fn test_health_reports_last_cycle() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let (status, _, body) = get(router(state.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json["now"].as_str().unwrap().ends_with('Z'));
        assert!(json["lastCycle"].is_null());

        state.monitor.start_cycle().complete(&Summary {
            total_errors: 3,
            processed_links: 1,
            ..Default::default()
        });

        let (_, _, body) = get(router(state), "/health").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["lastCycle"]["outcome"], "completed");
        assert_eq!(json["lastCycle"]["totalErrors"], 3);
        assert_eq!(json["cycles"]["completed"], 1);
    }

    #[tokio::test]
    async fn test_errors_missing_report_is_404() {
        let dir = TempDir::new().unwrap();

        let (status, _, body) = get(router(state(&dir)), "/errors").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "No errors data available yet");
    }

    #[tokio::test]
    async fn test_errors_serves_report() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let now = Utc::now();
        let report = ConsolidatedReport {
            generated_at: now,
            window_minutes: 5,
            time_range: TimeWindow::ending_at(now, 5).unwrap(),
            summary: Summary {
                failed_links: 2,
                ..Default::default()
            },
            errors: Vec::new(),
        };
        state.writer.write(&report).await.unwrap();

        let (status, content_type, body) = get(router(state), "/errors").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["summary"]["failedLinks"], 2);
    }

    #[tokio::test]
    async fn test_index_is_plain_text() {
        let dir = TempDir::new().unwrap();

        let (status, content_type, body) = get(router(state(&dir)), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/plain"));
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("Datadog Errors Monitor"));
        assert!(text.contains("/errors"));
        assert!(text.contains("/health"));
    }

    #[tokio::test]
    async fn test_data_directory_served_statically() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let (status, _, body) = get(router(state(&dir)), "/notes.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"hello");

        let (status, _, _) = get(router(state(&dir)), "/missing.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_temporary_files_not_served() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".errors.json.tmp"), "{\"partial\":").unwrap();
        std::fs::create_dir(dir.path().join("o1")).unwrap();
        std::fs::write(dir.path().join("o1").join(".errors.json.tmp"), "{").unwrap();

        for uri in [
            "/.errors.json.tmp",
            "/%2Eerrors.json.tmp",
            "/%2eerrors.json.tmp",
            "/o1/.errors.json.tmp",
            "/o1/%2Eerrors.json.tmp",
        ] {
            let (status, _, _) = get(router(state(&dir)), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_target_report_served_statically() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let result = LinkResult {
            org_key: "o1".to_string(),
            connector_name: "svc-sub-v1".to_string(),
            raw_connector_name: "svc-sub-v1".to_string(),
            logs: Vec::new(),
            query: "source:app".to_string(),
            original_link: None,
        };
        state
            .writer
            .write_target(&result.target_report(Utc::now(), 5))
            .await
            .unwrap();

        let (status, _, body) = get(router(state), "/o1/svc-sub-v1/errors.json").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["orgKey"], "o1");
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancellation() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();

        let server = tokio::spawn(serve_on(listener, state(&dir), shutdown.clone()));
        shutdown.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
