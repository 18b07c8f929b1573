use crate::api::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// `GET /api/metrics`
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.prometheus_handle.as_ref() {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

/// Per-request span plus the HTTP counter/histogram. The route template is
/// used as the metrics label so ids in paths do not blow up cardinality.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let matched_path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %uri,
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;

        let elapsed = start.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let status = response.status();

        let labels = [
            ("method", method.clone()),
            ("path", matched_path.unwrap_or_else(|| uri.clone())),
            ("status", status.as_u16().to_string()),
        ];

        metrics::counter!("keyward_http_requests_total", &labels).increment(1);
        metrics::histogram!("keyward_http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        if status.is_server_error() {
            warn!(
                event = "http_request_finished",
                duration_ms,
                status_code = status.as_u16(),
                "Request failed"
            );
        } else {
            info!(
                event = "http_request_finished",
                duration_ms,
                status_code = status.as_u16(),
                "Request finished"
            );
        }

        response
    }
    .instrument(span)
    .await
}
