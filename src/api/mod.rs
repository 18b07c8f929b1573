use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AdminService, AuthService, RecoveryWorkflow};
use crate::state::SharedState;

mod admin;
pub mod auth;
mod error;
mod observability;
mod system;
mod types;

pub use auth::{CurrentUser, FORGOT_REQUEST_MESSAGE};
pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn admin(&self) -> &Arc<dyn AdminService> {
        &self.shared.admin_service
    }

    #[must_use]
    pub fn recovery(&self) -> &RecoveryWorkflow {
        &self.shared.recovery
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/change_own_password", put(auth::change_own_password))
        .route("/change_username", post(auth::change_username))
        .route("/forgot_request", post(auth::forgot_request))
        .route(
            "/admin/change_credentials",
            post(admin::change_credentials).put(admin::change_credentials),
        )
        .route("/admin/create_user", post(admin::create_user))
        .route("/admin/forgot_requests", get(admin::forgot_requests))
        .route(
            "/admin/reset_user_password",
            post(admin::reset_user_password),
        )
        .route("/users", get(admin::list_users))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}
