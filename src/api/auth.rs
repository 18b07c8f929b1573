use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, ChangeOwnPasswordRequest, ChangeUsernameRequest,
    ForgotRequest, LoginRequest, LoginResponse, MeResponse, MessageResponse,
};
use crate::domain::Identity;
use crate::services::bearer_token;

/// Same reply for known and unknown usernames.
pub const FORGOT_REQUEST_MESSAGE: &str = "If the username exists, a request has been recorded.";

// ============================================================================
// Extractor
// ============================================================================

/// The verified caller. Rejects with 401 on a missing, malformed, expired or
/// forged bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = bearer_token(header).ok_or(ApiError::Unauthorized)?;
        let identity = state.auth().get_identity(token)?;

        tracing::Span::current().record("user_id", identity.user_id.value());
        Ok(Self(identity))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /login
/// Verify username and password, returns a bearer token on success
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let outcome = state
        .auth()
        .login(&payload.username, &payload.password, payload.is_admin)
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        access_token: outcome.token,
        token_type: "Bearer",
        must_reset: outcome.must_reset,
        user: outcome.user,
    })))
}

/// GET /me
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<ApiResponse<MeResponse>> {
    Json(ApiResponse::success(MeResponse { user: identity }))
}

/// PUT /change_own_password
pub async fn change_own_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<ChangeOwnPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth()
        .change_own_password(&identity, &payload.old_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

/// POST /change_username
/// Admin only; requires the current password
pub async fn change_username(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<ChangeUsernameRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth()
        .change_own_username(&identity, &payload.new_username, &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Username updated successfully",
    ))))
}

/// POST /forgot_request
/// Unauthenticated. Answers identically whether or not the user exists.
pub async fn forgot_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse>>), ApiError> {
    state.recovery().request(&payload.username).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(MessageResponse::new(
            FORGOT_REQUEST_MESSAGE,
        ))),
    ))
}
