//! Administrator endpoints. The services enforce the role check, so a
//! valid non-admin token gets 403 here.

use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, ChangeCredentialsRequest, CreateUserRequest,
    CreatedUserResponse, CurrentUser, MessageResponse, RecoveryRequestsResponse,
    ResetUserPasswordRequest, UsersResponse,
};
use crate::services::CredentialChange;

/// POST|PUT /admin/change_credentials
pub async fn change_credentials(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<ChangeCredentialsRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let change = CredentialChange {
        new_username: payload.new_username.as_deref(),
        new_password: payload.new_password.as_deref(),
    };

    state
        .admin()
        .change_admin_credentials(&identity, &payload.current_password, change)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Credentials updated successfully",
    ))))
}

/// POST /admin/create_user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedUserResponse>>), ApiError> {
    let id = state
        .admin()
        .create_user(&identity, &payload.username, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreatedUserResponse {
            id,
            username: payload.username,
        })),
    ))
}

/// GET /admin/forgot_requests
pub async fn forgot_requests(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ApiResponse<RecoveryRequestsResponse>>, ApiError> {
    let requests = state.admin().list_pending_recovery(&identity).await?;
    Ok(Json(ApiResponse::success(RecoveryRequestsResponse {
        requests,
    })))
}

/// POST /admin/reset_user_password
pub async fn reset_user_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<ResetUserPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .admin()
        .reset_password(
            &identity,
            payload.user_id,
            &payload.new_password,
            &payload.admin_note,
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User password reset by admin",
    ))))
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ApiResponse<UsersResponse>>, ApiError> {
    let users = state.admin().list_users(&identity).await?;
    Ok(Json(ApiResponse::success(UsersResponse { users })))
}
