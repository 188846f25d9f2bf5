use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ConfirmRequest, CredentialsRequest, MessageResponse, RecoveryEmailRequest,
            RecoveryRequest, SessionResponse,
        },
        extractors::AuthUser,
        services,
    },
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/confirm", post(confirm))
        .route("/auth/refresh", post(refresh))
        .route("/auth/recovery", post(recovery))
        .route("/auth/recovery/email", post(recovery_email))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let user = services::register(&state, &payload.email, &payload.password).await?;
    let session = services::issue_session(&state, user)?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> AppResult<Json<SessionResponse>> {
    let user = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(services::issue_session(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn confirm(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ConfirmRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::confirm_registration(&state, &payload.register_token).await?;
    Ok(Json(MessageResponse::new("The account has been confirmed")))
}

/// Issues a fresh access token for the caller and returns their boards.
#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<SessionResponse>> {
    let user = state.store.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "refresh for deleted user");
        AppError::InvalidToken
    })?;
    info!(%user_id, "token refreshed");
    Ok(Json(services::issue_session(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn recovery_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RecoveryEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::request_recovery(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(
        "If the account exists, a recovery mail is on its way",
    )))
}

#[instrument(skip(state, payload))]
pub async fn recovery(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RecoveryRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(&state, &payload.recovery_token, &payload.password).await?;
    Ok(Json(MessageResponse::new("The password has been changed")))
}
