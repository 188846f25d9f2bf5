use anyhow::Context;
use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{
    claims::TokenKind,
    dto::SessionResponse,
    jwt::JwtKeys,
    password::{hash_password, verify_password, PASSWORD_MIN_LEN},
};
use crate::{
    db::UserDocument,
    error::{AppError, AppResult},
    mail::{confirmation_mail, recovery_mail},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are matched exactly after trimming; case is significant.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_string()
}

fn validate_email(email: &str) -> AppResult<()> {
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("The email is required".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        warn!("password too short");
        return Err(AppError::Validation(format!(
            "The password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

/// Signs an access token for `user` and packs the session payload.
pub fn issue_session(state: &AppState, user: UserDocument) -> AppResult<SessionResponse> {
    let token = JwtKeys::from_ref(state).sign_access(user.id, &user.email)?;
    Ok(SessionResponse {
        id: user.id,
        email: user.email,
        token,
        boards: user.boards,
    })
}

/// Creates a pending account and mails its confirmation link.
///
/// An unverified account with the same email is a stale registration and
/// gets the new password; a verified one is a conflict.
pub async fn register(state: &AppState, email: &str, password: &str) -> AppResult<UserDocument> {
    let email = normalize_email(email);
    validate_email(&email)?;
    validate_password(password)?;

    let existing = state.store.find_by_email(&email).await?;
    if existing.as_ref().is_some_and(|u| u.verified) {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(password)?;
    let user = match existing {
        Some(stale) => {
            info!(user_id = %stale.id, email = %email, "replacing stale registration");
            state
                .store
                .set_password(stale.id, &hash)
                .await?
                .with_context(|| format!("user {} vanished during registration", stale.id))?
        }
        None => state.store.create(&email, &hash).await?,
    };

    let token = JwtKeys::from_ref(state).sign(user.id, &user.email, TokenKind::Register)?;
    state
        .mailer
        .send(confirmation_mail(&state.config.public_url, &user.email, &token))
        .await
        .context("send confirmation mail")?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<UserDocument> {
    let email = normalize_email(email);
    validate_email(&email)?;

    let Some(user) = state.store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.verified {
        warn!(user_id = %user.id, "login before confirmation");
        return Err(AppError::NotVerified);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(user)
}

pub async fn confirm_registration(state: &AppState, token: &str) -> AppResult<UserDocument> {
    let invalid = || AppError::NotFound("registration token".into());

    let claims = JwtKeys::from_ref(state)
        .verify_kind(token, TokenKind::Register)
        .map_err(|e| {
            warn!(error = %e, "invalid register token");
            invalid()
        })?;

    let user = state.store.find_by_id(claims.sub).await?.ok_or_else(invalid)?;
    if user.verified {
        return Err(AppError::Conflict("The account is already confirmed".into()));
    }
    let user = state.store.mark_verified(user.id).await?.ok_or_else(invalid)?;

    info!(user_id = %user.id, "registration confirmed");
    Ok(user)
}

/// Mails a recovery link when a verified account owns `email`. Answers the
/// same way either way.
pub async fn request_recovery(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email);
    validate_email(&email)?;

    match state.store.find_by_email(&email).await? {
        Some(user) if user.verified => {
            let token = JwtKeys::from_ref(state).sign(user.id, &user.email, TokenKind::Recovery)?;
            state
                .mailer
                .send(recovery_mail(&state.config.public_url, &user.email, &token))
                .await
                .context("send recovery mail")?;
            info!(user_id = %user.id, "recovery mail sent");
        }
        _ => debug!(email = %email, "recovery requested for unknown or unverified email"),
    }
    Ok(())
}

pub async fn reset_password(state: &AppState, token: &str, password: &str) -> AppResult<UserDocument> {
    validate_password(password)?;

    let claims = JwtKeys::from_ref(state)
        .verify_kind(token, TokenKind::Recovery)
        .map_err(|e| {
            warn!(error = %e, "invalid recovery token");
            AppError::InvalidToken
        })?;

    let hash = hash_password(password)?;
    let user = state
        .store
        .set_password(claims.sub, &hash)
        .await?
        .ok_or(AppError::InvalidToken)?;

    info!(user_id = %user.id, "password reset");
    Ok(user)
}
