use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boards::model::Board;

/// Request body for registration and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    #[serde(default)]
    pub register_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryEmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRequest {
    #[serde(default, alias = "registerToken")]
    pub recovery_token: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub boards: Vec<Board>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
