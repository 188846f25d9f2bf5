use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    boards::{
        model::Board,
        session::{BoardsMutation, BoardsSession},
    },
    db::{UserBoards, UserDocument},
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub boards: Vec<Board>,
}

impl From<UserDocument> for UserResponse {
    fn from(user: UserDocument) -> Self {
        Self {
            id: user.id,
            email: user.email,
            boards: user.boards,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatchUserRequest {
    pub boards: Vec<Board>,
}

pub fn users_routes() -> Router<AppState> {
    Router::new().route("/users/:id", get(get_user).patch(patch_user).delete(delete_user))
}

/// Loads the document at `path_id` for the caller, who must own it and be
/// verified.
pub(crate) async fn load_owner(
    state: &AppState,
    caller: Uuid,
    path_id: Uuid,
) -> AppResult<UserDocument> {
    if caller != path_id {
        warn!(%caller, %path_id, "access to another user's document");
        return Err(AppError::Forbidden);
    }
    let user = state
        .store
        .find_by_id(path_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))?;
    if !user.verified {
        warn!(user_id = %user.id, "unverified user");
        return Err(AppError::NotVerified);
    }
    Ok(user)
}

/// Opens a boards session over the caller's document. The returned
/// document has its boards moved into the session.
pub(crate) async fn open_session(
    state: &AppState,
    caller: Uuid,
    path_id: Uuid,
) -> AppResult<(UserDocument, BoardsSession<UserBoards>)> {
    let mut user = load_owner(state, caller, path_id).await?;
    let gateway = UserBoards {
        store: state.store.clone(),
        user_id: user.id,
    };
    let boards = std::mem::take(&mut user.boards);
    Ok((user, BoardsSession::new(gateway, boards)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = load_owner(&state, caller, id).await?;
    Ok(Json(user.into()))
}

/// Replaces the whole board list after checking it is consistent.
#[instrument(skip(state, payload))]
pub async fn patch_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<PatchUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let (user, mut session) = open_session(&state, caller, id).await?;
    session.apply(BoardsMutation::Replace(payload.boards)).await?;

    info!(user_id = %user.id, boards = session.boards().len(), "boards replaced");
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        boards: session.into_boards(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let user = load_owner(&state, caller, id).await?;
    if !state.store.delete(user.id).await? {
        return Err(AppError::NotFound("user".into()));
    }
    info!(user_id = %user.id, "user deleted");
    Ok(Json(MessageResponse::new("The user has been deleted")))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, mail::testing::RecordingMailer, state::AppState};

    pub(crate) fn test_app() -> (Router, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with_mailer(mailer.clone());
        (build_app(state), mailer)
    }

    pub(crate) async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub(crate) async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/kanbanify/api{uri}"))
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("x-token", token);
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Registers and confirms `email`, returning `(user_id, token)`.
    pub(crate) async fn signed_up(
        app: &Router,
        mailer: &RecordingMailer,
        email: &str,
    ) -> (String, String) {
        let creds = json!({ "email": email, "password": "secret1" });
        let (status, _) = send(app, "POST", "/auth/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let token = mailer.last_token().unwrap();
        let (status, _) = send(
            app,
            "POST",
            "/auth/confirm",
            None,
            Some(json!({ "registerToken": token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, "POST", "/auth/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        (
            body["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn register_returns_created_session() {
        let (app, _mailer) = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "ada@example.com");
        assert!(body["token"].as_str().is_some());
        assert_eq!(body["boards"], json!([]));
    }

    #[tokio::test]
    async fn unverified_user_cannot_read_document() {
        let (app, _mailer) = test_app();
        let (_, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": "secret1" })),
        )
        .await;
        let id = body["id"].as_str().unwrap();
        let token = body["token"].as_str().unwrap();

        let (status, _) = send(&app, "GET", &format!("/users/{id}"), Some(token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn login_unverified_is_forbidden() {
        let (app, _mailer) = test_app();
        let creds = json!({ "email": "ada@example.com", "password": "secret1" });
        send(&app, "POST", "/auth/register", None, Some(creds.clone())).await;
        let (status, body) = send(&app, "POST", "/auth/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "user not verified");
    }

    #[tokio::test]
    async fn get_user_requires_token() {
        let (app, mailer) = test_app();
        let (id, _token) = signed_up(&app, &mailer, "ada@example.com").await;

        let (status, body) = send(&app, "GET", &format!("/users/{id}"), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "there is no token");

        let (status, _) = send(&app, "GET", &format!("/users/{id}"), Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let request = Request::builder()
            .uri(format!("/kanbanify/api/users/{id}"))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn other_users_document_is_forbidden() {
        let (app, mailer) = test_app();
        let (ada, _) = signed_up(&app, &mailer, "ada@example.com").await;
        let (_, bob_token) = signed_up(&app, &mailer, "bob@example.com").await;

        let (status, _) = send(&app, "GET", &format!("/users/{ada}"), Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, "DELETE", &format!("/users/{ada}"), Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn patch_replaces_boards_in_rank_order() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let boards = json!([
            { "id": "b", "name": "Doing", "color": "", "createdAt": 2, "indexOrder": 1,
              "tickets": [{ "id": "t1", "description": "x", "content": "", "color": "",
                            "createdAt": 3, "categoryId": "b" }] },
            { "_id": "a", "name": "Todo", "createdAt": 1, "indexOrder": 0 }
        ]);
        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/users/{id}"),
            Some(&token),
            Some(json!({ "boards": boards })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["boards"][0]["id"], "a");
        assert_eq!(body["boards"][1]["id"], "b");
        assert_eq!(body["boards"][1]["tickets"][0]["categoryId"], "b");

        let (_, stored) = send(&app, "GET", &format!("/users/{id}"), Some(&token), None).await;
        assert_eq!(stored["boards"], body["boards"]);
    }

    #[tokio::test]
    async fn patch_rejects_inconsistent_boards() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let boards = json!([
            { "id": "a", "name": "Todo", "createdAt": 1, "indexOrder": 0,
              "tickets": [{ "id": "t1", "description": "x", "content": "", "color": "",
                            "createdAt": 3, "categoryId": "zzz" }] }
        ]);
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/users/{id}"),
            Some(&token),
            Some(json!({ "boards": boards })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, stored) = send(&app, "GET", &format!("/users/{id}"), Some(&token), None).await;
        assert_eq!(stored["boards"], json!([]));
    }

    #[tokio::test]
    async fn patch_applies_board_and_ticket_rules() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let boards = json!([
            { "id": "a", "name": "x", "createdAt": 1, "indexOrder": 0,
              "tickets": [{ "id": "t1", "description": "", "content": "", "color": "",
                            "createdAt": 3, "categoryId": "a" }] },
            { "id": "b", "name": "X", "createdAt": 2, "indexOrder": 1 }
        ]);
        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/users/{id}"),
            Some(&token),
            Some(json!({ "boards": boards })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().is_some());

        let clash = json!([
            { "id": "a", "name": "Todo", "createdAt": 1, "indexOrder": 0 },
            { "id": "b", "name": "TODO", "createdAt": 2, "indexOrder": 1 }
        ]);
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/users/{id}"),
            Some(&token),
            Some(json!({ "boards": clash })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, stored) = send(&app, "GET", &format!("/users/{id}"), Some(&token), None).await;
        assert_eq!(stored["boards"], json!([]));
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let (status, body) =
            send(&app, "PATCH", &format!("/users/{id}"), Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("boards"));

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/users/{id}"),
            Some(&token),
            Some(json!({ "boards": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().is_some());

        let (status, body) = send(&app, "POST", "/auth/confirm", None, Some(json!("nope"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().is_some());
    }

    #[tokio::test]
    async fn delete_user_removes_document() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let (status, _) = send(&app, "DELETE", &format!("/users/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/users/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_issues_new_session() {
        let (app, mailer) = test_app();
        let (id, token) = signed_up(&app, &mailer, "ada@example.com").await;

        let (status, body) = send(&app, "POST", "/auth/refresh", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());
        assert!(body["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn confirm_with_bad_token_is_not_found() {
        let (app, _mailer) = test_app();
        let (status, _) = send(
            &app,
            "POST",
            "/auth/confirm",
            None,
            Some(json!({ "registerToken": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn recovery_email_answers_the_same_for_unknown_accounts() {
        let (app, mailer) = test_app();
        signed_up(&app, &mailer, "ada@example.com").await;

        let (known, known_body) = send(
            &app,
            "POST",
            "/auth/recovery/email",
            None,
            Some(json!({ "email": "ada@example.com" })),
        )
        .await;
        let (unknown, unknown_body) = send(
            &app,
            "POST",
            "/auth/recovery/email",
            None,
            Some(json!({ "email": "ghost@example.com" })),
        )
        .await;
        assert_eq!(known, StatusCode::OK);
        assert_eq!(unknown, StatusCode::OK);
        assert_eq!(known_body, unknown_body);

        let token = mailer.last_token().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            "/auth/recovery",
            None,
            Some(json!({ "recoveryToken": token, "password": "another1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (app, _mailer) = test_app();
        let request = Request::builder()
            .uri("/kanbanify/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
