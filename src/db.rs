use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::boards::{model::Board, session::BoardsGateway};

/// One user and every board they own.
#[derive(Debug, Clone, Serialize)]
pub struct UserDocument {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub verified: bool,
    pub boards: Vec<Board>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    verified: bool,
    boards: Json<Vec<Board>>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserDocument {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            verified: r.verified,
            boards: r.boards.0,
            created_at: r.created_at,
        }
    }
}

/// Document store for users. Every write replaces whole fields; there is no
/// version check, so concurrent writers race and the last one wins.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserDocument>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserDocument>>;
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<UserDocument>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<Option<UserDocument>>;
    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<Option<UserDocument>>;
    async fn replace_boards(&self, id: Uuid, boards: &[Board]) -> anyhow::Result<Option<UserDocument>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str = "id, email, password_hash, verified, boards, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserDocument>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserDocument>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(Into::into))
    }

    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<UserDocument> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .context("insert user")?;
        Ok(row.into())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<Option<UserDocument>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET password_hash = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .context("update password")?;
        Ok(row.map(Into::into))
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<Option<UserDocument>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET verified = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("mark user verified")?;
        Ok(row.map(Into::into))
    }

    async fn replace_boards(&self, id: Uuid, boards: &[Board]) -> anyhow::Result<Option<UserDocument>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET boards = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(Json(boards.to_vec()))
        .fetch_optional(&self.db)
        .await
        .context("replace boards")?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserDocument>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserDocument>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserDocument>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<UserDocument> {
        let mut users = self.users.write().await;
        anyhow::ensure!(
            users.values().all(|u| u.email != email),
            "email {email} already stored"
        );
        let user = UserDocument {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            verified: false,
            boards: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<Option<UserDocument>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|u| {
            u.password_hash = password_hash.to_string();
            u.clone()
        }))
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<Option<UserDocument>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|u| {
            u.verified = true;
            u.clone()
        }))
    }

    async fn replace_boards(&self, id: Uuid, boards: &[Board]) -> anyhow::Result<Option<UserDocument>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|u| {
            u.boards = boards.to_vec();
            u.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

/// The boards of one user, seen through the document store.
#[derive(Clone)]
pub struct UserBoards {
    pub store: Arc<dyn UserStore>,
    pub user_id: Uuid,
}

#[async_trait]
impl BoardsGateway for UserBoards {
    async fn replace_boards(&self, boards: &[Board]) -> anyhow::Result<Vec<Board>> {
        let user = self
            .store
            .replace_boards(self.user_id, boards)
            .await?
            .with_context(|| format!("user {} not found", self.user_id))?;
        Ok(user.boards)
    }
}
