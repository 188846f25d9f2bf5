use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A board ("category") embedded in the user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    pub created_at: i64,     // unix millis
    pub index_order: usize,  // dense 0-based rank among the user's boards
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

/// A ticket ("entry"). Its order inside a board is its array position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(alias = "_id")]
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub color: String,
    pub created_at: i64,
    pub category_id: String, // back-reference to the containing board
}

pub const DEFAULT_BOARD_COLOR: &str = "rgb(255, 255, 255)";

impl Board {
    pub fn new(name: String, color: Option<String>, index_order: usize) -> Self {
        Self {
            id: new_id(),
            name,
            color: color.unwrap_or_else(|| DEFAULT_BOARD_COLOR.to_string()),
            created_at: now_millis(),
            index_order,
            tickets: Vec::new(),
        }
    }

    pub fn ticket_position(&self, ticket_id: &str) -> Option<usize> {
        self.tickets.iter().position(|t| t.id == ticket_id)
    }
}

impl Ticket {
    pub fn new(description: String, category_id: &str) -> Self {
        Self {
            id: new_id(),
            description,
            content: String::new(),
            color: String::new(),
            created_at: now_millis(),
            category_id: category_id.to_string(),
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
