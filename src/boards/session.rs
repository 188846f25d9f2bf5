use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::model::Board;
use super::ordering::{self, BoardError, BoardPatch, TicketDrop, TicketPatch, TicketSlot};

/// Whole-document persistence for one user's boards.
#[async_trait]
pub trait BoardsGateway: Send + Sync {
    /// Replaces the stored list as one unit and returns what was stored.
    async fn replace_boards(&self, boards: &[Board]) -> anyhow::Result<Vec<Board>>;
}

/// Named transitions over a board list.
#[derive(Debug, Clone)]
pub enum BoardsMutation {
    AddBoard { name: String, color: Option<String> },
    UpdateBoard { board_id: String, patch: BoardPatch },
    ReorderBoards { from: usize, to: usize },
    DeleteBoard { board_id: String },
    AddTicket { board_id: String, description: String },
    UpdateTicket { board_id: String, ticket_id: String, patch: TicketPatch },
    MoveTicket { source: TicketSlot, destination: TicketDrop },
    DeleteTicket { board_id: String, ticket_id: String },
    Replace(Vec<Board>),
}

impl BoardsMutation {
    fn name(&self) -> &'static str {
        match self {
            Self::AddBoard { .. } => "add_board",
            Self::UpdateBoard { .. } => "update_board",
            Self::ReorderBoards { .. } => "reorder_boards",
            Self::DeleteBoard { .. } => "delete_board",
            Self::AddTicket { .. } => "add_ticket",
            Self::UpdateTicket { .. } => "update_ticket",
            Self::MoveTicket { .. } => "move_ticket",
            Self::DeleteTicket { .. } => "delete_ticket",
            Self::Replace(_) => "replace",
        }
    }

    /// Applies the transition to `boards`. Returns whether anything changed.
    pub fn apply_to(self, boards: &mut Vec<Board>) -> Result<bool, BoardError> {
        match self {
            Self::AddBoard { name, color } => ordering::insert_board(boards, &name, color).map(|_| true),
            Self::UpdateBoard { board_id, patch } => ordering::update_board(boards, &board_id, patch),
            Self::ReorderBoards { from, to } => ordering::reorder_boards(boards, from, to),
            Self::DeleteBoard { board_id } => ordering::delete_board(boards, &board_id).map(|_| true),
            Self::AddTicket { board_id, description } => {
                ordering::insert_ticket(boards, &board_id, &description).map(|_| true)
            }
            Self::UpdateTicket { board_id, ticket_id, patch } => {
                ordering::update_ticket(boards, &board_id, &ticket_id, patch)
            }
            Self::MoveTicket { source, destination } => {
                ordering::move_ticket(boards, &source, &destination)
            }
            Self::DeleteTicket { board_id, ticket_id } => {
                ordering::delete_ticket(boards, &board_id, &ticket_id).map(|_| true)
            }
            Self::Replace(incoming) => ordering::replace_boards(boards, incoming),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] BoardError),
    #[error("persisting boards failed: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

/// Owns the in-memory board list and keeps the gateway in step with it.
///
/// Mutations are applied locally first. When the gateway write fails the
/// previous list is restored, so the local state never drifts from what a
/// reader of the store could see.
pub struct BoardsSession<G> {
    gateway: G,
    boards: Vec<Board>,
}

impl<G: BoardsGateway> BoardsSession<G> {
    pub fn new(gateway: G, boards: Vec<Board>) -> Self {
        Self { gateway, boards }
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn into_boards(self) -> Vec<Board> {
        self.boards
    }

    pub async fn apply(&mut self, mutation: BoardsMutation) -> Result<&[Board], SessionError> {
        let name = mutation.name();
        let previous = self.boards.clone();

        let changed = match mutation.apply_to(&mut self.boards) {
            Ok(changed) => changed,
            Err(e) => {
                self.boards = previous;
                debug!(mutation = name, error = %e, "mutation rejected");
                return Err(e.into());
            }
        };
        if !changed {
            debug!(mutation = name, "mutation is a no-op, skipping write");
            return Ok(&self.boards);
        }

        match self.gateway.replace_boards(&self.boards).await {
            Ok(stored) => {
                self.boards = stored;
                debug!(mutation = name, boards = self.boards.len(), "boards persisted");
                Ok(&self.boards)
            }
            Err(e) => {
                warn!(mutation = name, error = %e, "persisting boards failed, reverting");
                self.boards = previous;
                Err(SessionError::Persistence(e))
            }
        }
    }
}
