//! Ordered-collection rules for a user's boards and their tickets.
//!
//! Every operation validates before touching the list, so a rejected
//! operation leaves `boards` exactly as it was. Operations that change
//! nothing return `Ok(false)` so callers can skip the persistence round-trip.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use super::model::{Board, Ticket};

pub const BOARD_NAME_MIN: usize = 3;
pub const BOARD_NAME_MAX: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("the board name should have at least {} characters", BOARD_NAME_MIN)]
    NameTooShort,
    #[error("the board name should have at most {} characters", BOARD_NAME_MAX)]
    NameTooLong,
    #[error("the board name already exists")]
    DuplicateName,
    #[error("the ticket description should contain at least 1 character")]
    EmptyDescription,
    #[error("board {0} not found")]
    BoardNotFound(String),
    #[error("ticket {0} not found")]
    TicketNotFound(String),
    #[error("position {index} is out of range for a list of {len}")]
    PositionOutOfRange { index: usize, len: usize },
    #[error("inconsistent boards: {0}")]
    Inconsistent(String),
}

/// Changes to a board's editable fields. `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketPatch {
    pub description: Option<String>,
    pub content: Option<String>,
    pub color: Option<String>,
}

/// Where a dragged ticket was picked up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSlot {
    pub board_id: String,
    pub index: usize,
}

/// Where a dragged ticket was dropped. No index means "append".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDrop {
    pub board_id: String,
    #[serde(default)]
    pub index: Option<usize>,
}

fn board_position(boards: &[Board], board_id: &str) -> Result<usize, BoardError> {
    boards
        .iter()
        .position(|b| b.id == board_id)
        .ok_or_else(|| BoardError::BoardNotFound(board_id.to_string()))
}

fn check_slot(index: usize, len: usize) -> Result<(), BoardError> {
    if index < len {
        Ok(())
    } else {
        Err(BoardError::PositionOutOfRange { index, len })
    }
}

/// Trims `name` and checks length and case-insensitive uniqueness.
/// `except` names a board whose own name does not count as a collision.
pub fn validate_board_name(
    boards: &[Board],
    name: &str,
    except: Option<&str>,
) -> Result<String, BoardError> {
    let cleaned = name.trim();
    let len = cleaned.chars().count();
    if len < BOARD_NAME_MIN {
        return Err(BoardError::NameTooShort);
    }
    if len > BOARD_NAME_MAX {
        return Err(BoardError::NameTooLong);
    }
    let lowered = cleaned.to_lowercase();
    let taken = boards
        .iter()
        .filter(|b| Some(b.id.as_str()) != except)
        .any(|b| b.name.to_lowercase() == lowered);
    if taken {
        return Err(BoardError::DuplicateName);
    }
    Ok(cleaned.to_string())
}

fn validate_description(description: &str) -> Result<String, BoardError> {
    let cleaned = description.trim();
    if cleaned.is_empty() {
        return Err(BoardError::EmptyDescription);
    }
    Ok(cleaned.to_string())
}

/// Rewrites every `index_order` with the board's array index.
pub fn restamp(boards: &mut [Board]) {
    for (i, board) in boards.iter_mut().enumerate() {
        board.index_order = i;
    }
}

/// Appends a new board ranked last.
pub fn insert_board<'a>(
    boards: &'a mut Vec<Board>,
    name: &str,
    color: Option<String>,
) -> Result<&'a Board, BoardError> {
    let name = validate_board_name(boards, name, None)?;
    let idx = boards.len();
    boards.push(Board::new(name, color, idx));
    Ok(&boards[idx])
}

pub fn update_board(
    boards: &mut [Board],
    board_id: &str,
    patch: BoardPatch,
) -> Result<bool, BoardError> {
    let pos = board_position(boards, board_id)?;
    let name = match patch.name.as_deref() {
        Some(n) => Some(validate_board_name(boards, n, Some(board_id))?),
        None => None,
    };

    let board = &mut boards[pos];
    let mut changed = false;
    if let Some(name) = name {
        changed |= board.name != name;
        board.name = name;
    }
    if let Some(color) = patch.color {
        changed |= board.color != color;
        board.color = color;
    }
    Ok(changed)
}

/// Moves the board at `from` to `to` and re-stamps all ranks.
pub fn reorder_boards(boards: &mut Vec<Board>, from: usize, to: usize) -> Result<bool, BoardError> {
    check_slot(from, boards.len())?;
    check_slot(to, boards.len())?;
    if from == to {
        return Ok(false);
    }
    let board = boards.remove(from);
    boards.insert(to, board);
    restamp(boards);
    Ok(true)
}

/// Removes a board together with its tickets.
pub fn delete_board(boards: &mut Vec<Board>, board_id: &str) -> Result<Board, BoardError> {
    let pos = board_position(boards, board_id)?;
    let removed = boards.remove(pos);
    restamp(boards);
    boards.sort_by_key(|b| b.index_order);
    Ok(removed)
}

/// Prepends a new ticket to the target board.
pub fn insert_ticket<'a>(
    boards: &'a mut [Board],
    board_id: &str,
    description: &str,
) -> Result<&'a Ticket, BoardError> {
    let pos = board_position(boards, board_id)?;
    let description = validate_description(description)?;
    let board = &mut boards[pos];
    board.tickets.insert(0, Ticket::new(description, &board.id));
    Ok(&board.tickets[0])
}

pub fn update_ticket(
    boards: &mut [Board],
    board_id: &str,
    ticket_id: &str,
    patch: TicketPatch,
) -> Result<bool, BoardError> {
    let pos = board_position(boards, board_id)?;
    let t = boards[pos]
        .ticket_position(ticket_id)
        .ok_or_else(|| BoardError::TicketNotFound(ticket_id.to_string()))?;
    let description = patch.description.as_deref().map(validate_description).transpose()?;

    let ticket = &mut boards[pos].tickets[t];
    let mut changed = false;
    if let Some(description) = description {
        changed |= ticket.description != description;
        ticket.description = description;
    }
    if let Some(content) = patch.content {
        let content = content.trim().to_string();
        changed |= ticket.content != content;
        ticket.content = content;
    }
    if let Some(color) = patch.color {
        changed |= ticket.color != color;
        ticket.color = color;
    }
    Ok(changed)
}

pub fn delete_ticket(
    boards: &mut [Board],
    board_id: &str,
    ticket_id: &str,
) -> Result<Ticket, BoardError> {
    let pos = board_position(boards, board_id)?;
    let t = boards[pos]
        .ticket_position(ticket_id)
        .ok_or_else(|| BoardError::TicketNotFound(ticket_id.to_string()))?;
    Ok(boards[pos].tickets.remove(t))
}

/// Moves a ticket between two slots.
///
/// Within one board the destination index must address an existing slot.
/// Across boards it may equal the destination length, and a missing index
/// appends. The ticket's `category_id` follows it to the destination.
pub fn move_ticket(
    boards: &mut [Board],
    source: &TicketSlot,
    destination: &TicketDrop,
) -> Result<bool, BoardError> {
    let from_board = board_position(boards, &source.board_id)?;
    let to_board = board_position(boards, &destination.board_id)?;
    let from_len = boards[from_board].tickets.len();
    let from = source.index;
    check_slot(from, from_len)?;

    if from_board == to_board {
        let to = destination.index.unwrap_or(from_len - 1);
        check_slot(to, from_len)?;
        if from == to {
            return Ok(false);
        }
        let tickets = &mut boards[from_board].tickets;
        let ticket = tickets.remove(from);
        tickets.insert(to, ticket);
        return Ok(true);
    }

    let to_len = boards[to_board].tickets.len();
    let to = destination.index.unwrap_or(to_len);
    if to > to_len {
        return Err(BoardError::PositionOutOfRange { index: to, len: to_len });
    }

    let mut ticket = boards[from_board].tickets.remove(from);
    ticket.category_id = boards[to_board].id.clone();
    boards[to_board].tickets.insert(to, ticket);
    Ok(true)
}

/// Verifies the document invariants: unique ids, `index_order` forming a
/// permutation of `0..N`, and every ticket pointing back at its board.
pub fn check_consistency(boards: &[Board]) -> Result<(), BoardError> {
    let mut board_ids = HashSet::new();
    let mut ticket_ids = HashSet::new();
    let mut ranks = vec![false; boards.len()];

    for board in boards {
        if !board_ids.insert(board.id.as_str()) {
            return Err(BoardError::Inconsistent(format!("duplicate board id {}", board.id)));
        }
        match ranks.get_mut(board.index_order) {
            Some(seen) if !*seen => *seen = true,
            _ => {
                return Err(BoardError::Inconsistent(format!(
                    "indexOrder {} of board {} is not a unique rank below {}",
                    board.index_order,
                    board.id,
                    boards.len()
                )))
            }
        }
        for ticket in &board.tickets {
            if !ticket_ids.insert(ticket.id.as_str()) {
                return Err(BoardError::Inconsistent(format!("duplicate ticket id {}", ticket.id)));
            }
            if ticket.category_id != board.id {
                return Err(BoardError::Inconsistent(format!(
                    "ticket {} references board {} but lives in {}",
                    ticket.id, ticket.category_id, board.id
                )));
            }
        }
    }
    Ok(())
}

/// Applies the per-item rules of the granular operations to a whole list:
/// board names and ticket descriptions are trimmed and validated.
fn clean_contents(boards: &mut [Board]) -> Result<(), BoardError> {
    for i in 0..boards.len() {
        let name = validate_board_name(boards, &boards[i].name, Some(&boards[i].id))?;
        boards[i].name = name;
        for ticket in &mut boards[i].tickets {
            ticket.description = validate_description(&ticket.description)?;
        }
    }
    Ok(())
}

/// Accepts a whole replacement list, ordered by rank.
pub fn replace_boards(boards: &mut Vec<Board>, mut incoming: Vec<Board>) -> Result<bool, BoardError> {
    check_consistency(&incoming)?;
    clean_contents(&mut incoming)?;
    incoming.sort_by_key(|b| b.index_order);
    if *boards == incoming {
        return Ok(false);
    }
    *boards = incoming;
    Ok(true)
}
