use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    model::Board,
    ordering::{BoardPatch, TicketDrop, TicketPatch, TicketSlot},
    session::BoardsMutation,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppJson, AppResult},
    state::AppState,
    users::handlers::open_session,
};

#[derive(Debug, Serialize)]
pub struct BoardsResponse {
    pub boards: Vec<Board>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBoardBody {
    #[serde(default)]
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveTicketBody {
    pub source: TicketSlot,
    pub destination: TicketDrop,
}

pub fn boards_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id/boards", post(create_board))
        .route("/users/:id/boards/:board_id", patch(update_board).delete(delete_board))
        .route("/users/:id/reorder-boards", post(reorder_boards))
        .route("/users/:id/boards/:board_id/tickets", post(create_ticket))
        .route(
            "/users/:id/boards/:board_id/tickets/:ticket_id",
            patch(update_ticket).delete(delete_ticket),
        )
        .route("/users/:id/move-ticket", post(move_ticket))
}

/// Runs one mutation against the caller's boards and returns the result.
async fn mutate(
    state: &AppState,
    caller: Uuid,
    user_id: Uuid,
    mutation: BoardsMutation,
) -> AppResult<BoardsResponse> {
    let (_, mut session) = open_session(state, caller, user_id).await?;
    session.apply(mutation).await?;
    Ok(BoardsResponse {
        boards: session.into_boards(),
    })
}

#[instrument(skip(state, body))]
pub async fn create_board(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<CreateBoardBody>,
) -> AppResult<(StatusCode, Json<BoardsResponse>)> {
    let mutation = BoardsMutation::AddBoard {
        name: body.name,
        color: body.color,
    };
    let res = mutate(&state, caller, id, mutation).await?;
    info!(user_id = %id, boards = res.boards.len(), "board created");
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, body))]
pub async fn update_board(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((id, board_id)): Path<(Uuid, String)>,
    AppJson(body): AppJson<BoardPatch>,
) -> AppResult<Json<BoardsResponse>> {
    let mutation = BoardsMutation::UpdateBoard { board_id, patch: body };
    Ok(Json(mutate(&state, caller, id, mutation).await?))
}

#[instrument(skip(state))]
pub async fn delete_board(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((id, board_id)): Path<(Uuid, String)>,
) -> AppResult<Json<BoardsResponse>> {
    let res = mutate(&state, caller, id, BoardsMutation::DeleteBoard { board_id: board_id.clone() }).await?;
    info!(user_id = %id, %board_id, "board deleted");
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn reorder_boards(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<ReorderBody>,
) -> AppResult<Json<BoardsResponse>> {
    let mutation = BoardsMutation::ReorderBoards {
        from: body.from,
        to: body.to,
    };
    Ok(Json(mutate(&state, caller, id, mutation).await?))
}

#[instrument(skip(state, body))]
pub async fn create_ticket(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((id, board_id)): Path<(Uuid, String)>,
    AppJson(body): AppJson<CreateTicketBody>,
) -> AppResult<(StatusCode, Json<BoardsResponse>)> {
    let mutation = BoardsMutation::AddTicket {
        board_id,
        description: body.description,
    };
    Ok((StatusCode::CREATED, Json(mutate(&state, caller, id, mutation).await?)))
}

#[instrument(skip(state, body))]
pub async fn update_ticket(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((id, board_id, ticket_id)): Path<(Uuid, String, String)>,
    AppJson(body): AppJson<TicketPatch>,
) -> AppResult<Json<BoardsResponse>> {
    let mutation = BoardsMutation::UpdateTicket {
        board_id,
        ticket_id,
        patch: body,
    };
    Ok(Json(mutate(&state, caller, id, mutation).await?))
}

#[instrument(skip(state))]
pub async fn delete_ticket(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((id, board_id, ticket_id)): Path<(Uuid, String, String)>,
) -> AppResult<Json<BoardsResponse>> {
    let mutation = BoardsMutation::DeleteTicket { board_id, ticket_id };
    Ok(Json(mutate(&state, caller, id, mutation).await?))
}

#[instrument(skip(state))]
pub async fn move_ticket(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<MoveTicketBody>,
) -> AppResult<Json<BoardsResponse>> {
    let mutation = BoardsMutation::MoveTicket {
        source: body.source,
        destination: body.destination,
    };
    Ok(Json(mutate(&state, caller, id, mutation).await?))
}
