use axum::{
    routing::{get, post},
    Router,
};

use crate::{axum::state::AppState, http::controllers::ChatController};

pub fn mount() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ChatController::connect))
        .route("/search", post(ChatController::search))
}
