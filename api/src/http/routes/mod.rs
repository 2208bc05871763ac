use axum::{routing::get, Json, Router};

mod chat;

use crate::{
    axum::{errors::ApiResult, state::AppState},
    http::controllers::PageController,
};

pub fn mount() -> Router<AppState> {
    Router::new()
        .merge(chat::mount())
        .route("/", get(PageController::show))
        .route("/version", get(version))
}

#[derive(serde::Serialize)]
struct BotVersion {
    semver: String,
    rev: Option<String>,
    compile_time: String,
}

#[allow(clippy::unused_async)]
async fn version() -> ApiResult<Json<BotVersion>> {
    Ok(Json(BotVersion {
        semver: env!("CARGO_PKG_VERSION").to_string(),
        rev: std::env::var("GIT_REV").ok(),
        compile_time: env!("STATIC_BUILD_DATE").to_string(),
    }))
}
