use anyhow::Result;
use axum::Router;
use qabot::{Bot, ConfigProvider, Corpus, EnvConfig, OpenAI, Settings};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{axum::state, http::routes};

pub fn create() -> Result<Router> {
    let settings = Settings::from_env()?;
    let openai = EnvConfig.openai()?;

    let mut corpus = Corpus::load(&settings.docs_path, &settings.github_path)?;
    let dimensions = corpus.validate(settings.embedding_dimensions)?;
    info!(dimensions, model = %settings.chat_model, "Corpus ready");

    let bot = Bot::new(Arc::new(corpus), Arc::new(OpenAI::new(&openai)), settings);

    Ok(Router::new()
        .merge(routes::mount())
        .layer(TraceLayer::new_for_http())
        .with_state(state::create(bot)))
}
