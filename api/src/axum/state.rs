use qabot::Bot;
use std::sync::Arc;

pub struct State {
    pub bot: Bot,
}

#[allow(clippy::module_name_repetitions)]
pub type AppState = Arc<State>;

pub fn create(bot: Bot) -> AppState {
    Arc::new(State { bot })
}
