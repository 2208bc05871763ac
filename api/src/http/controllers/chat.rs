use anyhow::Context;
use axum::{
    async_trait,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use axum_jsonschema::Json;
use qabot::{converse, Disconnected, Output, Surface, Thread};
use schemars::JsonSchema;
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::axum::{
    errors::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, serde::Deserialize, JsonSchema)]
pub struct AskRequest {
    query: String,
}

#[derive(Debug, serde::Serialize)]
pub struct SearchResponse {
    issues: Vec<Thread>,
    discussions: Vec<Thread>,
    docs: Vec<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Json(AskRequest { query }): Json<AskRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::ClientError("Please enter a question.".to_string()));
    }

    let related = state
        .bot
        .search(query)
        .await
        .context("Failed to search related resources.")?;

    Ok(Json(SearchResponse {
        issues: related.issues.into_iter().cloned().collect(),
        discussions: related.discussions.into_iter().cloned().collect(),
        docs: related.docs.iter().map(|d| d.content.clone()).collect(),
    }))
}

#[allow(clippy::unused_async)]
pub async fn connect(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();

    async move {
        info!("Session started");

        let mut surface = Socket { socket };
        let outcome = converse(&state.bot, &mut surface).await;

        info!(?outcome, "Session ended");
        let _ = surface.socket.close().await;
    }
    .instrument(info_span!("session", %id))
    .await;
}

#[derive(Debug, serde::Deserialize)]
struct ClientMessage {
    question: String,
}

fn parse_question(text: &str) -> Option<String> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage { question }) => Some(question),
        Err(err) => {
            warn!(error = %err, "Ignoring malformed message");
            None
        }
    }
}

/// A browser tab on the other end of a WebSocket.
struct Socket {
    socket: WebSocket,
}

impl Socket {
    async fn send(&mut self, payload: String) -> Result<(), Disconnected> {
        self.socket
            .send(Message::Text(payload))
            .await
            .map_err(|_| Disconnected)
    }
}

#[async_trait]
impl Surface for Socket {
    async fn prompt(&mut self, placeholder: &str) -> Result<String, Disconnected> {
        self.send(json!({ "type": "prompt", "placeholder": placeholder }).to_string())
            .await?;

        while let Some(Ok(message)) = self.socket.recv().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            if let Some(question) = parse_question(&text) {
                return Ok(question);
            }
        }

        Err(Disconnected)
    }

    async fn emit(&mut self, output: Output) -> Result<(), Disconnected> {
        let payload = serde_json::to_string(&output).map_err(|_| Disconnected)?;

        self.send(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use qabot::{openai::DeltaStream, Backend, Bot, Corpus, DocSection, Message, Settings};
    use std::sync::Arc;

    struct Offline;

    #[async_trait]
    impl Backend for Offline {
        async fn embed(&self, _: &str) -> anyhow::Result<Vec<f32>> {
            Err(anyhow::anyhow!("embeddings are offline"))
        }

        async fn chat_stream(&self, _: &str, _: &[Message]) -> anyhow::Result<DeltaStream> {
            Err(anyhow::anyhow!("chat is offline"))
        }
    }

    fn state() -> AppState {
        let corpus = Corpus::from_parts(
            vec![DocSection {
                content: "put_text prints text.".to_string(),
                embedding: vec![1.0, 0.0],
            }],
            vec![],
            vec![],
        );

        crate::axum::state::create(Bot::new(
            Arc::new(corpus),
            Arc::new(Offline),
            Settings::default(),
        ))
    }

    fn ask(query: &str) -> Json<AskRequest> {
        Json(AskRequest {
            query: query.to_string(),
        })
    }

    #[tokio::test]
    async fn rejects_blank_queries() {
        let Err(err) = search(State(state()), ask("  \n ")).await else {
            panic!("blank query was accepted");
        };

        assert!(matches!(
            err,
            ApiError::ClientError(ref message) if message == "Please enter a question."
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reports_embedding_failures() {
        let Err(err) = search(State(state()), ask("How do I print text?")).await else {
            panic!("search succeeded without embeddings");
        };

        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn parses_client_questions() {
        assert_eq!(
            parse_question(r#"{"question": "How do I print text?"}"#),
            Some("How do I print text?".to_string())
        );
        assert_eq!(parse_question("How do I print text?"), None);
        assert_eq!(parse_question(r#"{"query": "wrong field"}"#), None);
    }

    #[test]
    fn outputs_are_tagged_for_the_page() {
        assert_eq!(
            serde_json::to_value(Output::Fragment {
                text: "Use ".to_string()
            })
            .unwrap(),
            json!({ "type": "fragment", "text": "Use " })
        );
        assert_eq!(
            serde_json::to_value(Output::Error {
                title: "ChatGPT Error".to_string(),
                detail: "rate limited".to_string(),
            })
            .unwrap(),
            json!({ "type": "error", "title": "ChatGPT Error", "detail": "rate limited" })
        );
        assert_eq!(
            serde_json::to_value(Output::Loading).unwrap(),
            json!({ "type": "loading" })
        );
    }
}
