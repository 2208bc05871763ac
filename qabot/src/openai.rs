use anyhow::Result;
use async_fn_stream::try_fn_stream;
use async_openai::{
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageArgs,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, Role as OpenAIRole,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures::{stream::BoxStream, StreamExt};
use std::time::Duration;
use tracing::debug;

use crate::{
    chat::{Delta, FinishReason, Message, Role},
    config::OpenAIConfig,
};

pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";

pub type DeltaStream = BoxStream<'static, Result<Delta>>;

/// The hosted model API the bot talks to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Embeds `text` into a single vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Starts a streamed chat completion over `messages`.
    async fn chat_stream(&self, model: &str, messages: &[Message]) -> Result<DeltaStream>;
}

pub struct OpenAI {
    client: Client,
}

impl OpenAI {
    #[must_use]
    pub fn new(config: &OpenAIConfig) -> Self {
        // Failures are reported to the user instead of retried.
        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::new()
                .with_api_key(&config.api_key)
                .with_api_base(&config.api_base)
                .with_backoff(backoff),
        }
    }
}

#[async_trait]
impl Backend for OpenAI {
    /// Embeds a string into a vector of points.
    ///
    /// # Errors
    ///
    /// This function will return an error if the Embeddings API returns an error.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(EMBEDDING_MODEL)
            .input(text)
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        Ok(response
            .data
            .first()
            .ok_or_else(|| anyhow::anyhow!("Could not find embedding"))?
            .embedding
            .clone())
    }

    /// Streams a chat completion for the given conversation.
    ///
    /// # Errors
    ///
    /// This function will return an error if the Chat API rejects the request.
    async fn chat_stream(&self, model: &str, messages: &[Message]) -> Result<DeltaStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(
                messages
                    .iter()
                    .map(into_request_message)
                    .collect::<Result<Vec<_>>>()?,
            )
            .build()?;

        debug!(model, messages = messages.len(), "Requesting chat completion");
        let mut responses = self.client.chat().create_stream(request).await?;

        let stream = try_fn_stream(|emitter| async move {
            while let Some(response) = responses.next().await {
                for choice in response?.choices {
                    emitter
                        .emit(Delta {
                            content: choice.delta.content,
                            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from),
                        })
                        .await;
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(stream.boxed())
    }
}

fn into_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let role = match message.role {
        Role::System => OpenAIRole::System,
        Role::User => OpenAIRole::User,
        Role::Assistant => OpenAIRole::Assistant,
    };

    Ok(ChatCompletionRequestMessageArgs::default()
        .role(role)
        .content(message.content.as_str())
        .build()?)
}
