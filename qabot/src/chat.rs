use futures::{ready, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    openai::{Backend, DeltaStream},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// The notice users should see alongside a reply that stopped for this reason, if any.
    #[must_use]
    pub const fn advisory(&self) -> Option<&'static str> {
        match self {
            Self::Length => {
                Some("Incomplete model output due to max_tokens parameter or token limit.")
            }
            Self::ContentFilter => {
                Some("Omitted content due to a flag from OpenAI's content filters.")
            }
            Self::Stop | Self::Other(_) => None,
        }
    }
}

impl From<&str> for FinishReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Length => write!(f, "length"),
            Self::ContentFilter => write!(f, "content_filter"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// One incremental piece of a streamed chat completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

/// A conversation with the chat model.
///
/// The history starts with the system prompt and only ever grows. A question and its
/// reply are recorded together once the reply has been fully received, so a failed or
/// abandoned turn leaves no trace.
pub struct ChatSession {
    model: String,
    backend: Arc<dyn Backend>,
    history: Vec<Message>,
    finish_reason: Option<FinishReason>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn Backend>,
        model: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            history: vec![Message::system(system)],
            finish_reason: None,
        }
    }

    /// Sends `question` and starts streaming the assistant's reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChatRequest`] if the completion request can't be started.
    pub async fn ask(&mut self, question: impl Into<String> + Send) -> Result<Reply<'_>> {
        let question = Message::user(question);

        let mut messages = self.history.clone();
        messages.push(question.clone());

        let stream = self
            .backend
            .chat_stream(&self.model, &messages)
            .await
            .map_err(Error::ChatRequest)?;

        Ok(Reply {
            session: self,
            question,
            stream: Some(stream),
            text: String::new(),
            finish_reason: None,
            state: ReplyState::Streaming,
        })
    }

    /// The finish reason reported for the most recent completed reply.
    #[must_use]
    pub const fn latest_finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn commit(&mut self, question: Message, reply: String, finish_reason: Option<FinishReason>) {
        debug!(
            characters = reply.len(),
            finish_reason = ?finish_reason,
            "Reply completed"
        );

        if let Some(advisory) = finish_reason.as_ref().and_then(FinishReason::advisory) {
            warn!("{advisory}");
        }

        self.history.push(question);
        self.history.push(Message::assistant(reply));
        self.finish_reason = finish_reason;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Streaming,
    Complete,
    Failed,
}

/// A reply as it streams in, fragment by fragment.
///
/// The full text is only available through [`Reply::result`] once the stream has been
/// drained; at that point the question and reply have also been recorded in the
/// session's history.
pub struct Reply<'s> {
    session: &'s mut ChatSession,
    question: Message,
    stream: Option<DeltaStream>,
    text: String,
    finish_reason: Option<FinishReason>,
    state: ReplyState,
}

impl Reply<'_> {
    /// The complete reply text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteReply`] until the stream has been fully consumed, and
    /// forever after if it failed midway.
    pub fn result(&self) -> Result<&str> {
        match self.state {
            ReplyState::Complete => Ok(&self.text),
            ReplyState::Streaming | ReplyState::Failed => Err(Error::IncompleteReply),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == ReplyState::Complete
    }
}

impl Stream for Reply<'_> {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(stream) = this.stream.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(stream.poll_next_unpin(cx)) {
                Some(Ok(delta)) => {
                    if delta.finish_reason.is_some() {
                        this.finish_reason = delta.finish_reason;
                    }

                    match delta.content {
                        Some(fragment) if !fragment.is_empty() => {
                            this.text.push_str(&fragment);
                            return Poll::Ready(Some(Ok(fragment)));
                        }
                        _ => continue,
                    }
                }
                Some(Err(err)) => {
                    this.stream = None;
                    this.state = ReplyState::Failed;

                    return Poll::Ready(Some(Err(Error::ChatRequest(err))));
                }
                None => {
                    this.stream = None;
                    this.state = ReplyState::Complete;
                    this.session.commit(
                        this.question.clone(),
                        this.text.clone(),
                        this.finish_reason.take(),
                    );

                    return Poll::Ready(None);
                }
            }
        }
    }
}
