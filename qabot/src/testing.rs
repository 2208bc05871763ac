//! In-memory stand-ins for the model API and the user interface.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::{collections::VecDeque, sync::Mutex};

use crate::{
    chat::{Delta, FinishReason, Message, Role},
    openai::{Backend, DeltaStream},
    stream::{Disconnected, Output, Surface},
};

/// A scripted chat completion.
#[derive(Debug, Clone, Default)]
pub struct Script {
    fragments: Vec<String>,
    finish_reason: Option<String>,
    request_failure: Option<String>,
    stream_failure: Option<String>,
}

impl Script {
    pub fn stop(fragments: &[&str]) -> Self {
        Self::finished(fragments, "stop")
    }

    pub fn finished(fragments: &[&str], reason: &str) -> Self {
        Self {
            fragments: fragments.iter().map(ToString::to_string).collect(),
            finish_reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn request_failure(message: &str) -> Self {
        Self {
            request_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn stream_failure(fragments: &[&str], message: &str) -> Self {
        Self {
            fragments: fragments.iter().map(ToString::to_string).collect(),
            stream_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn into_stream(self) -> DeltaStream {
        // The API opens every stream with a role-only chunk.
        let mut items = vec![Ok(Delta::default())];

        items.extend(self.fragments.into_iter().map(|fragment| {
            Ok(Delta {
                content: Some(fragment),
                finish_reason: None,
            })
        }));

        if let Some(message) = self.stream_failure {
            items.push(Err(anyhow!(message)));
        } else {
            items.push(Ok(Delta {
                content: None,
                finish_reason: self.finish_reason.as_deref().map(FinishReason::from),
            }));
        }

        stream::iter(items).boxed()
    }
}

#[derive(Default)]
pub struct FakeBackend {
    embedding: Option<Result<Vec<f32>, String>>,
    replies: Mutex<VecDeque<Script>>,
    embedded: Mutex<Vec<String>>,
    chat_requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(Ok(embedding));
        self
    }

    pub fn embedding_failure(mut self, message: &str) -> Self {
        self.embedding = Some(Err(message.to_string()));
        self
    }

    pub fn reply(self, script: Script) -> Self {
        self.replies.lock().unwrap().push_back(script);
        self
    }

    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    pub fn chat_requests(&self) -> Vec<(String, Vec<Message>)> {
        self.chat_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedded.lock().unwrap().push(text.to_string());

        match &self.embedding {
            Some(Ok(embedding)) => Ok(embedding.clone()),
            Some(Err(message)) => Err(anyhow!(message.clone())),
            None => Err(anyhow!("no embedding scripted")),
        }
    }

    async fn chat_stream(&self, model: &str, messages: &[Message]) -> Result<DeltaStream> {
        assert_eq!(messages[0].role, Role::System);

        self.chat_requests
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));

        let script = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::stop(&[]));

        if let Some(message) = script.request_failure {
            return Err(anyhow!(message));
        }

        Ok(script.into_stream())
    }
}

/// Answers prompts from a fixed list of inputs and records everything shown.
pub struct FakeSurface {
    inputs: VecDeque<String>,
    pub prompts: Vec<String>,
    pub outputs: Vec<Output>,
}

impl FakeSurface {
    pub fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(ToString::to_string).collect(),
            prompts: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn prompt(&mut self, placeholder: &str) -> Result<String, Disconnected> {
        self.prompts.push(placeholder.to_string());
        self.inputs.pop_front().ok_or(Disconnected)
    }

    async fn emit(&mut self, output: Output) -> Result<(), Disconnected> {
        self.outputs.push(output);
        Ok(())
    }
}
