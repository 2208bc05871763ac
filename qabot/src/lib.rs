#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod chat;
pub mod config;
pub mod context;
pub mod corpus;
mod error;
pub mod openai;
pub mod similarity;
pub mod stream;
#[cfg(test)]
mod testing;

pub use chat::{ChatSession, FinishReason, Message, Reply, Role};
pub use config::{ConfigProvider, EnvConfig, OpenAIConfig, Settings};
pub use corpus::{Corpus, DocSection, Thread, ThreadKind};
pub use error::{Error, Result};
pub use openai::{Backend, OpenAI};
pub use stream::{converse, Bot, Disconnected, Outcome, Output, Related, Surface};
