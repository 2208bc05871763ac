use indoc::indoc;
use std::{env, str::FromStr};

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const DEFAULT_SYSTEM_PROMPT: &str = indoc! {"
    Answer the question about the project based on the context below, \
    and if the question can't be answered based on the context, say \"I don't know\""};

/// Credentials for the OpenAI-compatible API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub api_base: String,
}

/// Supplies API credentials to the bot.
pub trait ConfigProvider {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the credentials are unavailable.
    fn openai(&self) -> Result<OpenAIConfig>;
}

/// Reads credentials from `$OPENAI_API_KEY` and `$OPENAI_API_BASE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl ConfigProvider for EnvConfig {
    fn openai(&self) -> Result<OpenAIConfig> {
        Ok(OpenAIConfig {
            api_key: env::var("OPENAI_API_KEY")
                .map_err(|_| Error::Config("$OPENAI_API_KEY not set".to_string()))?,
            api_base: env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        })
    }
}

/// Tunables for retrieval and chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chat_model: String,
    pub system_prompt: String,
    pub doc_context_tokens: usize,
    pub related_count: usize,
    pub docs_path: String,
    pub github_path: String,
    pub embedding_dimensions: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_model: "gpt-3.5-turbo".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.trim_end().to_string(),
            doc_context_tokens: 1000,
            related_count: 5,
            docs_path: "data/doc-sections.json".to_string(),
            github_path: "data/github-dump.json".to_string(),
            embedding_dimensions: None,
        }
    }
}

impl Settings {
    /// Builds settings from the environment, falling back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable can't be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            chat_model: lookup("CHAT_MODEL").unwrap_or(defaults.chat_model),
            system_prompt: lookup("SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            doc_context_tokens: parse(&lookup, "DOC_CONTEXT_TOKENS")?
                .unwrap_or(defaults.doc_context_tokens),
            related_count: parse(&lookup, "RELATED_COUNT")?.unwrap_or(defaults.related_count),
            docs_path: lookup("DOCS_PATH").unwrap_or(defaults.docs_path),
            github_path: lookup("GITHUB_PATH").unwrap_or(defaults.github_path),
            embedding_dimensions: parse(&lookup, "EMBEDDING_DIMENSIONS")?,
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("${key} must be a number, got {value:?}")))
        })
        .transpose()
}
