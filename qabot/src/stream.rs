use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::{fmt::Write, sync::Arc};
use tracing::{debug, error, info};

use crate::{
    chat::{ChatSession, FinishReason},
    config::Settings,
    context::{self, count_tokens},
    corpus::{Corpus, DocSection, Thread},
    error::{Error, Result},
    openai::Backend,
    similarity,
};

pub const QUESTION_PLACEHOLDER: &str =
    "Input your question when using the library. (e.g., how to output matplotlib chart)";
pub const FOLLOW_UP_PLACEHOLDER: &str = "Follow up question";
pub const ANSWERS_HEADING: &str = "ChatGPT Answers";
pub const AI_NOTICE: &str = "Noted that the answer is generated by AI, and may not be correct. \
    Please be cautious and critically evaluate the responses.";

/// Everything a session needs, shared across sessions.
#[derive(Clone)]
pub struct Bot {
    corpus: Arc<Corpus>,
    backend: Arc<dyn Backend>,
    settings: Arc<Settings>,
}

impl Bot {
    pub fn new(corpus: Arc<Corpus>, backend: Arc<dyn Backend>, settings: Settings) -> Self {
        Self {
            corpus,
            backend,
            settings: Arc::new(settings),
        }
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Embeds a question.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddingRequest`] if the Embeddings API fails.
    pub async fn embed(&self, question: &str) -> Result<Vec<f32>> {
        self.backend
            .embed(question)
            .await
            .map_err(Error::EmbeddingRequest)
    }

    /// Finds the issues, discussions and documentation sections closest to `embedding`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the corpus was embedded with a different model.
    pub fn related(&self, embedding: &[f32]) -> Result<Related<'_>> {
        let count = self.settings.related_count;

        let issues = similarity::nearest(embedding, self.corpus.issues(), count)?;
        let discussions = similarity::nearest(embedding, self.corpus.discussions(), count)?;

        let ranked = similarity::rank(embedding, self.corpus.docs())?;
        let docs = context::assemble(&ranked, self.settings.doc_context_tokens, count_tokens);

        Ok(Related {
            issues,
            discussions,
            docs,
        })
    }

    /// Embeds `question` and finds the resources related to it.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or ranking fails.
    pub async fn search(&self, question: &str) -> Result<Related<'_>> {
        let embedding = self.embed(question).await?;

        self.related(&embedding)
    }

    /// Starts a fresh conversation with the configured model and system prompt.
    #[must_use]
    pub fn chat(&self) -> ChatSession {
        ChatSession::new(
            self.backend.clone(),
            &self.settings.chat_model,
            &self.settings.system_prompt,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct Related<'a> {
    pub issues: Vec<&'a Thread>,
    pub discussions: Vec<&'a Thread>,
    #[serde(skip)]
    pub docs: Vec<&'a DocSection>,
}

impl Related<'_> {
    #[must_use]
    pub fn to_markdown(&self) -> String {
        format!(
            "## Related Resources\nIssues:\n{}\n\nDiscussions:\n{}",
            links(&self.issues),
            links(&self.discussions)
        )
    }

    #[must_use]
    pub fn context_prompt(&self) -> String {
        context::context_prompt(&self.docs)
    }
}

fn links(threads: &[&Thread]) -> String {
    threads.iter().fold(String::new(), |mut out, thread| {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, " - [{}]({})", thread.title, thread.url);
        out
    })
}

/// What a session shows the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Loading,
    Question { text: String },
    Resources { markdown: String },
    Heading { text: String },
    Notice { text: String },
    Fragment { text: String },
    Answer { markdown: String },
    Warning { text: String },
    Error { title: String, detail: String },
}

/// The user went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Where a session reads questions from and renders its output to.
#[async_trait]
pub trait Surface: Send {
    /// Waits for the user's next input.
    async fn prompt(&mut self, placeholder: &str) -> Result<String, Disconnected>;

    async fn emit(&mut self, output: Output) -> Result<(), Disconnected>;
}

#[derive(Debug)]
pub enum Outcome {
    /// The user left.
    Closed,
    /// A request failed and was reported to the user.
    Failed(Error),
}

#[derive(Debug)]
enum Stage {
    AwaitingQuestion,
    Embedding { question: String },
    Ranking { question: String, embedding: Vec<f32> },
    AwaitingChatTurn { prompt: String },
    AwaitingFollowUp,
}

impl Stage {
    const fn name(&self) -> &'static str {
        match self {
            Self::AwaitingQuestion => "awaiting_question",
            Self::Embedding { .. } => "embedding",
            Self::Ranking { .. } => "ranking",
            Self::AwaitingChatTurn { .. } => "awaiting_chat_turn",
            Self::AwaitingFollowUp => "awaiting_follow_up",
        }
    }
}

/// Runs one user's session until they leave or a request fails.
pub async fn converse<S: Surface + ?Sized>(bot: &Bot, surface: &mut S) -> Outcome {
    match drive(bot, surface).await {
        Ok(outcome) => outcome,
        Err(Disconnected) => {
            info!("Session closed");
            Outcome::Closed
        }
    }
}

async fn drive<S: Surface + ?Sized>(bot: &Bot, surface: &mut S) -> Result<Outcome, Disconnected> {
    let mut chat = bot.chat();
    let mut stage = Stage::AwaitingQuestion;

    loop {
        debug!(stage = stage.name(), "Advancing session");

        stage = match stage {
            Stage::AwaitingQuestion => Stage::Embedding {
                question: read_question(surface, QUESTION_PLACEHOLDER).await?,
            },
            Stage::Embedding { question } => {
                surface.emit(Output::Loading).await?;

                match bot.embed(&question).await {
                    Ok(embedding) => {
                        surface
                            .emit(Output::Question {
                                text: question.clone(),
                            })
                            .await?;

                        Stage::Ranking {
                            question,
                            embedding,
                        }
                    }
                    Err(err) => {
                        return fail(surface, "Error in get embedding of question", err).await;
                    }
                }
            }
            Stage::Ranking {
                question,
                embedding,
            } => {
                let related = match bot.related(&embedding) {
                    Ok(related) => related,
                    Err(err) => {
                        return fail(surface, "Error in searching related resources", err).await;
                    }
                };

                surface
                    .emit(Output::Resources {
                        markdown: related.to_markdown(),
                    })
                    .await?;
                surface
                    .emit(Output::Heading {
                        text: ANSWERS_HEADING.to_string(),
                    })
                    .await?;
                surface
                    .emit(Output::Notice {
                        text: AI_NOTICE.to_string(),
                    })
                    .await?;

                Stage::AwaitingChatTurn {
                    prompt: format!(
                        "Context: \n{}\n\nQuestion: \n{question}",
                        related.context_prompt()
                    ),
                }
            }
            Stage::AwaitingChatTurn { prompt } => {
                surface.emit(Output::Loading).await?;

                if let Err(err) = chat_turn(&mut chat, prompt, surface).await? {
                    return fail(surface, "ChatGPT Error", err).await;
                }

                Stage::AwaitingFollowUp
            }
            Stage::AwaitingFollowUp => {
                let question = read_question(surface, FOLLOW_UP_PLACEHOLDER).await?;

                surface
                    .emit(Output::Question {
                        text: question.clone(),
                    })
                    .await?;

                Stage::AwaitingChatTurn {
                    prompt: format!("Question: \n{question}"),
                }
            }
        };
    }
}

async fn read_question<S: Surface + ?Sized>(
    surface: &mut S,
    placeholder: &str,
) -> Result<String, Disconnected> {
    loop {
        let input = surface.prompt(placeholder).await?;
        let question = input.trim();

        if !question.is_empty() {
            return Ok(question.to_string());
        }

        surface
            .emit(Output::Warning {
                text: "Please enter a question.".to_string(),
            })
            .await?;
    }
}

/// Streams one reply to the surface, then any advisory about how it ended.
async fn chat_turn<S: Surface + ?Sized>(
    chat: &mut ChatSession,
    prompt: String,
    surface: &mut S,
) -> Result<Result<()>, Disconnected> {
    let mut reply = match chat.ask(prompt).await {
        Ok(reply) => reply,
        Err(err) => return Ok(Err(err)),
    };

    while let Some(fragment) = reply.next().await {
        match fragment {
            Ok(text) => surface.emit(Output::Fragment { text }).await?,
            Err(err) => return Ok(Err(err)),
        }
    }

    let answer = match reply.result() {
        Ok(answer) => answer.to_string(),
        Err(err) => return Ok(Err(err)),
    };
    drop(reply);

    surface.emit(Output::Answer { markdown: answer }).await?;

    if let Some(advisory) = chat.latest_finish_reason().and_then(FinishReason::advisory) {
        surface
            .emit(Output::Warning {
                text: advisory.to_string(),
            })
            .await?;
    }

    Ok(Ok(()))
}

async fn fail<S: Surface + ?Sized>(
    surface: &mut S,
    title: &str,
    err: Error,
) -> Result<Outcome, Disconnected> {
    error!(error = %err, "{title}");

    surface
        .emit(Output::Error {
            title: title.to_string(),
            detail: err.to_string(),
        })
        .await?;

    Ok(Outcome::Failed(err))
}
