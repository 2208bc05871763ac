#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use qabot::{
    converse, Bot, ConfigProvider, Corpus, Disconnected, EnvConfig, OpenAI, Outcome, Output,
    Settings, Surface,
};
use std::{io::Write, process, sync::Arc};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat about the documentation, with follow-up questions.
    Ask { question: Option<String> },
    /// Print the issues, discussions and documentation related to a question.
    Related { question: String },
    /// Load the corpus files and check their embeddings.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "cli=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::from_env()?;
    let mut corpus = Corpus::load(&settings.docs_path, &settings.github_path)?;
    let dimensions = corpus.validate(settings.embedding_dimensions)?;

    match cli.command {
        Commands::Check => {
            println!(
                "{} documentation sections, {} issues, {} discussions ({dimensions} dimensions)",
                corpus.docs().len(),
                corpus.issues().len(),
                corpus.discussions().len()
            );
        }
        Commands::Related { question } => {
            let bot = bot(corpus, settings)?;
            let related = bot.search(&question).await?;

            println!("{}\n", related.to_markdown());
            println!("## Context\n{}", related.context_prompt());
        }
        Commands::Ask { question } => {
            let bot = bot(corpus, settings)?;
            let mut terminal = Terminal::new(question);

            if let Outcome::Failed(err) = converse(&bot, &mut terminal).await {
                info!("Conversation ended: {err}");
                process::exit(1);
            }
        }
    }

    Ok(())
}

fn bot(corpus: Corpus, settings: Settings) -> Result<Bot> {
    let openai = OpenAI::new(&EnvConfig.openai()?);

    Ok(Bot::new(Arc::new(corpus), Arc::new(openai), settings))
}

/// Reads questions from stdin and prints the conversation to stdout.
struct Terminal {
    first: Option<String>,
    lines: Lines<BufReader<Stdin>>,
    streaming: bool,
}

impl Terminal {
    fn new(first: Option<String>) -> Self {
        Self {
            first,
            lines: BufReader::new(io::stdin()).lines(),
            streaming: false,
        }
    }
}

#[async_trait]
impl Surface for Terminal {
    async fn prompt(&mut self, placeholder: &str) -> Result<String, Disconnected> {
        if let Some(question) = self.first.take() {
            return Ok(question);
        }

        print!("\n{placeholder}\n> ");
        std::io::stdout().flush().map_err(|_| Disconnected)?;

        match self.lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            _ => Err(Disconnected),
        }
    }

    async fn emit(&mut self, output: Output) -> Result<(), Disconnected> {
        match output {
            Output::Loading => {}
            Output::Question { text } => println!("\n> {text}"),
            Output::Resources { markdown } => println!("\n{markdown}"),
            Output::Heading { text } => println!("\n## {text}"),
            Output::Notice { text } | Output::Warning { text } => println!("\n(!) {text}"),
            Output::Fragment { text } => {
                if !self.streaming {
                    println!();
                    self.streaming = true;
                }
                print!("{text}");
            }
            // Already printed fragment by fragment.
            Output::Answer { .. } => {
                println!();
                self.streaming = false;
            }
            Output::Error { title, detail } => {
                if self.streaming {
                    println!();
                    self.streaming = false;
                }
                eprintln!("\nError: {title}: {detail}");
            }
        }

        std::io::stdout().flush().map_err(|_| Disconnected)
    }
}
