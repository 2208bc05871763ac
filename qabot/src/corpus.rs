use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Anything carrying a pre-computed embedding vector.
pub trait Embedded {
    fn embedding(&self) -> &[f32];
}

/// A section of the project's documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSection {
    pub content: String,
    pub embedding: Vec<f32>,
}

impl Embedded for DocSection {
    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreadKind {
    #[default]
    Issue,
    Discussion,
}

/// A GitHub issue or discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub kind: ThreadKind,
}

impl Embedded for Thread {
    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

#[derive(Debug, Deserialize)]
struct GithubDump {
    #[serde(default)]
    issues: Vec<Thread>,
    #[serde(default)]
    discussions: Vec<Thread>,
}

/// The read-only collections every session searches.
///
/// Built once at startup and shared between sessions behind an `Arc`.
#[derive(Debug, Default)]
pub struct Corpus {
    docs: Vec<DocSection>,
    issues: Vec<Thread>,
    discussions: Vec<Thread>,
    dimensions: Option<usize>,
}

impl Corpus {
    #[must_use]
    pub fn from_parts(
        docs: Vec<DocSection>,
        issues: Vec<Thread>,
        discussions: Vec<Thread>,
    ) -> Self {
        Self {
            docs,
            issues: tag(issues, ThreadKind::Issue),
            discussions: tag(discussions, ThreadKind::Discussion),
            dimensions: None,
        }
    }

    /// Loads the documentation sections and the GitHub dump from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corpus`] if either file can't be read or parsed.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(docs_path: P, github_path: Q) -> Result<Self> {
        let docs: Vec<DocSection> = read_json(docs_path.as_ref())?;
        let dump: GithubDump = read_json(github_path.as_ref())?;

        info!(
            docs = docs.len(),
            issues = dump.issues.len(),
            discussions = dump.discussions.len(),
            "Loaded corpus"
        );

        Ok(Self::from_parts(docs, dump.issues, dump.discussions))
    }

    /// Checks that every vector in the corpus shares one dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for the first vector that disagrees.
    pub fn validate(&mut self, expected: Option<usize>) -> Result<usize> {
        let mut dimensions = expected;

        for (collection, vectors) in [
            ("docs", self.docs.iter().map(Embedded::embedding).collect::<Vec<_>>()),
            ("issues", self.issues.iter().map(Embedded::embedding).collect()),
            ("discussions", self.discussions.iter().map(Embedded::embedding).collect()),
        ] {
            for (index, vector) in vectors.into_iter().enumerate() {
                let expected = *dimensions.get_or_insert(vector.len());

                if vector.is_empty() || vector.len() != expected {
                    return Err(Error::DimensionMismatch {
                        collection,
                        index,
                        expected,
                        found: vector.len(),
                    });
                }
            }
        }

        let dimensions = dimensions.unwrap_or_default();
        debug!(dimensions, "Corpus validated");
        self.dimensions = Some(dimensions);

        Ok(dimensions)
    }

    #[must_use]
    pub const fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    #[must_use]
    pub fn docs(&self) -> &[DocSection] {
        &self.docs
    }

    #[must_use]
    pub fn issues(&self) -> &[Thread] {
        &self.issues
    }

    #[must_use]
    pub fn discussions(&self) -> &[Thread] {
        &self.discussions
    }
}

fn tag(threads: Vec<Thread>, kind: ThreadKind) -> Vec<Thread> {
    threads
        .into_iter()
        .map(|thread| Thread { kind, ..thread })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    fs::read_to_string(path)
        .context("Failed to read file")
        .and_then(|contents| serde_json::from_str(&contents).context("Failed to parse JSON"))
        .map_err(|source| Error::Corpus {
            path: path.display().to_string(),
            source,
        })
}
