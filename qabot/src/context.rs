use lazy_static::lazy_static;
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::corpus::DocSection;

lazy_static! {
    // cl100k_base is the encoding shared by text-embedding-ada-002 and the chat models.
    static ref TOKENIZER: CoreBPE = tiktoken_rs::cl100k_base().unwrap();
}

/// Counts the tokens `text` occupies in the model's context window.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_ordinary(text).len()
}

/// Walks `ranked` nearest-first, collecting sections until their token total exceeds `budget`.
///
/// The section that crosses the budget is kept, so the result can overshoot by one section.
pub fn assemble<'a>(
    ranked: &[&'a DocSection],
    budget: usize,
    measure: impl Fn(&str) -> usize,
) -> Vec<&'a DocSection> {
    let mut related = Vec::new();
    let mut tokens = 0;

    for doc in ranked {
        tokens += measure(&doc.content);
        related.push(*doc);

        if tokens > budget {
            break;
        }
    }

    debug!(sections = related.len(), tokens, budget, "Assembled context");

    related
}

#[must_use]
pub fn context_prompt(docs: &[&DocSection]) -> String {
    docs.iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
