//! Context assembly, prompting, and answer generation.
//!
//! Selected matches are resolved to their full chunk text (chunk store
//! first, vector metadata second), joined with blank lines, and wrapped in
//! a fixed instruction template for the language model.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{Match, SourceReference};
use crate::relevance::round2;
use crate::store::ChunkStore;

/// Separator placed between chunk texts in the assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Characters of chunk content shown in a source excerpt.
pub const DEFAULT_EXCERPT_LENGTH: usize = 150;

/// Answer returned when the model produces no content.
pub const EMPTY_COMPLETION_ANSWER: &str =
    "I apologize, but I could not generate an appropriate response.";

/// Answer returned when retrieval found nothing at all.
pub const NO_MATCH_ANSWER: &str =
    "I could not find relevant information about your question in the medical device manuals.";

/// Answer returned when nothing cleared the relevance threshold.
pub const LOW_RELEVANCE_ANSWER: &str = "I could not find sufficiently relevant information about your question in the medical device manuals.";

pub const SYSTEM_PROMPT: &str = "You are a helpful medical device assistant. Always base your answers on the provided context and be precise about medical procedures and safety requirements.";

const PROMPT_PREAMBLE: &str = "You are a medical device assistant helping healthcare professionals understand medical equipment manuals. ";

const PROMPT_INSTRUCTIONS: &str = "Instructions:
- Answer based ONLY on the provided context from medical device manuals
- If the context doesn't contain relevant information, say so clearly
- Be precise and technical when discussing medical device procedures
- Include specific steps, warnings, or specifications when mentioned in the context
- If discussing safety procedures, emphasize their importance
- Do not make assumptions or provide information not in the context";

/// Sampling parameters for answer generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// Resolve one match to its chunk text.
pub fn resolve_content(m: &Match, store: &ChunkStore) -> String {
    match store.content(&m.id) {
        Some(content) => content,
        None => {
            warn!(id = %m.id, "Chunk not in store, using index metadata");
            m.metadata.content.clone()
        }
    }
}

/// Join the resolved text of `selected`, in order, into one context block.
pub fn assemble(selected: &[Match], store: &ChunkStore) -> String {
    let context = selected
        .iter()
        .map(|m| resolve_content(m, store))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    debug!(
        chunks = selected.len(),
        chars = context.chars().count(),
        "Context assembled"
    );
    context
}

/// Render the user prompt for a question and its context.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "{PROMPT_PREAMBLE}\n\nContext from medical device manuals:\n{context}\n\nQuestion: {question}\n\n{PROMPT_INSTRUCTIONS}\n\nAnswer:"
    )
}

pub fn build_completion_request(
    question: &str,
    context: &str,
    params: GenerationParams,
) -> CompletionRequest {
    CompletionRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: build_prompt(question, context),
        temperature: params.temperature,
        max_tokens: params.max_tokens,
    }
}

/// Ask the model to answer `question` from `context`.
///
/// An empty completion yields [`EMPTY_COMPLETION_ANSWER`]; transport and
/// provider failures propagate.
pub async fn generate_answer(
    llm: &dyn LanguageModel,
    question: &str,
    context: &str,
    params: GenerationParams,
) -> Result<String> {
    let request = build_completion_request(question, context, params);
    info!(model = llm.model_name(), "Generating answer");

    let answer = match llm.complete(&request).await? {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            warn!("Model returned no content");
            EMPTY_COMPLETION_ANSWER.to_string()
        }
    };
    Ok(answer)
}

/// First `max_chars` characters of `content` followed by `"..."`.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let mut out: String = content.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Citation for a selected match. Missing metadata cites `"Unknown"`, page 1.
pub fn source_reference(m: &Match, excerpt_length: usize) -> SourceReference {
    let document = if m.metadata.source.is_empty() {
        "Unknown".to_string()
    } else {
        m.metadata.source.clone()
    };
    SourceReference {
        document,
        page: m.metadata.page.max(1),
        relevance_score: round2(m.score),
        excerpt: excerpt(&m.metadata.content, excerpt_length),
    }
}
