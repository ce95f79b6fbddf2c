//! Memory and knowledge summaries attached to each dialogue turn before it
//! goes into a generation prompt.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::dataset::{read_jsonl, BatchSink, DialogueExample, JsonlWriter};
use crate::error::AnnotationError;
use crate::generator::TextGenerator;
use crate::retriever::FactRetriever;

pub const MEMORY_FIELD: &str = "memory_summary";
pub const KNOWLEDGE_FIELD: &str = "knowledge_summary";

/// Stored instead of a memory summary when the context is blank
pub const NO_MEMORY: &str = "<no memory>";
/// Stored instead of a knowledge summary when no fact applies
pub const NO_FACTS: &str = "<no relevant facts>";
/// Stored when the summarization call failed
pub const FAILED_SUMMARY: &str = "failed summary";

pub fn memory_prompt(context: &str) -> Option<String> {
    if context.trim().is_empty() {
        return None;
    }
    Some(format!(
        "Summarize this dialogue in 2-3 sentences, focusing on the emotional tone, \
         character motivations, and key facts:\n\n{context}\n\nSummary:"
    ))
}

pub fn knowledge_prompt(facts: &[String], protagonist: &str) -> Option<String> {
    if facts.is_empty() {
        return None;
    }
    let perspective = protagonist.split_whitespace().next().unwrap_or(protagonist);
    Some(format!(
        "You are {protagonist}. Based on these facts about your world, \
         write 2-3 sentences describing your perspective and feelings.\n\n\
         Facts:\n{}\n\n{perspective}'s perspective:",
        facts.join("\n")
    ))
}

/// Adds `memory_summary` and `knowledge_summary` to every example.
///
/// Examples are handled in order and written to `sink` batch by batch. A
/// failed call only affects the field it was meant to fill.
pub async fn attach_summaries<G: TextGenerator>(
    examples: Vec<DialogueExample>,
    retriever: &FactRetriever,
    generator: &G,
    batch_size: usize,
    sink: &mut impl BatchSink,
) -> Result<usize, AnnotationError> {
    if batch_size == 0 {
        return Err(AnnotationError::InvalidBatchSize);
    }

    let mut examples = examples;
    let mut written = 0;
    for (idx, batch) in examples.chunks_mut(batch_size).enumerate() {
        for example in batch.iter_mut() {
            let memory = match memory_prompt(example.context()) {
                Some(prompt) => summarize(generator, &prompt, "memory").await,
                None => NO_MEMORY.to_string(),
            };
            let facts = retriever.facts_for(example);
            let knowledge = match knowledge_prompt(&facts, retriever.protagonist()) {
                Some(prompt) => summarize(generator, &prompt, "knowledge").await,
                None => NO_FACTS.to_string(),
            };
            example.set_field(MEMORY_FIELD, memory);
            example.set_field(KNOWLEDGE_FIELD, knowledge);
        }
        sink.write_batch(batch)?;
        written += batch.len();
        info!(batch = idx + 1, written, "summaries written");
    }
    Ok(written)
}

async fn summarize<G: TextGenerator>(generator: &G, prompt: &str, kind: &str) -> String {
    match generator.generate(prompt).await {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            warn!(kind, error = %err, "summary failed");
            FAILED_SUMMARY.to_string()
        }
    }
}

/// Summarize a JSONL split into `output`
pub async fn summarize_file<G: TextGenerator>(
    retriever: &FactRetriever,
    generator: &G,
    input: &Path,
    output: &Path,
    batch_size: usize,
) -> Result<usize> {
    let examples = read_jsonl(input)
        .with_context(|| format!("Failed to read dataset {}", input.display()))?;
    let mut writer = JsonlWriter::create(output)
        .with_context(|| format!("Failed to open output {}", output.display()))?;
    let written = attach_summaries(examples, retriever, generator, batch_size, &mut writer).await?;
    info!(written, path = %output.display(), "saved summarized dataset");
    Ok(written)
}
