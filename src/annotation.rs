//! Batched action annotation.
//!
//! Examples without an action are sent to a [`TextGenerator`] in numbered
//! batches; the answer is read back line by line. A failing batch is marked
//! with the failure sentinel and the run moves on, so a later
//! [`AnnotationPipeline::retry_failed`] pass can pick up exactly those
//! examples and merge the new labels back by identity key.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::dataset::{read_jsonl, recover_jsonl, write_jsonl, ActionLabel, BatchSink, DialogueExample, JsonlWriter, ACTION_FIELD};
use crate::error::{AnnotationError, GeneratorError, ShapeMismatch};
use crate::generator::TextGenerator;

const PROMPT_HEADER: &str = "Summarize each NPC response below as a short verb phrase \
describing the action the player is told or encouraged to take. \
If no action is suggested, write 'none'. \
Return only a numbered list of answers matching the inputs. \n\n";

/// How a batch response is mapped onto the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Line i labels example i; missing lines leave the example unset and
    /// extra lines are ignored
    #[default]
    Lenient,
    /// Any line count other than the batch size fails the whole batch
    Strict,
}

/// Call pacing towards the external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Minimum time between the starts of two consecutive calls
    pub min_interval: Duration,
    /// Calls per batch before it is marked failed (at least 1)
    pub attempts: u32,
    /// Wait before the second attempt; multiplied by `backoff_factor` after
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_interval: Duration::ZERO,
            attempts: 1,
            initial_backoff: Duration::ZERO,
            backoff_factor: 2,
        }
    }
}

impl Pacing {
    fn backoff(&self, failed_attempts: u32) -> Duration {
        let factor = self.backoff_factor.max(1).saturating_pow(failed_attempts.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationConfig {
    pub batch_size: usize,
    pub parse_mode: ParseMode,
    pub pacing: Pacing,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            parse_mode: ParseMode::Lenient,
            pacing: Pacing::default(),
        }
    }
}

impl AnnotationConfig {
    /// Settings for retry passes: at least 3s between calls, three attempts
    /// per batch with doubling backoff
    pub fn retry_defaults() -> Self {
        Self {
            pacing: Pacing {
                min_interval: Duration::from_secs(3),
                attempts: 3,
                initial_backoff: Duration::from_secs(3),
                backoff_factor: 2,
            },
            ..Self::default()
        }
    }
}

/// Outcome counts of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    pub batches: usize,
    pub labeled: usize,
    pub unset: usize,
    pub failed: usize,
}

impl AnnotationReport {
    fn record(&mut self, batch: &[DialogueExample]) {
        self.batches += 1;
        for example in batch {
            match example.action() {
                ActionLabel::Label(_) => self.labeled += 1,
                ActionLabel::Unset => self.unset += 1,
                ActionLabel::Failed => self.failed += 1,
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.labeled + self.unset + self.failed
    }
}

/// Why a batch call did not produce labels
#[derive(Debug, thiserror::Error)]
enum BatchFailure {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
}

pub struct AnnotationPipeline<G> {
    generator: G,
    config: AnnotationConfig,
    last_call: Option<Instant>,
}

impl<G: TextGenerator> AnnotationPipeline<G> {
    pub fn new(generator: G, config: AnnotationConfig) -> Result<Self, AnnotationError> {
        if config.batch_size == 0 {
            return Err(AnnotationError::InvalidBatchSize);
        }
        Ok(Self {
            generator,
            config,
            last_call: None,
        })
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    /// Annotate every example whose action is unset.
    ///
    /// Examples that already carry a label (or the failure sentinel) are
    /// skipped and not forwarded. Each processed batch goes to `sink` as soon
    /// as it is labeled, in input order.
    pub async fn annotate(
        &mut self,
        examples: Vec<DialogueExample>,
        sink: &mut impl BatchSink,
    ) -> Result<AnnotationReport, AnnotationError> {
        let pending: Vec<DialogueExample> = examples
            .into_iter()
            .filter(|example| example.action() == ActionLabel::Unset)
            .collect();
        info!(pending = pending.len(), batch_size = self.config.batch_size, "annotating");
        self.process(pending, sink).await
    }

    /// [`annotate`](Self::annotate) collecting the processed examples
    pub async fn annotate_all(
        &mut self,
        examples: Vec<DialogueExample>,
    ) -> Result<(Vec<DialogueExample>, AnnotationReport), AnnotationError> {
        let mut out = Vec::new();
        let report = self.annotate(examples, &mut out).await?;
        Ok((out, report))
    }

    /// Re-annotate the examples carrying the failure sentinel and merge the
    /// results back into `dataset`.
    ///
    /// Record count and order are preserved; examples that were not retried
    /// keep their labels. A dataset without failures comes back unchanged.
    pub async fn retry_failed(
        &mut self,
        dataset: Vec<DialogueExample>,
    ) -> Result<(Vec<DialogueExample>, AnnotationReport), AnnotationError> {
        let to_retry: Vec<DialogueExample> = dataset
            .iter()
            .filter(|example| example.action() == ActionLabel::Failed)
            .cloned()
            .collect();

        if to_retry.is_empty() {
            info!("no failed examples to retry");
            return Ok((dataset, AnnotationReport::default()));
        }
        info!(retrying = to_retry.len(), "retrying failed examples");

        let mut updated = Vec::with_capacity(to_retry.len());
        let report = self.process(to_retry, &mut updated).await?;
        let (merged, _) = merge_labels(dataset, &updated);
        Ok((merged, report))
    }

    async fn process(
        &mut self,
        mut examples: Vec<DialogueExample>,
        sink: &mut impl BatchSink,
    ) -> Result<AnnotationReport, AnnotationError> {
        let mut report = AnnotationReport::default();
        let total = examples.len().div_ceil(self.config.batch_size);

        for (idx, batch) in examples.chunks_mut(self.config.batch_size).enumerate() {
            self.label_batch(idx, batch).await;
            sink.write_batch(batch)?;
            report.record(batch);
            info!(batch = idx + 1, of = total, size = batch.len(), "batch done");
        }

        info!(
            batches = report.batches,
            labeled = report.labeled,
            unset = report.unset,
            failed = report.failed,
            "annotation pass finished"
        );
        Ok(report)
    }

    /// Label one batch in place; never fails, failures become the sentinel
    async fn label_batch(&mut self, idx: usize, batch: &mut [DialogueExample]) {
        let prompt = build_batch_prompt(batch);
        let attempts = self.config.pacing.attempts.max(1);

        for attempt in 1..=attempts {
            match self.call(&prompt, batch.len()).await {
                Ok(labels) => {
                    for (example, label) in batch.iter_mut().zip(labels) {
                        example.set_action(label);
                    }
                    return;
                }
                Err(err) if attempt < attempts => {
                    let wait = self.config.pacing.backoff(attempt);
                    warn!(batch = idx + 1, attempt, error = %err, ?wait, "batch call failed, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    warn!(batch = idx + 1, attempt, error = %err, "batch failed");
                }
            }
        }

        for example in batch.iter_mut() {
            example.set_action(ActionLabel::Failed);
        }
    }

    async fn call(&mut self, prompt: &str, expected: usize) -> Result<Vec<ActionLabel>, BatchFailure> {
        if let Some(last) = self.last_call {
            let since = last.elapsed();
            if since < self.config.pacing.min_interval {
                tokio::time::sleep(self.config.pacing.min_interval - since).await;
            }
        }
        self.last_call = Some(Instant::now());

        let response = self.generator.generate(prompt).await?;
        debug!(response_chars = response.len(), "batch response");
        Ok(parse_labels(&response, expected, self.config.parse_mode)?)
    }
}

/// Prompt asking for one numbered label per gold response
pub fn build_batch_prompt(batch: &[DialogueExample]) -> String {
    let lines: Vec<String> = batch
        .iter()
        .enumerate()
        .map(|(i, example)| format!("{}. {}", i + 1, example.response()))
        .collect();
    format!("{PROMPT_HEADER}{}", lines.join("\n"))
}

/// Map a free-text response onto `expected` labels by line position.
///
/// Always returns exactly `expected` labels in lenient mode.
pub fn parse_labels(response: &str, expected: usize, mode: ParseMode) -> Result<Vec<ActionLabel>, ShapeMismatch> {
    let lines: Vec<&str> = response
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if mode == ParseMode::Strict && lines.len() != expected {
        return Err(ShapeMismatch {
            expected,
            actual: lines.len(),
        });
    }

    Ok((0..expected)
        .map(|i| lines.get(i).map_or(ActionLabel::Unset, |line| ActionLabel::parse(line)))
        .collect())
}

/// Drop an echoed "N. " list marker: when the second character is a period,
/// the first three characters go. Only single-digit markers are recognised.
pub fn strip_list_marker(label: &str) -> &str {
    let mut chars = label.char_indices();
    let is_marked = matches!(chars.nth(1), Some((_, '.'))) && label.chars().count() > 3;
    if !is_marked {
        return label;
    }
    match label.char_indices().nth(3) {
        Some((start, _)) => &label[start..],
        None => "",
    }
}

/// Strip list markers from every example's action; returns how many changed
pub fn strip_numbering(examples: &mut [DialogueExample]) -> usize {
    let mut changed = 0;
    for example in examples.iter_mut() {
        let Some(raw) = example.field(ACTION_FIELD) else {
            continue;
        };
        let stripped = strip_list_marker(raw);
        if stripped.len() != raw.len() {
            let stripped = stripped.to_string();
            example.set_action(ActionLabel::parse(&stripped));
            changed += 1;
        }
    }
    changed
}

/// Copy the actions of `updated` onto the matching examples of `full`.
///
/// Matching uses [`DialogueExample::identity_key`]. Returns the dataset in
/// its original order and the number of examples that received a label.
pub fn merge_labels(
    mut full: Vec<DialogueExample>,
    updated: &[DialogueExample],
) -> (Vec<DialogueExample>, usize) {
    let mut labels: HashMap<String, ActionLabel> = HashMap::with_capacity(updated.len());
    for example in updated {
        let key = example.identity_key();
        if labels.insert(key, example.action()).is_some() {
            warn!(response = example.response(), "duplicate identity among updated examples, last label wins");
        }
    }

    let mut matched = HashSet::new();
    let mut merged = 0;
    for example in full.iter_mut() {
        let key = example.identity_key();
        if let Some(label) = labels.get(&key) {
            if !matched.insert(key) {
                warn!(response = example.response(), "identity key matches several records");
            }
            example.set_action(label.clone());
            merged += 1;
        }
    }
    (full, merged)
}

/// Annotate a JSONL file, writing only the processed examples to `output`.
///
/// With `resume`, examples already present in `output` are skipped and new
/// batches are appended to it.
pub async fn annotate_file<G: TextGenerator>(
    pipeline: &mut AnnotationPipeline<G>,
    input: &Path,
    output: &Path,
    resume: bool,
) -> Result<AnnotationReport> {
    let mut examples = read_jsonl(input)
        .with_context(|| format!("Failed to read dataset {}", input.display()))?;

    let opened = if resume && output.exists() {
        let done: HashSet<String> = recover_jsonl(output)
            .with_context(|| format!("Failed to read previous output {}", output.display()))?
            .iter()
            .map(DialogueExample::identity_key)
            .collect();
        let before = examples.len();
        examples.retain(|example| !done.contains(&example.identity_key()));
        info!(skipped = before - examples.len(), "resuming annotation");
        JsonlWriter::append(output)
    } else {
        JsonlWriter::create(output)
    };
    let mut writer = opened.with_context(|| format!("Failed to open output {}", output.display()))?;

    let report = pipeline.annotate(examples, &mut writer).await?;
    info!(written = writer.written(), path = %output.display(), "wrote annotated examples");
    Ok(report)
}

/// Retry failed examples of a JSONL file and write the merged dataset.
/// `input` and `output` may be the same file.
pub async fn retry_file<G: TextGenerator>(
    pipeline: &mut AnnotationPipeline<G>,
    input: &Path,
    output: &Path,
) -> Result<AnnotationReport> {
    let dataset = read_jsonl(input)
        .with_context(|| format!("Failed to read dataset {}", input.display()))?;
    let (merged, report) = pipeline.retry_failed(dataset).await?;
    write_jsonl(output, &merged)
        .with_context(|| format!("Failed to write merged dataset {}", output.display()))?;
    info!(records = merged.len(), path = %output.display(), "saved merged dataset");
    Ok(report)
}

/// Remove echoed list markers from a JSONL file's actions
pub fn strip_numbering_file(input: &Path, output: &Path) -> Result<usize> {
    let mut dataset = read_jsonl(input)
        .with_context(|| format!("Failed to read dataset {}", input.display()))?;
    let changed = strip_numbering(&mut dataset);
    write_jsonl(output, &dataset)
        .with_context(|| format!("Failed to write cleaned dataset {}", output.display()))?;
    info!(changed, path = %output.display(), "cleaned numbered labels");
    Ok(changed)
}
