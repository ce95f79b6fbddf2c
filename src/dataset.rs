use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::DatasetError;

/// Field the annotation pipeline owns
pub const ACTION_FIELD: &str = "gold_response_action";
/// Sentinel for "no action annotated yet" (also what the annotator answers
/// when a response implies no action)
pub const UNSET_ACTION: &str = "none";
/// Sentinel for "the batch call for this example failed"
pub const FAILED_ACTION: &str = "failed action summary";
/// Optional stable identifier used as merge key when present
pub const ID_FIELD: &str = "id";

/// State of an example's `gold_response_action`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionLabel {
    Unset,
    Failed,
    Label(String),
}

impl ActionLabel {
    pub fn parse(raw: &str) -> Self {
        match raw {
            UNSET_ACTION => ActionLabel::Unset,
            FAILED_ACTION => ActionLabel::Failed,
            label => ActionLabel::Label(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionLabel::Unset => UNSET_ACTION,
            ActionLabel::Failed => FAILED_ACTION,
            ActionLabel::Label(label) => label,
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dialogue turn record.
///
/// Stored as the raw JSON object so unknown fields and field order survive
/// a read/write cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogueExample {
    fields: Map<String, Value>,
}

impl DialogueExample {
    pub fn new(
        mission: &str,
        context: &str,
        speaker: &str,
        utterance: &str,
        response_speaker: &str,
        response: &str,
    ) -> Self {
        let mut example = Self::from_map(Map::new());
        for (key, value) in [
            ("mission", mission),
            ("context", context),
            ("speaker", speaker),
            ("utterance", utterance),
            ("response_speaker", response_speaker),
            ("response", response),
        ] {
            example.set_field(key, value);
        }
        example
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn with_action(mut self, label: ActionLabel) -> Self {
        self.set_action(label);
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_field(key, value);
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// String value of `key`, if present and a string
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Insert or overwrite a field; existing fields keep their position
    pub fn set_field(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), Value::String(value.into()));
    }

    pub fn mission(&self) -> &str {
        self.field("mission").unwrap_or_default()
    }

    pub fn context(&self) -> &str {
        self.field("context").unwrap_or_default()
    }

    pub fn speaker(&self) -> &str {
        self.field("speaker").unwrap_or_default()
    }

    pub fn utterance(&self) -> &str {
        self.field("utterance").unwrap_or_default()
    }

    pub fn response_speaker(&self) -> &str {
        self.field("response_speaker").unwrap_or_default()
    }

    pub fn response(&self) -> &str {
        self.field("response").unwrap_or_default()
    }

    /// Current action label; a missing field counts as unset
    pub fn action(&self) -> ActionLabel {
        self.field(ACTION_FIELD)
            .map(ActionLabel::parse)
            .unwrap_or(ActionLabel::Unset)
    }

    pub fn set_action(&mut self, label: ActionLabel) {
        self.set_field(ACTION_FIELD, label.as_str());
    }

    /// Key identifying the example's slot in a dataset, ignoring its action.
    ///
    /// Records carrying an `id` are keyed by it. Otherwise the key is the
    /// JSON of every other field in record order, so two records that differ
    /// only in their action share a key.
    pub fn identity_key(&self) -> String {
        if let Some(id) = self.fields.get(ID_FIELD).filter(|id| !id.is_null()) {
            return format!("id:{id}");
        }
        let content: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(key, _)| key.as_str() != ACTION_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(content).to_string()
    }
}

/// Destination for processed batches
pub trait BatchSink {
    fn write_batch(&mut self, batch: &[DialogueExample]) -> Result<(), DatasetError>;
}

impl BatchSink for Vec<DialogueExample> {
    fn write_batch(&mut self, batch: &[DialogueExample]) -> Result<(), DatasetError> {
        self.extend_from_slice(batch);
        Ok(())
    }
}

/// Newline-delimited JSON writer, flushed after every batch
pub struct JsonlWriter<W: Write> {
    inner: BufWriter<W>,
    written: usize,
}

impl JsonlWriter<File> {
    /// Create (or truncate) the file, creating parent directories
    pub fn create(path: &Path) -> Result<Self, DatasetError> {
        create_parent(path)?;
        Ok(Self::new(File::create(path)?))
    }

    /// Open the file for appending, creating it if needed
    pub fn append(path: &Path) -> Result<Self, DatasetError> {
        create_parent(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            written: 0,
        }
    }

    pub fn write(&mut self, example: &DialogueExample) -> Result<(), DatasetError> {
        serde_json::to_writer(&mut self.inner, example)?;
        self.inner.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DatasetError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W, DatasetError> {
        self.inner.into_inner().map_err(|err| DatasetError::Io(err.into_error()))
    }
}

impl<W: Write> BatchSink for JsonlWriter<W> {
    fn write_batch(&mut self, batch: &[DialogueExample]) -> Result<(), DatasetError> {
        for example in batch {
            self.write(example)?;
        }
        self.flush()
    }
}

/// Read every record of a JSONL file (blank lines are skipped)
pub fn read_jsonl(path: &Path) -> Result<Vec<DialogueExample>, DatasetError> {
    let reader = BufReader::new(File::open(path)?);
    let mut examples = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        if let Some(example) = parse_line(idx + 1, &line?)? {
            examples.push(example);
        }
    }
    Ok(examples)
}

/// Read the output of an interrupted run so it can be appended to.
///
/// A run can stop in the middle of its last record. An unparsable trailing
/// fragment (no final newline) is cut off the file; a complete record that
/// only misses its newline gets one. Malformed lines elsewhere are errors.
pub fn recover_jsonl(path: &Path) -> Result<Vec<DialogueExample>, DatasetError> {
    let raw = std::fs::read_to_string(path)?;
    let complete_len = raw.rfind('\n').map_or(0, |pos| pos + 1);
    let (complete, tail) = raw.split_at(complete_len);

    let mut examples = Vec::new();
    for (idx, line) in complete.lines().enumerate() {
        if let Some(example) = parse_line(idx + 1, line)? {
            examples.push(example);
        }
    }

    if !tail.trim().is_empty() {
        let line = complete.lines().count() + 1;
        match parse_line(line, tail) {
            Ok(Some(example)) => {
                examples.push(example);
                OpenOptions::new().append(true).open(path)?.write_all(b"\n")?;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(line, error = %err, path = %path.display(), "dropping partial trailing record");
                OpenOptions::new().write(true).open(path)?.set_len(complete_len as u64)?;
            }
        }
    }
    Ok(examples)
}

fn parse_line(line: usize, text: &str) -> Result<Option<DialogueExample>, DatasetError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(text).map_err(|source| DatasetError::Json { line, source })?;
    match value {
        Value::Object(fields) => Ok(Some(DialogueExample::from_map(fields))),
        _ => Err(DatasetError::NotAnObject { line }),
    }
}

/// Write all records, replacing the file.
///
/// Records go to a temporary file next to `path` which is renamed over it
/// once complete, so a failed write leaves the previous contents in place.
pub fn write_jsonl(path: &Path, examples: &[DialogueExample]) -> Result<(), DatasetError> {
    create_parent(path)?;
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };

    let mut writer = JsonlWriter::new(NamedTempFile::new_in(dir)?);
    writer.write_batch(examples)?;
    let staged = writer.into_inner()?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| DatasetError::Io(err.error))?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
