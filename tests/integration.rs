mod common;

use std::path::PathBuf;

use common::{example, examples, Reply, ScriptedGenerator};
use dialogue_grounding_rs::annotation::{
    annotate_file, retry_file, strip_numbering_file, AnnotationConfig, AnnotationPipeline,
};
use dialogue_grounding_rs::dataset::{read_jsonl, write_jsonl, ActionLabel, DialogueExample};
use dialogue_grounding_rs::error::DatasetError;
use dialogue_grounding_rs::graph::{EntityKind, RelationshipGraph};
use dialogue_grounding_rs::lore::{seed_graph, PROTAGONIST};
use dialogue_grounding_rs::manager::KnowledgeGraphManager;
use dialogue_grounding_rs::retriever::FactRetriever;
use dialogue_grounding_rs::summaries::{
    attach_summaries, knowledge_prompt, memory_prompt, summarize_file, FAILED_SUMMARY, KNOWLEDGE_FIELD,
    MEMORY_FIELD, NO_FACTS, NO_MEMORY,
};
use tempfile::TempDir;

/// Helper to create a temp dir with a path for a .jsonl file
fn temp_file(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

fn config(batch_size: usize) -> AnnotationConfig {
    AnnotationConfig {
        batch_size,
        ..AnnotationConfig::default()
    }
}

#[test]
fn test_jsonl_roundtrip_preserves_fields() {
    let (_dir, path) = temp_file("pairs.jsonl");
    std::fs::write(
        &path,
        "{\"zeta\":\"1\",\"mission\":\"A Fisher of Men\",\"response\":\"Sure.\",\"gold_response_action\":\"none\",\"alpha\":\"2\"}\n\n",
    )
    .unwrap();

    let mut dataset = read_jsonl(&path).unwrap();
    assert_eq!(dataset.len(), 1);
    dataset[0].set_action(ActionLabel::Label("go fishing".to_string()));
    write_jsonl(&path, &dataset).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        raw,
        "{\"zeta\":\"1\",\"mission\":\"A Fisher of Men\",\"response\":\"Sure.\",\"gold_response_action\":\"go fishing\",\"alpha\":\"2\"}\n"
    );
}

#[test]
fn test_read_jsonl_reports_bad_lines() {
    let (_dir, path) = temp_file("bad.jsonl");
    std::fs::write(&path, "{\"response\":\"ok\"}\n[1, 2]\n").unwrap();
    assert!(matches!(read_jsonl(&path), Err(DatasetError::NotAnObject { line: 2 })));

    std::fs::write(&path, "{\"response\":\"ok\"}\n{oops\n").unwrap();
    assert!(matches!(read_jsonl(&path), Err(DatasetError::Json { line: 2, .. })));
}

#[tokio::test]
async fn test_annotate_file_writes_processed_examples() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("pairs.jsonl");
    let output = dir.path().join("out/pairs_action.jsonl");

    let mut dataset = examples(6);
    dataset[2].set_action(ActionLabel::Label("ride".to_string()));
    write_jsonl(&input, &dataset).unwrap();

    let generator = ScriptedGenerator::new(vec![Reply::Echo, Reply::Fail]);
    let mut pipeline = AnnotationPipeline::new(&generator, config(3)).unwrap();
    let report = annotate_file(&mut pipeline, &input, &output, false).await.unwrap();

    assert_eq!(report.batches, 2);
    let written = read_jsonl(&output).unwrap();
    let responses: Vec<&str> = written.iter().map(DialogueExample::response).collect();
    assert_eq!(responses, vec!["r0", "r1", "r3", "r4", "r5"]);
    assert_eq!(written[2].action(), ActionLabel::Label("3. do r3".to_string()));
    assert_eq!(written[3].action(), ActionLabel::Failed);
    assert_eq!(written[4].action(), ActionLabel::Failed);
}

#[tokio::test]
async fn test_annotate_file_resumes() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("pairs.jsonl");
    let output = dir.path().join("pairs_action.jsonl");

    write_jsonl(&input, &examples(5)).unwrap();
    // A previous run got through the first two examples
    let mut done = examples(2);
    for ex in done.iter_mut() {
        ex.set_action(ActionLabel::Label("ride".to_string()));
    }
    write_jsonl(&output, &done).unwrap();

    let generator = ScriptedGenerator::echo();
    let mut pipeline = AnnotationPipeline::new(&generator, config(10)).unwrap();
    let report = annotate_file(&mut pipeline, &input, &output, true).await.unwrap();

    assert_eq!(report.processed(), 3);
    assert!(generator.prompts()[0].ends_with("1. r2\n2. r3\n3. r4"));

    let written = read_jsonl(&output).unwrap();
    assert_eq!(written.len(), 5);
    assert_eq!(written[0].action(), ActionLabel::Label("ride".to_string()));
    assert_eq!(written[4].action(), ActionLabel::Label("3. do r4".to_string()));
}

#[test]
fn test_example_accessors() {
    let ex = example("Sure.").with_field("id", "turn-7");
    assert_eq!(ex.utterance(), "We ride.");
    assert_eq!(ex.response_speaker(), "Arthur Morgan");
    let keys: Vec<&str> = ex.fields().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["mission", "context", "speaker", "utterance", "response_speaker", "response", "gold_response_action", "id"]
    );
}

#[test]
fn test_rewrite_replaces_file_instead_of_truncating_it() {
    let (dir, path) = temp_file("pairs_action.jsonl");
    write_jsonl(&path, &examples(3)).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    // A second name for the original contents; an in-place truncate would change it too
    let alias = dir.path().join("alias.jsonl");
    std::fs::hard_link(&path, &alias).unwrap();

    write_jsonl(&path, &examples(1)).unwrap();
    assert_eq!(read_jsonl(&path).unwrap().len(), 1);
    assert_eq!(std::fs::read_to_string(&alias).unwrap(), before);
}

#[test]
fn test_failed_rewrite_keeps_existing_data() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("pairs_action.jsonl");
    std::fs::create_dir(&target).unwrap();
    write_jsonl(&target.join("inner.jsonl"), &examples(2)).unwrap();

    // The rename over a non-empty directory fails after all records were staged
    assert!(write_jsonl(&target, &examples(4)).is_err());
    assert_eq!(read_jsonl(&target.join("inner.jsonl")).unwrap().len(), 2);

    // No staging file is left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn test_resume_drops_partial_trailing_record() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("pairs.jsonl");
    let output = dir.path().join("pairs_action.jsonl");

    write_jsonl(&input, &examples(5)).unwrap();
    let mut done = examples(2);
    for ex in done.iter_mut() {
        ex.set_action(ActionLabel::Label("ride".to_string()));
    }
    write_jsonl(&output, &done).unwrap();
    // Interrupted in the middle of writing the third record
    let mut raw = std::fs::read_to_string(&output).unwrap();
    raw.push_str("{\"mission\":\"Outlaws fr");
    std::fs::write(&output, raw).unwrap();

    let generator = ScriptedGenerator::echo();
    let mut pipeline = AnnotationPipeline::new(&generator, config(10)).unwrap();
    let report = annotate_file(&mut pipeline, &input, &output, true).await.unwrap();
    assert_eq!(report.processed(), 3);

    let written = read_jsonl(&output).unwrap();
    let responses: Vec<&str> = written.iter().map(DialogueExample::response).collect();
    assert_eq!(responses, vec!["r0", "r1", "r2", "r3", "r4"]);
}

#[tokio::test]
async fn test_resume_keeps_record_missing_its_newline() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("pairs.jsonl");
    let output = dir.path().join("pairs_action.jsonl");

    write_jsonl(&input, &examples(4)).unwrap();
    let mut done = examples(2);
    for ex in done.iter_mut() {
        ex.set_action(ActionLabel::Label("ride".to_string()));
    }
    write_jsonl(&output, &done).unwrap();
    let raw = std::fs::read_to_string(&output).unwrap();
    std::fs::write(&output, raw.trim_end()).unwrap();

    let generator = ScriptedGenerator::echo();
    let mut pipeline = AnnotationPipeline::new(&generator, config(10)).unwrap();
    let report = annotate_file(&mut pipeline, &input, &output, true).await.unwrap();
    assert_eq!(report.processed(), 2);

    let written = read_jsonl(&output).unwrap();
    assert_eq!(written.len(), 4);
    assert_eq!(written[1].action(), ActionLabel::Label("ride".to_string()));
    assert_eq!(written[3].action(), ActionLabel::Label("2. do r3".to_string()));
}

#[tokio::test]
async fn test_retry_then_strip_in_place() {
    let (_dir, path) = temp_file("pairs_action.jsonl");

    let dataset = vec![
        example("a").with_action(ActionLabel::Label("1. ride".to_string())),
        example("b").with_action(ActionLabel::Failed),
        example("c").with_action(ActionLabel::Label("hide".to_string())),
        example("d").with_action(ActionLabel::Failed),
    ];
    write_jsonl(&path, &dataset).unwrap();

    let generator = ScriptedGenerator::echo();
    let mut pipeline = AnnotationPipeline::new(&generator, config(10)).unwrap();
    let report = retry_file(&mut pipeline, &path, &path).await.unwrap();
    assert_eq!(report.labeled, 2);

    let changed = strip_numbering_file(&path, &path).unwrap();
    assert_eq!(changed, 3);

    let merged = read_jsonl(&path).unwrap();
    let actions: Vec<String> = merged.iter().map(|ex| ex.action().to_string()).collect();
    assert_eq!(actions, vec!["ride", "do b", "hide", "do d"]);
}

#[test]
fn test_summary_prompts() {
    assert_eq!(memory_prompt("   "), None);
    let prompt = memory_prompt("<Dutch> We ride. </Dutch>").unwrap();
    assert!(prompt.contains("<Dutch> We ride. </Dutch>"));
    assert!(prompt.ends_with("Summary:"));

    assert_eq!(knowledge_prompt(&[], PROTAGONIST), None);
    let facts = vec!["fact one".to_string(), "fact two".to_string()];
    let prompt = knowledge_prompt(&facts, PROTAGONIST).unwrap();
    assert!(prompt.starts_with("You are Arthur Morgan."));
    assert!(prompt.contains("Facts:\nfact one\nfact two\n"));
    assert!(prompt.ends_with("Arthur's perspective:"));
}

#[tokio::test]
async fn test_attach_summaries() {
    let retriever = FactRetriever::new(seed_graph(), PROTAGONIST);

    let grounded = DialogueExample::new(
        "Banking, the Old American Art",
        "<Hosea Matthews> Easy now. </Hosea Matthews>",
        "Hosea Matthews",
        "Easy now.",
        "Arthur Morgan",
        "Sure.",
    );
    let empty = DialogueExample::new("Nowhere", "", "Stranger", "Hm?", "Arthur Morgan", "Nothing.");
    let failing = DialogueExample::new("Nowhere", "<Stranger> Hm? </Stranger>", "Stranger", "Hm?", "Arthur Morgan", "No.");

    // Calls: grounded memory, grounded knowledge, failing memory
    let generator = ScriptedGenerator::new(vec![Reply::Text(" Tense. "), Reply::Echo, Reply::Fail]);
    let mut out = Vec::new();
    let written = attach_summaries(vec![grounded, empty, failing], &retriever, &generator, 2, &mut out)
        .await
        .unwrap();

    assert_eq!(written, 3);
    assert_eq!(generator.calls(), 3);
    assert_eq!(out[0].field(MEMORY_FIELD), Some("Tense."));
    assert_eq!(out[0].field(KNOWLEDGE_FIELD), Some("A short summary."));
    assert!(generator.prompts()[1].contains("Arthur Morgan TRUSTS Hosea Matthews."));
    assert_eq!(out[1].field(MEMORY_FIELD), Some(NO_MEMORY));
    assert_eq!(out[1].field(KNOWLEDGE_FIELD), Some(NO_FACTS));
    assert_eq!(out[2].field(MEMORY_FIELD), Some(FAILED_SUMMARY));
    assert_eq!(out[2].field(KNOWLEDGE_FIELD), Some(NO_FACTS));
}

#[tokio::test]
async fn test_summarize_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("train.jsonl");
    let output = dir.path().join("summarized/train.jsonl");
    write_jsonl(&input, &examples(3)).unwrap();

    let retriever = FactRetriever::new(seed_graph(), PROTAGONIST);
    let generator = ScriptedGenerator::echo();
    let written = summarize_file(&retriever, &generator, &input, &output, 2).await.unwrap();
    assert_eq!(written, 3);

    let summarized = read_jsonl(&output).unwrap();
    assert_eq!(summarized.len(), 3);
    for ex in &summarized {
        assert_eq!(ex.field(MEMORY_FIELD), Some("A short summary."));
        assert_eq!(ex.field(KNOWLEDGE_FIELD), Some("A short summary."));
    }
}

#[tokio::test]
async fn test_manager_loads_snapshot_file() {
    let (_dir, path) = temp_file("graph.json");

    let mut graph = RelationshipGraph::new();
    graph.add_entity("Hero", EntityKind::Character, None);
    graph.add_entity("Ally", EntityKind::Character, Some("Trusty"));
    graph.add_relationship("Hero", "Ally", "TRUSTS", None).unwrap();
    std::fs::write(&path, serde_json::to_string(&graph.snapshot()).unwrap()).unwrap();

    let manager = KnowledgeGraphManager::load(Some(path.as_path()), Some("Hero")).unwrap();
    let facts = manager.get_relevant_facts("", "", "Ally", "Hero").await;
    assert_eq!(facts, vec!["Hero TRUSTS Ally. Details: N/A".to_string()]);

    let snapshot = manager.read_graph().await;
    assert_eq!(snapshot.entities.len(), 2);
    let opened = manager.open_nodes(vec!["Ally".to_string()]).await;
    assert_eq!(opened.entities.len(), 1);
    assert!(opened.relations.is_empty());
}

#[tokio::test]
async fn test_manager_defaults_to_lore() {
    let manager = KnowledgeGraphManager::load(None, None).unwrap();
    assert_eq!(manager.retriever().protagonist(), PROTAGONIST);
    assert_eq!(manager.read_graph().await.entities.len(), 37);

    let (_dir, path) = temp_file("missing.json");
    assert!(KnowledgeGraphManager::load(Some(path.as_path()), None).is_err());
}
