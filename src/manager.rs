use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::graph::{GraphSnapshot, RelationshipGraph};
use crate::lore::{seed_graph, PROTAGONIST};
use crate::retriever::FactRetriever;

/// Shared read-only access to the graph and its retriever
#[derive(Clone)]
pub struct KnowledgeGraphManager {
    retriever: Arc<FactRetriever>,
}

impl KnowledgeGraphManager {
    pub fn new(retriever: FactRetriever) -> Self {
        Self {
            retriever: Arc::new(retriever),
        }
    }

    /// Built-in lore graph, or the snapshot stored at `graph_path`
    pub fn load(graph_path: Option<&Path>, protagonist: Option<&str>) -> Result<Self> {
        let graph = match graph_path {
            Some(path) => load_snapshot(path)?,
            None => seed_graph(),
        };
        let protagonist = protagonist.unwrap_or(PROTAGONIST);
        if !graph.contains(protagonist) {
            tracing::warn!(protagonist, "protagonist is not an entity of the graph");
        }
        Ok(Self::new(FactRetriever::new(graph, protagonist)))
    }

    pub fn retriever(&self) -> &FactRetriever {
        &self.retriever
    }

    /// Ordered, deduplicated facts for one dialogue turn
    pub async fn get_relevant_facts(
        &self,
        mission: &str,
        context: &str,
        speaker: &str,
        target: &str,
    ) -> Vec<String> {
        self.retriever.get_relevant_facts(mission, context, speaker, target)
    }

    /// Read entire graph
    pub async fn read_graph(&self) -> GraphSnapshot {
        self.retriever.graph().snapshot()
    }

    /// Open specific nodes by names
    pub async fn open_nodes(&self, names: Vec<String>) -> GraphSnapshot {
        self.retriever.graph().open_nodes(&names)
    }
}

/// Read a graph snapshot JSON file
pub fn load_snapshot(path: &Path) -> Result<RelationshipGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file {}", path.display()))?;
    let snapshot: GraphSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse graph file {}", path.display()))?;
    RelationshipGraph::from_snapshot(&snapshot)
        .with_context(|| format!("Invalid graph file {}", path.display()))
}
