use std::collections::HashSet;

use tracing::debug;

use crate::context::{speaker_tags, ACTION_TAG};
use crate::dataset::DialogueExample;
use crate::graph::{EdgeRef, RelationshipGraph};

/// Where a fact came from; decides the prefix it is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactCategory {
    /// Protagonist to speaker, and speaker/target in either direction
    Direct,
    Mission,
    MissionInvolvement,
    ContextCharacter,
}

/// Rule-ordered fact lookup over a relationship graph.
///
/// Rules run in a fixed order: protagonist→speaker, speaker↔target,
/// mission edges, protagonist→mission, then protagonist→characters tagged in
/// the context. Output keeps the first occurrence of each formatted fact.
#[derive(Debug, Clone)]
pub struct FactRetriever {
    graph: RelationshipGraph,
    protagonist: String,
    perspective: String,
}

impl FactRetriever {
    pub fn new(graph: RelationshipGraph, protagonist: impl Into<String>) -> Self {
        let protagonist = protagonist.into();
        let perspective = protagonist
            .split_whitespace()
            .next()
            .unwrap_or(protagonist.as_str())
            .to_string();
        Self {
            graph,
            protagonist,
            perspective,
        }
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn protagonist(&self) -> &str {
        &self.protagonist
    }

    pub fn get_relevant_facts(
        &self,
        mission: &str,
        context: &str,
        speaker: &str,
        target: &str,
    ) -> Vec<String> {
        let mut facts = Vec::new();

        for edge in self.protagonist_edges_to(speaker) {
            facts.push(self.format(FactCategory::Direct, edge));
        }

        if self.graph.contains(speaker) && self.graph.contains(target) {
            for edge in self.graph.edges_from(speaker).filter(|e| e.target == target) {
                facts.push(self.format(FactCategory::Direct, edge));
            }
            for edge in self.graph.edges_from(target).filter(|e| e.target == speaker) {
                facts.push(self.format(FactCategory::Direct, edge));
            }
        }

        for edge in self.graph.edges_from(mission) {
            facts.push(self.format(FactCategory::Mission, edge));
        }

        for edge in self.protagonist_edges_to(mission) {
            facts.push(self.format(FactCategory::MissionInvolvement, edge));
        }

        let excluded = [speaker, target, self.protagonist.as_str(), ACTION_TAG];
        for name in speaker_tags(context, &excluded) {
            if !self.graph.contains(name) {
                continue;
            }
            for edge in self.protagonist_edges_to(name) {
                facts.push(self.format(FactCategory::ContextCharacter, edge));
            }
        }

        let mut seen = HashSet::new();
        facts.retain(|fact| seen.insert(fact.clone()));
        debug!(mission, speaker, response_speaker = target, facts = facts.len(), "retrieved facts");
        facts
    }

    /// Facts for a dialogue turn, answering as its `response_speaker`
    pub fn facts_for(&self, example: &DialogueExample) -> Vec<String> {
        self.get_relevant_facts(
            example.mission(),
            example.context(),
            example.speaker(),
            example.response_speaker(),
        )
    }

    fn protagonist_edges_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = EdgeRef<'a>> + 'a {
        self.graph
            .edges_from(&self.protagonist)
            .filter(move |edge| edge.target == target)
    }

    fn format(&self, category: FactCategory, edge: EdgeRef<'_>) -> String {
        let details = edge.attributes.details.as_deref().unwrap_or("N/A");
        let prefix = match category {
            FactCategory::Direct => String::new(),
            FactCategory::Mission => "Mission Fact: ".to_string(),
            FactCategory::MissionInvolvement => {
                format!("{}'s Mission Involvement: ", self.perspective)
            }
            FactCategory::ContextCharacter => {
                format!("Context Fact ({}'s View): ", self.perspective)
            }
        };
        format!(
            "{prefix}{} {} {}. Details: {details}",
            edge.source, edge.attributes.relation_type, edge.target
        )
    }
}
