use std::collections::HashMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GraphError;
use crate::validation::{validate_description, validate_name, validate_type};

/// Kind of narrative entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Character,
    Location,
    Mission,
    /// Any other label supplied by graph data
    Other(String),
}

impl EntityKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Character => "Character",
            EntityKind::Location => "Location",
            EntityKind::Mission => "Mission",
            EntityKind::Other(label) => label,
        }
    }
}

impl From<String> for EntityKind {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Character" => EntityKind::Character,
            "Location" => EntityKind::Location,
            "Mission" => EntityKind::Mission,
            _ => EntityKind::Other(label),
        }
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity in the relationship graph
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Entity {
    /// Unique display name of the entity (serves as ID)
    pub name: String,

    /// Kind of entity (Character, Location, Mission, ...)
    #[serde(rename = "entityType")]
    #[schemars(with = "String")]
    pub entity_type: EntityKind,

    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Directed, labeled relation between two entities
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Relation {
    /// Source entity name
    pub from: String,

    /// Target entity name
    pub to: String,

    /// Relationship label (TRUSTS, CAMPED_AT, etc.)
    #[serde(rename = "relationType")]
    pub relation_type: String,

    /// Free-text details about the relationship
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Serializable view of a relationship graph, in insertion order
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// Attributes carried by an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeAttributes {
    pub relation_type: String,
    pub details: Option<String>,
}

/// Borrowed view of one outgoing edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub attributes: &'a EdgeAttributes,
}

#[derive(Debug, Clone)]
struct Edge {
    target: usize,
    attributes: EdgeAttributes,
}

/// In-memory directed graph of narrative entities.
///
/// Entities are never removed. At most one edge is kept per ordered
/// (source, target) pair; re-relating a pair overwrites its attributes in
/// place, so `edges_from` keeps the position of the first insertion.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    index: HashMap<String, usize>,
    entities: Vec<Entity>,
    adjacency: Vec<Vec<Edge>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity. Returns false (and changes nothing) if the name exists.
    pub fn add_entity(
        &mut self,
        name: impl Into<String>,
        entity_type: EntityKind,
        description: Option<&str>,
    ) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            return false;
        }

        self.index.insert(name.clone(), self.entities.len());
        self.entities.push(Entity {
            name,
            entity_type,
            description: description.map(str::to_string),
        });
        self.adjacency.push(Vec::new());
        true
    }

    /// Insert or overwrite the directed edge `source -> target`.
    ///
    /// Both endpoints must already exist. Otherwise the graph is left
    /// untouched and the missing names are reported.
    pub fn add_relationship(
        &mut self,
        source: &str,
        target: &str,
        relation_type: impl Into<String>,
        details: Option<&str>,
    ) -> Result<(), GraphError> {
        let (from, to) = match (self.index.get(source), self.index.get(target)) {
            (Some(&from), Some(&to)) => (from, to),
            (from, to) => {
                let mut missing = Vec::new();
                if from.is_none() {
                    missing.push(source.to_string());
                }
                if to.is_none() && target != source {
                    missing.push(target.to_string());
                }
                warn!(from = source, to = target, ?missing, "relationship skipped: entity not found");
                return Err(GraphError::UnknownEntities {
                    from: source.to_string(),
                    to: target.to_string(),
                    missing,
                });
            }
        };

        let attributes = EdgeAttributes {
            relation_type: relation_type.into(),
            details: details.map(str::to_string),
        };

        let edges = &mut self.adjacency[from];
        match edges.iter_mut().find(|edge| edge.target == to) {
            Some(existing) => existing.attributes = attributes,
            None => edges.push(Edge { target: to, attributes }),
        }
        Ok(())
    }

    /// All outgoing edges of `node` in insertion order (empty for unknown nodes)
    pub fn edges_from<'a>(&'a self, node: &str) -> impl Iterator<Item = EdgeRef<'a>> + 'a {
        let source = self.index.get(node).copied();
        source.into_iter().flat_map(move |idx| {
            self.adjacency[idx].iter().map(move |edge| EdgeRef {
                source: &self.entities[idx].name,
                target: &self.entities[edge.target].name,
                attributes: &edge.attributes,
            })
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.index.get(name).map(|&idx| &self.entities[idx])
    }

    /// Entities in insertion order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Serializable copy of the whole graph
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            entities: self.entities.clone(),
            relations: self.relations_where(|_, _| true),
        }
    }

    /// Named entities plus the relations among them.
    /// Unknown names are ignored.
    pub fn open_nodes(&self, names: &[String]) -> GraphSnapshot {
        let mut selected: Vec<usize> = names
            .iter()
            .filter_map(|name| self.index.get(name.as_str()).copied())
            .collect();
        selected.sort_unstable();
        selected.dedup();

        GraphSnapshot {
            entities: selected.iter().map(|&idx| self.entities[idx].clone()).collect(),
            relations: self.relations_where(|from, to| {
                selected.binary_search(&from).is_ok() && selected.binary_search(&to).is_ok()
            }),
        }
    }

    /// Rebuild a graph from snapshot data.
    ///
    /// Names and types are validated first; a bad record rejects the whole
    /// snapshot. Relations with unknown endpoints are skipped with a warning.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Result<Self, GraphError> {
        for entity in &snapshot.entities {
            validate_name(&entity.name, "Entity name").map_err(invalid)?;
            validate_type(entity.entity_type.as_str(), "Entity type").map_err(invalid)?;
            if let Some(description) = &entity.description {
                validate_description(description).map_err(invalid)?;
            }
        }
        for rel in &snapshot.relations {
            validate_name(&rel.from, "From entity").map_err(invalid)?;
            validate_name(&rel.to, "To entity").map_err(invalid)?;
            validate_type(&rel.relation_type, "Relation type").map_err(invalid)?;
            if let Some(details) = &rel.details {
                validate_description(details).map_err(invalid)?;
            }
        }

        let mut graph = Self::new();
        for entity in &snapshot.entities {
            graph.add_entity(
                entity.name.clone(),
                entity.entity_type.clone(),
                entity.description.as_deref(),
            );
        }
        for rel in &snapshot.relations {
            // Reported by add_relationship; the rest of the snapshot still loads
            let _ = graph.add_relationship(
                &rel.from,
                &rel.to,
                rel.relation_type.clone(),
                rel.details.as_deref(),
            );
        }
        Ok(graph)
    }

    fn relations_where(&self, keep: impl Fn(usize, usize) -> bool) -> Vec<Relation> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(from, edges)| edges.iter().map(move |edge| (from, edge)))
            .filter(|(from, edge)| keep(*from, edge.target))
            .map(|(from, edge)| Relation {
                from: self.entities[from].name.clone(),
                to: self.entities[edge.target].name.clone(),
                relation_type: edge.attributes.relation_type.clone(),
                details: edge.attributes.details.clone(),
            })
            .collect()
    }
}

fn invalid(err: anyhow::Error) -> GraphError {
    GraphError::Invalid(err.to_string())
}
