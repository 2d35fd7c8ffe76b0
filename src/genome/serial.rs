//! Serialized form of a genome
//!
//! A JSON element tree: container, graphs, subgraphs, nodes, each with an
//! `id` and a `ref` naming its grammar counterpart. Node values live in
//! `$param` tags; `place`, `next` and `prev` tags record the slice order.
//! Only resolved genomes are written. Loading checks the tree against the
//! grammar and advances the id generator past every loaded id.

use super::container::{Genome, ResolvedGenome};
use super::edge::{Edge, LabelKind};
use super::node::MacroNode;
use super::section_graph::SectionGraph;
use super::slice::Slice;
use super::subgraph::SubsectionGraph;
use super::tag::Tag;
use crate::error::GenomeError;
use crate::grammar::{Grammar, Macro, ParameterKind};
use crate::ids::{EntityId, IdGenerator, NodeId};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

pub const FORMAT_VERSION: u32 = 1;

const PLACE_TAG: &str = "place";
const NEXT_TAG: &str = "next";
const PREV_TAG: &str = "prev";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeDocument {
    pub format_version: u32,
    /// Grammar name
    pub grammar: String,
    pub saved_at: DateTime<Utc>,
    pub container: ContainerElement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerElement {
    pub id: String,
    pub prologue: NodeElement,
    pub epilogue: NodeElement,
    pub graphs: Vec<GraphElement>,
}

/// One section graph; `ref` is the section name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphElement {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub prologue: NodeElement,
    pub epilogue: NodeElement,
    pub subgraphs: Vec<SubgraphElement>,
}

/// One subsection graph; `ref` is the subsection name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphElement {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub slice: String,
    pub nodes: Vec<NodeElement>,
}

/// One node; `ref` is the macro path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeElement {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub edges: Vec<EdgeElement>,
}

/// One label; `ref` is the parameter name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeElement {
    #[serde(rename = "ref")]
    pub reference: String,
    pub target: String,
}

impl NodeElement {
    fn from_node(node: &MacroNode) -> Self {
        let tags = node
            .tags()
            .iter()
            .map(|t| Tag::new(format!("${}", t.name), t.value.clone()))
            .collect();
        let edges = node
            .edges()
            .iter()
            .filter_map(|e| {
                e.target().map(|target| EdgeElement {
                    reference: e.parameter().to_string(),
                    target: target.to_string(),
                })
            })
            .collect();
        Self {
            id: node.id().to_string(),
            reference: node.def().path.clone(),
            tags,
            edges,
        }
    }

    fn tag(&self, name: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.name == name).map(|t| t.value.as_str())
    }
}

fn slice_elements(slice: &Slice) -> Vec<NodeElement> {
    slice
        .nodes()
        .iter()
        .enumerate()
        .map(|(position, node)| {
            let mut element = NodeElement::from_node(node);
            element.tags.push(Tag::new(PLACE_TAG, position.to_string()));
            if let Some(next) = slice.next(position) {
                element.tags.push(Tag::new(NEXT_TAG, next.id().to_string()));
            }
            if let Some(prev) = slice.prev(position) {
                element.tags.push(Tag::new(PREV_TAG, prev.id().to_string()));
            }
            element
        })
        .collect()
}

impl ResolvedGenome<'_> {
    pub fn to_document(&self) -> GenomeDocument {
        let genome = self.genome();
        let graphs = genome
            .sections()
            .iter()
            .map(|section| GraphElement {
                id: section.id().to_string(),
                reference: section.def().name.clone(),
                prologue: NodeElement::from_node(section.prologue()),
                epilogue: NodeElement::from_node(section.epilogue()),
                subgraphs: section
                    .subgraphs()
                    .iter()
                    .map(|g| SubgraphElement {
                        id: g.id().to_string(),
                        reference: g.def().name.clone(),
                        slice: g.slice().id().to_string(),
                        nodes: slice_elements(g.slice()),
                    })
                    .collect(),
            })
            .collect();
        GenomeDocument {
            format_version: FORMAT_VERSION,
            grammar: genome.grammar().name.clone(),
            saved_at: Utc::now(),
            container: ContainerElement {
                id: genome.id().to_string(),
                prologue: NodeElement::from_node(genome.prologue()),
                epilogue: NodeElement::from_node(genome.epilogue()),
                graphs,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, GenomeError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), GenomeError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!("Saved genome {} to {}", self.genome().id(), path.display());
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> GenomeError {
    GenomeError::Document(message.into())
}

/// Loading state shared by every element of one document
struct Loader<'a> {
    ids: &'a mut IdGenerator,
    seen: HashSet<String>,
}

impl Loader<'_> {
    fn node(&mut self, element: &NodeElement, def: &Arc<Macro>) -> Result<MacroNode, GenomeError> {
        if element.reference != def.path {
            return Err(invalid(format!(
                "node {} instantiates {} where {} is expected",
                element.id, element.reference, def.path
            )));
        }
        if element.id.is_empty() || !self.seen.insert(element.id.clone()) {
            return Err(invalid(format!("duplicate or empty node id '{}'", element.id)));
        }
        let id = NodeId::from(element.id.as_str());
        self.ids.observe_node(&id);

        let mut tags = Vec::new();
        for param in def.tag_parameters() {
            let value = element
                .tag(&format!("${}", param.name))
                .ok_or_else(|| invalid(format!("node {} lacks a value for '{}'", element.id, param.name)))?;
            if let ParameterKind::UniqueTag = param.kind {
                self.ids.observe_unique_tag(value);
            }
            tags.push(Tag::new(&param.name, value));
        }
        let declared = element.tags.iter().filter(|t| t.name.starts_with('$')).count();
        if declared != tags.len() {
            return Err(invalid(format!("node {} carries unknown parameter tags", element.id)));
        }

        let mut edges = Vec::new();
        for param in def.label_parameters() {
            let kind = match param.kind {
                ParameterKind::InnerLabel(_) => LabelKind::Inner,
                _ => LabelKind::Outer,
            };
            let edge = element
                .edges
                .iter()
                .find(|e| e.reference == param.name)
                .ok_or_else(|| invalid(format!("node {} lacks label '{}'", element.id, param.name)))?;
            edges.push(Edge::attached(&param.name, kind, NodeId::from(edge.target.as_str())));
        }
        if element.edges.len() != edges.len() {
            return Err(invalid(format!("node {} carries unknown labels", element.id)));
        }
        Ok(MacroNode::from_parts(id, Arc::clone(def), tags, edges))
    }

    /// Node elements in `next`/`prev` order
    fn chain<'e>(&self, subgraph: &'e SubgraphElement) -> Result<Vec<&'e NodeElement>, GenomeError> {
        let by_id: HashMap<&str, &NodeElement> =
            subgraph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut heads = subgraph.nodes.iter().filter(|n| n.tag(PREV_TAG).is_none());
        let (Some(head), None) = (heads.next(), heads.next()) else {
            return Err(invalid(format!("subgraph {} has no single first node", subgraph.id)));
        };
        let mut ordered = vec![head];
        let mut cursor = head;
        while let Some(next) = cursor.tag(NEXT_TAG) {
            let node = by_id
                .get(next)
                .copied()
                .ok_or_else(|| invalid(format!("node {} links to missing node {}", cursor.id, next)))?;
            if node.tag(PREV_TAG) != Some(cursor.id.as_str()) || ordered.len() > subgraph.nodes.len() {
                return Err(invalid(format!("broken links around node {}", cursor.id)));
            }
            ordered.push(node);
            cursor = node;
        }
        if ordered.len() != subgraph.nodes.len() {
            return Err(invalid(format!("subgraph {} has unlinked nodes", subgraph.id)));
        }
        for (position, node) in ordered.iter().enumerate() {
            if let Some(place) = node.tag(PLACE_TAG) {
                if place.parse::<usize>().ok() != Some(position) {
                    return Err(invalid(format!("node {} is placed at {} but linked at {}", node.id, place, position)));
                }
            }
        }
        Ok(ordered)
    }

    fn subgraph(&mut self, section: &str, element: &SubgraphElement, grammar: &Grammar) -> Result<SubsectionGraph, GenomeError> {
        let def = grammar.subsection(section, &element.reference).ok_or_else(|| {
            invalid(format!("grammar {} has no subsection {}/{}", grammar.name, section, element.reference))
        })?;
        let ordered = self.chain(element)?;
        if ordered.len() < 2 {
            return Err(invalid(format!("subgraph {} lacks its prologue or epilogue", element.id)));
        }
        let last = ordered.len() - 1;
        let mut nodes = Vec::with_capacity(ordered.len());
        for (position, node) in ordered.into_iter().enumerate() {
            let macro_def = if position == 0 {
                &def.prologue
            } else if position == last {
                &def.epilogue
            } else {
                def.macros
                    .iter()
                    .find(|m| m.path == node.reference)
                    .ok_or_else(|| invalid(format!("node {} uses unknown macro {}", node.id, node.reference)))?
            };
            nodes.push(self.node(node, macro_def)?);
        }
        let id = EntityId::from(element.id.as_str());
        let slice_id = EntityId::from(element.slice.as_str());
        self.ids.observe_graph(&id);
        self.ids.observe_slice(&slice_id);
        Ok(SubsectionGraph::from_parts(id, Arc::clone(def), Slice::from_nodes(slice_id, nodes)))
    }

    fn graph(&mut self, element: &GraphElement, grammar: &Grammar) -> Result<SectionGraph, GenomeError> {
        let def = grammar
            .section(&element.reference)
            .ok_or_else(|| invalid(format!("grammar {} has no section {}", grammar.name, element.reference)))?;
        let prologue = self.node(&element.prologue, &def.prologue)?;
        let epilogue = self.node(&element.epilogue, &def.epilogue)?;
        let subgraphs = element
            .subgraphs
            .iter()
            .map(|g| self.subgraph(&def.name, g, grammar))
            .collect::<Result<Vec<_>, _>>()?;
        let id = EntityId::from(element.id.as_str());
        self.ids.observe_graph(&id);
        Ok(SectionGraph::from_parts(id, Arc::clone(def), prologue, epilogue, subgraphs))
    }
}

impl GenomeDocument {
    /// Rebuild the genome described by this document
    pub fn into_genome(self, grammar: &Arc<Grammar>, ids: &mut IdGenerator) -> Result<Genome, GenomeError> {
        if self.format_version != FORMAT_VERSION {
            return Err(invalid(format!("unsupported format version {}", self.format_version)));
        }
        if self.grammar != grammar.name {
            return Err(invalid(format!(
                "document was written for grammar {}, not {}",
                self.grammar, grammar.name
            )));
        }
        let container = &self.container;
        let names: Vec<&str> = container.graphs.iter().map(|g| g.reference.as_str()).collect();
        let expected: Vec<&str> = grammar.sections.iter().map(|s| s.name.as_str()).collect();
        if names != expected {
            return Err(invalid(format!("sections {:?} do not match grammar order {:?}", names, expected)));
        }

        let mut loader = Loader {
            ids,
            seen: HashSet::new(),
        };
        let prologue = loader.node(&container.prologue, &grammar.prologue)?;
        let epilogue = loader.node(&container.epilogue, &grammar.epilogue)?;
        let sections = container
            .graphs
            .iter()
            .map(|g| loader.graph(g, grammar))
            .collect::<Result<Vec<_>, _>>()?;
        let id = EntityId::from(container.id.as_str());
        loader.ids.observe_graph(&id);

        for element in container.graphs.iter().flat_map(|g| &g.subgraphs).flat_map(|g| &g.nodes) {
            if let Some(edge) = element.edges.iter().find(|e| !loader.seen.contains(&e.target)) {
                return Err(invalid(format!(
                    "label '{}' of node {} points at missing node {}",
                    edge.reference, element.id, edge.target
                )));
            }
        }

        let genome = Genome::from_parts(id, Arc::clone(grammar), prologue, epilogue, sections);
        debug!("Loaded genome {} with {} macros", genome.id(), genome.macro_count());
        Ok(genome)
    }
}

impl Genome {
    pub fn from_json(json: &str, grammar: &Arc<Grammar>, ids: &mut IdGenerator) -> Result<Genome, GenomeError> {
        let document: GenomeDocument = serde_json::from_str(json)?;
        document.into_genome(grammar, ids)
    }

    pub fn load_json(path: impl AsRef<Path>, grammar: &Arc<Grammar>, ids: &mut IdGenerator) -> Result<Genome, GenomeError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let genome = Self::from_json(&data, grammar, ids)?;
        info!("Loaded genome {} from {}", genome.id(), path.display());
        Ok(genome)
    }
}
