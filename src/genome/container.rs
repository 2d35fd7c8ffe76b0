//! Genome — the root container of one individual
//!
//! Owns a global prologue/epilogue and one section graph per grammar
//! section. Genome-level editing wraps the lower-level editors and takes
//! care of edges that cross subsection graph boundaries.

use super::edge::{LabelKind, TargetLocation, TargetLocator};
use super::node::MacroNode;
use super::section_graph::SectionGraph;
use super::slice::{Slice, SplicePosition};
use super::subgraph::SubsectionGraph;
use crate::context::GenomeContext;
use crate::error::GenomeError;
use crate::grammar::{Grammar, MacroRole};
use crate::ids::{GraphId, IdGenerator, NodeId};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Address of a node living inside a subsection graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAddress {
    pub section: usize,
    pub subgraph: usize,
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Genome {
    id: GraphId,
    grammar: Arc<Grammar>,
    prologue: MacroNode,
    epilogue: MacroNode,
    sections: Vec<SectionGraph>,
}

impl Genome {
    /// Build a random individual; every label is left floating
    pub fn build_random(grammar: &Arc<Grammar>, ctx: &mut GenomeContext) -> Result<Self, GenomeError> {
        if grammar.sections.is_empty() {
            return Err(GenomeError::SchemaBinding(format!(
                "grammar {} declares no sections",
                grammar.name
            )));
        }
        let id = ctx.ids.next_graph();
        let prologue = MacroNode::build_random(&grammar.prologue, ctx);
        let epilogue = MacroNode::build_random(&grammar.epilogue, ctx);
        let sections = grammar
            .sections
            .iter()
            .map(|section| SectionGraph::build_random(section, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id,
            grammar: Arc::clone(grammar),
            prologue,
            epilogue,
            sections,
        })
    }

    /// Build, resolve, and validate until a usable individual comes out
    pub fn generate(grammar: &Arc<Grammar>, ctx: &mut GenomeContext) -> Result<Self, GenomeError> {
        let attempts = ctx.config.build_attempts.max(1);
        for attempt in 1..=attempts {
            let mut genome = Self::build_random(grammar, ctx)?;
            if genome.attach_floating_edges(ctx) && genome.validate() {
                info!(
                    "Generated genome {} ({} macros) after {} attempt(s)",
                    genome.id,
                    genome.macro_count(),
                    attempt
                );
                return Ok(genome);
            }
            debug!("Discarding candidate genome {} (attempt {})", genome.id, attempt);
        }
        warn!("No valid genome for grammar {} after {} attempts", grammar.name, attempts);
        Err(GenomeError::Exhausted(attempts))
    }

    pub(crate) fn from_parts(
        id: GraphId,
        grammar: Arc<Grammar>,
        prologue: MacroNode,
        epilogue: MacroNode,
        sections: Vec<SectionGraph>,
    ) -> Self {
        Self {
            id,
            grammar,
            prologue,
            epilogue,
            sections,
        }
    }

    pub fn id(&self) -> &GraphId {
        &self.id
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn prologue(&self) -> &MacroNode {
        &self.prologue
    }

    pub fn epilogue(&self) -> &MacroNode {
        &self.epilogue
    }

    pub fn sections(&self) -> &[SectionGraph] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> &SectionGraph {
        &self.sections[index]
    }

    pub fn section_mut(&mut self, index: usize) -> &mut SectionGraph {
        &mut self.sections[index]
    }

    pub(crate) fn sections_mut(&mut self) -> &mut [SectionGraph] {
        &mut self.sections
    }

    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.def().name == name)
    }

    pub fn subgraph(&self, section: usize, index: usize) -> &SubsectionGraph {
        self.sections[section].subgraph(index)
    }

    /// Total number of body macros
    pub fn macro_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.subgraphs())
            .map(SubsectionGraph::macro_count)
            .sum()
    }

    pub fn has_floating_edges(&self) -> bool {
        self.sections.iter().any(SectionGraph::has_floating_edges)
    }

    /// Every node, frames included, in rendering order
    pub fn nodes(&self) -> impl Iterator<Item = &MacroNode> {
        std::iter::once(&self.prologue)
            .chain(self.sections.iter().flat_map(|s| {
                std::iter::once(s.prologue())
                    .chain(s.subgraphs().iter().flat_map(|g| g.slice().nodes()))
                    .chain(std::iter::once(s.epilogue()))
            }))
            .chain(std::iter::once(&self.epilogue))
    }

    pub fn find_node(&self, id: &NodeId) -> Option<NodeAddress> {
        for (s, section) in self.sections.iter().enumerate() {
            for (g, subgraph) in section.subgraphs().iter().enumerate() {
                if let Some(position) = subgraph.slice().position(id) {
                    return Some(NodeAddress {
                        section: s,
                        subgraph: g,
                        position,
                    });
                }
            }
        }
        None
    }

    pub fn node(&self, address: NodeAddress) -> &MacroNode {
        self.sections[address.section]
            .subgraph(address.subgraph)
            .slice()
            .node(address.position)
    }

    /// Prologue id of every subsection graph with its location
    pub fn locator(&self) -> TargetLocator {
        let mut locator = TargetLocator::empty();
        for section in &self.sections {
            for (g, subgraph) in section.subgraphs().iter().enumerate() {
                locator.insert(
                    subgraph.prologue().id().clone(),
                    TargetLocation {
                        section: section.def().name.clone(),
                        subsection: subgraph.def().name.clone(),
                        position: section.instance_position(g),
                    },
                );
            }
        }
        locator
    }

    /// Attached outer labels per target prologue
    pub fn incoming_outer_counts(&self) -> HashMap<NodeId, usize> {
        let mut counts = HashMap::new();
        for section in &self.sections {
            for subgraph in section.subgraphs() {
                for node in subgraph.slice().nodes() {
                    for edge in node.edges() {
                        if edge.kind() == LabelKind::Outer {
                            if let Some(target) = edge.target() {
                                *counts.entry(target.clone()).or_insert(0) += 1;
                            }
                        }
                    }
                }
            }
        }
        counts
    }

    /// Prologue, epilogue, and frame checks for every level
    pub fn check_structure(&self) -> bool {
        if self.prologue.def().role != MacroRole::Prologue
            || self.epilogue.def().role != MacroRole::Epilogue
            || self.prologue.def().path != self.grammar.prologue.path
            || self.epilogue.def().path != self.grammar.epilogue.path
        {
            debug!("Genome {}: bad global frame", self.id);
            return false;
        }
        self.sections.iter().all(|section| {
            if !section.check_frame() {
                debug!("Genome {}: bad frame in section {}", self.id, section.def().name);
                return false;
            }
            section.subgraphs().iter().all(SubsectionGraph::check_structure)
        })
    }

    /// Deep copy with fresh ids; every edge is left floating with hints
    /// that reproduce the current topology
    pub fn clone_genome(&self, ids: &mut IdGenerator) -> Genome {
        let locator = self.locator();
        let id = ids.next_graph();
        let prologue = self.prologue.clone_node(ids);
        let epilogue = self.epilogue.clone_node(ids);
        let sections = self
            .sections
            .iter()
            .map(|s| s.clone_graph(ids, &locator))
            .collect();
        debug!("Cloned genome {} into {}", self.id, id);
        Genome {
            id,
            grammar: Arc::clone(&self.grammar),
            prologue,
            epilogue,
            sections,
        }
    }

    /// Float one label of the node `id`
    pub fn detach_label(&mut self, id: &NodeId, parameter: &str) -> bool {
        let Some(address) = self.find_node(id) else {
            return false;
        };
        let locator = self.locator();
        self.sections[address.section]
            .subgraph_mut(address.subgraph)
            .slice_mut()
            .detach_edge(address.position, parameter, &locator)
    }

    /// Float every attached outer edge pointing at `prologue`
    fn float_incoming_outer(&mut self, prologue: &NodeId, locator: &TargetLocator) {
        for section in &mut self.sections {
            for subgraph in section.subgraphs_mut() {
                for node in subgraph.slice_mut().nodes_mut() {
                    for edge in node.edges_mut() {
                        if edge.kind() == LabelKind::Outer && edge.target() == Some(prologue) {
                            edge.float(locator.outer_hint(prologue));
                        }
                    }
                }
            }
        }
    }

    /// Remove a subsection graph, floating its outer labels and every
    /// outer label that pointed at it
    pub fn detach_subgraph(&mut self, section: usize, index: usize) -> Option<SubsectionGraph> {
        let target = self.sections[section].subgraph(index);
        let name = target.def().name.clone();
        if self.sections[section].instance_count(&name) <= target.def().min_instances {
            return None;
        }
        let prologue = target.prologue().id().clone();
        let locator = self.locator();
        self.float_incoming_outer(&prologue, &locator);
        self.sections[section].detach_subgraph(index, &locator)
    }

    pub fn insert_subgraph(&mut self, section: usize, subgraph: SubsectionGraph) -> Result<(), SubsectionGraph> {
        self.sections[section].insert_subgraph(subgraph)
    }

    pub fn insert_random_subgraph(
        &mut self,
        section: usize,
        subsection: &str,
        ctx: &mut GenomeContext,
    ) -> Result<bool, GenomeError> {
        self.sections[section].insert_random_subgraph(subsection, ctx)
    }

    /// Swap in a new instance; labels that pointed at the old one float
    pub fn replace_subgraph(
        &mut self,
        section: usize,
        index: usize,
        subgraph: SubsectionGraph,
    ) -> Result<SubsectionGraph, SubsectionGraph> {
        if subgraph.def().name != self.sections[section].subgraph(index).def().name {
            return Err(subgraph);
        }
        let prologue = self.sections[section].subgraph(index).prologue().id().clone();
        let locator = self.locator();
        self.float_incoming_outer(&prologue, &locator);
        let mut old = self.sections[section].replace_subgraph(index, subgraph)?;
        let slice = old.slice_mut();
        for position in 0..slice.len() {
            slice.detach_outer_labels(position, &locator);
        }
        Ok(old)
    }

    /// Cut body nodes `first..=last` of one subsection graph
    pub fn cut_slice(
        &mut self,
        section: usize,
        subgraph: usize,
        first: usize,
        last: usize,
        ids: &mut IdGenerator,
    ) -> Option<Slice> {
        let locator = self.locator();
        self.sections[section]
            .subgraph_mut(subgraph)
            .cut(first, last, ids, &locator)
    }

    pub fn splice_slice(
        &mut self,
        section: usize,
        subgraph: usize,
        slice: Slice,
        position: SplicePosition,
    ) -> Result<(), Slice> {
        self.sections[section].subgraph_mut(subgraph).splice(slice, position)
    }

    /// Re-draw one random parameter of a body node; changed labels float
    pub fn mutate_parameter(
        &mut self,
        section: usize,
        subgraph: usize,
        position: usize,
        ctx: &mut GenomeContext,
    ) -> bool {
        let slice = self.sections[section].subgraph_mut(subgraph).slice_mut();
        if position == 0 || position + 1 >= slice.len() {
            return false;
        }
        slice.node_mut(position).randomize_random_parameter(ctx)
    }

    /// A view usable for rendering and serialization, if nothing floats
    pub fn as_resolved(&self) -> Option<ResolvedGenome<'_>> {
        if self.has_floating_edges() {
            None
        } else {
            Some(ResolvedGenome { genome: self })
        }
    }

    /// Like `as_resolved`, as an error for callers that propagate with `?`
    pub fn resolved(&self) -> Result<ResolvedGenome<'_>, GenomeError> {
        self.as_resolved()
            .ok_or_else(|| GenomeError::Floating(self.id.to_string()))
    }
}

/// Proof that a genome has no floating edges
#[derive(Debug, Clone, Copy)]
pub struct ResolvedGenome<'a> {
    genome: &'a Genome,
}

impl<'a> ResolvedGenome<'a> {
    pub fn genome(&self) -> &'a Genome {
        self.genome
    }
}

impl Deref for ResolvedGenome<'_> {
    type Target = Genome;

    fn deref(&self) -> &Genome {
        self.genome
    }
}
