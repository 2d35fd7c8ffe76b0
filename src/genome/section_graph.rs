//! SectionGraph — one grammar section: a prologue, an epilogue, and the
//! subsection graph instances in between

use super::edge::{LabelKind, TargetLocator};
use super::node::MacroNode;
use super::subgraph::SubsectionGraph;
use crate::context::GenomeContext;
use crate::error::GenomeError;
use crate::grammar::{MacroRole, Section};
use crate::ids::{GraphId, IdGenerator};
use log::debug;
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SectionGraph {
    id: GraphId,
    def: Arc<Section>,
    prologue: MacroNode,
    epilogue: MacroNode,
    subgraphs: Vec<SubsectionGraph>,
}

impl SectionGraph {
    /// Build the frame, then a uniform number of instances of every
    /// declared subsection
    pub fn build_random(def: &Arc<Section>, ctx: &mut GenomeContext) -> Result<Self, GenomeError> {
        let id = ctx.ids.next_graph();
        let prologue = MacroNode::build_random(&def.prologue, ctx);
        let epilogue = MacroNode::build_random(&def.epilogue, ctx);
        let mut subgraphs = Vec::new();
        for sub in &def.subsections {
            let count = ctx.rng.gen_range(sub.min_instances..=sub.max_instances);
            for _ in 0..count {
                subgraphs.push(SubsectionGraph::build_random(sub, ctx)?);
            }
        }
        debug!("Built section graph {} ({}) with {} subgraphs", id, def.name, subgraphs.len());
        Ok(Self {
            id,
            def: Arc::clone(def),
            prologue,
            epilogue,
            subgraphs,
        })
    }

    pub(crate) fn from_parts(
        id: GraphId,
        def: Arc<Section>,
        prologue: MacroNode,
        epilogue: MacroNode,
        subgraphs: Vec<SubsectionGraph>,
    ) -> Self {
        Self {
            id,
            def,
            prologue,
            epilogue,
            subgraphs,
        }
    }

    pub fn id(&self) -> &GraphId {
        &self.id
    }

    pub fn def(&self) -> &Arc<Section> {
        &self.def
    }

    pub fn prologue(&self) -> &MacroNode {
        &self.prologue
    }

    pub fn epilogue(&self) -> &MacroNode {
        &self.epilogue
    }

    pub fn subgraphs(&self) -> &[SubsectionGraph] {
        &self.subgraphs
    }

    pub fn subgraph(&self, index: usize) -> &SubsectionGraph {
        &self.subgraphs[index]
    }

    pub(crate) fn subgraphs_mut(&mut self) -> &mut [SubsectionGraph] {
        &mut self.subgraphs
    }

    pub fn subgraph_mut(&mut self, index: usize) -> &mut SubsectionGraph {
        &mut self.subgraphs[index]
    }

    /// Number of instances of the named subsection
    pub fn instance_count(&self, subsection: &str) -> usize {
        self.subgraphs.iter().filter(|g| g.def().name == subsection).count()
    }

    /// Index among instances of the same subsection
    pub fn instance_position(&self, index: usize) -> usize {
        let name = &self.subgraphs[index].def().name;
        self.subgraphs[..index].iter().filter(|g| &g.def().name == name).count()
    }

    /// Index of the `position`-th instance of `subsection`
    pub fn find_instance(&self, subsection: &str, position: usize) -> Option<usize> {
        self.subgraphs
            .iter()
            .enumerate()
            .filter(|(_, g)| g.def().name == subsection)
            .nth(position)
            .map(|(i, _)| i)
    }

    pub fn has_floating_edges(&self) -> bool {
        self.subgraphs.iter().any(SubsectionGraph::has_floating_edges)
    }

    pub(crate) fn check_frame(&self) -> bool {
        self.prologue.def().role == MacroRole::Prologue
            && self.prologue.def().path == self.def.prologue.path
            && self.epilogue.def().role == MacroRole::Epilogue
            && self.epilogue.def().path == self.def.epilogue.path
    }

    /// Add an instance after the last instance of the same subsection
    ///
    /// Handed back when the subsection is not declared here or already has
    /// its maximum number of instances.
    pub fn insert_subgraph(&mut self, subgraph: SubsectionGraph) -> Result<(), SubsectionGraph> {
        let name = subgraph.def().name.clone();
        let Some(sub) = self.def.subsection(&name) else {
            debug!("Section {} has no subsection {}", self.def.name, name);
            return Err(subgraph);
        };
        if self.instance_count(&name) >= sub.max_instances {
            debug!(
                "Refusing insert into section {}: {} already at {} instances",
                self.def.name, name, sub.max_instances
            );
            return Err(subgraph);
        }
        let at = self
            .subgraphs
            .iter()
            .rposition(|g| g.def().name == name)
            .map(|i| i + 1)
            .unwrap_or(self.subgraphs.len());
        self.subgraphs.insert(at, subgraph);
        Ok(())
    }

    /// Build and insert a fresh instance of the named subsection
    ///
    /// `Ok(false)` when the subsection is already at its maximum.
    pub fn insert_random_subgraph(
        &mut self,
        subsection: &str,
        ctx: &mut GenomeContext,
    ) -> Result<bool, GenomeError> {
        let sub = Arc::clone(self.def.subsection(subsection).ok_or_else(|| {
            GenomeError::SchemaBinding(format!(
                "section {} has no subsection {}",
                self.def.name, subsection
            ))
        })?);
        if self.instance_count(subsection) >= sub.max_instances {
            return Ok(false);
        }
        let built = SubsectionGraph::build_random(&sub, ctx)?;
        Ok(self.insert_subgraph(built).is_ok())
    }

    /// Remove the instance at `index`, floating its outer labels
    ///
    /// `None` when its subsection is already at its minimum.
    pub fn detach_subgraph(&mut self, index: usize, locator: &TargetLocator) -> Option<SubsectionGraph> {
        assert!(index < self.subgraphs.len(), "subgraph index {index} out of bounds");
        let name = self.subgraphs[index].def().name.clone();
        let min = self.subgraphs[index].def().min_instances;
        if self.instance_count(&name) <= min {
            debug!(
                "Refusing detach from section {}: {} already at {} instances",
                self.def.name, name, min
            );
            return None;
        }
        let mut removed = self.subgraphs.remove(index);
        let slice = removed.slice_mut();
        for position in 0..slice.len() {
            slice.detach_outer_labels(position, locator);
        }
        Some(removed)
    }

    /// Swap in `subgraph` for the instance at `index`, without bound checks
    ///
    /// Handed back if it instantiates a different subsection.
    pub fn replace_subgraph(
        &mut self,
        index: usize,
        subgraph: SubsectionGraph,
    ) -> Result<SubsectionGraph, SubsectionGraph> {
        assert!(index < self.subgraphs.len(), "subgraph index {index} out of bounds");
        if subgraph.def().name != self.subgraphs[index].def().name {
            return Err(subgraph);
        }
        Ok(std::mem::replace(&mut self.subgraphs[index], subgraph))
    }

    /// Deep copy with fresh ids; every edge is left floating
    pub fn clone_graph(&self, ids: &mut IdGenerator, locator: &TargetLocator) -> SectionGraph {
        let id = ids.next_graph();
        let prologue = self.prologue.clone_node(ids);
        let epilogue = self.epilogue.clone_node(ids);
        let subgraphs = self
            .subgraphs
            .iter()
            .map(|g| g.clone_graph(ids, locator))
            .collect();
        SectionGraph {
            id,
            def: Arc::clone(&self.def),
            prologue,
            epilogue,
            subgraphs,
        }
    }

    /// Outer edges of this section, as (subgraph index, node position,
    /// edge index)
    pub(crate) fn outer_edge_slots(&self) -> Vec<(usize, usize, usize)> {
        let mut slots = Vec::new();
        for (g, subgraph) in self.subgraphs.iter().enumerate() {
            for (p, node) in subgraph.slice().nodes().iter().enumerate() {
                for (e, edge) in node.edges().iter().enumerate() {
                    if edge.kind() == LabelKind::Outer {
                        slots.push((g, p, e));
                    }
                }
            }
        }
        slots
    }
}
