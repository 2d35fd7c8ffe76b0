//! SubsectionGraph — one instance of a grammar subsection
//!
//! Owns a slice framed by a prologue (position 0) and an epilogue (last
//! position). Editing operations that would break the subsection's macro
//! count bounds are refused and hand their input back.

use super::edge::TargetLocator;
use super::node::MacroNode;
use super::slice::{Slice, SplicePosition};
use crate::context::GenomeContext;
use crate::error::GenomeError;
use crate::grammar::{MacroRole, SubSection};
use crate::ids::{GraphId, IdGenerator};
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SubsectionGraph {
    id: GraphId,
    def: Arc<SubSection>,
    slice: Slice,
}

impl SubsectionGraph {
    /// Build prologue, a normally distributed number of weighted random
    /// macros, and epilogue; every edge is left floating
    pub fn build_random(def: &Arc<SubSection>, ctx: &mut GenomeContext) -> Result<Self, GenomeError> {
        let id = ctx.ids.next_graph();
        let count = ctx.sample_bounded(def.average(), def.sigma, def.min_macros, def.max_macros);
        let mut slice = Slice::new(ctx.ids.next_slice());
        slice.push(MacroNode::build_random(&def.prologue, ctx));
        for _ in 0..count {
            let chosen = def.random_macro(&mut ctx.rng).ok_or_else(|| {
                GenomeError::SchemaBinding(format!(
                    "subsection {}/{} has no selectable macro",
                    def.section, def.name
                ))
            })?;
            let chosen = Arc::clone(chosen);
            slice.push(MacroNode::build_random(&chosen, ctx));
        }
        slice.push(MacroNode::build_random(&def.epilogue, ctx));
        debug!("Built subsection graph {} ({}/{}) with {} macros", id, def.section, def.name, count);
        Ok(Self {
            id,
            def: Arc::clone(def),
            slice,
        })
    }

    pub(crate) fn from_parts(id: GraphId, def: Arc<SubSection>, slice: Slice) -> Self {
        Self { id, def, slice }
    }

    pub fn id(&self) -> &GraphId {
        &self.id
    }

    pub fn def(&self) -> &Arc<SubSection> {
        &self.def
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    pub(crate) fn slice_mut(&mut self) -> &mut Slice {
        &mut self.slice
    }

    pub fn prologue(&self) -> &MacroNode {
        self.slice.node(0)
    }

    pub fn epilogue(&self) -> &MacroNode {
        self.slice.node(self.slice.len() - 1)
    }

    /// Number of body macros
    pub fn macro_count(&self) -> usize {
        self.slice.len().saturating_sub(2)
    }

    pub fn has_floating_edges(&self) -> bool {
        self.slice.has_floating_edges()
    }

    fn assert_body_range(&self, first: usize, last: usize) {
        assert!(
            first >= 1 && first <= last && last + 1 < self.slice.len(),
            "range [{first}, {last}] is not inside the body of subsection graph {}",
            self.id
        );
    }

    /// Map an editor position onto the slice, keeping the frame intact
    fn body_position(&self, position: SplicePosition) -> usize {
        let at = match position {
            SplicePosition::Start => 1,
            SplicePosition::End => self.slice.len() - 1,
            SplicePosition::At(i) => i,
        };
        assert!(
            at >= 1 && at < self.slice.len(),
            "position {at} is outside the body of subsection graph {}",
            self.id
        );
        at
    }

    /// Prologue first, epilogue last, body macros in between, all bound to
    /// this subsection's definitions
    pub fn check_structure(&self) -> bool {
        let len = self.slice.len();
        if len < 2 {
            debug!("Subsection graph {}: slice too short", self.id);
            return false;
        }
        for (position, node) in self.slice.nodes().iter().enumerate() {
            let def = node.def();
            let ok = if position == 0 {
                def.role == MacroRole::Prologue && def.path == self.def.prologue.path
            } else if position == len - 1 {
                def.role == MacroRole::Epilogue && def.path == self.def.epilogue.path
            } else {
                def.role == MacroRole::Body && self.def.macros.iter().any(|m| m.path == def.path)
            };
            if !ok {
                debug!(
                    "Subsection graph {}: node {} ({}) misplaced at {}",
                    self.id,
                    node.id(),
                    def.path,
                    position
                );
                return false;
            }
        }
        true
    }

    /// Cut body nodes `first..=last` into a new slice
    ///
    /// `None` when the remaining macro count would drop below the minimum.
    pub fn cut(
        &mut self,
        first: usize,
        last: usize,
        ids: &mut IdGenerator,
        locator: &TargetLocator,
    ) -> Option<Slice> {
        self.assert_body_range(first, last);
        let removed = last - first + 1;
        if self.macro_count() - removed < self.def.min_macros {
            debug!(
                "Refusing cut of {} nodes from {}: minimum is {}",
                removed, self.id, self.def.min_macros
            );
            return None;
        }
        Some(self.slice.cut(first, last, ids, locator))
    }

    /// Splice `other` into the body
    ///
    /// The slice is handed back when the maximum macro count would be
    /// exceeded or it holds nodes of another subsection.
    pub fn splice(&mut self, other: Slice, position: SplicePosition) -> Result<(), Slice> {
        let at = self.body_position(position);
        if self.macro_count() + other.len() > self.def.max_macros {
            debug!(
                "Refusing splice of {} nodes into {}: maximum is {}",
                other.len(),
                self.id,
                self.def.max_macros
            );
            return Err(other);
        }
        if !other.nodes().iter().all(|n| self.def.macros.iter().any(|m| m.path == n.def().path)) {
            debug!("Refusing splice into {}: foreign macros", self.id);
            return Err(other);
        }
        self.slice.splice(other, SplicePosition::At(at));
        Ok(())
    }

    /// Insert one node before `position`; refused at the maximum size
    pub fn insert_node(&mut self, position: usize, node: MacroNode) -> Result<(), MacroNode> {
        let at = self.body_position(SplicePosition::At(position));
        let foreign = !self.def.macros.iter().any(|m| m.path == node.def().path);
        if foreign || self.macro_count() >= self.def.max_macros {
            return Err(node);
        }
        self.slice.insert_node(at, node);
        Ok(())
    }

    /// Insert a weighted random macro before `position`
    pub fn insert_random_node(&mut self, position: usize, ctx: &mut GenomeContext) -> bool {
        let Some(chosen) = self.def.random_macro(&mut ctx.rng).cloned() else {
            return false;
        };
        let node = MacroNode::build_random(&chosen, ctx);
        self.insert_node(position, node).is_ok()
    }

    /// Remove the body node at `position`; refused at the minimum size
    pub fn remove_node(&mut self, position: usize, locator: &TargetLocator) -> Option<MacroNode> {
        self.assert_body_range(position, position);
        if self.macro_count() <= self.def.min_macros {
            return None;
        }
        Some(self.slice.remove_node(position, locator))
    }

    pub fn swap_nodes(&mut self, i: usize, j: usize) {
        self.assert_body_range(i.min(j), i.max(j));
        self.slice.swap_nodes(i, j);
    }

    pub fn invert(&mut self, first: usize, last: usize) {
        self.assert_body_range(first, last);
        self.slice.invert(first, last);
    }

    /// Deep copy with fresh ids; every edge is left floating
    pub fn clone_graph(&self, ids: &mut IdGenerator, locator: &TargetLocator) -> SubsectionGraph {
        SubsectionGraph {
            id: ids.next_graph(),
            def: Arc::clone(&self.def),
            slice: self.slice.clone_slice(ids, locator),
        }
    }
}
