//! Slice — an ordered, owning sequence of nodes
//!
//! The slice owns neighbour relations: a node's previous and next nodes are
//! simply its index neighbours, and every node's `place` equals its index.
//! Editing operations float the labels they could invalidate and leave the
//! slice relinked; resolving those labels is the caller's job.

use super::edge::{LabelKind, RestoreHint, TargetLocator};
use super::node::MacroNode;
use crate::ids::{EntityId, IdGenerator, NodeId};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Where `Slice::splice` inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplicePosition {
    Start,
    End,
    At(usize),
}

#[derive(Debug, Clone)]
pub struct Slice {
    id: EntityId,
    nodes: Vec<MacroNode>,
    index: HashMap<NodeId, usize>,
}

impl Slice {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Take ownership of `nodes` in order
    ///
    /// Panics on duplicate node ids.
    pub fn from_nodes(id: EntityId, nodes: Vec<MacroNode>) -> Self {
        let mut slice = Self {
            id,
            nodes,
            index: HashMap::new(),
        };
        slice.relink();
        slice
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[MacroNode] {
        &self.nodes
    }

    pub fn node(&self, position: usize) -> &MacroNode {
        &self.nodes[position]
    }

    pub(crate) fn node_mut(&mut self, position: usize) -> &mut MacroNode {
        &mut self.nodes[position]
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [MacroNode] {
        &mut self.nodes
    }

    pub fn first(&self) -> Option<&MacroNode> {
        self.nodes.first()
    }

    pub fn last(&self) -> Option<&MacroNode> {
        self.nodes.last()
    }

    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Position of the first node matching `predicate`
    pub fn position_where(&self, predicate: impl Fn(&MacroNode) -> bool) -> Option<usize> {
        self.nodes.iter().position(predicate)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn prev(&self, position: usize) -> Option<&MacroNode> {
        position.checked_sub(1).and_then(|p| self.nodes.get(p))
    }

    pub fn next(&self, position: usize) -> Option<&MacroNode> {
        self.nodes.get(position + 1)
    }

    /// Signed distance from `from` to the node `to`, if `to` is here
    pub fn offset(&self, from: usize, to: &NodeId) -> Option<isize> {
        self.position(to).map(|p| p as isize - from as isize)
    }

    pub fn has_floating_edges(&self) -> bool {
        self.nodes.iter().any(MacroNode::has_floating_edges)
    }

    pub(crate) fn push(&mut self, node: MacroNode) {
        let position = self.nodes.len();
        assert!(
            self.index.insert(node.id().clone(), position).is_none(),
            "duplicate node id {} in slice {}",
            node.id(),
            self.id
        );
        self.nodes.push(node);
        self.nodes[position].set_place(position);
    }

    /// Recompute positions and the id index
    ///
    /// Panics on duplicate node ids.
    pub fn relink(&mut self) {
        self.index.clear();
        for (position, node) in self.nodes.iter_mut().enumerate() {
            node.set_place(position);
            assert!(
                self.index.insert(node.id().clone(), position).is_none(),
                "duplicate node id {} in slice {}",
                node.id(),
                self.id
            );
        }
    }

    /// Restore hint for an inner edge of the node at `position`
    fn inner_hint(&self, position: usize, target: &NodeId) -> RestoreHint {
        RestoreHint {
            prior_target: Some(target.clone()),
            offset: self.offset(position, target),
            location: None,
        }
    }

    /// Float every attached inner edge of the node at `position`
    pub fn detach_inner_labels(&mut self, position: usize) {
        let hints: Vec<Option<RestoreHint>> = self.nodes[position]
            .edges()
            .iter()
            .map(|edge| match (edge.kind(), edge.target()) {
                (LabelKind::Inner, Some(target)) => Some(self.inner_hint(position, target)),
                _ => None,
            })
            .collect();
        for (edge, hint) in self.nodes[position].edges_mut().iter_mut().zip(hints) {
            if let Some(hint) = hint {
                edge.float(hint);
            }
        }
    }

    /// Float every attached outer edge of the node at `position`
    pub fn detach_outer_labels(&mut self, position: usize, locator: &TargetLocator) {
        for edge in self.nodes[position].edges_mut() {
            if edge.kind() != LabelKind::Outer {
                continue;
            }
            if let Some(target) = edge.target().cloned() {
                edge.float(locator.outer_hint(&target));
            }
        }
    }

    /// Float one named edge of the node at `position`
    ///
    /// Returns `false` if the node has no such edge or it is already floating.
    pub fn detach_edge(&mut self, position: usize, parameter: &str, locator: &TargetLocator) -> bool {
        let Some(edge) = self.nodes[position].edge(parameter) else {
            return false;
        };
        let Some(target) = edge.target() else {
            return false;
        };
        let hint = match edge.kind() {
            LabelKind::Inner => self.inner_hint(position, target),
            LabelKind::Outer => locator.outer_hint(target),
        };
        match self.nodes[position].edge_mut(parameter) {
            Some(edge) => {
                edge.float(hint);
                true
            }
            None => false,
        }
    }

    /// Float inner edges anywhere in the slice that point into `targets`
    pub fn detach_incoming_inner(&mut self, targets: &HashSet<NodeId>) {
        for position in 0..self.nodes.len() {
            let hints: Vec<Option<RestoreHint>> = self.nodes[position]
                .edges()
                .iter()
                .map(|edge| match (edge.kind(), edge.target()) {
                    (LabelKind::Inner, Some(target)) if targets.contains(target) => {
                        Some(self.inner_hint(position, target))
                    }
                    _ => None,
                })
                .collect();
            for (edge, hint) in self.nodes[position].edges_mut().iter_mut().zip(hints) {
                if let Some(hint) = hint {
                    edge.float(hint);
                }
            }
        }
    }

    fn detach_range(&mut self, first: usize, last: usize, locator: &TargetLocator) {
        let moved: HashSet<NodeId> = self.nodes[first..=last].iter().map(|n| n.id().clone()).collect();
        self.detach_incoming_inner(&moved);
        for position in first..=last {
            self.detach_inner_labels(position);
            self.detach_outer_labels(position, locator);
        }
    }

    /// Remove nodes `first..=last` and return them as a new slice
    ///
    /// Labels of the removed nodes, and inner labels pointing at them, are
    /// floated first. Panics if the range is out of bounds.
    pub fn cut(
        &mut self,
        first: usize,
        last: usize,
        ids: &mut IdGenerator,
        locator: &TargetLocator,
    ) -> Slice {
        assert!(
            first <= last && last < self.nodes.len(),
            "cut [{first}, {last}] out of bounds for slice {} of {} nodes",
            self.id,
            self.nodes.len()
        );
        self.detach_range(first, last, locator);
        let removed: Vec<MacroNode> = self.nodes.drain(first..=last).collect();
        self.relink();
        let cut = Slice::from_nodes(ids.next_slice(), removed);
        debug!("Cut slice {} ({} nodes) out of {}", cut.id, cut.len(), self.id);
        cut
    }

    /// Insert every node of `other` at `position`, taking ownership
    ///
    /// Panics if the position is out of bounds or a node id collides.
    pub fn splice(&mut self, other: Slice, position: SplicePosition) {
        let at = match position {
            SplicePosition::Start => 0,
            SplicePosition::End => self.nodes.len(),
            SplicePosition::At(i) => i,
        };
        assert!(
            at <= self.nodes.len(),
            "splice position {at} out of bounds for slice {}",
            self.id
        );
        debug!("Splicing slice {} ({} nodes) into {} at {}", other.id, other.len(), self.id, at);
        let tail: Vec<MacroNode> = self.nodes.split_off(at);
        self.nodes.extend(other.nodes);
        self.nodes.extend(tail);
        self.relink();
    }

    /// Insert a single node before `position`
    pub fn insert_node(&mut self, position: usize, node: MacroNode) {
        assert!(position <= self.nodes.len(), "insert position {position} out of bounds");
        self.nodes.insert(position, node);
        self.relink();
    }

    /// Remove the node at `position`, floating the inner labels that
    /// pointed at it and its own labels
    pub fn remove_node(&mut self, position: usize, locator: &TargetLocator) -> MacroNode {
        assert!(position < self.nodes.len(), "remove position {position} out of bounds");
        self.detach_range(position, position, locator);
        let node = self.nodes.remove(position);
        self.relink();
        node
    }

    /// Exchange two nodes; their labels and inner labels pointing at them
    /// are floated
    pub fn swap_nodes(&mut self, i: usize, j: usize) {
        assert!(i < self.nodes.len() && j < self.nodes.len(), "swap out of bounds");
        if i == j {
            return;
        }
        let moved: HashSet<NodeId> = [self.nodes[i].id().clone(), self.nodes[j].id().clone()].into();
        self.detach_incoming_inner(&moved);
        self.detach_inner_labels(i);
        self.detach_inner_labels(j);
        self.nodes.swap(i, j);
        self.relink();
    }

    /// Reverse the order of nodes `first..=last`
    pub fn invert(&mut self, first: usize, last: usize) {
        assert!(first <= last && last < self.nodes.len(), "invert out of bounds");
        let moved: HashSet<NodeId> = self.nodes[first..=last].iter().map(|n| n.id().clone()).collect();
        self.detach_incoming_inner(&moved);
        for position in first..=last {
            self.detach_inner_labels(position);
        }
        self.nodes[first..=last].reverse();
        self.relink();
    }

    /// Deep copy with fresh ids and every edge floating
    ///
    /// Inner edges keep their offset; outer edges keep the target's
    /// location as recorded by `locator`.
    pub fn clone_slice(&self, ids: &mut IdGenerator, locator: &TargetLocator) -> Slice {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (position, node) in self.nodes.iter().enumerate() {
            let hints = node
                .edges()
                .iter()
                .map(|edge| match (edge.kind(), edge.target(), edge.hint()) {
                    (LabelKind::Inner, Some(target), _) => self.inner_hint(position, target),
                    (LabelKind::Outer, Some(target), _) => locator.outer_hint(target),
                    (_, None, Some(hint)) => hint.clone(),
                    (_, None, None) => RestoreHint::default(),
                })
                .collect();
            nodes.push(node.clone_with_hints(ids, hints));
        }
        Slice::from_nodes(ids.next_slice(), nodes)
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.nodes.iter().map(|n| n.id().as_str()).collect();
        write!(f, "{}", ids.join("-"))
    }
}
