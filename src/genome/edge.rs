//! Edge — a structural link from a node to another node
//!
//! An edge is either attached to a target id or floating. A floating edge
//! carries a restore hint describing where it pointed before it was
//! detached or cloned, so the resolver can prefer the same structure.

use crate::ids::NodeId;
use std::collections::HashMap;

/// Which label parameter produced the edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Target inside the same subsection graph
    Inner,
    /// Target is the prologue of some subsection graph
    Outer,
}

/// Position of a subsection graph inside a genome
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetLocation {
    /// Owning section name
    pub section: String,
    /// Subsection name
    pub subsection: String,
    /// Index among the section's graphs of the same subsection
    pub position: usize,
}

/// Bookkeeping carried by a floating edge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreHint {
    pub prior_target: Option<NodeId>,
    /// Signed distance from source to target (inner labels)
    pub offset: Option<isize>,
    /// Where the old target's subsection graph sat (outer labels)
    pub location: Option<TargetLocation>,
}

impl RestoreHint {
    pub fn is_empty(&self) -> bool {
        self.prior_target.is_none() && self.offset.is_none() && self.location.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeState {
    Floating(RestoreHint),
    Attached(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    parameter: String,
    kind: LabelKind,
    state: EdgeState,
}

impl Edge {
    /// A fresh edge with no history
    pub fn floating(parameter: impl Into<String>, kind: LabelKind) -> Self {
        Self {
            parameter: parameter.into(),
            kind,
            state: EdgeState::Floating(RestoreHint::default()),
        }
    }

    pub(crate) fn attached(parameter: impl Into<String>, kind: LabelKind, target: NodeId) -> Self {
        Self {
            parameter: parameter.into(),
            kind,
            state: EdgeState::Attached(target),
        }
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn kind(&self) -> LabelKind {
        self.kind
    }

    pub fn state(&self) -> &EdgeState {
        &self.state
    }

    pub fn target(&self) -> Option<&NodeId> {
        match &self.state {
            EdgeState::Attached(id) => Some(id),
            EdgeState::Floating(_) => None,
        }
    }

    pub fn hint(&self) -> Option<&RestoreHint> {
        match &self.state {
            EdgeState::Floating(hint) => Some(hint),
            EdgeState::Attached(_) => None,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self.state, EdgeState::Floating(_))
    }

    pub(crate) fn attach(&mut self, target: NodeId) {
        self.state = EdgeState::Attached(target);
    }

    pub(crate) fn float(&mut self, hint: RestoreHint) {
        self.state = EdgeState::Floating(hint);
    }
}

/// Snapshot of where every subsection graph prologue sits in a genome
///
/// Built before an edit so outer labels can record a location hint while
/// the genome is being mutated.
#[derive(Debug, Clone, Default)]
pub struct TargetLocator {
    entries: HashMap<NodeId, TargetLocation>,
}

impl TargetLocator {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, prologue: NodeId, location: TargetLocation) {
        self.entries.insert(prologue, location);
    }

    pub fn locate(&self, prologue: &NodeId) -> Option<&TargetLocation> {
        self.entries.get(prologue)
    }

    /// Restore hint for an outer edge currently pointing at `target`
    pub fn outer_hint(&self, target: &NodeId) -> RestoreHint {
        RestoreHint {
            prior_target: Some(target.clone()),
            offset: None,
            location: self.locate(target).cloned(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
