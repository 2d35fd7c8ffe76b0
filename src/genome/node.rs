//! MacroNode — one instantiation of a grammar macro
//!
//! Tags hold data, unique-tag and self-reference values in parameter order;
//! edges hold one structural link per label parameter. Neighbour links and
//! the `place` index are owned by the enclosing slice.

use super::edge::{Edge, LabelKind, RestoreHint};
use super::tag::Tag;
use crate::context::GenomeContext;
use crate::grammar::{Macro, ParameterKind};
use crate::ids::{IdGenerator, NodeId};
use log::debug;
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MacroNode {
    id: NodeId,
    def: Arc<Macro>,
    tags: Vec<Tag>,
    edges: Vec<Edge>,
    place: usize,
}

impl MacroNode {
    /// Instantiate `def` with random data and floating edges
    pub fn build_random(def: &Arc<Macro>, ctx: &mut GenomeContext) -> Self {
        let id = ctx.ids.next_node();
        let mut tags = Vec::new();
        let mut edges = Vec::new();
        for param in &def.parameters {
            match &param.kind {
                ParameterKind::Data(ty) => tags.push(Tag::new(&param.name, ty.randomize(&mut ctx.rng))),
                ParameterKind::UniqueTag => tags.push(Tag::new(&param.name, ctx.ids.next_unique_tag())),
                ParameterKind::SelfRef => tags.push(Tag::new(&param.name, id.to_string())),
                ParameterKind::InnerLabel(_) => edges.push(Edge::floating(&param.name, LabelKind::Inner)),
                ParameterKind::OuterLabel { .. } => {
                    edges.push(Edge::floating(&param.name, LabelKind::Outer))
                }
            }
        }
        Self {
            id,
            def: Arc::clone(def),
            tags,
            edges,
            place: 0,
        }
    }

    pub(crate) fn from_parts(id: NodeId, def: Arc<Macro>, tags: Vec<Tag>, edges: Vec<Edge>) -> Self {
        Self {
            id,
            def,
            tags,
            edges,
            place: 0,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn def(&self) -> &Arc<Macro> {
        &self.def
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Index inside the owning slice
    pub fn place(&self) -> usize {
        self.place
    }

    pub(crate) fn set_place(&mut self, place: usize) {
        self.place = place;
    }

    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn edge(&self, name: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.parameter() == name)
    }

    pub(crate) fn edge_mut(&mut self, name: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.parameter() == name)
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    pub fn has_floating_edges(&self) -> bool {
        self.edges.iter().any(Edge::is_floating)
    }

    /// Deep copy under a fresh id
    ///
    /// Attached edges become floating with the old target as prior target.
    pub fn clone_node(&self, ids: &mut IdGenerator) -> MacroNode {
        let hints = self
            .edges
            .iter()
            .map(|edge| match edge.hint() {
                Some(hint) => hint.clone(),
                None => RestoreHint {
                    prior_target: edge.target().cloned(),
                    ..RestoreHint::default()
                },
            })
            .collect();
        self.clone_with_hints(ids, hints)
    }

    /// Deep copy under a fresh id, one restore hint per edge
    pub(crate) fn clone_with_hints(&self, ids: &mut IdGenerator, hints: Vec<RestoreHint>) -> MacroNode {
        let id = ids.next_node();
        let tags = self
            .def
            .tag_parameters()
            .zip(&self.tags)
            .map(|(param, tag)| match param.kind {
                ParameterKind::UniqueTag => Tag::new(&tag.name, ids.next_unique_tag()),
                ParameterKind::SelfRef => Tag::new(&tag.name, id.to_string()),
                _ => tag.clone(),
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .zip(hints)
            .map(|(edge, hint)| {
                let mut copy = Edge::floating(edge.parameter(), edge.kind());
                copy.float(hint);
                copy
            })
            .collect();
        MacroNode {
            id,
            def: Arc::clone(&self.def),
            tags,
            edges,
            place: self.place,
        }
    }

    /// Re-draw the parameter at `index`
    ///
    /// Data parameters get a new value; labels become floating with no
    /// history, so the next resolver pass picks a new target. Returns
    /// `false` for parameters that cannot change.
    pub fn randomize_parameter(&mut self, index: usize, ctx: &mut GenomeContext) -> bool {
        let def = Arc::clone(&self.def);
        let Some(param) = def.parameters.get(index) else {
            return false;
        };
        match &param.kind {
            ParameterKind::Data(ty) => {
                let value = ty.randomize(&mut ctx.rng);
                match self.tags.iter_mut().find(|t| t.name == param.name) {
                    Some(tag) => {
                        tag.value = value;
                        true
                    }
                    None => false,
                }
            }
            ParameterKind::InnerLabel(_) | ParameterKind::OuterLabel { .. } => {
                match self.edge_mut(&param.name) {
                    Some(edge) => {
                        edge.float(RestoreHint::default());
                        true
                    }
                    None => false,
                }
            }
            ParameterKind::UniqueTag | ParameterKind::SelfRef => false,
        }
    }

    /// Re-draw one randomly chosen mutable parameter
    pub fn randomize_random_parameter(&mut self, ctx: &mut GenomeContext) -> bool {
        let mutable: Vec<usize> = self
            .def
            .parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| !matches!(p.kind, ParameterKind::UniqueTag | ParameterKind::SelfRef))
            .map(|(i, _)| i)
            .collect();
        if mutable.is_empty() {
            return false;
        }
        let index = mutable[ctx.rng.gen_range(0..mutable.len())];
        self.randomize_parameter(index, ctx)
    }

    /// Checks that need no knowledge of neighbours
    pub fn validate(&self) -> bool {
        let params: Vec<_> = self.def.tag_parameters().collect();
        if params.len() != self.tags.len() {
            debug!("Node {}: expected {} tags, found {}", self.id, params.len(), self.tags.len());
            return false;
        }
        for (param, tag) in params.iter().zip(&self.tags) {
            if param.name != tag.name {
                debug!("Node {}: tag '{}' where '{}' expected", self.id, tag.name, param.name);
                return false;
            }
            let ok = match &param.kind {
                ParameterKind::Data(ty) => ty.validate(&tag.value),
                ParameterKind::UniqueTag => !tag.value.is_empty(),
                ParameterKind::SelfRef => tag.value == self.id.as_str(),
                ParameterKind::InnerLabel(_) | ParameterKind::OuterLabel { .. } => false,
            };
            if !ok {
                debug!("Node {}: value '{}' invalid for '{}'", self.id, tag.value, tag.name);
                return false;
            }
        }

        let labels: Vec<_> = self.def.label_parameters().collect();
        if labels.len() != self.edges.len() {
            debug!("Node {}: expected {} edges, found {}", self.id, labels.len(), self.edges.len());
            return false;
        }
        for (param, edge) in labels.iter().zip(&self.edges) {
            let kind = match param.kind {
                ParameterKind::InnerLabel(_) => LabelKind::Inner,
                _ => LabelKind::Outer,
            };
            if param.name != edge.parameter() || kind != edge.kind() {
                debug!("Node {}: edge '{}' does not match its macro", self.id, edge.parameter());
                return false;
            }
            if edge.is_floating() {
                debug!("Node {}: edge '{}' is floating", self.id, edge.parameter());
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::fixtures;

    fn program_macro(id: &str) -> Arc<Macro> {
        let grammar = fixtures::program();
        Arc::clone(grammar.subsection("main", "code").unwrap().macro_by_id(id).unwrap())
    }

    #[test]
    fn test_build_random() {
        let mut ctx = GenomeContext::seeded(1);
        let node = MacroNode::build_random(&program_macro("add"), &mut ctx);
        assert_eq!(node.tags().len(), 2);
        assert!(node.edges().is_empty());
        assert!(node.validate());

        let jmp = MacroNode::build_random(&program_macro("jmp"), &mut ctx);
        assert_eq!(jmp.edges().len(), 1);
        assert!(jmp.has_floating_edges());
        assert!(!jmp.validate());
        assert_ne!(node.id(), jmp.id());
    }

    #[test]
    fn test_identity_parameters() {
        let mut ctx = GenomeContext::seeded(2);
        let mark = MacroNode::build_random(&program_macro("mark"), &mut ctx);
        assert_eq!(mark.tag("me").unwrap().value, mark.id().as_str());
        assert!(mark.validate());

        let copy = mark.clone_node(&mut ctx.ids);
        assert_ne!(copy.id(), mark.id());
        assert_eq!(copy.tag("me").unwrap().value, copy.id().as_str());
        assert_ne!(copy.tag("u").unwrap().value, mark.tag("u").unwrap().value);
        assert!(copy.validate());
    }

    #[test]
    fn test_clone_keeps_data_and_floats_edges() {
        let mut ctx = GenomeContext::seeded(3);
        let add = MacroNode::build_random(&program_macro("add"), &mut ctx);
        let copy = add.clone_node(&mut ctx.ids);
        assert_eq!(copy.tags(), add.tags());

        let mut jmp = MacroNode::build_random(&program_macro("jmp"), &mut ctx);
        let target = NodeId::from("T");
        jmp.edge_mut("to").unwrap().attach(target.clone());
        assert!(jmp.edge("to").unwrap().target().is_some());

        let copy = jmp.clone_node(&mut ctx.ids);
        let hint = copy.edge("to").unwrap().hint().unwrap();
        assert_eq!(hint.prior_target.as_ref(), Some(&target));
    }

    #[test]
    fn test_randomize_parameter() {
        let mut ctx = GenomeContext::seeded(4);
        let mut jmp = MacroNode::build_random(&program_macro("jmp"), &mut ctx);
        jmp.edge_mut("to").unwrap().attach(NodeId::from("X"));
        assert!(jmp.randomize_parameter(0, &mut ctx));
        assert!(jmp.edge("to").unwrap().hint().unwrap().is_empty());

        let mut mark = MacroNode::build_random(&program_macro("mark"), &mut ctx);
        assert!(!mark.randomize_parameter(0, &mut ctx));
        assert!(!mark.randomize_random_parameter(&mut ctx));
        assert!(!mark.randomize_parameter(9, &mut ctx));

        let mut add = MacroNode::build_random(&program_macro("add"), &mut ctx);
        for _ in 0..10 {
            assert!(add.randomize_random_parameter(&mut ctx));
            assert!(add.validate());
        }
    }
}
