//! Label resolver — turns floating edges into attached ones
//!
//! Inner labels are resolved first, one subsection graph at a time; outer
//! labels afterwards, across the whole genome. Each floating edge tries its
//! restore hint before falling back to a uniform random choice among the
//! legal targets. When `EngineConfig::random_fallback` is off, an edge whose
//! hint fails is left floating and the pass reports failure.

use super::container::Genome;
use super::edge::{LabelKind, RestoreHint};
use super::slice::Slice;
use super::subgraph::SubsectionGraph;
use crate::context::GenomeContext;
use crate::grammar::{InnerLabelFlags, LabelTarget, ParameterKind, SubSection};
use crate::ids::NodeId;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Follow a recorded offset from `source`, redirecting at the frame
///
/// A walk that runs into a disallowed epilogue (prologue) steps back
/// (forward) one node; a walk that would end on the source itself moves
/// to the adjacent node against the walking direction, if that is legal.
fn walk_offset(source: usize, offset: isize, flags: &InnerLabelFlags, len: usize) -> Option<usize> {
    let last = len - 1;
    let mut target = (source as isize + offset).clamp(0, last as isize) as usize;
    if offset > 0 {
        if target == last && !flags.epilogue {
            target -= 1;
        }
        if target == source && !flags.itself {
            if source >= 1 && flags.admits(source, source - 1, len) {
                target = source - 1;
            } else {
                return None;
            }
        }
    } else if offset < 0 {
        if target == 0 && !flags.prologue {
            target += 1;
        }
        if target == source && !flags.itself {
            if source + 1 < len && flags.admits(source, source + 1, len) {
                target = source + 1;
            } else {
                return None;
            }
        }
    }
    Some(target)
}

impl Slice {
    /// Pick a target position for an inner label of the node at `source`
    pub(crate) fn inner_target<R: Rng + ?Sized>(
        &self,
        source: usize,
        flags: &InnerLabelFlags,
        hint: &RestoreHint,
        random_fallback: bool,
        rng: &mut R,
    ) -> Option<usize> {
        let len = self.len();
        if let Some(prior) = hint.prior_target.as_ref().and_then(|id| self.position(id)) {
            if flags.admits(source, prior, len) {
                return Some(prior);
            }
        }
        if let Some(offset) = hint.offset {
            if let Some(target) = walk_offset(source, offset, flags, len) {
                if flags.admits(source, target, len) {
                    return Some(target);
                }
            }
        }
        if !hint.is_empty() && !random_fallback {
            return None;
        }
        let candidates: Vec<usize> = (0..len).filter(|&t| flags.admits(source, t, len)).collect();
        candidates.choose(rng).copied()
    }

    /// Float attached inner edges whose target is not in this slice
    fn float_dangling_inner(&mut self) {
        let present: HashSet<NodeId> = self.nodes().iter().map(|n| n.id().clone()).collect();
        for node in self.nodes_mut() {
            for edge in node.edges_mut() {
                if edge.kind() != LabelKind::Inner {
                    continue;
                }
                if let Some(target) = edge.target().cloned() {
                    if !present.contains(&target) {
                        edge.float(RestoreHint {
                            prior_target: Some(target),
                            ..RestoreHint::default()
                        });
                    }
                }
            }
        }
    }

    /// Attach every floating inner edge; `false` on the first edge with
    /// no legal target
    pub(crate) fn attach_inner_edges(&mut self, ctx: &mut GenomeContext) -> bool {
        self.float_dangling_inner();
        for source in 0..self.len() {
            for e in 0..self.node(source).edges().len() {
                let node = self.node(source);
                let edge = &node.edges()[e];
                let Some(hint) = edge.hint() else {
                    continue;
                };
                if edge.kind() != LabelKind::Inner {
                    continue;
                }
                let flags = match node.def().parameter(edge.parameter()).map(|param| &param.kind) {
                    Some(ParameterKind::InnerLabel(flags)) => *flags,
                    _ => {
                        debug!("Node {}: '{}' is not an inner label", node.id(), edge.parameter());
                        return false;
                    }
                };
                let fallback = ctx.config.random_fallback;
                let Some(target) = self.inner_target(source, &flags, hint, fallback, &mut ctx.rng) else {
                    debug!(
                        "Node {}: no target for inner label '{}' in slice {}",
                        node.id(),
                        edge.parameter(),
                        self.id()
                    );
                    return false;
                };
                let target_id = self.node(target).id().clone();
                self.node_mut(source).edges_mut()[e].attach(target_id);
            }
        }
        true
    }
}

impl SubsectionGraph {
    /// Resolve the inner labels of this graph alone
    pub fn attach_inner_edges(&mut self, ctx: &mut GenomeContext) -> bool {
        if !self.check_structure() {
            return false;
        }
        self.slice_mut().attach_inner_edges(ctx)
    }
}

/// A subsection graph that outer labels may point at
struct OuterCandidate {
    section: usize,
    subgraph: usize,
    prologue: NodeId,
    section_name: String,
    position: usize,
    def: Arc<SubSection>,
}

impl OuterCandidate {
    fn admits(
        &self,
        source: (usize, usize),
        targets: &[LabelTarget],
        counts: &HashMap<NodeId, usize>,
    ) -> bool {
        (self.section, self.subgraph) != source
            && targets
                .iter()
                .any(|t| t.section == self.section_name && t.subsection == self.def.name)
            && self
                .def
                .accepts_reference(counts.get(&self.prologue).copied().unwrap_or(0))
    }
}

fn outer_target<R: Rng + ?Sized>(
    candidates: &[OuterCandidate],
    source: (usize, usize),
    targets: &[LabelTarget],
    hint: &RestoreHint,
    counts: &HashMap<NodeId, usize>,
    random_fallback: bool,
    rng: &mut R,
) -> Option<NodeId> {
    if let Some(prior) = &hint.prior_target {
        if let Some(c) = candidates.iter().find(|c| &c.prologue == prior) {
            if c.admits(source, targets, counts) {
                return Some(c.prologue.clone());
            }
        }
    }
    if let Some(location) = &hint.location {
        let found = candidates.iter().find(|c| {
            c.section_name == location.section
                && c.def.name == location.subsection
                && c.position == location.position
        });
        if let Some(c) = found {
            if c.admits(source, targets, counts) {
                return Some(c.prologue.clone());
            }
        }
    }
    if !hint.is_empty() && !random_fallback {
        return None;
    }
    let eligible: Vec<&OuterCandidate> = candidates
        .iter()
        .filter(|c| c.admits(source, targets, counts))
        .collect();
    eligible.choose(rng).map(|c| c.prologue.clone())
}

impl Genome {
    fn outer_candidates(&self) -> Vec<OuterCandidate> {
        let mut candidates = Vec::new();
        for (s, section) in self.sections().iter().enumerate() {
            for (g, subgraph) in section.subgraphs().iter().enumerate() {
                candidates.push(OuterCandidate {
                    section: s,
                    subgraph: g,
                    prologue: subgraph.prologue().id().clone(),
                    section_name: section.def().name.clone(),
                    position: section.instance_position(g),
                    def: Arc::clone(subgraph.def()),
                });
            }
        }
        candidates
    }

    /// Float attached outer edges whose target is no subsection prologue
    fn float_dangling_outer(&mut self, prologues: &HashSet<NodeId>) {
        for section in self.sections_mut() {
            for subgraph in section.subgraphs_mut() {
                for node in subgraph.slice_mut().nodes_mut() {
                    for edge in node.edges_mut() {
                        if edge.kind() != LabelKind::Outer {
                            continue;
                        }
                        if let Some(target) = edge.target().cloned() {
                            if !prologues.contains(&target) {
                                edge.float(RestoreHint {
                                    prior_target: Some(target),
                                    ..RestoreHint::default()
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    /// Resolve every floating edge of the individual
    ///
    /// Returns `false` when the frame is broken or some edge has no legal
    /// target; the individual should then be discarded. Edges resolved
    /// before the failure stay attached.
    pub fn attach_floating_edges(&mut self, ctx: &mut GenomeContext) -> bool {
        if !self.check_structure() {
            debug!("Genome {}: broken structure, cannot resolve", self.id());
            return false;
        }

        for section in self.sections_mut() {
            for subgraph in section.subgraphs_mut() {
                if !subgraph.slice_mut().attach_inner_edges(ctx) {
                    return false;
                }
            }
        }

        let candidates = self.outer_candidates();
        let prologues: HashSet<NodeId> = candidates.iter().map(|c| c.prologue.clone()).collect();
        self.float_dangling_outer(&prologues);
        let mut counts = self.incoming_outer_counts();
        let fallback = ctx.config.random_fallback;

        for s in 0..self.sections().len() {
            for (g, p, e) in self.section(s).outer_edge_slots() {
                let node = self.subgraph(s, g).slice().node(p);
                let edge = &node.edges()[e];
                let Some(hint) = edge.hint() else {
                    continue;
                };
                let targets = match node.def().parameter(edge.parameter()).map(|param| &param.kind) {
                    Some(ParameterKind::OuterLabel { targets }) => targets.as_slice(),
                    _ => {
                        debug!("Node {}: '{}' is not an outer label", node.id(), edge.parameter());
                        return false;
                    }
                };
                let Some(target) =
                    outer_target(&candidates, (s, g), targets, hint, &counts, fallback, &mut ctx.rng)
                else {
                    debug!(
                        "Node {}: no target for outer label '{}' in genome {}",
                        node.id(),
                        edge.parameter(),
                        self.id()
                    );
                    return false;
                };
                *counts.entry(target.clone()).or_insert(0) += 1;
                self.section_mut(s).subgraph_mut(g).slice_mut().node_mut(p).edges_mut()[e].attach(target);
            }
        }
        debug!("Genome {}: all labels attached", self.id());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineConfig;
    use crate::genome::edge::EdgeState;
    use crate::genome::slice::SplicePosition;
    use crate::grammar::fixtures;

    fn flags(prologue: bool, epilogue: bool, itself: bool, backward: bool, forward: bool) -> InnerLabelFlags {
        InnerLabelFlags {
            prologue,
            epilogue,
            itself,
            backward,
            forward,
        }
    }

    #[test]
    fn test_walk_offset() {
        // P 1 2 3 E
        let forward = flags(false, true, false, false, true);
        assert_eq!(walk_offset(1, 2, &forward, 5), Some(3));
        assert_eq!(walk_offset(1, 9, &forward, 5), Some(4));

        let no_epilogue = flags(false, false, false, true, true);
        assert_eq!(walk_offset(1, 9, &no_epilogue, 5), Some(3));
        // clamped back onto the source: step back to 2
        assert_eq!(walk_offset(3, 1, &no_epilogue, 5), Some(2));

        let forward_only = flags(false, false, false, false, true);
        assert_eq!(walk_offset(3, 1, &forward_only, 5), None);

        let backward = flags(true, false, false, true, false);
        assert_eq!(walk_offset(3, -9, &backward, 5), Some(0));
        let no_prologue = flags(false, false, false, true, true);
        assert_eq!(walk_offset(3, -9, &no_prologue, 5), Some(1));
        assert_eq!(walk_offset(1, -1, &no_prologue, 5), Some(2));
    }

    #[test]
    fn test_scenario_a_always_resolves() {
        let grammar = fixtures::scenario_a();
        let def = grammar.subsection("main", "body").unwrap();
        let mut ctx = GenomeContext::seeded(17);
        for _ in 0..200 {
            let mut graph = SubsectionGraph::build_random(def, &mut ctx).unwrap();
            assert!((3..=5).contains(&graph.slice().len()));
            assert!(graph.attach_inner_edges(&mut ctx));
            assert!(!graph.has_floating_edges());
            assert!(graph.validate());
        }
    }

    #[test]
    fn test_scenario_a_genome() {
        let grammar = fixtures::scenario_a();
        let mut ctx = GenomeContext::seeded(18);
        for _ in 0..50 {
            let mut genome = Genome::build_random(&grammar, &mut ctx).unwrap();
            assert!(genome.attach_floating_edges(&mut ctx));
            assert!(genome.validate());
            let len = genome.subgraph(0, 0).slice().len();
            assert!((3..=5).contains(&len));
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let grammar = fixtures::program();
        let mut ctx = GenomeContext::seeded(19);
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        let mut copy = genome.clone_genome(&mut ctx.ids);
        assert!(copy.attach_floating_edges(&mut ctx));
        let snapshot: Vec<EdgeState> = copy.nodes().flat_map(|n| n.edges()).map(|e| e.state().clone()).collect();
        for _ in 0..3 {
            assert!(copy.attach_floating_edges(&mut ctx));
            let again: Vec<EdgeState> = copy.nodes().flat_map(|n| n.edges()).map(|e| e.state().clone()).collect();
            assert_eq!(snapshot, again);
        }
    }

    #[test]
    fn test_clone_reproduces_topology() {
        let grammar = fixtures::program();
        let mut ctx = GenomeContext::seeded(20);
        for _ in 0..20 {
            let genome = Genome::generate(&grammar, &mut ctx).unwrap();
            let mut copy = genome.clone_genome(&mut ctx.ids);
            assert!(copy.has_floating_edges() || genome.nodes().all(|n| n.edges().is_empty()));
            assert!(copy.attach_floating_edges(&mut ctx));
            assert!(copy.validate());
            assert!(genome.equals(&copy));
        }
    }

    #[test]
    fn test_detach_reattach_continuity() {
        let grammar = fixtures::editing(4, 4);
        let mut ctx = GenomeContext::seeded(21);
        for _ in 0..20 {
            let mut genome = Genome::generate(&grammar, &mut ctx).unwrap();
            for position in 1..=4 {
                let node = genome.subgraph(0, 0).slice().node(position);
                let id = node.id().clone();
                let before = node.edge("to").unwrap().target().cloned();
                assert!(genome.detach_label(&id, "to"));
                assert!(!genome.detach_label(&id, "to"));
                assert!(genome.attach_floating_edges(&mut ctx));
                let after = genome.subgraph(0, 0).slice().node(position).edge("to").unwrap().target().cloned();
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn test_offset_survives_transplant() {
        let grammar = fixtures::editing(2, 8);
        let mut ctx = GenomeContext::seeded(22);
        let mut donor = Genome::generate(&grammar, &mut ctx).unwrap();
        let mut host = Genome::generate(&grammar, &mut ctx).unwrap();
        let donor_len = donor.subgraph(0, 0).slice().len();
        let host_macros = host.subgraph(0, 0).macro_count();
        assert_eq!(host_macros, 5);

        // the last body node of the donor jumps somewhere; after transplant
        // onto the host its offset is walked again
        let cut = donor
            .cut_slice(0, 0, donor_len - 2, donor_len - 2, &mut ctx.ids)
            .unwrap();
        host.splice_slice(0, 0, cut, SplicePosition::End).unwrap();
        assert_eq!(host.subgraph(0, 0).macro_count(), host_macros + 1);
        assert!(host.attach_floating_edges(&mut ctx));
        assert!(host.validate());
        assert!(donor.attach_floating_edges(&mut ctx));
        assert!(donor.validate());
    }

    #[test]
    fn test_cut_and_splice_between_clones() {
        // three body macros per individual, room for five
        let grammar = fixtures::editing(1, 5);
        let mut ctx = GenomeContext::seeded(28);
        for _ in 0..50 {
            let original = Genome::generate(&grammar, &mut ctx).unwrap();
            let mut donor = original.clone_genome(&mut ctx.ids);
            assert!(donor.attach_floating_edges(&mut ctx));
            let mut host = Genome::generate(&grammar, &mut ctx).unwrap().clone_genome(&mut ctx.ids);
            assert!(host.attach_floating_edges(&mut ctx));
            assert_eq!(donor.subgraph(0, 0).slice().len(), 5);
            let total = donor.macro_count() + host.macro_count();

            let cut = donor.cut_slice(0, 0, 1, 2, &mut ctx.ids).unwrap();
            assert_eq!(cut.len(), 2);
            let moved: Vec<NodeId> = cut.nodes().iter().map(|n| n.id().clone()).collect();
            host.splice_slice(0, 0, cut, SplicePosition::At(1)).unwrap();
            assert_eq!(host.subgraph(0, 0).slice().node(1).id(), &moved[0]);
            assert_eq!(host.subgraph(0, 0).slice().node(2).id(), &moved[1]);

            assert!(donor.attach_floating_edges(&mut ctx));
            assert!(host.attach_floating_edges(&mut ctx));
            assert!(donor.validate());
            assert!(host.validate());
            assert_eq!(donor.subgraph(0, 0).macro_count(), 1);
            assert_eq!(host.subgraph(0, 0).macro_count(), 5);
            assert_eq!(donor.macro_count() + host.macro_count(), total);
        }
    }

    #[test]
    fn test_strict_mode_refuses_random_fallback() {
        // forward-only labels without the epilogue: the last body node has
        // no legal target at all
        let grammar = crate::grammar::Grammar::from_json(
            r#"{
                "name": "dead-end",
                "sections": [{"name": "s", "subsections": [{
                    "name": "b", "min_macros": 2, "max_macros": 2,
                    "macros": [{"id": "j", "parameters": [{"name": "to", "kind": "inner_label"}]}]
                }]}]
            }"#,
        )
        .unwrap();
        let mut ctx = GenomeContext::seeded(23);
        let mut genome = Genome::build_random(&grammar, &mut ctx).unwrap();
        assert!(!genome.attach_floating_edges(&mut ctx));

        // with hints that point backwards, strict mode fails where the
        // default mode re-randomizes
        let program = fixtures::editing(3, 3);
        let mut strict = GenomeContext::seeded(24).with_config(EngineConfig::strict());
        let mut genome = Genome::generate(&program, &mut strict).unwrap();
        let slice = genome.section_mut(0).subgraph_mut(0).slice_mut();
        let hint = RestoreHint {
            prior_target: Some(NodeId::from("missing")),
            offset: None,
            location: None,
        };
        slice.node_mut(1).edge_mut("to").unwrap().float(hint);
        let mut relaxed = genome.clone();
        assert!(!genome.attach_floating_edges(&mut strict));

        let mut ctx = GenomeContext::seeded(25);
        assert!(relaxed.attach_floating_edges(&mut ctx));
    }

    #[test]
    fn test_reference_cap() {
        let mut ctx = GenomeContext::seeded(26);
        let grammar = fixtures::capped(2);
        for _ in 0..30 {
            let genome = Genome::generate(&grammar, &mut ctx).unwrap();
            let counts = genome.incoming_outer_counts();
            assert_eq!(counts.len(), 2);
            assert!(counts.values().all(|&n| n == 1));
        }

        // three callers, two functions with one slot each
        let grammar = fixtures::capped(3);
        let mut genome = Genome::build_random(&grammar, &mut ctx).unwrap();
        assert!(!genome.attach_floating_edges(&mut ctx));
        assert!(!genome.validate());
    }

    #[test]
    fn test_outer_location_hint() {
        let grammar = fixtures::program();
        let mut ctx = GenomeContext::seeded(27);
        let mut genome = Genome::generate(&grammar, &mut ctx).unwrap();
        let funcs = genome.section_index("funcs").unwrap();
        let wanted = genome.subgraph(funcs, 1).prologue().id().clone();
        let caller = genome.section(0).subgraph(0).slice().position_where(|n| n.def().id == "call");
        let Some(position) = caller else {
            return;
        };
        let slice = genome.section_mut(0).subgraph_mut(0).slice_mut();
        slice.node_mut(position).edge_mut("fn").unwrap().float(RestoreHint {
            prior_target: None,
            offset: None,
            location: Some(crate::genome::edge::TargetLocation {
                section: "funcs".into(),
                subsection: "func".into(),
                position: 1,
            }),
        });
        assert!(genome.attach_floating_edges(&mut ctx));
        let node = genome.section(0).subgraph(0).slice().node(position);
        assert_eq!(node.edge("fn").unwrap().target(), Some(&wanted));
    }
}
