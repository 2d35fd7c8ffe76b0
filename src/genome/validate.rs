//! Validation — read-only checks run bottom-up before an individual is
//! accepted
//!
//! Subsection and section graphs check what they can see locally. The genome
//! adds what needs the whole tree: outer label targets, reference caps, and
//! id uniqueness.

use super::container::Genome;
use super::edge::LabelKind;
use super::section_graph::SectionGraph;
use super::subgraph::SubsectionGraph;
use crate::grammar::ParameterKind;
use crate::ids::NodeId;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

impl SubsectionGraph {
    /// Frame, nodes, inner labels, and macro count bounds
    pub fn validate(&self) -> bool {
        if !self.check_structure() {
            return false;
        }
        let def = self.def();
        let count = self.macro_count();
        if count < def.min_macros || count > def.max_macros {
            debug!(
                "Subsection graph {}: {} macros outside [{}, {}]",
                self.id(),
                count,
                def.min_macros,
                def.max_macros
            );
            return false;
        }
        let slice = self.slice();
        let len = slice.len();
        for (position, node) in slice.nodes().iter().enumerate() {
            if node.place() != position || !node.validate() {
                debug!("Subsection graph {}: node {} invalid", self.id(), node.id());
                return false;
            }
            for edge in node.edges() {
                if edge.kind() != LabelKind::Inner {
                    continue;
                }
                let Some(ParameterKind::InnerLabel(flags)) =
                    node.def().parameter(edge.parameter()).map(|p| &p.kind)
                else {
                    return false;
                };
                let legal = edge
                    .target()
                    .and_then(|t| slice.position(t))
                    .map_or(false, |t| flags.admits(position, t, len));
                if !legal {
                    debug!(
                        "Subsection graph {}: inner label '{}' of {} has an illegal target",
                        self.id(),
                        edge.parameter(),
                        node.id()
                    );
                    return false;
                }
            }
        }
        true
    }
}

impl SectionGraph {
    /// Frame, every subgraph, and declared instance counts
    pub fn validate(&self) -> bool {
        if !self.check_frame() || !self.prologue().validate() || !self.epilogue().validate() {
            debug!("Section graph {}: invalid frame", self.id());
            return false;
        }
        for subgraph in self.subgraphs() {
            let declared = self
                .def()
                .subsection(&subgraph.def().name)
                .map_or(false, |sub| Arc::ptr_eq(sub, subgraph.def()) || **sub == **subgraph.def());
            if !declared || !subgraph.validate() {
                debug!("Section graph {}: subgraph {} invalid", self.id(), subgraph.id());
                return false;
            }
        }
        for sub in &self.def().subsections {
            let n = self.instance_count(&sub.name);
            if n < sub.min_instances || n > sub.max_instances {
                debug!(
                    "Section graph {}: {} instances of {} outside [{}, {}]",
                    self.id(),
                    n,
                    sub.name,
                    sub.min_instances,
                    sub.max_instances
                );
                return false;
            }
        }
        true
    }
}

impl Genome {
    /// Full validation of the individual
    pub fn validate(&self) -> bool {
        if !self.check_structure() || !self.prologue().validate() || !self.epilogue().validate() {
            return false;
        }
        let grammar = self.grammar();
        if self.sections().len() != grammar.sections.len()
            || self
                .sections()
                .iter()
                .zip(&grammar.sections)
                .any(|(graph, def)| graph.def().name != def.name)
        {
            debug!("Genome {}: sections do not match grammar {}", self.id(), grammar.name);
            return false;
        }
        if !self.sections().iter().all(SectionGraph::validate) {
            return false;
        }

        let mut seen = HashSet::new();
        for node in self.nodes() {
            if !seen.insert(node.id()) {
                warn!("Genome {}: duplicate node id {}", self.id(), node.id());
                return false;
            }
        }

        // prologue id -> (section, subgraph)
        let mut prologues: HashMap<&NodeId, (usize, usize)> = HashMap::new();
        for (s, section) in self.sections().iter().enumerate() {
            for (g, subgraph) in section.subgraphs().iter().enumerate() {
                prologues.insert(subgraph.prologue().id(), (s, g));
            }
        }
        for (s, section) in self.sections().iter().enumerate() {
            for (g, subgraph) in section.subgraphs().iter().enumerate() {
                for node in subgraph.slice().nodes() {
                    for edge in node.edges() {
                        if edge.kind() != LabelKind::Outer {
                            continue;
                        }
                        let Some(ParameterKind::OuterLabel { targets }) =
                            node.def().parameter(edge.parameter()).map(|p| &p.kind)
                        else {
                            return false;
                        };
                        let Some(&(ts, tg)) = edge.target().and_then(|t| prologues.get(t)) else {
                            debug!("Genome {}: outer label of {} is not on a prologue", self.id(), node.id());
                            return false;
                        };
                        let target = self.subgraph(ts, tg);
                        let section_name = &self.section(ts).def().name;
                        let allowed = (ts, tg) != (s, g)
                            && targets
                                .iter()
                                .any(|t| &t.section == section_name && t.subsection == target.def().name);
                        if !allowed {
                            debug!(
                                "Genome {}: outer label '{}' of {} targets {}/{}",
                                self.id(),
                                edge.parameter(),
                                node.id(),
                                section_name,
                                target.def().name
                            );
                            return false;
                        }
                    }
                }
            }
        }

        for (prologue, count) in self.incoming_outer_counts() {
            let Some(&(s, g)) = prologues.get(&prologue) else {
                return false;
            };
            let def = self.subgraph(s, g).def();
            if def.max_references.map_or(false, |cap| count > cap) {
                debug!(
                    "Genome {}: {} references to {} exceed the cap of {:?}",
                    self.id(),
                    count,
                    prologue,
                    def.max_references
                );
                return false;
            }
        }
        true
    }
}
