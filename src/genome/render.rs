//! Rendering — turns a resolved genome into program text
//!
//! Every node writes its macro expression in slice order. Nodes that are the
//! target of a label get a label line first; labels are written through the
//! grammar's `identifier_format`, with the node id mapped by a `Relabeller`.
//! Outer labels pointing into an `expand` subsection inline that subsection
//! instead of naming it.

use super::container::{Genome, ResolvedGenome};
use super::edge::{Edge, LabelKind};
use super::node::MacroNode;
use crate::grammar::{ExpressionElement, ParameterKind};
use crate::ids::NodeId;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Maps node ids to the text used for them in the rendering
pub trait Relabeller {
    fn label(&mut self, id: &NodeId) -> String;
}

/// Sequential labels in order of first use, so equal structures render
/// identically whatever their ids
#[derive(Debug, Default)]
pub struct NormalizingRelabeller {
    labels: HashMap<NodeId, usize>,
}

impl NormalizingRelabeller {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Relabeller for NormalizingRelabeller {
    fn label(&mut self, id: &NodeId) -> String {
        let next = self.labels.len() + 1;
        self.labels.entry(id.clone()).or_insert(next).to_string()
    }
}

/// Node ids as they are
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityRelabeller;

impl Relabeller for IdentityRelabeller {
    fn label(&mut self, id: &NodeId) -> String {
        id.to_string()
    }
}

fn apply(format: &str, value: &str) -> String {
    format.replace("{}", value)
}

struct Renderer<'g, 'r> {
    genome: &'g Genome,
    relabeller: &'r mut dyn Relabeller,
    /// (inner, outer) labels pointing at each node
    incoming: HashMap<&'g NodeId, (usize, usize)>,
    /// Subsection graph prologue -> (section, subgraph)
    owners: HashMap<&'g NodeId, (usize, usize)>,
    inlining: Vec<(usize, usize)>,
    out: String,
}

impl<'g, 'r> Renderer<'g, 'r> {
    fn new(genome: &'g Genome, relabeller: &'r mut dyn Relabeller) -> Self {
        let mut incoming: HashMap<&NodeId, (usize, usize)> = HashMap::new();
        let mut owners = HashMap::new();
        for (s, section) in genome.sections().iter().enumerate() {
            for (g, subgraph) in section.subgraphs().iter().enumerate() {
                owners.insert(subgraph.prologue().id(), (s, g));
                for node in subgraph.slice().nodes() {
                    for edge in node.edges() {
                        let Some(target) = edge.target() else { continue };
                        let entry = incoming.entry(target).or_insert((0, 0));
                        match edge.kind() {
                            LabelKind::Inner => entry.0 += 1,
                            LabelKind::Outer => entry.1 += 1,
                        }
                    }
                }
            }
        }
        Self {
            genome,
            relabeller,
            incoming,
            owners,
            inlining: Vec::new(),
            out: String::new(),
        }
    }

    fn identifier(&mut self, id: &NodeId) -> String {
        let label = self.relabeller.label(id);
        apply(&self.genome.grammar().identifier_format, &label)
    }

    fn render(mut self) -> String {
        let genome = self.genome;
        self.node(genome.prologue(), false);
        for (s, section) in genome.sections().iter().enumerate() {
            let widest = section.subgraphs().iter().map(|g| g.slice().len()).max().unwrap_or(0);
            if widest <= 2 && !section.def().compulsory_prologue_epilogue {
                debug!("Skipping empty section {}", section.def().name);
                continue;
            }
            self.node(section.prologue(), false);
            for g in 0..section.subgraphs().len() {
                self.subgraph(s, g);
            }
            self.node(section.epilogue(), false);
        }
        self.node(genome.epilogue(), false);
        self.out
    }

    fn subgraph(&mut self, section: usize, index: usize) {
        let genome = self.genome;
        let subgraph = genome.subgraph(section, index);
        let expand = subgraph.def().expand;
        self.inlining.push((section, index));
        for node in subgraph.slice().nodes() {
            self.node(node, expand);
        }
        self.inlining.pop();
    }

    fn node(&mut self, node: &'g MacroNode, expand: bool) {
        let (inner, outer) = self.incoming.get(node.id()).copied().unwrap_or((0, 0));
        // inlined subsections only need a label for their own jumps
        if inner + outer > 0 && (!expand || inner > 0) {
            let identifier = self.identifier(node.id());
            let label = apply(&self.genome.grammar().label_format, &identifier);
            self.out.push_str(&label);
        }
        for element in &node.def().expression {
            match element {
                ExpressionElement::Text(text) => self.out.push_str(text),
                ExpressionElement::Param { param } => self.parameter(node, param),
            }
        }
    }

    fn parameter(&mut self, node: &'g MacroNode, name: &str) {
        let Some(param) = node.def().parameter(name) else {
            return;
        };
        let tag = node.tag(name).map(|t| t.value.as_str()).unwrap_or("");
        match &param.kind {
            ParameterKind::Data(_) => self.out.push_str(tag),
            ParameterKind::UniqueTag => {
                let grammar = self.genome.grammar();
                let identifier = apply(&grammar.identifier_format, tag);
                self.out.push_str(&apply(&grammar.unique_tag_format, &identifier));
            }
            ParameterKind::SelfRef => {
                let text = self.identifier(node.id());
                self.out.push_str(&text);
            }
            ParameterKind::InnerLabel(_) => {
                if let Some(target) = node.edge(name).and_then(Edge::target) {
                    let text = self.identifier(target);
                    self.out.push_str(&text);
                }
            }
            ParameterKind::OuterLabel { .. } => {
                let Some(target) = node.edge(name).and_then(Edge::target) else {
                    return;
                };
                match self.owners.get(target).copied() {
                    Some((s, g)) if self.genome.subgraph(s, g).def().expand => {
                        if self.inlining.contains(&(s, g)) {
                            warn!(
                                "Recursive expansion of subgraph {}, writing a label",
                                self.genome.subgraph(s, g).id()
                            );
                            let text = self.identifier(target);
                            self.out.push_str(&text);
                        } else {
                            self.subgraph(s, g);
                        }
                    }
                    _ => {
                        let text = self.identifier(target);
                        self.out.push_str(&text);
                    }
                }
            }
        }
    }
}

impl ResolvedGenome<'_> {
    pub fn render(&self, relabeller: &mut dyn Relabeller) -> String {
        Renderer::new(self.genome(), relabeller).render()
    }

    /// Rendering with sequential labels
    pub fn render_normalized(&self) -> String {
        self.render(&mut NormalizingRelabeller::new())
    }

    /// SHA-256 of the normalized rendering, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render_normalized().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenomeContext;
    use crate::grammar::{fixtures, Grammar};
    use std::collections::HashSet;

    #[test]
    fn test_normalizing_relabeller() {
        let mut relabeller = NormalizingRelabeller::new();
        assert_eq!(relabeller.label(&NodeId::from("X")), "1");
        assert_eq!(relabeller.label(&NodeId::from("Y")), "2");
        assert_eq!(relabeller.label(&NodeId::from("X")), "1");
        assert_eq!(IdentityRelabeller.label(&NodeId::from("X")), "X");
    }

    #[test]
    fn test_floating_genome_has_no_view() {
        let grammar = fixtures::scenario_a();
        let mut ctx = GenomeContext::seeded(51);
        let mut genome = Genome::build_random(&grammar, &mut ctx).unwrap();
        assert!(genome.as_resolved().is_none());
        assert!(matches!(genome.resolved(), Err(crate::error::GenomeError::Floating(_))));
        assert!(genome.attach_floating_edges(&mut ctx));
        assert!(genome.as_resolved().is_some());
    }

    #[test]
    fn test_labels_precede_targets() {
        let grammar = fixtures::scenario_a();
        let mut ctx = GenomeContext::seeded(52);
        for _ in 0..20 {
            let genome = Genome::generate(&grammar, &mut ctx).unwrap();
            let text = genome.as_resolved().unwrap().render_normalized();

            let defined: Vec<&str> = text.lines().filter_map(|l| l.strip_suffix(':')).collect();
            let targets: HashSet<&NodeId> = genome
                .subgraph(0, 0)
                .slice()
                .nodes()
                .iter()
                .flat_map(|n| n.edges())
                .filter_map(Edge::target)
                .collect();
            assert_eq!(defined.len(), targets.len());

            // every label used is defined somewhere
            for line in text.lines().filter(|l| l.starts_with("br ")) {
                for used in line["br ".len()..].split(", ") {
                    assert!(defined.contains(&used), "{used} undefined in\n{text}");
                }
            }
            assert_eq!(text.lines().filter(|l| l.starts_with("br ")).count(), genome.macro_count());
        }
    }

    #[test]
    fn test_normalized_rendering_ignores_ids() {
        let grammar = fixtures::scenario_a();
        let mut ctx = GenomeContext::seeded(53);
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        let mut copy = genome.clone_genome(&mut ctx.ids);
        assert!(copy.attach_floating_edges(&mut ctx));

        let a = genome.as_resolved().unwrap();
        let b = copy.as_resolved().unwrap();
        assert_eq!(a.render_normalized(), b.render_normalized());
        assert_ne!(a.render(&mut IdentityRelabeller), b.render(&mut IdentityRelabeller));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_identity_labels_use_identifier_format() {
        let grammar = fixtures::scenario_a();
        let mut ctx = GenomeContext::seeded(54);
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        let text = genome.as_resolved().unwrap().render(&mut IdentityRelabeller);
        let node = genome.subgraph(0, 0).slice().node(1);
        let target = node.edge("then").unwrap().target().unwrap();
        assert!(text.contains(&format!("br n{},", target)));
        assert!(text.contains(&format!("n{}:\n", target)));
    }

    #[test]
    fn test_expand_inlines_target() {
        let grammar = fixtures::expanded();
        let mut ctx = GenomeContext::seeded(55);
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        let text = genome.as_resolved().unwrap().render_normalized();
        assert_eq!(text, "call inc\ninc");
    }

    #[test]
    fn test_empty_section_skipped_unless_compulsory() {
        let json = |compulsory: bool| {
            format!(
                r#"{{
                    "name": "frames",
                    "sections": [
                        {{"name": "a", "prologue": {{"expression": ["A\n"]}},
                          "subsections": [{{"name": "s", "max_macros": 0}}]}},
                        {{"name": "b", "prologue": {{"expression": ["B\n"]}},
                          "compulsory_prologue_epilogue": {compulsory},
                          "subsections": [{{"name": "s", "max_macros": 0}}]}}
                    ]
                }}"#
            )
        };
        let mut ctx = GenomeContext::seeded(56);

        let grammar = Grammar::from_json(&json(false)).unwrap();
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        assert_eq!(genome.as_resolved().unwrap().render_normalized(), "");

        let grammar = Grammar::from_json(&json(true)).unwrap();
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        assert_eq!(genome.as_resolved().unwrap().render_normalized(), "B\n");
    }

    #[test]
    fn test_program_renders_every_macro() {
        let grammar = fixtures::program();
        let mut ctx = GenomeContext::seeded(57);
        let genome = Genome::generate(&grammar, &mut ctx).unwrap();
        let text = genome.as_resolved().unwrap().render_normalized();
        assert!(text.starts_with("; begin\nmain:\n"));
        assert!(text.contains("halt\n"));
        assert!(text.ends_with("ret\n; end\n"));
        assert_eq!(text.matches("ret\n").count(), genome.section(1).subgraphs().len());
        assert!(!text.contains("{}"));
    }
}
