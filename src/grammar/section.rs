//! Grammar, Section, SubSection — the read-only constraint tree
//!
//! A grammar is deserialized from JSON and then linked: every macro gets a
//! grammar-wide path and a role, and the whole description is checked once
//! so that genome code can rely on it without re-validating.

use super::macro_def::{ExpressionElement, Macro, MacroRole};
use super::parameter::ParameterKind;
use crate::error::GrammarError;
use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub const PROLOGUE_KEY: &str = "$prologue";
pub const EPILOGUE_KEY: &str = "$epilogue";

fn one() -> usize {
    1
}

fn default_identifier_format() -> String {
    "n{}".to_string()
}

fn default_label_format() -> String {
    "{}:\n".to_string()
}

fn default_unique_tag_format() -> String {
    "{}".to_string()
}

/// One subsection: the template of every subsection graph instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSection {
    pub name: String,
    #[serde(default = "one")]
    pub min_instances: usize,
    #[serde(default = "one")]
    pub max_instances: usize,
    #[serde(default)]
    pub min_macros: usize,
    pub max_macros: usize,
    /// Mean macro count; the range midpoint when omitted
    #[serde(default)]
    pub average_macros: Option<f64>,
    #[serde(default)]
    pub sigma: f64,
    /// Cap on outer labels pointing at one instance; unbounded when omitted.
    /// Must be 1 when `expand` is set.
    #[serde(default)]
    pub max_references: Option<usize>,
    /// Rendered inline wherever an outer label references it
    #[serde(default)]
    pub expand: bool,
    #[serde(default)]
    pub prologue: Arc<Macro>,
    #[serde(default)]
    pub epilogue: Arc<Macro>,
    #[serde(default)]
    pub macros: Vec<Arc<Macro>>,
    /// Owning section, set when the grammar is linked
    #[serde(skip)]
    pub section: String,
}

impl SubSection {
    pub fn average(&self) -> f64 {
        self.average_macros
            .unwrap_or((self.min_macros + self.max_macros) as f64 / 2.0)
    }

    /// Whether another instance may receive one more outer label
    pub fn accepts_reference(&self, current: usize) -> bool {
        self.max_references.map_or(true, |cap| current < cap)
    }

    /// Roulette-wheel choice over the declared macro weights
    pub fn random_macro<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Arc<Macro>> {
        let dist = WeightedIndex::new(self.macros.iter().map(|m| m.weight)).ok()?;
        self.macros.get(dist.sample(rng))
    }

    pub fn macro_by_id(&self, id: &str) -> Option<&Arc<Macro>> {
        self.macros.iter().find(|m| m.id == id)
    }
}

/// One grammar section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub prologue: Arc<Macro>,
    #[serde(default)]
    pub epilogue: Arc<Macro>,
    pub subsections: Vec<Arc<SubSection>>,
    /// Render prologue and epilogue even when the section is empty
    #[serde(default)]
    pub compulsory_prologue_epilogue: bool,
}

impl Section {
    pub fn subsection(&self, name: &str) -> Option<&Arc<SubSection>> {
        self.subsections.iter().find(|s| s.name == name)
    }
}

/// The complete constraint description a genome is bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    pub name: String,
    #[serde(default)]
    pub prologue: Arc<Macro>,
    #[serde(default)]
    pub epilogue: Arc<Macro>,
    pub sections: Vec<Arc<Section>>,
    /// Rendered form of a label reference; `{}` is replaced by the node label
    #[serde(default = "default_identifier_format")]
    pub identifier_format: String,
    /// Rendered form of a label definition; `{}` is replaced by the identifier
    #[serde(default = "default_label_format")]
    pub label_format: String,
    /// Rendered form of a unique tag; `{}` is replaced by its identifier
    #[serde(default = "default_unique_tag_format")]
    pub unique_tag_format: String,
}

impl Grammar {
    pub fn from_json(json: &str) -> Result<Arc<Self>, GrammarError> {
        let raw: Grammar = serde_json::from_str(json)?;
        raw.link()
    }

    pub fn load(path: &Path) -> Result<Arc<Self>, GrammarError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn section(&self, name: &str) -> Option<&Arc<Section>> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn subsection(&self, section: &str, subsection: &str) -> Option<&Arc<SubSection>> {
        self.section(section)?.subsection(subsection)
    }

    /// Look up any macro (body or boundary) by its linked path
    pub fn macro_by_path(&self, path: &str) -> Option<&Arc<Macro>> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [PROLOGUE_KEY] => Some(&self.prologue),
            [EPILOGUE_KEY] => Some(&self.epilogue),
            [section, PROLOGUE_KEY] => self.section(section).map(|s| &s.prologue),
            [section, EPILOGUE_KEY] => self.section(section).map(|s| &s.epilogue),
            [section, subsection, PROLOGUE_KEY] => {
                self.subsection(section, subsection).map(|s| &s.prologue)
            }
            [section, subsection, EPILOGUE_KEY] => {
                self.subsection(section, subsection).map(|s| &s.epilogue)
            }
            [section, subsection, id] => self.subsection(section, subsection)?.macro_by_id(id),
            _ => None,
        }
    }

    /// Assign paths and roles, and check the whole description
    pub fn link(self) -> Result<Arc<Self>, GrammarError> {
        let declared: HashSet<(String, String)> = self
            .sections
            .iter()
            .flat_map(|s| s.subsections.iter().map(move |sub| (s.name.clone(), sub.name.clone())))
            .collect();

        let mut section_names = HashSet::new();
        let mut sections = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            check_identifier(&section.name)?;
            if !section_names.insert(section.name.clone()) {
                return Err(GrammarError::Duplicate {
                    kind: "section",
                    name: section.name.clone(),
                });
            }
            sections.push(Arc::new(link_section(section, &declared)?));
        }

        let linked = Grammar {
            prologue: link_boundary(&self.prologue, PROLOGUE_KEY.to_string(), MacroRole::Prologue)?,
            epilogue: link_boundary(&self.epilogue, EPILOGUE_KEY.to_string(), MacroRole::Epilogue)?,
            sections,
            ..self
        };
        debug!(
            "Linked grammar '{}' with {} sections",
            linked.name,
            linked.sections.len()
        );
        Ok(Arc::new(linked))
    }
}

fn check_identifier(name: &str) -> Result<(), GrammarError> {
    if name.is_empty() || name.contains('/') || name.starts_with('$') {
        return Err(GrammarError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

fn link_section(
    section: &Section,
    declared: &HashSet<(String, String)>,
) -> Result<Section, GrammarError> {
    let mut names = HashSet::new();
    let mut subsections = Vec::with_capacity(section.subsections.len());
    for sub in &section.subsections {
        check_identifier(&sub.name)?;
        if !names.insert(sub.name.clone()) {
            return Err(GrammarError::Duplicate {
                kind: "subsection",
                name: format!("{}/{}", section.name, sub.name),
            });
        }
        subsections.push(Arc::new(link_subsection(&section.name, sub, declared)?));
    }
    Ok(Section {
        name: section.name.clone(),
        prologue: link_boundary(
            &section.prologue,
            format!("{}/{}", section.name, PROLOGUE_KEY),
            MacroRole::Prologue,
        )?,
        epilogue: link_boundary(
            &section.epilogue,
            format!("{}/{}", section.name, EPILOGUE_KEY),
            MacroRole::Epilogue,
        )?,
        subsections,
        compulsory_prologue_epilogue: section.compulsory_prologue_epilogue,
    })
}

fn link_subsection(
    section: &str,
    sub: &SubSection,
    declared: &HashSet<(String, String)>,
) -> Result<SubSection, GrammarError> {
    let owner = format!("{}/{}", section, sub.name);
    let range_error = |detail: String| GrammarError::InvalidRange {
        owner: owner.clone(),
        detail,
    };
    if sub.min_instances > sub.max_instances {
        return Err(range_error(format!(
            "instances [{}, {}]",
            sub.min_instances, sub.max_instances
        )));
    }
    if sub.min_macros > sub.max_macros {
        return Err(range_error(format!(
            "macros [{}, {}]",
            sub.min_macros, sub.max_macros
        )));
    }
    if !sub.average().is_finite() || !sub.sigma.is_finite() || sub.sigma < 0.0 {
        return Err(range_error(format!(
            "average {} / sigma {}",
            sub.average(),
            sub.sigma
        )));
    }
    if sub.expand && sub.max_references != Some(1) {
        return Err(range_error(format!(
            "expand needs max_references of 1, found {:?}",
            sub.max_references
        )));
    }
    let total_weight: f64 = sub.macros.iter().map(|m| m.weight).sum();
    if sub.max_macros > 0 && !(total_weight > 0.0) {
        return Err(range_error("no macro with positive weight".to_string()));
    }

    let mut ids = HashSet::new();
    let mut macros = Vec::with_capacity(sub.macros.len());
    for def in &sub.macros {
        check_identifier(&def.id)?;
        if !ids.insert(def.id.clone()) {
            return Err(GrammarError::Duplicate {
                kind: "macro",
                name: format!("{}/{}", owner, def.id),
            });
        }
        if !(def.weight >= 0.0) {
            return Err(range_error(format!("weight of '{}'", def.id)));
        }
        let mut linked = (**def).clone();
        linked.path = format!("{}/{}", owner, def.id);
        linked.role = MacroRole::Body;
        check_parameters(&linked)?;
        for param in &linked.parameters {
            if let ParameterKind::OuterLabel { targets } = &param.kind {
                if targets.is_empty() {
                    return Err(GrammarError::MisplacedParameter {
                        owner: linked.path.clone(),
                        parameter: param.name.clone(),
                    });
                }
                for target in targets {
                    if !declared.contains(&(target.section.clone(), target.subsection.clone())) {
                        return Err(GrammarError::UnknownTarget {
                            owner: linked.path.clone(),
                            parameter: param.name.clone(),
                            section: target.section.clone(),
                            subsection: target.subsection.clone(),
                        });
                    }
                }
            }
        }
        macros.push(Arc::new(linked));
    }

    Ok(SubSection {
        prologue: link_boundary(
            &sub.prologue,
            format!("{}/{}", owner, PROLOGUE_KEY),
            MacroRole::Prologue,
        )?,
        epilogue: link_boundary(
            &sub.epilogue,
            format!("{}/{}", owner, EPILOGUE_KEY),
            MacroRole::Epilogue,
        )?,
        macros,
        section: section.to_string(),
        ..sub.clone()
    })
}

/// Prologues and epilogues never carry labels
fn link_boundary(def: &Arc<Macro>, path: String, role: MacroRole) -> Result<Arc<Macro>, GrammarError> {
    let mut linked = (**def).clone();
    if linked.id.is_empty() {
        linked.id = match role {
            MacroRole::Prologue => "prologue",
            MacroRole::Epilogue => "epilogue",
            MacroRole::Body => "body",
        }
        .to_string();
    }
    linked.path = path;
    linked.role = role;
    if let Some(label) = linked.label_parameters().next() {
        return Err(GrammarError::MisplacedParameter {
            owner: linked.path.clone(),
            parameter: label.name.clone(),
        });
    }
    check_parameters(&linked)?;
    Ok(Arc::new(linked))
}

fn check_parameters(def: &Macro) -> Result<(), GrammarError> {
    let mut names = HashSet::new();
    for param in &def.parameters {
        if param.name.is_empty() || !names.insert(param.name.as_str()) {
            return Err(GrammarError::Duplicate {
                kind: "parameter",
                name: format!("{}:{}", def.path, param.name),
            });
        }
        if let ParameterKind::Data(ty) = &param.kind {
            if let Some(detail) = ty.check() {
                return Err(GrammarError::InvalidRange {
                    owner: format!("{}:{}", def.path, param.name),
                    detail,
                });
            }
        }
    }
    for element in &def.expression {
        if let ExpressionElement::Param { param } = element {
            if def.parameter(param).is_none() {
                return Err(GrammarError::UnknownParameter {
                    owner: def.path.clone(),
                    parameter: param.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::fixtures;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_link_assigns_paths() {
        let grammar = fixtures::program();
        let code = grammar.subsection("main", "code").unwrap();
        assert_eq!(code.section, "main");
        assert_eq!(code.prologue.path, "main/code/$prologue");
        assert_eq!(code.prologue.role, MacroRole::Prologue);
        assert_eq!(code.macros[0].path, "main/code/add");
        assert_eq!(grammar.prologue.path, "$prologue");
        assert_eq!(grammar.section("funcs").unwrap().epilogue.path, "funcs/$epilogue");
    }

    #[test]
    fn test_macro_by_path() {
        let grammar = fixtures::program();
        assert_eq!(grammar.macro_by_path("main/code/jmp").unwrap().id, "jmp");
        assert_eq!(
            grammar.macro_by_path("funcs/func/$epilogue").unwrap().role,
            MacroRole::Epilogue
        );
        assert_eq!(grammar.macro_by_path("$prologue").unwrap().role, MacroRole::Prologue);
        assert!(grammar.macro_by_path("main/nope/jmp").is_none());
        assert!(grammar.macro_by_path("a/b/c/d").is_none());
    }

    #[test]
    fn test_average_defaults_to_midpoint() {
        let grammar = fixtures::program();
        let func = grammar.subsection("funcs", "func").unwrap();
        assert_eq!(func.average_macros, None);
        assert_eq!(func.average(), (func.min_macros + func.max_macros) as f64 / 2.0);
    }

    #[test]
    fn test_roulette_respects_weights() {
        let grammar = Grammar::from_json(
            r#"{
                "name": "w",
                "sections": [{"name": "s", "subsections": [{
                    "name": "b", "min_macros": 1, "max_macros": 1,
                    "macros": [
                        {"id": "never", "weight": 0.0},
                        {"id": "often", "weight": 3.0},
                        {"id": "rare", "weight": 1.0}
                    ]
                }]}]
            }"#,
        )
        .unwrap();
        let sub = grammar.subsection("s", "b").unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut often = 0;
        for _ in 0..4000 {
            let id = &sub.random_macro(&mut rng).unwrap().id;
            assert_ne!(id, "never");
            if id == "often" {
                often += 1;
            }
        }
        assert!((2700..3300).contains(&often), "often drawn {often} times");
    }

    #[test]
    fn test_roulette_without_positive_weight() {
        let grammar = Grammar::from_json(
            r#"{
                "name": "z",
                "sections": [{"name": "s", "subsections": [{
                    "name": "b", "max_macros": 0,
                    "macros": [{"id": "off", "weight": 0.0}]
                }]}]
            }"#,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        assert!(grammar.subsection("s", "b").unwrap().random_macro(&mut rng).is_none());
    }

    #[test]
    fn test_max_references_defaults_to_unbounded() {
        let grammar = fixtures::program();
        let func = grammar.subsection("funcs", "func").unwrap();
        assert_eq!(func.max_references, None);
        assert!(func.accepts_reference(1_000));

        let capped = fixtures::capped(1);
        let func = capped.subsection("funcs", "func").unwrap();
        assert!(func.accepts_reference(0));
        assert!(!func.accepts_reference(1));
    }

    #[test]
    fn test_expand_requires_single_reference() {
        let json = |references: &str| {
            format!(
                r#"{{"name": "g", "sections": [{{"name": "s", "subsections": [
                    {{"name": "inline", "expand": true, {references} "max_macros": 1,
                      "macros": [{{"id": "m"}}]}}]}}]}}"#
            )
        };
        for references in ["", r#""max_references": 2,"#] {
            assert!(matches!(
                Grammar::from_json(&json(references)).unwrap_err(),
                GrammarError::InvalidRange { .. }
            ));
        }
        let grammar = Grammar::from_json(&json(r#""max_references": 1,"#)).unwrap();
        assert!(grammar.subsection("s", "inline").unwrap().expand);
        assert!(fixtures::expanded().subsection("lib", "inline").is_some());
    }

    #[test]
    fn test_rejects_label_on_prologue() {
        let err = Grammar::from_json(
            r#"{
                "name": "bad",
                "sections": [{"name": "s", "subsections": [{
                    "name": "b", "max_macros": 1,
                    "prologue": {"parameters": [{"name": "to", "kind": "inner_label"}]},
                    "macros": [{"id": "m"}]
                }]}]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::MisplacedParameter { .. }));
    }

    #[test]
    fn test_rejects_unknown_outer_target() {
        let err = Grammar::from_json(
            r#"{
                "name": "bad",
                "sections": [{"name": "s", "subsections": [{
                    "name": "b", "max_macros": 1,
                    "macros": [{"id": "call", "parameters": [
                        {"name": "f", "kind": "outer_label", "targets": [{"section": "s", "subsection": "zz"}]}
                    ]}]
                }]}]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::UnknownTarget { .. }));
    }

    #[test]
    fn test_rejects_bad_ranges_and_names() {
        let inverted = r#"{"name": "g", "sections": [{"name": "s", "subsections": [
            {"name": "b", "min_macros": 3, "max_macros": 1, "macros": [{"id": "m"}]}]}]}"#;
        assert!(matches!(
            Grammar::from_json(inverted).unwrap_err(),
            GrammarError::InvalidRange { .. }
        ));

        let slash = r#"{"name": "g", "sections": [{"name": "a/b", "subsections": []}]}"#;
        assert!(matches!(
            Grammar::from_json(slash).unwrap_err(),
            GrammarError::InvalidIdentifier(_)
        ));

        let dup = r#"{"name": "g", "sections": [{"name": "s", "subsections": [
            {"name": "b", "max_macros": 1, "macros": [{"id": "m"}, {"id": "m"}]}]}]}"#;
        assert!(matches!(
            Grammar::from_json(dup).unwrap_err(),
            GrammarError::Duplicate { kind: "macro", .. }
        ));

        let unknown = r#"{"name": "g", "sections": [{"name": "s", "subsections": [
            {"name": "b", "max_macros": 1, "macros": [{"id": "m", "expression": [{"param": "x"}]}]}]}]}"#;
        assert!(matches!(
            Grammar::from_json(unknown).unwrap_err(),
            GrammarError::UnknownParameter { .. }
        ));
    }
}
