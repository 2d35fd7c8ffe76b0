//! Macro — a template that a genome node instantiates

use super::parameter::Parameter;
use serde::{Deserialize, Serialize};

/// One element of a macro's textual template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpressionElement {
    /// Literal text
    Text(String),
    /// Value of the named parameter
    Param { param: String },
}

/// Where a macro sits within its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MacroRole {
    Prologue,
    Epilogue,
    #[default]
    Body,
}

fn default_weight() -> f64 {
    1.0
}

/// A macro definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Macro {
    #[serde(default)]
    pub id: String,
    /// Relative probability in the subsection's roulette wheel
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub expression: Vec<ExpressionElement>,
    /// Grammar-wide unique path, set when the grammar is linked
    #[serde(skip)]
    pub path: String,
    #[serde(skip)]
    pub role: MacroRole,
}

impl Macro {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn has_labels(&self) -> bool {
        self.parameters.iter().any(|p| p.kind.is_label())
    }

    /// Parameters materialized as tags on a node
    pub fn tag_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.kind.is_label())
    }

    /// Parameters materialized as edges on a node
    pub fn label_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.kind.is_label())
    }
}
