//! Grammar — the constraint description genomes are bound to
//!
//! Sections contain subsections, subsections contain macros, macros carry
//! typed parameters. The genome engine only ever reads a linked grammar.

mod macro_def;
mod parameter;
mod section;

#[cfg(test)]
pub(crate) mod fixtures;

pub use macro_def::{ExpressionElement, Macro, MacroRole};
pub use parameter::{DataType, InnerLabelFlags, LabelTarget, Parameter, ParameterKind};
pub use section::{Grammar, Section, SubSection, EPILOGUE_KEY, PROLOGUE_KEY};
