//! Error types for grammar loading and genome handling
//!
//! Resolution and editor failures are not errors: they are reported as
//! `bool`/`Option` so the caller can discard the attempt and retry.

/// Errors raised while loading or linking a grammar description
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("Invalid identifier '{0}': must be non-empty and free of '/' and '$'")]
    InvalidIdentifier(String),

    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("Invalid range in {owner}: {detail}")]
    InvalidRange { owner: String, detail: String },

    #[error("Parameter '{parameter}' not allowed on {owner}")]
    MisplacedParameter { owner: String, parameter: String },

    #[error("Macro '{owner}' references unknown parameter '{parameter}'")]
    UnknownParameter { owner: String, parameter: String },

    #[error("Outer label '{parameter}' in '{owner}' targets unknown subsection {section}/{subsection}")]
    UnknownTarget {
        owner: String,
        parameter: String,
        section: String,
        subsection: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building, loading, or saving a genome
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    /// An entity refers to a grammar element that does not exist
    #[error("Schema binding error: {0}")]
    SchemaBinding(String),

    /// A serialized genome is structurally broken
    #[error("Malformed genome document: {0}")]
    Document(String),

    /// The genome still carries unresolved edges
    #[error("Genome {0} has floating edges")]
    Floating(String),

    /// Random construction never produced a valid individual
    #[error("No valid genome after {0} attempts")]
    Exhausted(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
