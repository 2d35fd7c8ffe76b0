//! Genograph — grammar-constrained program graphs for evolutionary synthesis
//!
//! An individual is a genome: a tree of section and subsection graphs whose
//! nodes instantiate grammar macros. Labels between nodes are re-established
//! by the resolver after every construction, clone, or edit, then the genome
//! is validated, hashed, rendered to program text, or serialized.

pub mod context;
pub mod error;
pub mod genome;
pub mod grammar;
pub mod ids;

pub use context::{EngineConfig, GenomeContext};
pub use error::{GenomeError, GrammarError};
pub use genome::{Genome, HashPurpose, Message, ResolvedGenome, SubsectionGraph};
pub use grammar::Grammar;
pub use ids::{IdGenerator, NodeId};
