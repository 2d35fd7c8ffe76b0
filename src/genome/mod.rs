//! Genome — the graph representation of one individual
//!
//! Genome → section graphs → subsection graphs → slice of macro nodes.
//! Labels are edges that float after construction, cloning, or editing and
//! are re-attached by the resolver before an individual is used.

mod container;
mod edge;
mod hash;
mod node;
mod render;
mod resolver;
mod section_graph;
mod serial;
mod slice;
mod subgraph;
mod tag;
mod validate;

pub use container::{Genome, NodeAddress, ResolvedGenome};
pub use edge::{Edge, EdgeState, LabelKind, RestoreHint, TargetLocation, TargetLocator};
pub use hash::{djb_bytes, djb_str, djb_u64, HashPurpose, Message, HASH_SEED};
pub use node::MacroNode;
pub use render::{IdentityRelabeller, NormalizingRelabeller, Relabeller};
pub use section_graph::SectionGraph;
pub use serial::{
    ContainerElement, EdgeElement, GenomeDocument, GraphElement, NodeElement, SubgraphElement,
    FORMAT_VERSION,
};
pub use slice::{Slice, SplicePosition};
pub use subgraph::SubsectionGraph;
pub use tag::Tag;
