//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Canonically-hashable rooted-tree topologies for phylogenetics, plus the
//! subsplit bit-vectors produced by walking them.
//!
//! Modules:
//! - `bitset`: fixed-length bit-vectors with subsplit and PCSS operations.
//! - `node`: immutable shared tree nodes, structural hashing, traversal
//!   protocols (including the virtual-rooting PCSS enumeration).
//! - `tree`: a topology decorated with branch lengths; Newick emission and
//!   the root trifurcation-to-bifurcation transform.
//! - `error`: typed errors for the recoverable operation failures.
//!
//! Public API kept stable by re-exporting key items from the modules.

pub mod bitset;
pub mod error;
pub mod node;
pub mod tree;

// Re-export frequently used types
pub use bitset::Bitset;
pub use error::{Error, Result};
pub use node::{Node, NodePtr, PcssVisit, TagIndexMap};
pub use tree::Tree;
