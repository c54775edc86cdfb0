//! Hierarchies of time-series segments.
//!
//! A hierarchy relates named *levels* (`total`, `market`, `product`, ...) to the
//! concrete series, *segments*, that live at each level:
//!
//! ```text
//! Level     │ Segments
//! ──────────┼─────────────────
//! total     │ total
//! market    │ X, Y
//! product   │ a, b, c, d
//! ```
//!
//! - [`HierarchicalStructure`]: the tree, its level segments and the summing
//!   matrices between any two levels
//! - [`validate_level_structure`]: structural checks run before a tree is built
//! - [`Node`]: arena node with the depth range over which it is active

mod node;
pub mod structure;
mod validate;

pub use node::Node;
pub use structure::{HierarchicalStructure, HierarchyDescription};
pub use validate::{validate_level_structure, Severity, ValidationIssue, ValidationReport};
