//! Time-series tables and their level-aware views.
//!
//! - [`TsFrame`]: timestamps × (segment, feature) table with dense per-feature blocks
//! - [`TsDataset`]: a frame bound to a [`HierarchicalStructure`](crate::hierarchy::HierarchicalStructure)
//!   and the level its segments live at
//! - [`to_hierarchical_dataset`]: long records with level columns to a frame plus hierarchy

mod frame;
mod level;
mod long;

pub use frame::{TsFrame, TARGET};
pub use level::{infer_level, TsDataset};
pub use long::{to_hierarchical_dataset, LongRecord, ROOT_SEGMENT};
