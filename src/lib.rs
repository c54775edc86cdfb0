//! # coherent
//!
//! Hierarchical time series: level structures, aggregation between levels and
//! top-down forecast reconciliation.
//!
//! A [`HierarchicalStructure`] names the levels of a segment tree and provides
//! sparse summing matrices between them. A [`TsDataset`] binds a [`TsFrame`] to a
//! structure and knows which level its segments live at. A [`Reconciler`] is
//! fitted on history and maps forecasts from a source level to a target level.
//!
//! ```
//! use coherent::{HierarchicalStructure, Reconciler, TopDownReconciler};
//!
//! let hs = HierarchicalStructure::from_json(
//!     r#"{"level_structure": {"total": ["X", "Y"], "X": ["a", "b"], "Y": ["c", "d"]},
//!         "level_names": ["total", "market", "product"]}"#,
//! )?;
//! assert_eq!(hs.level_segments("market")?, ["X", "Y"]);
//! assert_eq!(hs.summing_matrix("market", "product")?.nnz(), 4);
//!
//! let reconciler = TopDownReconciler::new("product", "market", 7, "AHP")?;
//! assert!(!reconciler.is_fitted());
//! # Ok::<(), coherent::Error>(())
//! ```

pub mod dataset;
/// Error types used across `coherent`.
pub mod error;
pub mod hierarchy;
pub mod reconciliation;
pub mod sparse;


pub use dataset::{
    infer_level, to_hierarchical_dataset, LongRecord, TsDataset, TsFrame, ROOT_SEGMENT, TARGET,
};
pub use error::{Error, Result};
pub use hierarchy::{HierarchicalStructure, HierarchyDescription};
pub use reconciliation::{
    ProportionsMethod, Reconciler, TopDownConfig, TopDownReconciler,
};
pub use sparse::SparseMatrix;
