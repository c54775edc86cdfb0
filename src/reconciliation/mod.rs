//! Reconciliation of forecasts between hierarchy levels.
//!
//! A reconciler is fitted on history, learns a sparse *mapping matrix* from the
//! `source_level` (where forecasts are produced) to the `target_level` (where
//! they are needed), and then maps `target` values between the two:
//!
//! ```text
//! target (T x |target|) = source (T x |source|) · mappingᵀ
//! ```
//!
//! - [`Reconciler`]: the fit / aggregate / reconcile contract
//! - [`TopDownReconciler`]: disaggregates coarse forecasts by historical proportions
//! - [`ProportionsMethod`]: AHP and PHA proportion estimators

mod proportions;
mod top_down;

pub use proportions::ProportionsMethod;
pub use top_down::{TopDownConfig, TopDownReconciler};

use crate::dataset::{TsDataset, TsFrame, TARGET};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchicalStructure;
use crate::sparse::SparseMatrix;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Maps `target` values between a source and a target hierarchy level.
pub trait Reconciler {
    /// Level the reconciled values are returned at.
    fn target_level(&self) -> &str;

    /// Level forecasts are produced at.
    fn source_level(&self) -> &str;

    /// Fitted `|target segments| x |source segments|` mapping, if fitted.
    fn mapping_matrix(&self) -> Option<&SparseMatrix>;

    /// Hierarchy the mapping was fitted on, if fitted.
    fn fitted_hierarchy(&self) -> Option<&Arc<HierarchicalStructure>>;

    /// Learn the mapping from a dataset at or below the target level.
    ///
    /// On error the reconciler keeps its previous state.
    fn fit(&mut self, ts: &TsDataset) -> Result<&mut Self>
    where
        Self: Sized;

    /// Whether [`fit`](Reconciler::fit) has succeeded.
    fn is_fitted(&self) -> bool {
        self.mapping_matrix().is_some()
    }

    /// Aggregate a dataset at or below the target level to the source level.
    fn aggregate(&self, ts: &TsDataset) -> Result<TsDataset> {
        let (hierarchy, current) = ts.require_hierarchy()?;
        if hierarchy.level_depth(current)? < hierarchy.level_depth(self.target_level())? {
            return Err(Error::InvalidLevelOrder {
                finer: current.to_string(),
                coarser: self.target_level().to_string(),
            });
        }
        ts.get_level_dataset(self.source_level())
    }

    /// Map `target` values at the source level to the target level.
    ///
    /// Only the `target` feature is carried over; the timestamp index is unchanged.
    /// The dataset must use the hierarchy the reconciler was fitted on.
    fn reconcile(&self, ts: &TsDataset) -> Result<TsDataset> {
        let (mapping, fitted) = self
            .mapping_matrix()
            .zip(self.fitted_hierarchy())
            .ok_or(Error::NotFitted)?;
        let (hierarchy, current) = ts.require_hierarchy()?;
        if !Arc::ptr_eq(fitted, hierarchy) && fitted != hierarchy {
            return Err(Error::HierarchyMismatch);
        }
        if current != self.source_level() {
            return Err(Error::LevelMismatch {
                expected: self.source_level().to_string(),
                found: current.to_string(),
            });
        }

        let values = mapping.apply(ts.frame().feature(TARGET)?)?;
        let segments = hierarchy.level_segments(self.target_level())?.to_vec();
        let frame = TsFrame::new(
            ts.frame().timestamps().to_vec(),
            segments,
            BTreeMap::from([(TARGET.to_string(), values)]),
        )?;
        debug!(
            source = self.source_level(),
            target = self.target_level(),
            timestamps = frame.len(),
            "reconciled dataset"
        );
        TsDataset::at_level(frame, Arc::clone(hierarchy), self.target_level())
    }
}
