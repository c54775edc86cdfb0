//! Top-down reconciliation by historical proportions.

use super::{ProportionsMethod, Reconciler};
use crate::dataset::{TsDataset, TARGET};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchicalStructure;
use crate::sparse::SparseMatrix;
use faer::Mat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Configuration for a [`TopDownReconciler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDownConfig {
    /// Level the reconciled forecasts are returned at.
    pub target_level: String,
    /// Level forecasts are produced at.
    pub source_level: String,
    /// Number of most recent timestamps used to estimate proportions.
    #[serde(default = "default_period_length")]
    pub period_length: usize,
    /// Proportion estimator.
    #[serde(default = "default_method")]
    pub method: ProportionsMethod,
}

fn default_period_length() -> usize {
    1
}

fn default_method() -> ProportionsMethod {
    ProportionsMethod::Ahp
}

impl TopDownConfig {
    /// Configuration with a one-step AHP window.
    pub fn new(target_level: impl Into<String>, source_level: impl Into<String>) -> Self {
        Self {
            target_level: target_level.into(),
            source_level: source_level.into(),
            period_length: default_period_length(),
            method: default_method(),
        }
    }

    /// Set the proportion window length.
    pub fn with_period_length(mut self, period_length: usize) -> Self {
        self.period_length = period_length;
        self
    }

    /// Set the proportion estimator.
    pub fn with_method(mut self, method: ProportionsMethod) -> Self {
        self.method = method;
        self
    }
}

/// Disaggregates forecasts from a coarse source level to a finer target level.
///
/// Each target segment receives a fixed share of its source ancestor's
/// forecast. Shares are estimated on the last `period_length` timestamps of
/// history and are not renormalised, so they need not sum to one.
///
/// ```text
/// source  X ──┬── a   share_a = mean(a) / mean(X)      (PHA)
///             └── b   share_b = mean(b / X)            (AHP)
/// ```
#[derive(Debug, Clone)]
pub struct TopDownReconciler {
    config: TopDownConfig,
    mapping: Option<SparseMatrix>,
    hierarchy: Option<Arc<HierarchicalStructure>>,
}

impl TopDownReconciler {
    /// Create an unfitted reconciler; `method` is `"AHP"` or `"PHA"`.
    pub fn new(
        target_level: impl Into<String>,
        source_level: impl Into<String>,
        period_length: usize,
        method: &str,
    ) -> Result<Self> {
        let config = TopDownConfig::new(target_level, source_level)
            .with_period_length(period_length)
            .with_method(method.parse()?);
        Self::from_config(config)
    }

    /// Create an unfitted reconciler from a configuration.
    pub fn from_config(config: TopDownConfig) -> Result<Self> {
        if config.period_length < 1 {
            return Err(Error::InvalidPeriod {
                period_length: config.period_length,
            });
        }
        Ok(Self {
            config,
            mapping: None,
            hierarchy: None,
        })
    }

    /// Configuration the reconciler was built with.
    pub fn config(&self) -> &TopDownConfig {
        &self.config
    }

    /// Proportion window length.
    pub fn period_length(&self) -> usize {
        self.config.period_length
    }

    /// Proportion estimator.
    pub fn method(&self) -> ProportionsMethod {
        self.config.method
    }

    fn estimate_mapping(&self, ts: &TsDataset) -> Result<SparseMatrix> {
        let (hierarchy, current) = ts.require_hierarchy()?;
        let source = self.config.source_level.as_str();
        let target = self.config.target_level.as_str();

        let current_depth = hierarchy.level_depth(current)?;
        let source_depth = hierarchy.level_depth(source)?;
        let target_depth = hierarchy.level_depth(target)?;

        if target_depth < source_depth {
            return Err(Error::InvalidLevelOrder {
                finer: target.to_string(),
                coarser: source.to_string(),
            });
        }
        if current_depth < target_depth {
            return Err(Error::InvalidLevelOrder {
                finer: current.to_string(),
                coarser: target.to_string(),
            });
        }

        if source_depth == target_depth {
            return Ok(hierarchy.summing_matrix(target, source)?.as_ref().clone());
        }

        let coarse_ts = ts.get_level_dataset(source)?;
        let fine_ts = ts.get_level_dataset(target)?;
        let coarse = coarse_ts.frame().feature(TARGET)?;
        let fine = fine_ts.frame().feature(TARGET)?;

        let summing = hierarchy.summing_matrix(source, target)?;
        let triplets = summing
            .iter()
            .map(|(coarse_idx, fine_idx, _)| {
                let share = self.config.method.estimate(
                    &column(fine, fine_idx),
                    &column(coarse, coarse_idx),
                    self.config.period_length,
                );
                (fine_idx, coarse_idx, share)
            })
            .collect();
        SparseMatrix::from_triplets(summing.ncols(), summing.nrows(), triplets)
    }
}

impl Reconciler for TopDownReconciler {
    fn target_level(&self) -> &str {
        &self.config.target_level
    }

    fn source_level(&self) -> &str {
        &self.config.source_level
    }

    fn mapping_matrix(&self) -> Option<&SparseMatrix> {
        self.mapping.as_ref()
    }

    fn fitted_hierarchy(&self) -> Option<&Arc<HierarchicalStructure>> {
        self.hierarchy.as_ref()
    }

    fn fit(&mut self, ts: &TsDataset) -> Result<&mut Self> {
        let mapping = self.estimate_mapping(ts)?;
        info!(
            source = %self.config.source_level,
            target = %self.config.target_level,
            method = %self.config.method,
            period_length = self.config.period_length,
            entries = mapping.nnz(),
            "fitted top-down reconciler"
        );
        self.mapping = Some(mapping);
        self.hierarchy = ts.hierarchy().cloned();
        Ok(self)
    }
}

fn column(block: &Mat<f64>, j: usize) -> Vec<f64> {
    (0..block.nrows()).map(|t| block[(t, j)]).collect()
}
