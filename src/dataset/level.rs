//! Level-aware view over a [`TsFrame`].

use super::frame::{TsFrame, TARGET};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchicalStructure;
use crate::sparse::SparseMatrix;
use faer::Mat;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Determine the single hierarchy level a set of segments belongs to.
///
/// Every expected segment of that level must be present. When several levels
/// hold exactly the same segments (every branch tails through them), the
/// deepest one is returned.
pub fn infer_level<S: AsRef<str>>(hierarchy: &HierarchicalStructure, segments: &[S]) -> Result<String> {
    if segments.is_empty() {
        return Err(Error::EmptyInput);
    }

    let present: BTreeSet<&str> = segments.iter().map(AsRef::as_ref).collect();
    let mut lo = 0usize;
    let mut hi = hierarchy.n_levels() - 1;
    for segment in &present {
        let range = hierarchy.segment_level_range(segment)?;
        lo = lo.max(*range.start());
        hi = hi.min(*range.end());
    }
    if lo > hi {
        return Err(Error::MixedLevel);
    }

    // All present segments are active at every depth in lo..=hi, so each
    // candidate level is a superset of `present`.
    for depth in (lo..=hi).rev() {
        if hierarchy.segments_at_depth(depth).len() == present.len() {
            return Ok(hierarchy.level_names()[depth].clone());
        }
    }

    let missing = hierarchy
        .segments_at_depth(hi)
        .iter()
        .filter(|s| !present.contains(s.as_str()))
        .cloned()
        .collect();
    Err(Error::MissingSegments {
        level: hierarchy.level_names()[hi].clone(),
        missing,
    })
}

/// A time-series dataset that knows which hierarchy level its segments live at.
///
/// Without a hierarchy it is a plain frame and every level-aware operation
/// fails with [`Error::NoHierarchy`].
#[derive(Debug, Clone)]
pub struct TsDataset {
    frame: TsFrame,
    hierarchy: Option<Arc<HierarchicalStructure>>,
    current_level: Option<String>,
}

impl TsDataset {
    /// Dataset without hierarchy information.
    pub fn new(frame: TsFrame) -> Self {
        Self {
            frame,
            hierarchy: None,
            current_level: None,
        }
    }

    /// Dataset whose level is inferred from the frame's segments.
    pub fn with_hierarchy(frame: TsFrame, hierarchy: Arc<HierarchicalStructure>) -> Result<Self> {
        let level = infer_level(&hierarchy, frame.segments())?;
        debug!(level = %level, segments = frame.segments().len(), "inferred dataset level");
        Ok(Self {
            frame,
            hierarchy: Some(hierarchy),
            current_level: Some(level),
        })
    }

    /// Dataset at a known level; segments must match the level exactly.
    pub(crate) fn at_level(
        frame: TsFrame,
        hierarchy: Arc<HierarchicalStructure>,
        level: &str,
    ) -> Result<Self> {
        let expected = hierarchy.level_segments(level)?;
        if frame.segments() != expected {
            return Err(Error::ShapeMismatch {
                expected: format!("segments of level '{level}'"),
                actual: format!("segments {:?}", frame.segments()),
            });
        }
        Ok(Self {
            frame,
            hierarchy: Some(hierarchy),
            current_level: Some(level.to_string()),
        })
    }

    /// Attach exogenous features.
    ///
    /// Exog data at the dataset's level is joined on timestamps. Exog data at
    /// another level is dropped, since it cannot be attached per segment.
    pub fn with_exog(self, exog: TsFrame) -> Result<Self> {
        let (Some(hierarchy), Some(current)) = (&self.hierarchy, &self.current_level) else {
            let frame = self.frame.join(&exog)?;
            return Ok(Self { frame, ..self });
        };

        let exog_level = infer_level(hierarchy, exog.segments())?;
        if &exog_level != current {
            warn!(
                exog_level = %exog_level,
                level = %current,
                "exogenous data is at a different level, dropping it"
            );
            return Ok(self);
        }
        let frame = self.frame.join(&exog)?;
        Ok(Self { frame, ..self })
    }

    /// Underlying table.
    pub fn frame(&self) -> &TsFrame {
        &self.frame
    }

    /// Hierarchy, if any.
    pub fn hierarchy(&self) -> Option<&Arc<HierarchicalStructure>> {
        self.hierarchy.as_ref()
    }

    /// Level the segments currently live at.
    pub fn current_level(&self) -> Option<&str> {
        self.current_level.as_deref()
    }

    /// Level names of the hierarchy, root first.
    pub fn level_names(&self) -> Option<&[String]> {
        self.hierarchy.as_ref().map(|h| h.level_names())
    }

    /// Segment names, sorted.
    pub fn segments(&self) -> &[String] {
        self.frame.segments()
    }

    /// Hierarchy and current level, or [`Error::NoHierarchy`].
    pub(crate) fn require_hierarchy(&self) -> Result<(&Arc<HierarchicalStructure>, &str)> {
        match (&self.hierarchy, &self.current_level) {
            (Some(hierarchy), Some(level)) => Ok((hierarchy, level.as_str())),
            _ => Err(Error::NoHierarchy),
        }
    }

    /// Aggregate the dataset to a level at or above the current one.
    ///
    /// `target` values are summed through the summing matrix. Other features
    /// survive only where all children of every parent carry the same value.
    pub fn get_level_dataset(&self, target_level: &str) -> Result<TsDataset> {
        let (hierarchy, current_level) = self.require_hierarchy()?;
        let target_depth = hierarchy.level_depth(target_level)?;
        let current_depth = hierarchy.level_depth(current_level)?;

        if target_depth > current_depth {
            return Err(Error::InvalidDirection {
                target: target_level.to_string(),
                current: current_level.to_string(),
            });
        }
        if target_depth == current_depth {
            return Ok(self.clone());
        }

        let summing = hierarchy.summing_matrix(target_level, current_level)?;
        let mut features = BTreeMap::new();
        for name in self.frame.feature_names() {
            let values = self.frame.feature(name)?;
            let aggregated = if name == TARGET {
                Some(summing.apply(values)?)
            } else {
                collapse_uniform(&summing, values)
            };
            match aggregated {
                Some(block) => {
                    let _ = features.insert(name.to_string(), block);
                }
                None => debug!(
                    feature = name,
                    level = target_level,
                    "feature differs between children, dropping it"
                ),
            }
        }

        let segments = hierarchy.level_segments(target_level)?.to_vec();
        let frame = TsFrame::new(self.frame.timestamps().to_vec(), segments, features)?;
        debug!(
            from = current_level,
            to = target_level,
            timestamps = frame.len(),
            "aggregated dataset"
        );
        TsDataset::at_level(frame, Arc::clone(hierarchy), target_level)
    }
}

/// Take each parent's value from its children when they all agree, or `None`.
fn collapse_uniform(summing: &SparseMatrix, values: &Mat<f64>) -> Option<Mat<f64>> {
    let n_steps = values.nrows();
    let mut out = Mat::<f64>::zeros(n_steps, summing.nrows());
    for parent in 0..summing.nrows() {
        let children: Vec<usize> = summing.row(parent).map(|(child, _)| child).collect();
        let first = *children.first()?;
        for t in 0..n_steps {
            let value = values[(t, first)];
            let uniform = children.iter().all(|&child| {
                let other = values[(t, child)];
                other == value || (other.is_nan() && value.is_nan())
            });
            if !uniform {
                return None;
            }
            out[(t, parent)] = value;
        }
    }
    Some(out)
}
