//! Long-format records to a wide frame plus the hierarchy implied by level columns.

use super::frame::{TsFrame, TARGET};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchicalStructure;
use chrono::NaiveDateTime;
use faer::Mat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Name of the root segment created by [`to_hierarchical_dataset`].
pub const ROOT_SEGMENT: &str = "total";

/// One observation in long format.
///
/// `levels` holds one value per level column, coarsest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    /// Observation time.
    pub timestamp: NaiveDateTime,
    /// Level values, ordered like the level columns.
    pub levels: Vec<String>,
    /// Observed value.
    pub target: f64,
}

impl LongRecord {
    /// Create a record.
    pub fn new<S: Into<String>>(
        timestamp: NaiveDateTime,
        levels: impl IntoIterator<Item = S>,
        target: f64,
    ) -> Self {
        Self {
            timestamp,
            levels: levels.into_iter().map(Into::into).collect(),
            target,
        }
    }
}

/// Convert long records into a wide frame and the hierarchy given by the level columns.
///
/// A segment at level `k` is the level values `0..=k` joined with `sep`, so the
/// records `(X, a)` give segments `X` and `X_a` with `X` the parent. All
/// segments hang under a [`ROOT_SEGMENT`] node, and the level names are the
/// level columns prefixed with `"total"`. The frame holds the finest level
/// with one `target` feature; pairs absent from the records are `NaN`.
pub fn to_hierarchical_dataset<S: AsRef<str>>(
    records: &[LongRecord],
    level_columns: &[S],
    sep: &str,
) -> Result<(TsFrame, HierarchicalStructure)> {
    if records.is_empty() || level_columns.is_empty() {
        return Err(Error::EmptyInput);
    }

    let depth = level_columns.len();
    let mut level_structure: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut observations: Vec<(String, NaiveDateTime, f64)> = Vec::with_capacity(records.len());
    let mut leaves: BTreeSet<String> = BTreeSet::new();
    let mut timestamps: BTreeSet<NaiveDateTime> = BTreeSet::new();

    for record in records {
        if record.levels.len() != depth {
            return Err(Error::ShapeMismatch {
                expected: format!("{depth} level values"),
                actual: format!("{} level values at {}", record.levels.len(), record.timestamp),
            });
        }

        let mut parent = ROOT_SEGMENT.to_string();
        let mut path = String::new();
        for (k, value) in record.levels.iter().enumerate() {
            if k > 0 {
                path.push_str(sep);
            }
            path.push_str(value);
            let _ = level_structure
                .entry(parent)
                .or_default()
                .insert(path.clone());
            parent = path.clone();
        }

        let _ = timestamps.insert(record.timestamp);
        let _ = leaves.insert(path.clone());
        observations.push((path, record.timestamp, record.target));
    }

    let level_structure = level_structure
        .into_iter()
        .map(|(parent, children)| (parent, children.into_iter().collect()))
        .collect();
    let level_names: Vec<String> = std::iter::once(ROOT_SEGMENT.to_string())
        .chain(level_columns.iter().map(|c| c.as_ref().to_string()))
        .collect();
    let hierarchy = HierarchicalStructure::new(level_structure, level_names)?;

    let timestamps: Vec<NaiveDateTime> = timestamps.into_iter().collect();
    let segments: Vec<String> = leaves.into_iter().collect();
    let rows: HashMap<NaiveDateTime, usize> =
        timestamps.iter().enumerate().map(|(t, &ts)| (ts, t)).collect();
    let cols: HashMap<&str, usize> = segments
        .iter()
        .enumerate()
        .map(|(j, s)| (s.as_str(), j))
        .collect();

    let mut block = Mat::from_fn(timestamps.len(), segments.len(), |_, _| f64::NAN);
    let mut observed = vec![false; timestamps.len() * segments.len()];
    for (segment, timestamp, value) in &observations {
        let (t, j) = (rows[timestamp], cols[segment.as_str()]);
        if std::mem::replace(&mut observed[t * segments.len() + j], true) {
            return Err(Error::DuplicateTimestamp {
                segment: segment.clone(),
                timestamp: timestamp.to_string(),
            });
        }
        block[(t, j)] = *value;
    }
    debug!(
        segments = segments.len(),
        timestamps = timestamps.len(),
        levels = depth + 1,
        "built hierarchical dataset from long records"
    );

    let frame = TsFrame::new(
        timestamps,
        segments,
        BTreeMap::from([(TARGET.to_string(), block)]),
    )?;
    Ok((frame, hierarchy))
}
