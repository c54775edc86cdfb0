//! Wide time-series table: timestamps × (segment, feature).

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use faer::Mat;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Name of the feature that is aggregated and reconciled.
pub const TARGET: &str = "target";

/// A table indexed by timestamp (rows) and (segment, feature) pairs (columns).
///
/// Each feature is stored as a dense `timestamps x segments` block whose rows
/// are in chronological order and whose columns follow the alphabetical segment
/// order. Missing observations are `NaN`.
#[derive(Debug, Clone)]
pub struct TsFrame {
    timestamps: Vec<NaiveDateTime>,
    segments: Vec<String>,
    features: BTreeMap<String, Mat<f64>>,
}

impl TsFrame {
    /// Build from feature blocks sharing one timestamp index and segment list.
    ///
    /// Neither index needs to be sorted: rows are reordered by timestamp and
    /// columns by segment name. Repeated timestamps are rejected.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        segments: Vec<String>,
        features: BTreeMap<String, Mat<f64>>,
    ) -> Result<Self> {
        for (feature, values) in &features {
            if values.nrows() != timestamps.len() || values.ncols() != segments.len() {
                return Err(Error::ShapeMismatch {
                    expected: format!("{}x{} block", timestamps.len(), segments.len()),
                    actual: format!(
                        "{}x{} block for feature '{feature}'",
                        values.nrows(),
                        values.ncols()
                    ),
                });
            }
        }

        let mut order: Vec<usize> = (0..segments.len()).collect();
        order.sort_by(|&a, &b| segments[a].cmp(&segments[b]));
        for pair in order.windows(2) {
            if segments[pair[0]] == segments[pair[1]] {
                return Err(Error::DuplicateColumn {
                    segment: segments[pair[0]].clone(),
                    feature: features
                        .keys()
                        .next()
                        .cloned()
                        .unwrap_or_else(|| TARGET.to_string()),
                });
            }
        }

        let mut rows: Vec<usize> = (0..timestamps.len()).collect();
        rows.sort_by_key(|&t| timestamps[t]);
        for pair in rows.windows(2) {
            if timestamps[pair[0]] == timestamps[pair[1]] {
                return Err(Error::DuplicateIndex {
                    timestamp: timestamps[pair[0]].to_string(),
                });
            }
        }

        let sorted_timestamps = rows.iter().map(|&t| timestamps[t]).collect();
        let sorted_segments = order.iter().map(|&j| segments[j].clone()).collect();
        let features = features
            .into_iter()
            .map(|(name, values)| {
                let permuted = Mat::from_fn(values.nrows(), values.ncols(), |t, j| {
                    values[(rows[t], order[j])]
                });
                (name, permuted)
            })
            .collect();

        Ok(Self {
            timestamps: sorted_timestamps,
            segments: sorted_segments,
            features,
        })
    }

    /// Build from `(segment, feature, values)` columns over one timestamp index.
    ///
    /// (segment, feature) pairs that are not given are filled with `NaN`.
    pub fn from_columns<S, F, I>(timestamps: Vec<NaiveDateTime>, columns: I) -> Result<Self>
    where
        S: Into<String>,
        F: Into<String>,
        I: IntoIterator<Item = (S, F, Vec<f64>)>,
    {
        let mut by_key: HashMap<(String, String), Vec<f64>> = HashMap::new();
        let mut segments: BTreeSet<String> = BTreeSet::new();
        let mut feature_names: BTreeSet<String> = BTreeSet::new();

        for (segment, feature, values) in columns {
            let (segment, feature) = (segment.into(), feature.into());
            if values.len() != timestamps.len() {
                return Err(Error::ShapeMismatch {
                    expected: format!("{} values", timestamps.len()),
                    actual: format!("{} values for ({segment}, {feature})", values.len()),
                });
            }
            let _ = segments.insert(segment.clone());
            let _ = feature_names.insert(feature.clone());
            if by_key.insert((segment.clone(), feature.clone()), values).is_some() {
                return Err(Error::DuplicateColumn { segment, feature });
            }
        }

        let segments: Vec<String> = segments.into_iter().collect();
        let features = feature_names
            .into_iter()
            .map(|feature| {
                let columns: Vec<Option<&Vec<f64>>> = segments
                    .iter()
                    .map(|segment| by_key.get(&(segment.clone(), feature.clone())))
                    .collect();
                let block = Mat::from_fn(timestamps.len(), segments.len(), |t, j| {
                    columns[j].map_or(f64::NAN, |values| values[t])
                });
                (feature, block)
            })
            .collect();

        Self::new(timestamps, segments, features)
    }

    /// Timestamp index.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Segment names, sorted.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Feature names, sorted.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.keys().map(String::as_str)
    }

    /// Whether a feature is present.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains_key(feature)
    }

    /// Dense `timestamps x segments` block of one feature.
    pub fn feature(&self, feature: &str) -> Result<&Mat<f64>> {
        self.features.get(feature).ok_or_else(|| Error::MissingFeature {
            feature: feature.to_string(),
        })
    }

    /// Number of timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the frame has no timestamps.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Values of one (segment, feature) column.
    pub fn column(&self, segment: &str, feature: &str) -> Option<Vec<f64>> {
        let j = self.segments.binary_search_by(|s| s.as_str().cmp(segment)).ok()?;
        let values = self.features.get(feature)?;
        Some((0..values.nrows()).map(|t| values[(t, j)]).collect())
    }

    /// Left join `other` on timestamps; its rows missing here are dropped and
    /// timestamps missing in `other` become `NaN`.
    ///
    /// Both frames must cover the same segments.
    pub fn join(&self, other: &TsFrame) -> Result<TsFrame> {
        if self.segments != other.segments {
            return Err(Error::ShapeMismatch {
                expected: format!("segments {:?}", self.segments),
                actual: format!("segments {:?}", other.segments),
            });
        }

        let positions: HashMap<&NaiveDateTime, usize> = other
            .timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| (ts, i))
            .collect();
        let rows: Vec<Option<usize>> = self
            .timestamps
            .iter()
            .map(|ts| positions.get(ts).copied())
            .collect();

        let mut features = self.features.clone();
        for (name, values) in &other.features {
            if features.contains_key(name) {
                return Err(Error::DuplicateColumn {
                    segment: self.segments.first().cloned().unwrap_or_default(),
                    feature: name.clone(),
                });
            }
            let joined = Mat::from_fn(rows.len(), self.segments.len(), |t, j| {
                rows[t].map_or(f64::NAN, |row| values[(row, j)])
            });
            let _ = features.insert(name.clone(), joined);
        }

        Ok(TsFrame {
            timestamps: self.timestamps.clone(),
            segments: self.segments.clone(),
            features,
        })
    }

    /// Frame holding only the given feature.
    pub fn select_feature(&self, feature: &str) -> Result<TsFrame> {
        let values = self.feature(feature)?.clone();
        Ok(TsFrame {
            timestamps: self.timestamps.clone(),
            segments: self.segments.clone(),
            features: BTreeMap::from([(feature.to_string(), values)]),
        })
    }
}

/// Equal index, segments and features; `NaN` equals `NaN`.
impl PartialEq for TsFrame {
    fn eq(&self, other: &Self) -> bool {
        self.timestamps == other.timestamps
            && self.segments == other.segments
            && self.features.len() == other.features.len()
            && self.features.iter().zip(&other.features).all(|((na, a), (nb, b))| {
                na == nb
                    && a.nrows() == b.nrows()
                    && a.ncols() == b.ncols()
                    && (0..a.nrows()).all(|t| {
                        (0..a.ncols()).all(|j| {
                            let (x, y) = (a[(t, j)], b[(t, j)]);
                            x == y || (x.is_nan() && y.is_nan())
                        })
                    })
            })
    }
}
