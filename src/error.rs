use thiserror::Error;

/// Result alias for `coherent`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by hierarchy, dataset and reconciliation primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Hierarchy description has no nodes.
    #[error("hierarchy structure is empty")]
    EmptyHierarchy,

    /// Hierarchy description does not form a valid tree.
    #[error("invalid hierarchy structure: {reason}")]
    InvalidStructure {
        /// What is wrong with the structure.
        reason: String,
    },

    /// Level name is not part of the hierarchy.
    #[error("level '{level}' is not part of the hierarchy")]
    UnknownLevel {
        /// Requested level name.
        level: String,
    },

    /// Segment name is not part of the hierarchy.
    #[error("segment '{segment}' is not part of the hierarchy")]
    UnknownSegment {
        /// Requested segment name.
        segment: String,
    },

    /// Two levels were passed in the wrong order.
    #[error("level '{finer}' must not be higher in the hierarchy than level '{coarser}'")]
    InvalidLevelOrder {
        /// Level that was required to be the same or lower.
        finer: String,
        /// Level that was required to be the same or higher.
        coarser: String,
    },

    /// Aggregation was requested towards a deeper level.
    #[error("target level should be higher in hierarchy than current level: target '{target}', current '{current}'")]
    InvalidDirection {
        /// Requested level.
        target: String,
        /// Level the data currently lives at.
        current: String,
    },

    /// Dataset is at a different level than required.
    #[error("dataset should be at level '{expected}', found '{found}'")]
    LevelMismatch {
        /// Required level.
        expected: String,
        /// Actual level.
        found: String,
    },

    /// Segments belong to more than one hierarchy level.
    #[error("segments are from more than 1 hierarchical level")]
    MixedLevel,

    /// Some segments of the inferred level are absent.
    #[error("some segments of hierarchical level '{level}' are missing: {missing:?}")]
    MissingSegments {
        /// Closest matching level.
        level: String,
        /// Segments expected but not present.
        missing: Vec<String>,
    },

    /// Operation needs a hierarchy but the dataset carries none.
    #[error("method can be applied only to instances with a hierarchy")]
    NoHierarchy,

    /// Reconciler used before `fit`.
    #[error("reconciler is not fitted")]
    NotFitted,

    /// Proportion window length out of range.
    #[error("period length must be positive, got {period_length}")]
    InvalidPeriod {
        /// Requested window length.
        period_length: usize,
    },

    /// Proportion method name not recognised.
    #[error("unable to recognize reconciliation method '{method}'; supported methods: {supported}")]
    UnsupportedMethod {
        /// Requested method name.
        method: String,
        /// Sorted, comma separated list of valid names.
        supported: String,
    },

    /// Shape mismatch (string description).
    #[error("shape mismatch: expected {expected}, actual {actual}")]
    ShapeMismatch {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        actual: String,
    },

    /// Same (segment, feature) column appears twice.
    #[error("duplicate column ({segment}, {feature})")]
    DuplicateColumn {
        /// Segment part of the column key.
        segment: String,
        /// Feature part of the column key.
        feature: String,
    },

    /// Same segment observed twice at one timestamp.
    #[error("duplicate observation of segment '{segment}' at {timestamp}")]
    DuplicateTimestamp {
        /// Segment observed twice.
        segment: String,
        /// Offending timestamp.
        timestamp: String,
    },

    /// Same timestamp appears twice in a frame index.
    #[error("duplicate timestamp {timestamp} in frame index")]
    DuplicateIndex {
        /// Offending timestamp.
        timestamp: String,
    },

    /// Hierarchy differs from the one a reconciler was fitted on.
    #[error("dataset hierarchy differs from the hierarchy the reconciler was fitted on")]
    HierarchyMismatch,

    /// Required feature is absent from a frame.
    #[error("feature '{feature}' is missing")]
    MissingFeature {
        /// Feature name.
        feature: String,
    },

    /// Hierarchy description could not be decoded.
    #[error("failed to decode hierarchy description: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
