use core::fmt;

/// Result alias for `troupe`.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage in which a numeric computation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Missing-value imputation.
    Impute,
    /// Feature scaling.
    Scale,
    /// Cluster assignment.
    Cluster,
    /// 2-D projection.
    Project,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Impute => write!(f, "impute"),
            Stage::Scale => write!(f, "scale"),
            Stage::Cluster => write!(f, "cluster"),
            Stage::Project => write!(f, "project"),
        }
    }
}

/// Errors returned by the clustering and summarization pipeline.
///
/// Three families, per the request contract:
/// caller-correctable validation errors ([`Error::EmptyInput`],
/// [`Error::UnknownFeature`], [`Error::UnknownScaler`],
/// [`Error::InvalidClusterCount`], [`Error::InvalidParameter`]),
/// server-side unavailability ([`Error::ArtifactUnavailable`]), and
/// numeric failures tagged with the stage that produced them
/// ([`Error::Computation`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Feature name is not a declared numeric column.
    UnknownFeature(String),

    /// Column name is not a declared categorical column.
    UnknownCategory(String),

    /// Scaler selector did not match any known strategy.
    UnknownScaler(String),

    /// Matrix dimension mismatch (usize).
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// Trained-pipeline artifact missing or unreadable.
    ArtifactUnavailable(String),

    /// Numeric failure inside the pipeline.
    Computation {
        /// Stage that failed.
        stage: Stage,
        /// Error message.
        message: String,
    },

    /// Generic error with message.
    Other(String),
}

impl Error {
    /// Whether the caller can correct this error by changing the request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput
                | Error::UnknownFeature(_)
                | Error::UnknownCategory(_)
                | Error::UnknownScaler(_)
                | Error::InvalidClusterCount { .. }
                | Error::InvalidParameter { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::UnknownFeature(name) => {
                write!(f, "unknown numeric feature '{name}'")
            }
            Error::UnknownCategory(name) => {
                write!(f, "unknown categorical column '{name}'")
            }
            Error::UnknownScaler(name) => {
                write!(f, "unknown scaler '{name}' (expected 'standard' or 'minmax')")
            }
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidClusterCount { requested, n_items } => {
                write!(f, "cannot create {requested} clusters from {n_items} items")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::ArtifactUnavailable(msg) => {
                write!(f, "trained pipeline artifact unavailable: {msg}")
            }
            Error::Computation { stage, message } => {
                write!(f, "computation failed in stage '{stage}': {message}")
            }
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
