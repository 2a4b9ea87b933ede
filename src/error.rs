use std::path::PathBuf;
use thiserror::Error;

/// The error type for evaluation operations.
///
/// Computational edge cases (empty segment lists, zero unions, zero
/// denominators) never surface here; they are absorbed by the matcher and the
/// aggregator. Only structural and usage errors are reported.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A video was recorded after the checkpoint computed its metrics.
    #[error("Checkpoint {run_id} is finalized, cannot record video {video}")]
    CheckpointFinalized {
        /// The run the checkpoint belongs to.
        run_id: i64,
        /// The video that was rejected.
        video: String,
    },

    /// A video was recorded twice in the same evaluation pass.
    #[error("Video {video} was already recorded")]
    DuplicateVideo {
        /// The name of the duplicated video.
        video: String,
    },

    /// A video was matched with settings other than the checkpoint's.
    #[error("Video {video} was evaluated with other settings: {reason}")]
    IncompatibleEvaluation {
        /// The video that was rejected.
        video: String,
        /// Which setting differs.
        reason: String,
    },

    /// A ground-truth label is missing from the label dictionary.
    #[error("Unknown label {label:?} in {}", path.display())]
    UnknownLabel {
        /// The offending label text.
        label: String,
        /// The ground-truth file containing the label.
        path: PathBuf,
    },

    /// An output file already exists and overwriting was not requested.
    #[error("Output file already exists: {}", path.display())]
    OutputExists {
        /// The path that would have been overwritten.
        path: PathBuf,
    },

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A metrics row does not fit the header already written to the log.
    #[error("Metrics log header mismatch: expected {expected:?}, got {actual:?}")]
    HeaderMismatch {
        /// The columns of the existing header.
        expected: Vec<String>,
        /// The columns of the rejected row.
        actual: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A specialized `Result` type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
