pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
mod iou_matrix;
pub mod matcher;
pub mod metrics;
pub mod metrics_log;
pub mod report;
pub mod segment;

pub use checkpoint::*;
pub use error::{EvalError, EvalResult};
