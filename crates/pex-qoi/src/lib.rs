#![deny(missing_docs)]
#![doc = "Quantity-of-interest extraction and aggregation: reads tabular artifacts from job output directories and merges them into `(parameter_id, run_id)` keyed tables."]

/// Reading delimited artifacts from job output directories.
pub mod artifact;
/// Cross-job concatenation of QoI tables.
pub mod aggregate;
/// Index-column heuristics for artifacts without a metadata line.
pub mod fallback;
/// Per-job metadata and parameter tables.
pub mod metadata;

pub use aggregate::{AggregatedTable, Aggregator, QoiResult};
pub use artifact::{read_artifact, Delimiter, QoiTable};
pub use fallback::fallback_index_columns;
pub use metadata::{MetadataRow, MetadataTable, ParameterRow, ParameterTable};

use pex_core::{ErrorInfo, PexError};

pub(crate) fn qoi_error(code: &str, message: impl Into<String>) -> PexError {
    PexError::Qoi(ErrorInfo::new(code, message))
}

pub(crate) fn wrap_csv(code: &str, path: &std::path::Path, err: csv::Error) -> PexError {
    PexError::Qoi(
        ErrorInfo::new(code, "CSV table failure")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}
