use std::collections::BTreeSet;

use indexmap::IndexMap;
use pex_core::{ErrorInfo, PexError};
use pex_doc::Node;
use serde::{Deserialize, Serialize};

/// One parameter assignment to explore, keyed by `(parameter_id, run_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    /// Distinct variation setting.
    pub parameter_id: usize,
    /// Repetition of the same setting.
    pub run_id: usize,
    /// Address string to value.
    pub values: IndexMap<String, Node>,
    /// Originating box for box/Ulam sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_id: Option<usize>,
}

impl ParameterPoint {
    /// Creates the first run of a parameter setting.
    pub fn new(parameter_id: usize, values: IndexMap<String, Node>) -> Self {
        Self {
            parameter_id,
            run_id: 0,
            values,
            box_id: None,
        }
    }

    /// Composite key of the point.
    pub fn key(&self) -> (usize, usize) {
        (self.parameter_id, self.run_id)
    }
}

/// Expands every point into `run_count` copies that share `parameter_id`
/// and are enumerated by `run_id`, parameter-major.
pub fn expand_runs(points: &[ParameterPoint], run_count: usize) -> Result<Vec<ParameterPoint>, PexError> {
    if run_count == 0 {
        return Err(PexError::Sampling(ErrorInfo::new(
            "sampling.run_count",
            "run count must be at least 1",
        )));
    }
    let mut expanded = Vec::with_capacity(points.len() * run_count);
    for point in points {
        for run_id in 0..run_count {
            let mut copy = point.clone();
            copy.run_id = run_id;
            expanded.push(copy);
        }
    }
    Ok(expanded)
}

/// Rejects point sets where two points share `(parameter_id, run_id)`.
pub fn ensure_unique_keys(points: &[ParameterPoint]) -> Result<(), PexError> {
    let mut seen = BTreeSet::new();
    for point in points {
        if !seen.insert(point.key()) {
            return Err(PexError::Sampling(
                ErrorInfo::new("sampling.duplicate_id", "duplicate job identifier")
                    .with_context("parameter_id", point.parameter_id.to_string())
                    .with_context("run_id", point.run_id.to_string()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: usize) -> ParameterPoint {
        let mut values = IndexMap::new();
        values.insert("speed".to_string(), Node::Float(id as f64));
        ParameterPoint::new(id, values)
    }

    #[test]
    fn runs_expand_parameter_major() {
        let expanded = expand_runs(&[point(0), point(1)], 3).unwrap();
        let keys: Vec<_> = expanded.iter().map(ParameterPoint::key).collect();
        assert_eq!(keys, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(expanded[4].values, point(1).values);
    }

    #[test]
    fn zero_runs_is_a_configuration_error() {
        assert!(expand_runs(&[point(0)], 0).is_err());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = ensure_unique_keys(&[point(2), point(2)]).unwrap_err();
        assert_eq!(err.info().code, "sampling.duplicate_id");
        assert!(ensure_unique_keys(&[point(1), point(2)]).is_ok());
    }
}
