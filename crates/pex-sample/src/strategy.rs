use std::collections::BTreeSet;

use indexmap::IndexMap;
use pex_core::{ErrorInfo, PexError, RngHandle};
use pex_doc::Node;
use serde::{Deserialize, Serialize};

use crate::boxes::{BoxAxis, BoxUlam};
use crate::point::ParameterPoint;
use crate::random::{RandomParameter, RandomPerParameter};

/// Produces the flat, ordered list of parameter points to explore.
///
/// Points come back with `run_id == 0`; repetitions are added afterwards by
/// [`crate::expand_runs`]. Implementations draw randomness only from the
/// supplied handle.
pub trait SamplingStrategy {
    /// Materializes every point, or fails with a sampling configuration error.
    fn points(&self, rng: &mut RngHandle) -> Result<Vec<ParameterPoint>, PexError>;
}

pub(crate) fn sampling_error(code: &str, message: impl Into<String>) -> PexError {
    PexError::Sampling(ErrorInfo::new(code, message))
}

pub(crate) fn ensure_distinct_addresses<'a>(
    addresses: impl IntoIterator<Item = &'a str>,
) -> Result<(), PexError> {
    let mut seen = BTreeSet::new();
    for address in addresses {
        if !seen.insert(address) {
            return Err(
                sampling_error("sampling.duplicate_address", "parameter address listed twice")
                    .with_address(address),
            );
        }
    }
    Ok(())
}

pub(crate) trait WithAddress {
    fn with_address(self, address: &str) -> Self;
}

impl WithAddress for PexError {
    fn with_address(self, address: &str) -> Self {
        match self {
            PexError::Sampling(info) => PexError::Sampling(info.with_context("address", address)),
            other => other,
        }
    }
}

/// Candidate values for one full-grid axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParameter {
    /// Document address of the varied leaf.
    pub address: String,
    /// Candidate values, in iteration order.
    pub values: Vec<Node>,
}

/// Cartesian product over independent candidate lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullGrid {
    /// Axes of the grid; the first axis varies slowest.
    pub parameters: Vec<GridParameter>,
}

impl SamplingStrategy for FullGrid {
    fn points(&self, _rng: &mut RngHandle) -> Result<Vec<ParameterPoint>, PexError> {
        ensure_distinct_addresses(self.parameters.iter().map(|p| p.address.as_str()))?;
        for parameter in &self.parameters {
            if parameter.values.is_empty() {
                return Err(sampling_error(
                    "sampling.empty_candidates",
                    "grid parameter has no candidate values",
                )
                .with_address(&parameter.address));
            }
        }
        let mut outputs = Vec::new();
        expand_grid(&self.parameters, 0, IndexMap::new(), &mut outputs);
        Ok(outputs
            .into_iter()
            .enumerate()
            .map(|(parameter_id, values)| ParameterPoint::new(parameter_id, values))
            .collect())
    }
}

fn expand_grid(
    params: &[GridParameter],
    idx: usize,
    current: IndexMap<String, Node>,
    outputs: &mut Vec<IndexMap<String, Node>>,
) {
    if idx == params.len() {
        outputs.push(current);
        return;
    }
    let param = &params[idx];
    for value in &param.values {
        let mut next = current.clone();
        next.insert(param.address.clone(), value.clone());
        expand_grid(params, idx + 1, next, outputs);
    }
}

/// Caller supplied list of assignments, passed through in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedList {
    /// One map per parameter setting; `parameter_id` is the list index.
    pub points: Vec<IndexMap<String, Node>>,
}

impl SamplingStrategy for UserDefinedList {
    fn points(&self, _rng: &mut RngHandle) -> Result<Vec<ParameterPoint>, PexError> {
        if self.points.is_empty() {
            return Err(sampling_error(
                "sampling.empty_list",
                "user defined strategy contains no points",
            ));
        }
        Ok(self
            .points
            .iter()
            .cloned()
            .enumerate()
            .map(|(parameter_id, values)| ParameterPoint::new(parameter_id, values))
            .collect())
    }
}

/// Serializable description of a sampling strategy, as written in study
/// files and shipped in remote bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StrategySpec {
    /// See [`FullGrid`].
    FullGrid {
        /// Grid axes.
        parameters: Vec<GridParameter>,
    },
    /// See [`UserDefinedList`].
    UserDefined {
        /// Explicit assignments.
        points: Vec<IndexMap<String, Node>>,
    },
    /// See [`RandomPerParameter`].
    Random {
        /// Number of rows drawn.
        count: usize,
        /// Per-parameter distributions.
        parameters: Vec<RandomParameter>,
    },
    /// See [`BoxUlam`].
    BoxUlam {
        /// One to three axes.
        axes: Vec<BoxAxis>,
    },
}

impl StrategySpec {
    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            StrategySpec::FullGrid { .. } => "full-grid",
            StrategySpec::UserDefined { .. } => "user-defined",
            StrategySpec::Random { .. } => "random",
            StrategySpec::BoxUlam { .. } => "box-ulam",
        }
    }

    /// Builds the box/Ulam strategy when this spec describes one.
    pub fn box_ulam(&self) -> Option<Result<BoxUlam, PexError>> {
        match self {
            StrategySpec::BoxUlam { axes } => Some(BoxUlam::new(axes.clone())),
            _ => None,
        }
    }
}

impl SamplingStrategy for StrategySpec {
    fn points(&self, rng: &mut RngHandle) -> Result<Vec<ParameterPoint>, PexError> {
        match self {
            StrategySpec::FullGrid { parameters } => FullGrid {
                parameters: parameters.clone(),
            }
            .points(rng),
            StrategySpec::UserDefined { points } => UserDefinedList {
                points: points.clone(),
            }
            .points(rng),
            StrategySpec::Random { count, parameters } => {
                RandomPerParameter::from_specs(*count, parameters)?.points(rng)
            }
            StrategySpec::BoxUlam { axes } => BoxUlam::new(axes.clone())?.points(rng),
        }
    }
}
