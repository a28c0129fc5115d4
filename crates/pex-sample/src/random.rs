use indexmap::IndexMap;
use pex_core::{PexError, RngHandle};
use pex_doc::Node;
use rand::distributions::{Bernoulli, Distribution, Uniform};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::point::ParameterPoint;
use crate::strategy::{ensure_distinct_addresses, sampling_error, SamplingStrategy, WithAddress};

/// A source of `count` independent draws for one parameter.
pub trait ParameterDistribution: Send + Sync {
    /// Draws exactly `count` values or fails with a sampling error.
    fn sample(&self, count: usize, rng: &mut RngHandle) -> Result<Vec<Node>, PexError>;
}

/// Built-in distributions available from study files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DistributionSpec {
    /// Continuous uniform on `[low, high)`.
    Uniform {
        /// Inclusive lower bound.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },
    /// Discrete uniform on `[low, high]`.
    Integer {
        /// Inclusive lower bound.
        low: i64,
        /// Inclusive upper bound.
        high: i64,
    },
    /// Uniform choice among explicit values.
    Choice {
        /// Candidate values.
        values: Vec<Node>,
    },
    /// `true` with probability `p`.
    Bernoulli {
        /// Success probability.
        p: f64,
    },
}

impl ParameterDistribution for DistributionSpec {
    fn sample(&self, count: usize, rng: &mut RngHandle) -> Result<Vec<Node>, PexError> {
        match self {
            DistributionSpec::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite() && low < high && (high - low).is_finite()) {
                    return Err(sampling_error(
                        "sampling.distribution",
                        format!("uniform bounds must be finite with low < high and a finite span, got [{low}, {high})"),
                    ));
                }
                let dist = Uniform::new(*low, *high);
                Ok((0..count).map(|_| Node::Float(dist.sample(rng))).collect())
            }
            DistributionSpec::Integer { low, high } => {
                if low > high {
                    return Err(sampling_error(
                        "sampling.distribution",
                        format!("integer bounds must satisfy low <= high, got [{low}, {high}]"),
                    ));
                }
                let dist = Uniform::new_inclusive(*low, *high);
                Ok((0..count).map(|_| Node::Int(dist.sample(rng))).collect())
            }
            DistributionSpec::Choice { values } => {
                if values.is_empty() {
                    return Err(sampling_error(
                        "sampling.distribution",
                        "choice distribution has no values",
                    ));
                }
                Ok((0..count)
                    .filter_map(|_| values.choose(rng).cloned())
                    .collect())
            }
            DistributionSpec::Bernoulli { p } => {
                let dist = Bernoulli::new(*p).map_err(|err| {
                    sampling_error("sampling.distribution", format!("bernoulli p={p}: {err}"))
                })?;
                Ok((0..count).map(|_| Node::Bool(dist.sample(rng))).collect())
            }
        }
    }
}

/// Distribution bound to a document address, as written in study files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomParameter {
    /// Document address of the varied leaf.
    pub address: String,
    /// Distribution drawn from.
    pub distribution: DistributionSpec,
}

/// Independent per-parameter draws zipped row-wise into `count` points.
pub struct RandomPerParameter {
    count: usize,
    parameters: Vec<(String, Box<dyn ParameterDistribution>)>,
}

impl RandomPerParameter {
    /// Creates an empty strategy drawing `count` rows.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            parameters: Vec::new(),
        }
    }

    /// Binds a distribution to an address.
    pub fn with_parameter(
        mut self,
        address: impl Into<String>,
        distribution: impl ParameterDistribution + 'static,
    ) -> Self {
        self.parameters.push((address.into(), Box::new(distribution)));
        self
    }

    /// Builds the strategy from serialized parameter descriptions.
    pub fn from_specs(count: usize, specs: &[RandomParameter]) -> Result<Self, PexError> {
        Ok(specs.iter().fold(Self::new(count), |strategy, spec| {
            strategy.with_parameter(spec.address.clone(), spec.distribution.clone())
        }))
    }
}

impl SamplingStrategy for RandomPerParameter {
    fn points(&self, rng: &mut RngHandle) -> Result<Vec<ParameterPoint>, PexError> {
        if self.count == 0 {
            return Err(sampling_error(
                "sampling.count",
                "random strategy needs a positive count",
            ));
        }
        if self.parameters.is_empty() {
            return Err(sampling_error(
                "sampling.empty_parameters",
                "random strategy has no parameters",
            ));
        }
        ensure_distinct_addresses(self.parameters.iter().map(|(address, _)| address.as_str()))?;

        let mut rows: Vec<IndexMap<String, Node>> = vec![IndexMap::new(); self.count];
        for (address, distribution) in &self.parameters {
            let draws = distribution
                .sample(self.count, rng)
                .map_err(|err| err.with_address(address))?;
            if draws.len() != self.count {
                return Err(sampling_error(
                    "sampling.distribution",
                    format!(
                        "distribution returned {} draws for count {}",
                        draws.len(),
                        self.count
                    ),
                )
                .with_address(address));
            }
            for (row, value) in rows.iter_mut().zip(draws) {
                row.insert(address.clone(), value);
            }
        }
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(parameter_id, values)| ParameterPoint::new(parameter_id, values))
            .collect())
    }
}

impl std::fmt::Debug for RandomPerParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomPerParameter")
            .field("count", &self.count)
            .field(
                "addresses",
                &self.parameters.iter().map(|(a, _)| a).collect::<Vec<_>>(),
            )
            .finish()
    }
}
