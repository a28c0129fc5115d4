#![deny(missing_docs)]
#![doc = "Sampling strategies for pex: full grid, user-defined lists, per-parameter random draws and box/Ulam discretization with its empirical Markov model."]

pub mod boxes;
pub mod markov;
/// Parameter points, run expansion and identifier checks.
pub mod point;
/// Per-parameter random distributions.
pub mod random;
/// Strategy trait, grid and list strategies, serializable strategy descriptions.
pub mod strategy;

pub use boxes::{BoxAxis, BoxPartition, BoxUlam};
pub use markov::{EigenPair, MarkovBoxModel, MarkovReport};
pub use point::{ensure_unique_keys, expand_runs, ParameterPoint};
pub use random::{DistributionSpec, ParameterDistribution, RandomParameter, RandomPerParameter};
pub use strategy::{FullGrid, GridParameter, SamplingStrategy, StrategySpec, UserDefinedList};
