use pex_core::derive_substream_seed;
use serde::{Deserialize, Serialize};

use crate::address::PathAddress;
use crate::node::Node;

/// Identity of the job a variant is being prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext<'a> {
    /// Distinct variation setting.
    pub parameter_id: usize,
    /// Repetition of the setting.
    pub run_id: usize,
    /// Zero-padded job name, e.g. `000001_000000`.
    pub job_name: &'a str,
    /// Master seed of the batch.
    pub master_seed: u64,
}

/// Substitution applied to every variant after the sampled parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PostChange {
    /// Writes a per-job integer seed derived from the master seed.
    Seed {
        /// Integer leaf receiving the seed.
        address: PathAddress,
    },
    /// Writes the job name into a string leaf.
    Name {
        /// String leaf receiving the name.
        address: PathAddress,
    },
    /// Writes the same value into every variant.
    Set {
        /// Leaf to overwrite.
        address: PathAddress,
        /// Value written.
        value: Node,
    },
}

impl PostChange {
    /// Address targeted by the change.
    pub fn address(&self) -> &PathAddress {
        match self {
            PostChange::Seed { address }
            | PostChange::Name { address }
            | PostChange::Set { address, .. } => address,
        }
    }

    /// Value written for the given job.
    pub fn value_for(&self, ctx: &JobContext<'_>) -> Node {
        match self {
            PostChange::Seed { .. } => Node::Int(job_seed(ctx)),
            PostChange::Name { .. } => Node::String(ctx.job_name.to_string()),
            PostChange::Set { value, .. } => value.clone(),
        }
    }
}

/// Non-negative per-job seed, stable for a given `(master_seed, parameter_id, run_id)`.
pub fn job_seed(ctx: &JobContext<'_>) -> i64 {
    let substream = ((ctx.parameter_id as u64) << 32) | (ctx.run_id as u64 & 0xffff_ffff);
    (derive_substream_seed(ctx.master_seed, substream) >> 1) as i64
}
