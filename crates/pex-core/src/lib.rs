#![deny(missing_docs)]
#![doc = "Shared primitives for the pex parameter explorer: the error family, the seeded RNG handle, canonical serialization and provenance records."]

pub mod codec;
pub mod errors;
pub mod hash;
pub mod provenance;
pub mod rng;

pub use codec::{from_json_slice, from_yaml_slice, to_canonical_json_bytes, to_json_bytes};
pub use errors::{ErrorInfo, PexError};
pub use hash::stable_hash_string;
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};

/// Formats the canonical zero-padded job name `PPPPPP_RRRRRR` for the given width.
pub fn job_name(parameter_id: usize, run_id: usize, width: usize) -> String {
    format!("{parameter_id:0width$}_{run_id:0width$}")
}

#[cfg(test)]
mod tests {
    use super::job_name;

    #[test]
    fn job_names_are_zero_padded() {
        assert_eq!(job_name(1, 0, 6), "000001_000000");
        assert_eq!(job_name(12, 3, 2), "12_03");
        assert_eq!(job_name(123, 4, 2), "123_04");
    }
}
