//! Polynomial commitment scheme: ties the Merkle VCS, the FRI low-degree
//! test, and the per-row quotient construction together into one
//! verifier-facing commit/verify pair. §4.G.

pub mod commitment_scheme;
pub mod quotients;

pub use commitment_scheme::{CommitmentSchemeProof, CommitmentSchemeVerifier};
pub use quotients::ColumnSampleBatch;

use serde::{Deserialize, Serialize};

use crate::fri::FriConfig;

/// Number of base-field lanes a `QM31` decomposes into; the composition
/// tree always carries `2 * SECURE_EXTENSION_DEGREE` columns (§4.G).
pub const SECURE_EXTENSION_DEGREE: u32 = 4;

/// The composition polynomial is split into `2^COMPOSITION_LOG_SPLIT`
/// pieces before being decomposed into base-field lanes, giving the
/// composition tree `2 * SECURE_EXTENSION_DEGREE = 8` columns (§4.G).
pub const COMPOSITION_LOG_SPLIT: u32 = 1;

/// Top-level PCS configuration: the proof-of-work difficulty plus the
/// FRI parameters. §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcsConfig {
    pub pow_bits: u32,
    pub fri_config: FriConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_tree_has_eight_columns() {
        assert_eq!(2u32.pow(COMPOSITION_LOG_SPLIT) * SECURE_EXTENSION_DEGREE, 8);
    }
}
