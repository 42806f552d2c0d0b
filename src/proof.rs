//! The top-level proof wire type: everything a prover hands the verifier.
//! §6.

use serde::{Deserialize, Serialize};

use crate::pcs::CommitmentSchemeProof;

/// The whole proof, opaque to this crate beyond its field shape: the
/// consumer is responsible for serializing and deserializing it round-trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StarkProof {
    pub commitment_scheme_proof: CommitmentSchemeProof,
}
