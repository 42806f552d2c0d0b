use thiserror::Error;

use crate::fri::FriVerificationError;
use crate::vcs::verifier::MerkleVerificationError;

/// Arithmetic-level failures, surfaced from the field layer.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("value is not a canonical field element")]
    NonCanonical,
    #[error("extension-field element has non-zero coordinates outside the base field")]
    NonBaseField,
}

/// Structural errors caught before any cryptographic check runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidStructureError {
    #[error("commitment scheme has no preprocessed trace")]
    MissingPreprocessedTrace,
    #[error("proof carries no commitments")]
    MissingCommitment,
    #[error("preprocessed column {0} is declared with inconsistent log sizes across components")]
    PreprocessedColumnSizeMismatch(usize),
    #[error("preprocessed column {0} was declared but never visited by any component")]
    PreprocessedColumnSizeMissing(usize),
    #[error("composition log size ({log_size}) does not exceed the composition log split ({split})")]
    CompositionLogSizeTooSmall { log_size: u32, split: u32 },
    #[error("invalid proof shape: {0}")]
    InvalidProofShape(String),
}

/// Proof-of-work grinding failure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("proof of work: found {found} leading zero bits, required {required}")]
pub struct ProofOfWorkError {
    pub found: u32,
    pub required: u32,
}

/// Top-level verification error. Every fallible verifier-facing operation
/// eventually surfaces one of these; there is no partial-success path.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    InvalidStructure(#[from] InvalidStructureError),
    #[error("out-of-domain sample does not match the claimed composition value")]
    OodsNotMatching,
    #[error(transparent)]
    Merkle(#[from] MerkleVerificationError),
    #[error(transparent)]
    Fri(#[from] FriVerificationError),
    #[error(transparent)]
    ProofOfWork(#[from] ProofOfWorkError),
    #[error(transparent)]
    Field(#[from] FieldError),
}
