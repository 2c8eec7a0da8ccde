//! Unified error type for the mixer client.
//!
//! Every failure is a distinct variant with its own message so a caller can
//! tell a malformed note apart from a note whose secrets do not match its
//! commitment.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MixerError {
    // ========== Merkle Accumulator Errors ==========

    /// Operation attempted before `initialize()`
    #[error("Merkle accumulator is not initialized")]
    NotInitialized,

    /// `initialize()` called twice
    #[error("Merkle accumulator is already initialized")]
    AlreadyInitialized,

    /// Tree depth outside the supported range
    #[error("Invalid tree depth {0}: must be between 1 and 32")]
    InvalidTreeDepth(u8),

    /// Leaf index does not fit in the tree
    #[error("Leaf index {index} out of range: tree holds {capacity} leaves")]
    LeafIndexOutOfRange { index: u64, capacity: u64 },

    /// No leaf has been inserted at this index
    #[error("No leaf inserted at index {0}")]
    UnknownLeaf(u64),

    /// Replayed tree does not reproduce the authoritative root
    #[error("Merkle root mismatch: expected {expected}, local tree has {actual}")]
    RootMismatch { expected: String, actual: String },

    /// Membership proof was generated against an older tree state
    #[error("Stale membership proof: generated at tree version {proof_version}, tree is at version {tree_version}")]
    StaleProof { proof_version: u64, tree_version: u64 },

    // ========== Encoding Errors ==========

    /// Byte string or integer outside the valid field range
    #[error("Decode error: {0}")]
    Decode(String),

    // ========== Note Errors ==========

    /// Note text is malformed
    #[error("Malformed note: {0}")]
    Parse(String),

    /// Note secrets do not hash to its commitment
    #[error("Note is corrupt: nullifier and secret do not match the commitment")]
    Validation,

    /// The tree leaf at the note's index is a different commitment
    #[error("Leaf {index} in the tree does not match the note commitment")]
    LeafMismatch { index: u64 },

    /// Relayer fee exceeds the note amount
    #[error("Relayer fee {fee} exceeds note amount {amount}")]
    FeeExceedsAmount { fee: u64, amount: u64 },

    // ========== Proof Errors ==========

    /// Public signal order or count disagrees with the circuit contract
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The proving backend failed
    #[error("Proof generation failed: {0}")]
    Prover(String),

    // ========== Hash Oracle Errors ==========

    /// Poseidon parameters could not be built
    #[error("Failed to initialize Poseidon: {0}")]
    HashInit(String),

    /// Poseidon rejected its input
    #[error("Poseidon hash failed: {0}")]
    Hash(String),

    // ========== Storage / Configuration Errors ==========

    /// Note store failure
    #[error("Note storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MixerError>;
