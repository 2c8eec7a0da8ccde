//! Cryptographic primitives for the mixer client
//!
//! Field codec, Poseidon oracle, and the byte layouts shared with the
//! withdraw circuit and the on-chain verifier.

pub mod field;
pub mod poseidon;
pub mod proof_format;
pub mod public_inputs;
pub mod witness;

pub use field::{join_pubkey_halves, split_pubkey_halves, FieldElement};
pub use poseidon::{hash_commitment, hash_nullifier, hash_two_to_one, FieldHasher, PoseidonOracle};
pub use proof_format::{format_proof_for_verifier, FormattedProof, ProofLayout};
pub use public_inputs::{build_public_input_vector, decode_public_signals, PublicInputVector};
pub use witness::{build_circuit_witness, CircuitWitness, ProvingBackend};
