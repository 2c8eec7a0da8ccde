//! Mixer client
//!
//! Off-chain half of the Solana mixer: notes and commitments, a mirror of
//! the program's Poseidon Merkle tree, and the encoding of Groth16 proofs
//! and public inputs for the withdraw instruction.
//!
//! The Poseidon oracle is built once with [`PoseidonOracle::setup`] and
//! shared by every component that hashes:
//!
//! ```no_run
//! use std::sync::Arc;
//! use mixer_client::{ClientConfig, MerkleAccumulator, NoteManager, PoseidonOracle};
//!
//! # fn main() -> mixer_client::Result<()> {
//! let config = ClientConfig::default();
//! let hasher = Arc::new(PoseidonOracle::setup()?);
//! let notes = NoteManager::new(hasher.clone());
//! let mut tree = MerkleAccumulator::with_root_history(config.tree_depth, config.root_history_size, hasher)?;
//! tree.initialize()?;
//!
//! let note = notes.generate(1_000_000_000)?;
//! tree.insert_leaf(0, note.commitment)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod instructions;
pub mod state;


pub use config::ClientConfig;
pub use crypto::{FieldElement, PoseidonOracle, ProofLayout};
pub use error::{MixerError, Result};
pub use state::{MerkleAccumulator, Note, NoteManager};
