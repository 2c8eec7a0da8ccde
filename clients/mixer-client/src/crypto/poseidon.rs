//! Poseidon hash oracle
//!
//! # Parameters
//! Circomlib-compatible Poseidon over the BN254 scalar field, as used by the
//! withdraw circuit and the on-chain program:
//! - t = 2 for one input (nullifier hash)
//! - t = 3 for two inputs (commitment, Merkle nodes)
//! - x^5 S-box, RF = 8, RP per circomlib's table for each width
//!
//! ```text
//! commitment     = Poseidon(nullifier, secret)
//! nullifier_hash = Poseidon(nullifier)
//! node           = Poseidon(left, right)
//! ```
//!
//! Building the round constants is the slow part. [`PoseidonOracle::setup`]
//! does it once and the resulting oracle is shared by reference.

use std::sync::Mutex;
use std::time::Instant;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use tracing::info;

use super::field::FieldElement;
use crate::error::{MixerError, Result};

/// Fixed-arity hash over field elements.
///
/// Implementations must be deterministic and stateless from the caller's
/// point of view.
pub trait FieldHasher: Send + Sync {
    fn hash1(&self, x: &FieldElement) -> Result<FieldElement>;

    fn hash2(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement>;
}

/// Poseidon hashers for arities 1 and 2, built once.
pub struct PoseidonOracle {
    one: Mutex<Poseidon<Fr>>,
    two: Mutex<Poseidon<Fr>>,
}

impl PoseidonOracle {
    /// Build the Poseidon parameters. Failure is a configuration error and
    /// is not retried.
    pub fn setup() -> Result<Self> {
        let started = Instant::now();

        let one = Poseidon::<Fr>::new_circom(1).map_err(|e| MixerError::HashInit(e.to_string()))?;
        let two = Poseidon::<Fr>::new_circom(2).map_err(|e| MixerError::HashInit(e.to_string()))?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Poseidon oracle ready"
        );

        Ok(Self {
            one: Mutex::new(one),
            two: Mutex::new(two),
        })
    }

    fn hash_with(hasher: &Mutex<Poseidon<Fr>>, inputs: &[Fr]) -> Result<FieldElement> {
        let mut hasher = hasher
            .lock()
            .map_err(|_| MixerError::Hash("hasher lock poisoned".to_string()))?;
        let output = hasher
            .hash(inputs)
            .map_err(|e| MixerError::Hash(e.to_string()))?;
        fr_to_field(output)
    }
}

impl FieldHasher for PoseidonOracle {
    fn hash1(&self, x: &FieldElement) -> Result<FieldElement> {
        Self::hash_with(&self.one, &[field_to_fr(x)])
    }

    fn hash2(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement> {
        Self::hash_with(&self.two, &[field_to_fr(left), field_to_fr(right)])
    }
}

/// Lossless: a `FieldElement` is always below `r`.
fn field_to_fr(value: &FieldElement) -> Fr {
    Fr::from_be_bytes_mod_order(value.as_bytes())
}

fn fr_to_field(value: Fr) -> Result<FieldElement> {
    let bytes = value.into_bigint().to_bytes_be();
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| MixerError::Hash(format!("unexpected digest width {}", bytes.len())))?;
    FieldElement::from_bytes_be(&bytes)
}

// ============================================================================
// PROTOCOL HASHES
// ============================================================================

/// Hash two child nodes into their parent.
pub fn hash_two_to_one(
    hasher: &dyn FieldHasher,
    left: &FieldElement,
    right: &FieldElement,
) -> Result<FieldElement> {
    hasher.hash2(left, right)
}

/// commitment = Poseidon(nullifier, secret)
pub fn hash_commitment(
    hasher: &dyn FieldHasher,
    nullifier: &FieldElement,
    secret: &FieldElement,
) -> Result<FieldElement> {
    hasher.hash2(nullifier, secret)
}

/// nullifier_hash = Poseidon(nullifier)
///
/// Revealed at withdrawal; the program refuses a second withdrawal with the
/// same value.
pub fn hash_nullifier(hasher: &dyn FieldHasher, nullifier: &FieldElement) -> Result<FieldElement> {
    hasher.hash1(nullifier)
}
