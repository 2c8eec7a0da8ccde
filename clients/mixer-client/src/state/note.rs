//! Deposit notes
//!
//! A note is the depositor's secret: `(nullifier, secret, amount)`. Its
//! commitment goes into the tree at deposit time; the nullifier hash is
//! revealed at withdrawal.
//!
//! # Text format
//! ```text
//! <nullifier>-<secret>-<amount>
//! ```
//! Each part is a decimal (or `0x` hex) unsigned integer. This string is what
//! the user backs up; losing it loses the deposit.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::field::{parse_biguint, FieldElement};
use crate::crypto::poseidon::{hash_commitment, hash_nullifier, FieldHasher};
use crate::error::{MixerError, Result};

/// Separator between the parts of a note string
pub const NOTE_DELIMITER: char = '-';

/// Random bytes drawn per secret before reduction mod r
const SAMPLE_BYTES: usize = 64;

/// A deposit note as stored by the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub nullifier: FieldElement,
    pub secret: FieldElement,

    /// Poseidon(nullifier, secret)
    pub commitment: FieldElement,

    /// Deposit amount in lamports
    pub amount: u64,

    /// Creation time, unix milliseconds
    #[serde(rename = "timestamp")]
    pub created_at: u64,
}

impl Note {
    /// Assemble a note from stored parts without checking the commitment.
    pub fn from_parts(
        nullifier: FieldElement,
        secret: FieldElement,
        amount: u64,
        commitment: FieldElement,
    ) -> Self {
        Self {
            nullifier,
            secret,
            commitment,
            amount,
            created_at: now_millis(),
        }
    }

    /// Canonical `nullifier-secret-amount` string.
    pub fn to_note_string(&self) -> String {
        format!(
            "{}{NOTE_DELIMITER}{}{NOTE_DELIMITER}{}",
            self.nullifier, self.secret, self.amount
        )
    }
}

/// Creation time is bookkeeping, not identity.
impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.nullifier == other.nullifier
            && self.secret == other.secret
            && self.commitment == other.commitment
            && self.amount == other.amount
    }
}

impl Eq for Note {}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_note_string())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// NOTE MANAGER
// ============================================================================

/// Creates, parses and checks notes against the shared Poseidon oracle.
#[derive(Clone)]
pub struct NoteManager {
    hasher: Arc<dyn FieldHasher>,
}

impl NoteManager {
    pub fn new(hasher: Arc<dyn FieldHasher>) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &Arc<dyn FieldHasher> {
        &self.hasher
    }

    /// Fresh note with OS randomness.
    pub fn generate(&self, amount: u64) -> Result<Note> {
        self.generate_with_rng(&mut OsRng, amount)
    }

    /// Fresh note from the given CSPRNG. `nullifier` and `secret` are drawn
    /// independently and reduced mod r.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(&self, rng: &mut R, amount: u64) -> Result<Note> {
        let nullifier = sample_field(rng);
        let secret = sample_field(rng);
        let commitment = hash_commitment(self.hasher.as_ref(), &nullifier, &secret)?;

        debug!(amount, commitment = %commitment, "Note generated");
        Ok(Note::from_parts(nullifier, secret, amount, commitment))
    }

    pub fn commitment(&self, nullifier: &FieldElement, secret: &FieldElement) -> Result<FieldElement> {
        hash_commitment(self.hasher.as_ref(), nullifier, secret)
    }

    pub fn serialize(&self, note: &Note) -> String {
        note.to_note_string()
    }

    /// Parse a note string and recompute its commitment.
    ///
    /// Fails with `Parse` on a wrong part count, a part that is not an
    /// unsigned integer, a secret not below r or an amount above u64.
    pub fn parse(&self, text: &str) -> Result<Note> {
        let parts: Vec<&str> = text.trim().split(NOTE_DELIMITER).collect();
        let [nullifier, secret, amount] = parts.as_slice() else {
            return Err(MixerError::Parse(format!(
                "expected 3 '{NOTE_DELIMITER}'-separated parts, found {}",
                parts.len()
            )));
        };

        let nullifier = parse_field_part("nullifier", nullifier)?;
        let secret = parse_field_part("secret", secret)?;
        let amount = parse_amount(amount)?;

        let commitment = self.commitment(&nullifier, &secret)?;
        Ok(Note::from_parts(nullifier, secret, amount, commitment))
    }

    /// Recompute the commitment and compare.
    ///
    /// Best-effort: a hashing failure counts as invalid. Use
    /// [`Self::ensure_valid`] to get the error instead.
    pub fn validate(&self, note: &Note) -> bool {
        self.commitment(&note.nullifier, &note.secret)
            .map(|commitment| commitment == note.commitment)
            .unwrap_or(false)
    }

    /// Like [`Self::validate`], but reports a mismatch as `Validation`.
    pub fn ensure_valid(&self, note: &Note) -> Result<()> {
        if self.commitment(&note.nullifier, &note.secret)? != note.commitment {
            return Err(MixerError::Validation);
        }
        Ok(())
    }

    /// Poseidon(nullifier), revealed at withdrawal.
    pub fn nullifier_hash(&self, note: &Note) -> Result<FieldElement> {
        hash_nullifier(self.hasher.as_ref(), &note.nullifier)
    }
}

fn sample_field<R: RngCore + CryptoRng>(rng: &mut R) -> FieldElement {
    let mut bytes = [0u8; SAMPLE_BYTES];
    rng.fill_bytes(&mut bytes);
    FieldElement::from_biguint_reduced(&BigUint::from_bytes_be(&bytes))
}

fn parse_field_part(name: &str, text: &str) -> Result<FieldElement> {
    let value = parse_biguint(text).map_err(|_| MixerError::Parse(format!("{name} '{text}' is not an integer")))?;
    FieldElement::from_biguint(&value)
        .map_err(|_| MixerError::Parse(format!("{name} is not a valid field element")))
}

fn parse_amount(text: &str) -> Result<u64> {
    let value = parse_biguint(text).map_err(|_| MixerError::Parse(format!("amount '{text}' is not an integer")))?;
    u64::try_from(value).map_err(|_| MixerError::Parse(format!("amount '{text}' does not fit in u64")))
}
