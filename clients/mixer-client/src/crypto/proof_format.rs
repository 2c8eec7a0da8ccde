//! Groth16 proof and verifying key byte layout
//!
//! Re-encodes snarkjs JSON output into the fixed-width arrays the on-chain
//! verifier consumes.
//!
//! # Proof Format (256 bytes)
//! - A: G1 point (64 bytes) = x || y
//! - B: G2 point (128 bytes) = four 32-byte limbs, order per [`G2LimbOrder`]
//! - C: G1 point (64 bytes) = x || y
//!
//! All coordinates are big-endian elements of the BN254 base field.
//!
//! # G2 limb order
//! snarkjs writes a G2 point as `[[x_c0, x_c1], [y_c0, y_c1]]`. The
//! web client copied limbs in that order ([`G2LimbOrder::Natural`]). Verifiers
//! built on EIP-197 / Solana's `alt_bn128` syscalls expect the imaginary limb
//! first ([`G2LimbOrder::Swapped`]) and, for groth16-solana, `-A` in place of
//! `A`. The target verifier decides; [`ProofLayout`] makes the choice explicit.

use serde::{Deserialize, Serialize};

use super::field::{encode_coordinate, negate_g1, parse_biguint, G1Point, G2Point, FIELD_BYTES};
use super::public_inputs::PUBLIC_INPUT_COUNT;
use crate::error::{MixerError, Result};

/// Total proof size: A (64) + B (128) + C (64)
pub const PROOF_DATA_LEN: usize = 256;

pub const G1_POINT_LEN: usize = 64;
pub const G2_POINT_LEN: usize = 128;

// ============================================================================
// LAYOUT
// ============================================================================

/// Order of the four 32-byte limbs of an encoded G2 point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum G2LimbOrder {
    /// x_c0, x_c1, y_c0, y_c1
    #[default]
    Natural,

    /// x_c1, x_c0, y_c1, y_c0
    Swapped,
}

/// Byte layout expected by the target verifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLayout {
    pub g2_limbs: G2LimbOrder,

    /// Replace `proof_a` by its negation
    pub negate_a: bool,
}

impl ProofLayout {
    /// snarkjs limb order, A as produced. Matches the web frontend.
    pub const fn natural() -> Self {
        Self {
            g2_limbs: G2LimbOrder::Natural,
            negate_a: false,
        }
    }

    /// EIP-197 limb order with negated A (groth16-solana / `alt_bn128`).
    pub const fn alt_bn128() -> Self {
        Self {
            g2_limbs: G2LimbOrder::Swapped,
            negate_a: true,
        }
    }
}

impl Default for ProofLayout {
    fn default() -> Self {
        Self::natural()
    }
}

// ============================================================================
// SNARKJS JSON
// ============================================================================

/// `proof.json` as written by snarkjs.
///
/// Points are in projective form; the trailing `"1"` (or `["1", "0"]`) is
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGroth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

impl RawGroth16Proof {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `verification_key.json` as written by snarkjs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVerifyingKey {
    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub curve: Option<String>,

    #[serde(rename = "nPublic", default)]
    pub n_public: Option<usize>,

    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,

    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

impl RawVerifyingKey {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// ENCODED PROOF
// ============================================================================

/// Groth16 proof ready for the withdraw instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedProof {
    /// Point A ∈ G1 (uncompressed, 64 bytes)
    pub proof_a: G1Point,

    /// Point B ∈ G2 (uncompressed, 128 bytes)
    pub proof_b: G2Point,

    /// Point C ∈ G1 (uncompressed, 64 bytes)
    pub proof_c: G1Point,
}

impl FormattedProof {
    /// Parse proof from its 256-byte `A || B || C` encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != PROOF_DATA_LEN {
            return Err(MixerError::Decode(format!(
                "proof must be {PROOF_DATA_LEN} bytes, got {}",
                data.len()
            )));
        }

        let mut proof = FormattedProof {
            proof_a: [0u8; G1_POINT_LEN],
            proof_b: [0u8; G2_POINT_LEN],
            proof_c: [0u8; G1_POINT_LEN],
        };

        proof.proof_a.copy_from_slice(&data[0..64]);
        proof.proof_b.copy_from_slice(&data[64..192]);
        proof.proof_c.copy_from_slice(&data[192..256]);

        Ok(proof)
    }

    pub fn to_bytes(&self) -> [u8; PROOF_DATA_LEN] {
        let mut bytes = [0u8; PROOF_DATA_LEN];
        bytes[0..64].copy_from_slice(&self.proof_a);
        bytes[64..192].copy_from_slice(&self.proof_b);
        bytes[192..256].copy_from_slice(&self.proof_c);
        bytes
    }
}

/// Encode a snarkjs proof for the verifier.
///
/// Pure; fails with `Decode` only when a coordinate is malformed or not
/// below the base field modulus.
pub fn format_proof_for_verifier(raw: &RawGroth16Proof, layout: ProofLayout) -> Result<FormattedProof> {
    let mut proof_a = encode_g1(&raw.pi_a)?;
    if layout.negate_a {
        proof_a = negate_g1(&proof_a)?;
    }

    Ok(FormattedProof {
        proof_a,
        proof_b: encode_g2(&raw.pi_b, layout.g2_limbs)?,
        proof_c: encode_g1(&raw.pi_c)?,
    })
}

// ============================================================================
// ENCODED VERIFYING KEY
// ============================================================================

/// Verifying key in the verifier's byte layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedVerifyingKey {
    pub alpha_g1: G1Point,
    pub beta_g2: G2Point,
    pub gamma_g2: G2Point,
    pub delta_g2: G2Point,

    /// One point per public input, plus the constant term
    pub ic: Vec<G1Point>,
}

impl FormattedVerifyingKey {
    pub fn nr_public_inputs(&self) -> usize {
        self.ic.len().saturating_sub(1)
    }
}

/// Encode a snarkjs verifying key.
///
/// The key must be for the withdraw circuit: `IC` holds exactly one point
/// per public input plus one, otherwise `ProtocolMismatch`.
pub fn format_verifying_key(raw: &RawVerifyingKey, layout: ProofLayout) -> Result<FormattedVerifyingKey> {
    let expected_ic = PUBLIC_INPUT_COUNT + 1;
    if raw.ic.len() != expected_ic {
        return Err(MixerError::ProtocolMismatch(format!(
            "verifying key has {} IC points, withdraw circuit needs {expected_ic}",
            raw.ic.len()
        )));
    }
    if let Some(n_public) = raw.n_public {
        if n_public != PUBLIC_INPUT_COUNT {
            return Err(MixerError::ProtocolMismatch(format!(
                "verifying key declares {n_public} public inputs, withdraw circuit has {PUBLIC_INPUT_COUNT}"
            )));
        }
    }

    Ok(FormattedVerifyingKey {
        alpha_g1: encode_g1(&raw.vk_alpha_1)?,
        beta_g2: encode_g2(&raw.vk_beta_2, layout.g2_limbs)?,
        gamma_g2: encode_g2(&raw.vk_gamma_2, layout.g2_limbs)?,
        delta_g2: encode_g2(&raw.vk_delta_2, layout.g2_limbs)?,
        ic: raw.ic.iter().map(|point| encode_g1(point)).collect::<Result<_>>()?,
    })
}

// ============================================================================
// POINT ENCODING
// ============================================================================

fn coordinate(text: &str) -> Result<[u8; FIELD_BYTES]> {
    encode_coordinate(&parse_biguint(text)?)
}

/// `x || y`, each 32 bytes big-endian.
pub fn encode_g1(point: &[String]) -> Result<G1Point> {
    let (x, y) = match point {
        [x, y, ..] => (x, y),
        _ => {
            return Err(MixerError::Decode(format!(
                "G1 point needs 2 coordinates, got {}",
                point.len()
            )))
        }
    };

    let mut out = [0u8; G1_POINT_LEN];
    out[..32].copy_from_slice(&coordinate(x)?);
    out[32..].copy_from_slice(&coordinate(y)?);
    Ok(out)
}

/// Four 32-byte limbs in the requested order.
pub fn encode_g2(point: &[Vec<String>], order: G2LimbOrder) -> Result<G2Point> {
    let (x, y) = match point {
        [x, y, ..] if x.len() >= 2 && y.len() >= 2 => (x, y),
        _ => {
            return Err(MixerError::Decode(
                "G2 point needs 2 coordinates of 2 limbs each".to_string(),
            ))
        }
    };

    let limbs = match order {
        G2LimbOrder::Natural => [&x[0], &x[1], &y[0], &y[1]],
        G2LimbOrder::Swapped => [&x[1], &x[0], &y[1], &y[0]],
    };

    let mut out = [0u8; G2_POINT_LEN];
    for (limb, chunk) in limbs.iter().zip(out.chunks_mut(FIELD_BYTES)) {
        chunk.copy_from_slice(&coordinate(limb)?);
    }
    Ok(out)
}
