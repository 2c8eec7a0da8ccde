//! BN254 field codec
//!
//! Converts between field elements and the fixed-width big-endian byte arrays
//! used at the program boundary.
//!
//! ## Two moduli
//! - Scalar field `r`: hash inputs/outputs, commitments, public signals.
//! - Base field `p`: coordinates of G1/G2 proof points.
//!
//! Anything decoded from bytes or text is rejected when it is not below the
//! relevant modulus; nothing is silently reduced except fresh randomness.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{Num, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_program::pubkey::Pubkey;

use crate::error::{MixerError, Result};

// ============================================================================
// BN254 CURVE PARAMETERS
// ============================================================================

/// BN254 base field modulus (p) - big-endian bytes
/// p = 21888242871839275222246405745257275088696311157297823662689037894645226208583
pub const BN254_FIELD_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x97, 0x81, 0x6a, 0x91, 0x68, 0x71, 0xca, 0x8d,
    0x3c, 0x20, 0x8c, 0x16, 0xd8, 0x7c, 0xfd, 0x47,
];

/// BN254 scalar field modulus (r) - order of G1 - big-endian bytes
/// r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
pub const BN254_SCALAR_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91,
    0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// Width of one encoded field element.
pub const FIELD_BYTES: usize = 32;

/// Width of one half of a split public key.
const PUBKEY_HALF_BYTES: usize = 16;

pub fn scalar_modulus() -> BigUint {
    BigUint::from_bytes_be(&BN254_SCALAR_MODULUS)
}

pub fn base_modulus() -> BigUint {
    BigUint::from_bytes_be(&BN254_FIELD_MODULUS)
}

// ============================================================================
// FIELD ELEMENT
// ============================================================================

/// An element of the BN254 scalar field, held in canonical big-endian form.
///
/// The inner bytes are always strictly below `r`; every constructor that can
/// see an out-of-range value returns `MixerError::Decode`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement([u8; FIELD_BYTES]);

impl FieldElement {
    pub const ZERO: Self = Self([0u8; FIELD_BYTES]);

    /// Decode a big-endian 32-byte value, rejecting anything `>= r`.
    pub fn from_bytes_be(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        if !is_valid_scalar(bytes) {
            return Err(MixerError::Decode(format!(
                "0x{} is not below the BN254 scalar modulus",
                hex(bytes)
            )));
        }
        Ok(Self(*bytes))
    }

    /// Big-endian, left-padded encoding.
    pub fn to_bytes_be(&self) -> [u8; FIELD_BYTES] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; FIELD_BYTES];
        bytes[24..32].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; FIELD_BYTES];
        bytes[16..32].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Strict conversion: fails if `value >= r`.
    pub fn from_biguint(value: &BigUint) -> Result<Self> {
        to_bytes32(value).map(Self)
    }

    /// Reduce an arbitrary integer into `[0, r)`. Only meant for sampling.
    pub fn from_biguint_reduced(value: &BigUint) -> Self {
        let reduced = value % scalar_modulus();
        Self(pad_be(&reduced))
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_biguint())
    }
}

/// Parses a decimal string, or hex when prefixed with `0x`.
impl FromStr for FieldElement {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self> {
        let value = parse_biguint(s)?;
        Self::from_biguint(&value)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// CODEC FUNCTIONS
// ============================================================================

/// Check that 32 big-endian bytes are below the scalar modulus.
///
/// Fixed-width big-endian arrays compare lexicographically in numeric order.
pub fn is_valid_scalar(bytes: &[u8; FIELD_BYTES]) -> bool {
    *bytes < BN254_SCALAR_MODULUS
}

/// Encode an integer as a 32-byte big-endian scalar field element.
pub fn to_bytes32(value: &BigUint) -> Result<[u8; FIELD_BYTES]> {
    if *value >= scalar_modulus() {
        return Err(MixerError::Decode(format!(
            "{value} is not below the BN254 scalar modulus"
        )));
    }
    Ok(pad_be(value))
}

pub fn from_bytes32(bytes: &[u8; FIELD_BYTES]) -> Result<FieldElement> {
    FieldElement::from_bytes_be(bytes)
}

/// Encode a curve point coordinate (base field element).
pub fn encode_coordinate(value: &BigUint) -> Result<[u8; FIELD_BYTES]> {
    if *value >= base_modulus() {
        return Err(MixerError::Decode(format!(
            "coordinate {value} is not below the BN254 base field modulus"
        )));
    }
    Ok(pad_be(value))
}

/// Parse a decimal (or `0x`-prefixed hex) unsigned integer.
///
/// Only digits are accepted: no sign, no separators, no whitespace.
pub fn parse_biguint(text: &str) -> Result<BigUint> {
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(rest) => (rest, 16),
        None => (text, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(MixerError::Decode(format!("'{text}' is not an unsigned integer")));
    }
    BigUint::from_str_radix(digits, radix)
        .map_err(|e| MixerError::Decode(format!("'{text}': {e}")))
}

/// Left-pad a value known to fit in 256 bits.
fn pad_be(value: &BigUint) -> [u8; FIELD_BYTES] {
    let mut bytes = [0u8; FIELD_BYTES];
    if value.is_zero() {
        return bytes;
    }
    let raw = value.to_bytes_be();
    let start = FIELD_BYTES - raw.len().min(FIELD_BYTES);
    bytes[start..].copy_from_slice(&raw[raw.len().saturating_sub(FIELD_BYTES)..]);
    bytes
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Convert u64 to a field element (big-endian, value in the last 8 bytes).
///
/// Used for the relayer fee public input.
#[inline]
pub fn u64_to_field(value: u64) -> FieldElement {
    FieldElement::from_u64(value)
}

// ============================================================================
// PUBLIC KEY SPLITTING
// ============================================================================

/// Split a 32-byte public key into two 16-byte halves, each a field element.
///
/// A raw 256-bit key does not always fit below `r`, so the circuit takes it
/// as `(key[0..16], key[16..32])`, each read as a big-endian integer.
pub fn split_pubkey_halves(pubkey: &Pubkey) -> (FieldElement, FieldElement) {
    let bytes = pubkey.to_bytes();
    let mut high = [0u8; PUBKEY_HALF_BYTES];
    let mut low = [0u8; PUBKEY_HALF_BYTES];
    high.copy_from_slice(&bytes[..PUBKEY_HALF_BYTES]);
    low.copy_from_slice(&bytes[PUBKEY_HALF_BYTES..]);
    (
        FieldElement::from_u128(u128::from_be_bytes(high)),
        FieldElement::from_u128(u128::from_be_bytes(low)),
    )
}

/// Inverse of [`split_pubkey_halves`], as done by the withdraw handler.
pub fn join_pubkey_halves(part1: &FieldElement, part2: &FieldElement) -> Result<Pubkey> {
    let mut key = [0u8; 32];
    for (half, out) in [part1, part2].iter().zip(key.chunks_mut(PUBKEY_HALF_BYTES)) {
        let bytes = half.as_bytes();
        if bytes[..FIELD_BYTES - PUBKEY_HALF_BYTES].iter().any(|&b| b != 0) {
            return Err(MixerError::Decode(format!(
                "public key half {half} does not fit in 128 bits"
            )));
        }
        out.copy_from_slice(&bytes[FIELD_BYTES - PUBKEY_HALF_BYTES..]);
    }
    Ok(Pubkey::new_from_array(key))
}

// ============================================================================
// G1 POINT OPERATIONS
// ============================================================================

/// G1 point in uncompressed form (64 bytes: x || y, big-endian).
pub type G1Point = [u8; 64];

/// G2 point in uncompressed form (128 bytes, four limbs).
pub type G2Point = [u8; 128];

/// G1 identity (point at infinity) - all zeros.
pub const G1_IDENTITY: G1Point = [0u8; 64];

/// Check if a G1 point is the identity (point at infinity).
pub fn is_g1_identity(point: &G1Point) -> bool {
    point.iter().all(|&b| b == 0)
}

/// Negate a G1 point: -P = (x, p - y).
///
/// The Solana `alt_bn128` pairing check takes `-A`, so verifiers built on
/// it expect `proof_a` already negated.
pub fn negate_g1(point: &G1Point) -> Result<G1Point> {
    if is_g1_identity(point) {
        return Ok(*point);
    }

    let y = BigUint::from_bytes_be(&point[32..64]);
    let p = base_modulus();
    if y >= p {
        return Err(MixerError::Decode(
            "G1 y coordinate is not below the base field modulus".to_string(),
        ));
    }

    let neg_y = if y.is_zero() { BigUint::zero() } else { &p - &y };

    let mut result = [0u8; 64];
    result[..32].copy_from_slice(&point[..32]);
    result[32..].copy_from_slice(&pad_be(&neg_y));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r_minus_one() -> BigUint {
        scalar_modulus() - 1u32
    }

    #[test]
    fn test_modulus_rejected() {
        assert!(matches!(to_bytes32(&scalar_modulus()), Err(MixerError::Decode(_))));
        assert!(FieldElement::from_bytes_be(&BN254_SCALAR_MODULUS).is_err());
    }

    #[test]
    fn test_modulus_minus_one_roundtrip() {
        let bytes = to_bytes32(&r_minus_one()).unwrap();
        let element = from_bytes32(&bytes).unwrap();
        assert_eq!(element.to_biguint(), r_minus_one());
        assert_eq!(element.to_bytes_be(), bytes);
    }

    #[test]
    fn test_left_padding() {
        let bytes = to_bytes32(&BigUint::from(0x0102u32)).unwrap();
        assert!(bytes[..30].iter().all(|&b| b == 0));
        assert_eq!(&bytes[30..], &[0x01, 0x02]);
    }

    #[test]
    fn test_split_all_ff_pubkey() {
        let pubkey = Pubkey::new_from_array([0xFF; 32]);
        let (part1, part2) = split_pubkey_halves(&pubkey);
        assert_eq!(part1, FieldElement::from_u128(u128::MAX));
        assert_eq!(part2, FieldElement::from_u128(u128::MAX));
        assert_eq!(part1.to_biguint(), (BigUint::from(1u32) << 128) - 1u32);
    }

    #[test]
    fn test_split_join_roundtrip() {
        let pubkey = Pubkey::new_unique();
        let (part1, part2) = split_pubkey_halves(&pubkey);
        assert_eq!(join_pubkey_halves(&part1, &part2).unwrap(), pubkey);
    }

    #[test]
    fn test_join_rejects_wide_half() {
        let wide = FieldElement::from_biguint(&(BigUint::from(1u32) << 128)).unwrap();
        assert!(join_pubkey_halves(&wide, &FieldElement::ZERO).is_err());
    }

    #[test]
    fn test_parse_decimal_and_hex() {
        let a: FieldElement = "255".parse().unwrap();
        let b: FieldElement = "0xff".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, FieldElement::from_u64(255));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<FieldElement>().is_err());
        assert!("+5".parse::<FieldElement>().is_err());
        assert!("1_000".parse::<FieldElement>().is_err());
        assert!("12a".parse::<FieldElement>().is_err());
        assert!(scalar_modulus().to_string().parse::<FieldElement>().is_err());
    }

    #[test]
    fn test_coordinate_uses_base_modulus() {
        // r <= x < p is a valid coordinate but not a valid scalar
        let between = scalar_modulus();
        assert!(encode_coordinate(&between).is_ok());
        assert!(encode_coordinate(&base_modulus()).is_err());
    }

    #[test]
    fn test_negate_identity_is_identity() {
        assert_eq!(negate_g1(&G1_IDENTITY).unwrap(), G1_IDENTITY);
    }

    #[test]
    fn test_negate_generator() {
        let mut generator = [0u8; 64];
        generator[31] = 1;
        generator[63] = 2;
        let negated = negate_g1(&generator).unwrap();
        assert_eq!(&negated[..32], &generator[..32]);
        let expected = base_modulus() - 2u32;
        assert_eq!(BigUint::from_bytes_be(&negated[32..]), expected);
        assert_eq!(negate_g1(&negated).unwrap(), generator);
    }

    #[test]
    fn test_u64_to_field_encoding() {
        let field = u64_to_field(0x0102030405060708);
        assert!(field.as_bytes()[..24].iter().all(|&b| b == 0));
        assert_eq!(field.as_bytes()[24], 0x01);
        assert_eq!(field.as_bytes()[31], 0x08);
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let element = FieldElement::from_u64(1000);
        let json = serde_json::to_string(&element).unwrap();
        assert_eq!(json, "\"1000\"");
        let back: FieldElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, element);
    }
}
