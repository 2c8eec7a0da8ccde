//! Public inputs of the withdraw circuit
//!
//! # Withdraw Circuit Public Inputs (7 total)
//! 1. root - Merkle root the membership proof resolves to
//! 2. nullifierHash - Prevents double-spending
//! 3. recipient_1 - Recipient pubkey bytes 0..16
//! 4. recipient_2 - Recipient pubkey bytes 16..32
//! 5. relayer_1 - Relayer pubkey bytes 0..16
//! 6. relayer_2 - Relayer pubkey bytes 16..32
//! 7. fee - Relayer fee in lamports
//!
//! The order is a wire contract with the verifying key's IC points and with
//! the program's withdraw handler. It is written down once, in
//! [`PublicInputField::ORDER`], and every conversion goes through it.
//!
//! # Field Element Encoding
//! All values are 32-byte big-endian elements of the BN254 scalar field.

use solana_program::pubkey::Pubkey;

use super::field::{join_pubkey_halves, split_pubkey_halves, u64_to_field, FieldElement};
use crate::error::{MixerError, Result};

/// Number of public inputs of the withdraw circuit
pub const PUBLIC_INPUT_COUNT: usize = 7;

/// Version of the public input schema. Bumped whenever the order changes.
pub const SCHEMA_VERSION: u16 = 1;

// ============================================================================
// SCHEMA
// ============================================================================

/// Named slot of the public input vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PublicInputField {
    Root,
    NullifierHash,
    RecipientPart1,
    RecipientPart2,
    RelayerPart1,
    RelayerPart2,
    Fee,
}

impl PublicInputField {
    /// Canonical order of the public signals.
    pub const ORDER: [PublicInputField; PUBLIC_INPUT_COUNT] = [
        PublicInputField::Root,
        PublicInputField::NullifierHash,
        PublicInputField::RecipientPart1,
        PublicInputField::RecipientPart2,
        PublicInputField::RelayerPart1,
        PublicInputField::RelayerPart2,
        PublicInputField::Fee,
    ];

    /// Signal name in the circuit.
    pub fn signal_name(self) -> &'static str {
        match self {
            PublicInputField::Root => "root",
            PublicInputField::NullifierHash => "nullifierHash",
            PublicInputField::RecipientPart1 => "recipient_1",
            PublicInputField::RecipientPart2 => "recipient_2",
            PublicInputField::RelayerPart1 => "relayer_1",
            PublicInputField::RelayerPart2 => "relayer_2",
            PublicInputField::Fee => "fee",
        }
    }

    /// Position in [`Self::ORDER`].
    pub fn position(self) -> usize {
        self as usize
    }
}

// ============================================================================
// PUBLIC INPUT VECTOR
// ============================================================================

/// Values the proof's public signals must equal.
///
/// They must match exactly what was used to generate the proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputVector {
    /// Merkle root of the commitment tree
    pub root: FieldElement,

    /// Poseidon(nullifier)
    pub nullifier_hash: FieldElement,

    pub recipient_part1: FieldElement,
    pub recipient_part2: FieldElement,

    pub relayer_part1: FieldElement,
    pub relayer_part2: FieldElement,

    /// Fee paid to the relayer
    pub fee: FieldElement,
}

impl PublicInputVector {
    pub const COUNT: usize = PUBLIC_INPUT_COUNT;

    pub fn get(&self, field: PublicInputField) -> &FieldElement {
        match field {
            PublicInputField::Root => &self.root,
            PublicInputField::NullifierHash => &self.nullifier_hash,
            PublicInputField::RecipientPart1 => &self.recipient_part1,
            PublicInputField::RecipientPart2 => &self.recipient_part2,
            PublicInputField::RelayerPart1 => &self.relayer_part1,
            PublicInputField::RelayerPart2 => &self.relayer_part2,
            PublicInputField::Fee => &self.fee,
        }
    }

    /// Values in circuit order.
    pub fn to_field_elements(&self) -> [FieldElement; PUBLIC_INPUT_COUNT] {
        PublicInputField::ORDER.map(|field| *self.get(field))
    }

    /// Values in circuit order, as 32-byte big-endian arrays.
    pub fn to_bytes(&self) -> [[u8; 32]; PUBLIC_INPUT_COUNT] {
        PublicInputField::ORDER.map(|field| self.get(field).to_bytes_be())
    }

    /// Values in circuit order, as decimal strings (snarkjs `publicSignals`).
    pub fn to_signal_strings(&self) -> Vec<String> {
        self.to_field_elements().iter().map(ToString::to_string).collect()
    }

    /// Build from values in circuit order. The count must be exact.
    pub fn from_field_elements(values: &[FieldElement]) -> Result<Self> {
        let values: &[FieldElement; PUBLIC_INPUT_COUNT] = values.try_into().map_err(|_| {
            MixerError::ProtocolMismatch(format!(
                "expected {} public signals, got {}",
                PUBLIC_INPUT_COUNT,
                values.len()
            ))
        })?;

        let at = |field: PublicInputField| values[field.position()];
        Ok(Self {
            root: at(PublicInputField::Root),
            nullifier_hash: at(PublicInputField::NullifierHash),
            recipient_part1: at(PublicInputField::RecipientPart1),
            recipient_part2: at(PublicInputField::RecipientPart2),
            relayer_part1: at(PublicInputField::RelayerPart1),
            relayer_part2: at(PublicInputField::RelayerPart2),
            fee: at(PublicInputField::Fee),
        })
    }

    pub fn recipient(&self) -> Result<Pubkey> {
        join_pubkey_halves(&self.recipient_part1, &self.recipient_part2)
    }

    pub fn relayer(&self) -> Result<Pubkey> {
        join_pubkey_halves(&self.relayer_part1, &self.relayer_part2)
    }

    /// Fee as lamports; fails if the signal does not fit in a u64.
    pub fn fee_lamports(&self) -> Result<u64> {
        let bytes = self.fee.as_bytes();
        if bytes[..24].iter().any(|&b| b != 0) {
            return Err(MixerError::Decode(format!("fee {} does not fit in u64", self.fee)));
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&bytes[24..]);
        Ok(u64::from_be_bytes(low))
    }

    /// Check if this is a self-relay (recipient == relayer, no fee)
    pub fn is_self_relay(&self) -> bool {
        self.recipient_part1 == self.relayer_part1
            && self.recipient_part2 == self.relayer_part2
            && self.fee.is_zero()
    }

    /// Require `other` to be identical, naming the first slot that differs.
    pub fn ensure_matches(&self, other: &PublicInputVector) -> Result<()> {
        for field in PublicInputField::ORDER {
            let (expected, actual) = (self.get(field), other.get(field));
            if expected != actual {
                return Err(MixerError::ProtocolMismatch(format!(
                    "public signal {} (position {}) is {actual}, expected {expected}",
                    field.signal_name(),
                    field.position()
                )));
            }
        }
        Ok(())
    }
}

/// Split both keys into halves and lay out the seven public inputs.
pub fn build_public_input_vector(
    root: FieldElement,
    nullifier_hash: FieldElement,
    recipient: &Pubkey,
    relayer: &Pubkey,
    fee: u64,
) -> PublicInputVector {
    let (recipient_part1, recipient_part2) = split_pubkey_halves(recipient);
    let (relayer_part1, relayer_part2) = split_pubkey_halves(relayer);

    PublicInputVector {
        root,
        nullifier_hash,
        recipient_part1,
        recipient_part2,
        relayer_part1,
        relayer_part2,
        fee: u64_to_field(fee),
    }
}

/// Map the backend's public signals back onto the schema.
///
/// A count other than seven means the circuit and this client have drifted
/// apart and is reported as `ProtocolMismatch`.
pub fn decode_public_signals(raw: &[FieldElement]) -> Result<PublicInputVector> {
    PublicInputVector::from_field_elements(raw)
}

/// Same as [`decode_public_signals`] for snarkjs' decimal-string signals.
///
/// A signal that is not a canonical field element is also a
/// `ProtocolMismatch`.
pub fn parse_public_signals(raw: &[String]) -> Result<PublicInputVector> {
    let values = raw
        .iter()
        .enumerate()
        .map(|(i, signal)| {
            signal.parse::<FieldElement>().map_err(|e| {
                MixerError::ProtocolMismatch(format!("public signal {i} '{signal}' is unreadable: {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    decode_public_signals(&values)
}

// ============================================================================
// BUILDER PATTERN
// ============================================================================

/// Builder for PublicInputVector
#[derive(Default)]
pub struct PublicInputVectorBuilder {
    root: Option<FieldElement>,
    nullifier_hash: Option<FieldElement>,
    recipient: Option<Pubkey>,
    relayer: Option<Pubkey>,
    fee: Option<u64>,
}

impl PublicInputVectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: FieldElement) -> Self {
        self.root = Some(root);
        self
    }

    pub fn nullifier_hash(mut self, hash: FieldElement) -> Self {
        self.nullifier_hash = Some(hash);
        self
    }

    pub fn recipient(mut self, recipient: Pubkey) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn relayer(mut self, relayer: Pubkey) -> Self {
        self.relayer = Some(relayer);
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Build for self-relay (recipient = relayer, no fee)
    pub fn build_self_relay(mut self) -> Result<PublicInputVector> {
        self.relayer = self.recipient;
        self.fee = Some(0);
        self.build()
    }

    pub fn build(self) -> Result<PublicInputVector> {
        let missing =
            |field: PublicInputField| MixerError::ProtocolMismatch(format!("missing public input {}", field.signal_name()));

        Ok(build_public_input_vector(
            self.root.ok_or_else(|| missing(PublicInputField::Root))?,
            self.nullifier_hash
                .ok_or_else(|| missing(PublicInputField::NullifierHash))?,
            &self.recipient.ok_or_else(|| missing(PublicInputField::RecipientPart1))?,
            &self.relayer.ok_or_else(|| missing(PublicInputField::RelayerPart1))?,
            self.fee.ok_or_else(|| missing(PublicInputField::Fee))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::field::scalar_modulus;

    fn sample() -> PublicInputVector {
        build_public_input_vector(
            FieldElement::from_u64(111),
            FieldElement::from_u64(222),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            5_000,
        )
    }

    #[test]
    fn test_order_is_fixed() {
        let names: Vec<_> = PublicInputField::ORDER.iter().map(|f| f.signal_name()).collect();
        assert_eq!(
            names,
            ["root", "nullifierHash", "recipient_1", "recipient_2", "relayer_1", "relayer_2", "fee"]
        );
        for (i, field) in PublicInputField::ORDER.iter().enumerate() {
            assert_eq!(field.position(), i);
        }
    }

    #[test]
    fn test_field_elements_layout() {
        let recipient = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let inputs = build_public_input_vector(
            FieldElement::from_u64(1),
            FieldElement::from_u64(2),
            &recipient,
            &relayer,
            3,
        );
        let values = inputs.to_field_elements();
        let (r1, r2) = split_pubkey_halves(&recipient);
        let (l1, l2) = split_pubkey_halves(&relayer);
        assert_eq!(
            values,
            [FieldElement::from_u64(1), FieldElement::from_u64(2), r1, r2, l1, l2, FieldElement::from_u64(3)]
        );
        assert_eq!(inputs.recipient().unwrap(), recipient);
        assert_eq!(inputs.relayer().unwrap(), relayer);
        assert_eq!(inputs.fee_lamports().unwrap(), 3);
    }

    #[test]
    fn test_decode_inverts_layout() {
        let inputs = sample();
        let decoded = decode_public_signals(&inputs.to_field_elements()).unwrap();
        assert_eq!(decoded, inputs);

        let parsed = parse_public_signals(&inputs.to_signal_strings()).unwrap();
        assert_eq!(parsed, inputs);
    }

    #[test]
    fn test_unreadable_signal_is_protocol_mismatch() {
        let mut signals = sample().to_signal_strings();
        signals[3] = "abc".to_string();
        assert!(matches!(
            parse_public_signals(&signals),
            Err(MixerError::ProtocolMismatch(_))
        ));

        signals[3] = scalar_modulus().to_string();
        assert!(matches!(
            parse_public_signals(&signals),
            Err(MixerError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_wrong_signal_count_is_protocol_mismatch() {
        let values = sample().to_field_elements();
        assert!(matches!(
            decode_public_signals(&values[..6]),
            Err(MixerError::ProtocolMismatch(_))
        ));
        let mut extra = values.to_vec();
        extra.push(FieldElement::ZERO);
        assert!(matches!(
            decode_public_signals(&extra),
            Err(MixerError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_swapped_signals_detected() {
        let inputs = sample();
        let mut values = inputs.to_field_elements();
        values.swap(0, 1);
        let decoded = decode_public_signals(&values).unwrap();

        let err = inputs.ensure_matches(&decoded).unwrap_err();
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_builder_self_relay() {
        let recipient = Pubkey::new_unique();
        let inputs = PublicInputVectorBuilder::new()
            .root(FieldElement::from_u64(9))
            .nullifier_hash(FieldElement::from_u64(8))
            .recipient(recipient)
            .build_self_relay()
            .unwrap();
        assert!(inputs.is_self_relay());
        assert_eq!(inputs.relayer().unwrap(), recipient);
    }

    #[test]
    fn test_builder_missing_field() {
        let result = PublicInputVectorBuilder::new()
            .root(FieldElement::from_u64(9))
            .recipient(Pubkey::new_unique())
            .relayer(Pubkey::new_unique())
            .fee(0)
            .build();
        assert!(matches!(result, Err(MixerError::ProtocolMismatch(_))));
    }
}
