//! Withdraw circuit witness and the proving backend port
//!
//! The witness is the circuit's full input set: the seven public inputs plus
//! the note secrets and the Merkle path. It serializes to the JSON object
//! snarkjs' `fullProve` expects, with the circuit's signal names as keys.

use serde::{Deserialize, Serialize};

use super::field::FieldElement;
use super::proof_format::RawGroth16Proof;
use super::public_inputs::{parse_public_signals, PublicInputVector};
use crate::error::{MixerError, Result};
use crate::state::merkle_tree::MembershipProof;
use crate::state::note::Note;

/// Input of the withdraw circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitWitness {
    // Public
    pub root: FieldElement,
    pub nullifier_hash: FieldElement,
    #[serde(rename = "recipient_1")]
    pub recipient_1: FieldElement,
    #[serde(rename = "recipient_2")]
    pub recipient_2: FieldElement,
    #[serde(rename = "relayer_1")]
    pub relayer_1: FieldElement,
    #[serde(rename = "relayer_2")]
    pub relayer_2: FieldElement,
    pub fee: FieldElement,

    // Private
    pub nullifier: FieldElement,
    pub secret: FieldElement,
    pub path_elements: Vec<FieldElement>,

    /// 0 = path node is a left child, 1 = right child
    pub path_indices: Vec<u8>,
}

impl CircuitWitness {
    /// Public part, in schema order.
    pub fn public_inputs(&self) -> PublicInputVector {
        PublicInputVector {
            root: self.root,
            nullifier_hash: self.nullifier_hash,
            recipient_part1: self.recipient_1,
            recipient_part2: self.recipient_2,
            relayer_part1: self.relayer_1,
            relayer_part2: self.relayer_2,
            fee: self.fee,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Assemble the witness for one withdrawal.
///
/// Path directions are coerced to `0`/`1`. The proof's path length must
/// match for every level and its root must be the public root.
pub fn build_circuit_witness(
    note: &Note,
    proof: &MembershipProof,
    public_inputs: &PublicInputVector,
) -> Result<CircuitWitness> {
    if proof.path_elements.len() != proof.path_indices.len() {
        return Err(MixerError::ProtocolMismatch(format!(
            "membership proof has {} siblings but {} directions",
            proof.path_elements.len(),
            proof.path_indices.len()
        )));
    }
    if proof.root != public_inputs.root {
        return Err(MixerError::ProtocolMismatch(format!(
            "membership proof root {} differs from public root {}",
            proof.root, public_inputs.root
        )));
    }

    Ok(CircuitWitness {
        root: public_inputs.root,
        nullifier_hash: public_inputs.nullifier_hash,
        recipient_1: public_inputs.recipient_part1,
        recipient_2: public_inputs.recipient_part2,
        relayer_1: public_inputs.relayer_part1,
        relayer_2: public_inputs.relayer_part2,
        fee: public_inputs.fee,
        nullifier: note.nullifier,
        secret: note.secret,
        path_elements: proof.path_elements.clone(),
        path_indices: proof.path_bits(),
    })
}

// ============================================================================
// PROVING BACKEND
// ============================================================================

/// What the proving backend returns: snarkjs' `{ proof, publicSignals }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProverOutput {
    pub proof: RawGroth16Proof,
    pub public_signals: Vec<String>,
}

impl ProverOutput {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Public signals mapped onto the schema.
    pub fn public_inputs(&self) -> Result<PublicInputVector> {
        parse_public_signals(&self.public_signals)
    }
}

/// Opaque Groth16 prover for the withdraw circuit.
///
/// Implementations may shell out to snarkjs or use an in-process prover.
/// Proving takes seconds; a caller that abandons the call must not reuse
/// any partial result.
pub trait ProvingBackend: Send + Sync {
    fn prove(&self, witness: &CircuitWitness) -> Result<ProverOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::public_inputs::build_public_input_vector;
    use solana_program::pubkey::Pubkey;

    fn note() -> Note {
        Note::from_parts(FieldElement::from_u64(5), FieldElement::from_u64(9), 1000, FieldElement::from_u64(77))
    }

    fn proof(root: FieldElement) -> MembershipProof {
        MembershipProof {
            leaf_index: 2,
            path_elements: vec![FieldElement::from_u64(1), FieldElement::from_u64(2)],
            path_indices: vec![false, true],
            root,
            version: 1,
        }
    }

    #[test]
    fn test_witness_json_keys() {
        let root = FieldElement::from_u64(42);
        let inputs = build_public_input_vector(
            root,
            FieldElement::from_u64(43),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            10,
        );
        let witness = build_circuit_witness(&note(), &proof(root), &inputs).unwrap();
        assert_eq!(witness.path_indices, vec![0, 1]);
        assert_eq!(witness.public_inputs(), inputs);

        let json: serde_json::Value = serde_json::from_str(&witness.to_json().unwrap()).unwrap();
        for key in [
            "root",
            "nullifierHash",
            "recipient_1",
            "recipient_2",
            "relayer_1",
            "relayer_2",
            "fee",
            "nullifier",
            "secret",
            "pathElements",
            "pathIndices",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["fee"], "10");
        assert_eq!(json["pathIndices"], serde_json::json!([0, 1]));
    }

    #[test]
    fn test_root_disagreement_rejected() {
        let inputs = build_public_input_vector(
            FieldElement::from_u64(42),
            FieldElement::from_u64(43),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            0,
        );
        let result = build_circuit_witness(&note(), &proof(FieldElement::from_u64(41)), &inputs);
        assert!(matches!(result, Err(MixerError::ProtocolMismatch(_))));
    }

    #[test]
    fn test_prover_output_json() {
        let json = r#"{
            "proof": {"pi_a": ["1", "2", "1"], "pi_b": [["3", "4"], ["5", "6"], ["1", "0"]], "pi_c": ["7", "8", "1"]},
            "publicSignals": ["1", "2", "3", "4", "5", "6", "7"]
        }"#;
        let output = ProverOutput::from_json_str(json).unwrap();
        let inputs = output.public_inputs().unwrap();
        assert_eq!(inputs.fee, FieldElement::from_u64(7));
        assert_eq!(inputs.root, FieldElement::from_u64(1));
    }
}
