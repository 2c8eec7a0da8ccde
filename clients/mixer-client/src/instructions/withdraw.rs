//! Withdraw pipeline and payload
//!
//! # Flow
//! 1. Check the note reproduces its commitment
//! 2. Check the tree holds that commitment at the note's leaf index
//! 3. Build the membership proof, the public inputs and the witness
//! 4. Run the proving backend
//! 5. Require the returned public signals to equal the requested ones
//! 6. Encode the proof and public inputs for the program
//!
//! The local tree must equal the on-chain root passed in by the caller;
//! a proof against a root the program no longer remembers is rejected
//! on-chain.

use anchor_lang::prelude::*;
use tracing::{debug, info, warn};

use super::encode_instruction;
use crate::crypto::field::FieldElement;
use crate::crypto::proof_format::{format_proof_for_verifier, FormattedProof, ProofLayout};
use crate::crypto::public_inputs::{
    build_public_input_vector, decode_public_signals, PublicInputVector, PUBLIC_INPUT_COUNT,
};
use crate::crypto::witness::{build_circuit_witness, CircuitWitness, ProvingBackend};
use crate::error::{MixerError, Result};
use crate::state::merkle_tree::{MembershipProof, MerkleAccumulator};
use crate::state::note::{Note, NoteManager};

pub const WITHDRAW_INSTRUCTION: &str = "withdraw";

/// Arguments of the program's `withdraw` instruction.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct WithdrawArgs {
    pub proof_a: [u8; 64],
    pub proof_b: [u8; 128],
    pub proof_c: [u8; 64],

    /// Public inputs in circuit order
    pub public_inputs: [[u8; 32]; PUBLIC_INPUT_COUNT],

    /// Sibling hashes, leaf level first
    pub merkle_path: Vec<[u8; 32]>,

    pub path_indices: Vec<bool>,
}

impl WithdrawArgs {
    pub fn new(proof: &FormattedProof, public_inputs: &PublicInputVector, membership: &MembershipProof) -> Self {
        Self {
            proof_a: proof.proof_a,
            proof_b: proof.proof_b,
            proof_c: proof.proof_c,
            public_inputs: public_inputs.to_bytes(),
            merkle_path: membership.path_bytes(),
            path_indices: membership.path_indices.clone(),
        }
    }

    pub fn proof(&self) -> FormattedProof {
        FormattedProof {
            proof_a: self.proof_a,
            proof_b: self.proof_b,
            proof_c: self.proof_c,
        }
    }

    /// Decode the public inputs back onto the schema.
    pub fn public_input_vector(&self) -> Result<PublicInputVector> {
        let values = self
            .public_inputs
            .iter()
            .map(FieldElement::from_bytes_be)
            .collect::<Result<Vec<_>>>()?;
        decode_public_signals(&values)
    }

    pub fn instruction_data(&self) -> Result<Vec<u8>> {
        encode_instruction(WITHDRAW_INSTRUCTION, self)
    }
}

/// What the user wants to withdraw, and to whom.
#[derive(Clone, Debug)]
pub struct WithdrawRequest {
    pub note: Note,

    /// Index the program assigned to the note's commitment
    pub leaf_index: u64,

    pub recipient: Pubkey,

    /// Relayer submitting the transaction (the recipient for self-relay)
    pub relayer: Pubkey,

    /// Relayer fee in lamports
    pub fee: u64,
}

impl WithdrawRequest {
    /// Self-relay: the recipient submits and pays no fee.
    pub fn self_relay(note: Note, leaf_index: u64, recipient: Pubkey) -> Self {
        Self {
            note,
            leaf_index,
            recipient,
            relayer: recipient,
            fee: 0,
        }
    }
}

/// Everything produced for one withdrawal.
#[derive(Clone, Debug)]
pub struct PreparedWithdrawal {
    pub args: WithdrawArgs,
    pub public_inputs: PublicInputVector,
    pub witness: CircuitWitness,
    pub membership_proof: MembershipProof,
    pub nullifier_hash: FieldElement,
}

/// Run the full withdraw pipeline against the local tree.
///
/// `authoritative_root` is the program's current root; a local tree that
/// does not produce it is rejected with `RootMismatch` before proving. Any
/// failure aborts the withdrawal; nothing is retried or partially reused.
pub fn prepare_withdrawal(
    manager: &NoteManager,
    tree: &MerkleAccumulator,
    authoritative_root: &FieldElement,
    backend: &dyn ProvingBackend,
    request: &WithdrawRequest,
    layout: ProofLayout,
) -> Result<PreparedWithdrawal> {
    let note = &request.note;
    manager.ensure_valid(note)?;

    match tree.leaf(request.leaf_index) {
        Some(leaf) if leaf == note.commitment => {}
        Some(_) => return Err(MixerError::LeafMismatch { index: request.leaf_index }),
        None => return Err(MixerError::UnknownLeaf(request.leaf_index)),
    }

    if request.fee > note.amount {
        return Err(MixerError::FeeExceedsAmount {
            fee: request.fee,
            amount: note.amount,
        });
    }

    let local_root = tree.root()?;
    if local_root != *authoritative_root {
        warn!(
            expected = %authoritative_root,
            actual = %local_root,
            "Local tree is out of sync, refusing to prove"
        );
        return Err(MixerError::RootMismatch {
            expected: authoritative_root.to_string(),
            actual: local_root.to_string(),
        });
    }

    let membership_proof = tree.generate_membership_proof(request.leaf_index)?;

    let nullifier_hash = manager.nullifier_hash(note)?;
    let public_inputs = build_public_input_vector(
        membership_proof.root,
        nullifier_hash,
        &request.recipient,
        &request.relayer,
        request.fee,
    );
    let witness = build_circuit_witness(note, &membership_proof, &public_inputs)?;

    info!(
        leaf_index = request.leaf_index,
        root = %membership_proof.root,
        "Invoking proving backend"
    );
    let output = backend.prove(&witness)?;

    public_inputs.ensure_matches(&output.public_inputs()?)?;

    let proof = format_proof_for_verifier(&output.proof, layout)?;
    let args = WithdrawArgs::new(&proof, &public_inputs, &membership_proof);

    debug!(nullifier_hash = %nullifier_hash, "Withdrawal prepared");
    Ok(PreparedWithdrawal {
        args,
        public_inputs,
        witness,
        membership_proof,
        nullifier_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::poseidon::{FieldHasher, PoseidonOracle};
    use crate::crypto::proof_format::RawGroth16Proof;
    use crate::crypto::witness::ProverOutput;
    use crate::instructions::instruction_discriminator;
    use std::sync::Arc;

    const DEPTH: u8 = 4;

    /// Returns a fixed proof and echoes the witness' public inputs.
    struct EchoBackend {
        tamper: fn(&mut Vec<String>),
    }

    impl ProvingBackend for EchoBackend {
        fn prove(&self, witness: &CircuitWitness) -> Result<ProverOutput> {
            let mut public_signals = witness.public_inputs().to_signal_strings();
            (self.tamper)(&mut public_signals);
            Ok(ProverOutput {
                proof: RawGroth16Proof {
                    pi_a: vec!["1".into(), "2".into(), "1".into()],
                    pi_b: vec![vec!["3".into(), "4".into()], vec!["5".into(), "6".into()]],
                    pi_c: vec!["7".into(), "8".into(), "1".into()],
                    protocol: None,
                    curve: None,
                },
                public_signals,
            })
        }
    }

    struct FailingBackend;

    impl ProvingBackend for FailingBackend {
        fn prove(&self, _witness: &CircuitWitness) -> Result<ProverOutput> {
            Err(MixerError::Prover("witness does not satisfy constraints".to_string()))
        }
    }

    fn honest() -> EchoBackend {
        EchoBackend { tamper: |_| {} }
    }

    fn setup() -> (NoteManager, MerkleAccumulator, Note) {
        let hasher: Arc<dyn FieldHasher> = Arc::new(PoseidonOracle::setup().unwrap());
        let manager = NoteManager::new(hasher.clone());
        let note = manager.generate(1_000).unwrap();

        let mut tree = MerkleAccumulator::new(DEPTH, hasher).unwrap();
        tree.initialize().unwrap();
        tree.insert_leaf(0, FieldElement::from_u64(77)).unwrap();
        tree.insert_leaf(1, note.commitment).unwrap();
        (manager, tree, note)
    }

    fn request(note: Note, fee: u64) -> WithdrawRequest {
        WithdrawRequest {
            note,
            leaf_index: 1,
            recipient: Pubkey::new_unique(),
            relayer: Pubkey::new_unique(),
            fee,
        }
    }

    #[test]
    fn test_prepare_withdrawal() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let request = request(note.clone(), 10);
        let prepared = prepare_withdrawal(&manager, &tree, &root, &honest(), &request, ProofLayout::natural()).unwrap();

        assert_eq!(prepared.public_inputs.root, tree.root().unwrap());
        assert_eq!(prepared.nullifier_hash, manager.nullifier_hash(&note).unwrap());
        assert_eq!(prepared.public_inputs.recipient().unwrap(), request.recipient);
        assert_eq!(prepared.public_inputs.fee_lamports().unwrap(), 10);
        assert!(tree
            .verify_membership_proof(&note.commitment, 1, &prepared.membership_proof)
            .unwrap());

        assert_eq!(prepared.args.public_input_vector().unwrap(), prepared.public_inputs);
        assert_eq!(prepared.args.merkle_path.len(), DEPTH as usize);
        assert!(prepared.args.path_indices[0]);
        assert_eq!(prepared.args.proof().proof_c[63], 8);
    }

    #[test]
    fn test_withdraw_payload_layout() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let prepared =
            prepare_withdrawal(&manager, &tree, &root, &honest(), &request(note, 0), ProofLayout::natural()).unwrap();
        let data = prepared.args.instruction_data().unwrap();

        let depth = DEPTH as usize;
        assert_eq!(data[..8], instruction_discriminator("withdraw"));
        assert_eq!(data.len(), 8 + 256 + 7 * 32 + (4 + 32 * depth) + (4 + depth));
        assert_eq!(data[8..264], prepared.args.proof().to_bytes());
        assert_eq!(data[264..296], prepared.public_inputs.root.to_bytes_be());
    }

    #[test]
    fn test_corrupt_note_aborts() {
        let (manager, tree, mut note) = setup();
        let root = tree.root().unwrap();
        note.nullifier = FieldElement::from_u64(3);
        let result = prepare_withdrawal(&manager, &tree, &root, &honest(), &request(note, 0), ProofLayout::natural());
        assert!(matches!(result, Err(MixerError::Validation)));
    }

    #[test]
    fn test_leaf_mismatch() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let mut req = request(note, 0);
        req.leaf_index = 0;
        assert!(matches!(
            prepare_withdrawal(&manager, &tree, &root, &honest(), &req, ProofLayout::natural()),
            Err(MixerError::LeafMismatch { index: 0 })
        ));
        req.leaf_index = 5;
        assert!(matches!(
            prepare_withdrawal(&manager, &tree, &root, &honest(), &req, ProofLayout::natural()),
            Err(MixerError::UnknownLeaf(5))
        ));
    }

    #[test]
    fn test_divergent_mirror_rejected() {
        let (manager, mut tree, note) = setup();
        let req = request(note, 0);
        let lagging = tree.clone();

        // The program has accepted a deposit the lagging mirror has not seen
        tree.insert_leaf(2, FieldElement::from_u64(99)).unwrap();
        let onchain = tree.root().unwrap();
        assert!(matches!(
            prepare_withdrawal(&manager, &lagging, &onchain, &honest(), &req, ProofLayout::natural()),
            Err(MixerError::RootMismatch { .. })
        ));

        // A mirror holding a leaf the program never accepted
        let mut forged = lagging.clone();
        forged.insert_leaf(2, FieldElement::from_u64(98)).unwrap();
        assert!(matches!(
            prepare_withdrawal(&manager, &forged, &onchain, &honest(), &req, ProofLayout::natural()),
            Err(MixerError::RootMismatch { .. })
        ));

        assert!(prepare_withdrawal(&manager, &tree, &onchain, &honest(), &req, ProofLayout::natural()).is_ok());
    }

    #[test]
    fn test_fee_exceeds_amount() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        assert!(matches!(
            prepare_withdrawal(&manager, &tree, &root, &honest(), &request(note, 1_001), ProofLayout::natural()),
            Err(MixerError::FeeExceedsAmount { fee: 1_001, amount: 1_000 })
        ));
    }

    #[test]
    fn test_reordered_signals_rejected() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let backend = EchoBackend {
            tamper: |signals| signals.swap(2, 4),
        };
        let result = prepare_withdrawal(&manager, &tree, &root, &backend, &request(note, 0), ProofLayout::natural());
        assert!(matches!(result, Err(MixerError::ProtocolMismatch(_))));
    }

    #[test]
    fn test_missing_signal_rejected() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let backend = EchoBackend {
            tamper: |signals| {
                signals.pop();
            },
        };
        let result = prepare_withdrawal(&manager, &tree, &root, &backend, &request(note, 0), ProofLayout::natural());
        assert!(matches!(result, Err(MixerError::ProtocolMismatch(_))));
    }

    #[test]
    fn test_backend_failure_propagates() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let result = prepare_withdrawal(&manager, &tree, &root, &FailingBackend, &request(note, 0), ProofLayout::natural());
        assert!(matches!(result, Err(MixerError::Prover(_))));
    }

    #[test]
    fn test_self_relay_request() {
        let (manager, tree, note) = setup();
        let root = tree.root().unwrap();
        let recipient = Pubkey::new_unique();
        let req = WithdrawRequest::self_relay(note, 1, recipient);
        let prepared = prepare_withdrawal(&manager, &tree, &root, &honest(), &req, ProofLayout::alt_bn128()).unwrap();
        assert!(prepared.public_inputs.is_self_relay());
    }
}
