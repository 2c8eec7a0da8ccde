//! Deposit payload
//!
//! A deposit publishes only the note commitment; the program appends it to
//! its tree and the leaf index it assigns is the one the note is later
//! withdrawn against.

use anchor_lang::prelude::*;
use tracing::info;

use super::encode_instruction;
use crate::crypto::field::FieldElement;
use crate::error::Result;
use crate::state::note::{Note, NoteManager};

pub const DEPOSIT_INSTRUCTION: &str = "deposit";

/// Arguments of the program's `deposit(commitment)` instruction.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct DepositArgs {
    pub commitment: [u8; 32],
}

impl DepositArgs {
    pub fn new(commitment: &FieldElement) -> Self {
        Self {
            commitment: commitment.to_bytes_be(),
        }
    }

    pub fn commitment(&self) -> Result<FieldElement> {
        FieldElement::from_bytes_be(&self.commitment)
    }

    pub fn instruction_data(&self) -> Result<Vec<u8>> {
        encode_instruction(DEPOSIT_INSTRUCTION, self)
    }
}

/// Generate a note for `amount` and the matching deposit payload.
///
/// The note is not persisted; the caller must store it before submitting.
pub fn prepare_deposit(manager: &NoteManager, amount: u64) -> Result<(Note, DepositArgs)> {
    let note = manager.generate(amount)?;
    let args = DepositArgs::new(&note.commitment);

    info!(amount, commitment = %note.commitment, "Deposit prepared");
    Ok((note, args))
}
