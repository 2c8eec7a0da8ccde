//! Instruction payloads for the mixer program
//!
//! Anchor instruction data is an 8-byte discriminator,
//! `sha256("global:<name>")[..8]`, followed by the borsh-encoded arguments.

use anchor_lang::AnchorSerialize;
use solana_program::hash::hash;

use crate::error::Result;

pub mod deposit;
pub mod set_verification_key;
pub mod withdraw;

pub use deposit::*;
pub use set_verification_key::*;
pub use withdraw::*;

/// Length of an Anchor instruction discriminator
pub const DISCRIMINATOR_LEN: usize = 8;

/// Discriminator of the program instruction `name`.
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = hash(format!("global:{name}").as_bytes()).to_bytes();
    let mut discriminator = [0u8; DISCRIMINATOR_LEN];
    discriminator.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    discriminator
}

/// Discriminator followed by the borsh-encoded arguments.
pub fn encode_instruction<T: AnchorSerialize>(name: &str, args: &T) -> Result<Vec<u8>> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}
