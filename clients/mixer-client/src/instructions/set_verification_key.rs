//! Verifying key upload payload

use anchor_lang::prelude::*;

use super::encode_instruction;
use crate::crypto::proof_format::FormattedVerifyingKey;
use crate::error::Result;

pub const SET_VERIFICATION_KEY_INSTRUCTION: &str = "set_verification_key";

/// Arguments of the program's `set_verification_key` instruction.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct SetVerificationKeyArgs {
    pub vk_alpha_g1: [u8; 64],
    pub vk_beta_g2: [u8; 128],
    pub vk_gamma_g2: [u8; 128],
    pub vk_delta_g2: [u8; 128],
    pub vk_ic: Vec<[u8; 64]>,
}

impl SetVerificationKeyArgs {
    pub fn instruction_data(&self) -> Result<Vec<u8>> {
        encode_instruction(SET_VERIFICATION_KEY_INSTRUCTION, self)
    }
}

impl From<&FormattedVerifyingKey> for SetVerificationKeyArgs {
    fn from(vk: &FormattedVerifyingKey) -> Self {
        Self {
            vk_alpha_g1: vk.alpha_g1,
            vk_beta_g2: vk.beta_g2,
            vk_gamma_g2: vk.gamma_g2,
            vk_delta_g2: vk.delta_g2,
            vk_ic: vk.ic.clone(),
        }
    }
}
