//! Client configuration
//!
//! Every value here is a protocol constant shared with the circuit and the
//! deployed program; the defaults match the deployed mixer. Changing the tree
//! depth without redeploying both makes every proof invalid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::proof_format::ProofLayout;
use crate::error::{MixerError, Result};
use crate::state::merkle_tree::{
    DEFAULT_ROOT_HISTORY_SIZE, DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH, MIN_TREE_DEPTH,
};
use crate::state::note_store::DEFAULT_NOTE_NAMESPACE;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Merkle tree depth
    pub tree_depth: u8,

    /// Number of recent roots remembered by the accumulator
    pub root_history_size: u16,

    /// Note store namespace
    pub note_namespace: String,

    /// Byte layout of the target verifier
    pub proof_layout: ProofLayout,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
            note_namespace: DEFAULT_NOTE_NAMESPACE.to_string(),
            proof_layout: ProofLayout::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&self.tree_depth) {
            return Err(MixerError::InvalidConfig(format!(
                "tree_depth {} outside {MIN_TREE_DEPTH}..={MAX_TREE_DEPTH}",
                self.tree_depth
            )));
        }
        if self.root_history_size == 0 {
            return Err(MixerError::InvalidConfig(
                "root_history_size must be at least 1".to_string(),
            ));
        }
        if self.note_namespace.trim().is_empty() {
            return Err(MixerError::InvalidConfig(
                "note_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), tree_depth = config.tree_depth, "Client config loaded");
        Ok(config)
    }
}
