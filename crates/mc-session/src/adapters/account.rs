//! # Ed25519 Account Adapter
//!
//! Accounts backed by an Ed25519 keypair derived from a 32-byte seed.

use crate::domain::SessionError;
use crate::ports::{Account, AccountFactory};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Seed length in bytes.
pub const SEED_LENGTH: usize = 32;

/// Wallet address prefix.
const WALLET_PREFIX: &str = "MC";

/// Ed25519 account.
pub struct Ed25519Account {
    signing_key: SigningKey,
    seed: [u8; SEED_LENGTH],
}

impl Ed25519Account {
    /// Account from raw seed bytes.
    pub fn from_seed_bytes(seed: [u8; SEED_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
            seed,
        }
    }

    /// Account from a fresh random seed.
    pub fn random() -> Self {
        Self::from_seed_bytes(rand::random())
    }
}

impl Account for Ed25519Account {
    fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    fn seed(&self) -> Vec<u8> {
        self.seed.to_vec()
    }

    fn wallet_address(&self) -> String {
        let digest = Sha256::digest(self.signing_key.verifying_key().as_bytes());
        format!("{WALLET_PREFIX}{}", hex::encode(&digest[..20]))
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// Builds [`Ed25519Account`]s.
#[derive(Clone, Debug, Default)]
pub struct Ed25519AccountFactory;

impl AccountFactory for Ed25519AccountFactory {
    fn from_seed(&self, seed: &[u8]) -> Result<Arc<dyn Account>, SessionError> {
        let seed = <[u8; SEED_LENGTH]>::try_from(seed).map_err(|_| {
            SessionError::AccountCreateFailed(format!(
                "seed must be {SEED_LENGTH} bytes, got {}",
                seed.len()
            ))
        })?;
        Ok(Arc::new(Ed25519Account::from_seed_bytes(seed)))
    }
}
