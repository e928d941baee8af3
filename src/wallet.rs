//! Wallet key storage and transaction signing.
//!
//! Security: wallets are encrypted at rest with AES-256-GCM using an
//! Argon2-derived key. This module only manages the signing keypair and its
//! on-disk encoding; coin selection and denomination bookkeeping live behind
//! the `WalletView` collaborator trait in `collaborators.rs`.

use crate::address::Address;
use crate::network_type::NetworkType;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use zeroize::Zeroize;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Failed to load wallet: {0}")]
    LoadFailed(String),
    #[error("Failed to save wallet: {0}")]
    SaveFailed(String),
    #[error("Wallet file not found")]
    NotFound,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Encryption error: {0}")]
    EncryptionError(String),
}

#[derive(Serialize, Deserialize)]
struct EncryptedWalletFile {
    version: u32,
    salt: String,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct WalletData {
    pub version: u32,
    pub network: NetworkType,
    pub keypair: KeypairData,
    pub address: String,
    pub created_at: i64,
    pub label: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct KeypairData {
    pub secret_key: [u8; 32],
    pub public_key: [u8; 32],
}

pub struct Wallet {
    data: WalletData,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Wallet {
    pub fn new(network: NetworkType, label: Option<String>) -> Result<Self, WalletError> {
        let signing_key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
        let verifying_key = signing_key.verifying_key();

        let address = Address::from_public_key(&verifying_key, network);

        let data = WalletData {
            version: 1,
            network,
            keypair: KeypairData {
                secret_key: signing_key.to_bytes(),
                public_key: verifying_key.to_bytes(),
            },
            address: address.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            label,
        };

        Ok(Wallet {
            data,
            signing_key,
            verifying_key,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P, password: &str) -> Result<Self, WalletError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(WalletError::NotFound);
        }

        let contents = fs::read(path)
            .map_err(|e| WalletError::LoadFailed(format!("failed to read file: {}", e)))?;

        let encrypted_file: EncryptedWalletFile = bincode::deserialize(&contents)
            .map_err(|e| WalletError::LoadFailed(format!("failed to deserialize: {}", e)))?;

        let mut key = Self::derive_key(password, &encrypted_file.salt)?;

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| WalletError::EncryptionError(e.to_string()))?;
        let nonce = Nonce::from_slice(&encrypted_file.nonce);

        let plaintext = cipher
            .decrypt(nonce, encrypted_file.ciphertext.as_ref())
            .map_err(|_| WalletError::InvalidPassword)?;
        key.zeroize();

        let data: WalletData = bincode::deserialize(&plaintext)
            .map_err(|e| WalletError::LoadFailed(format!("failed to deserialize: {}", e)))?;

        let signing_key = SigningKey::from_bytes(&data.keypair.secret_key);
        let verifying_key = VerifyingKey::from_bytes(&data.keypair.public_key)
            .map_err(|e| WalletError::LoadFailed(format!("invalid public key: {}", e)))?;

        Ok(Wallet {
            data,
            signing_key,
            verifying_key,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, password: &str) -> Result<(), WalletError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| WalletError::SaveFailed(format!("failed to create directory: {}", e)))?;
        }

        let salt = SaltString::generate(&mut OsRng);
        let mut key = Self::derive_key(password, salt.as_str())?;

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| WalletError::EncryptionError(e.to_string()))?;

        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = bincode::serialize(&self.data)
            .map_err(|e| WalletError::SaveFailed(format!("failed to serialize: {}", e)))?;

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|e| WalletError::EncryptionError(e.to_string()))?;
        key.zeroize();

        let encrypted_file = EncryptedWalletFile {
            version: 1,
            salt: salt.to_string(),
            nonce: nonce_bytes.to_vec(),
            ciphertext,
        };

        let contents = bincode::serialize(&encrypted_file)
            .map_err(|e| WalletError::SaveFailed(format!("failed to serialize: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &contents)
            .map_err(|e| WalletError::SaveFailed(format!("failed to write temp file: {}", e)))?;
        fs::rename(&temp_path, path)
            .map_err(|e| WalletError::SaveFailed(format!("failed to rename: {}", e)))?;

        Ok(())
    }

    fn derive_key(password: &str, salt_str: &str) -> Result<[u8; 32], WalletError> {
        let argon2 = Argon2::default();
        let salt = SaltString::from_b64(salt_str)
            .map_err(|e| WalletError::EncryptionError(format!("invalid salt: {}", e)))?;

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| WalletError::EncryptionError(format!("key derivation failed: {}", e)))?;

        let hash_bytes = password_hash
            .hash
            .ok_or_else(|| WalletError::EncryptionError("no hash output".to_string()))?;

        let mut key = [0u8; 32];
        let hash_slice = hash_bytes.as_bytes();
        key.copy_from_slice(&hash_slice[..32.min(hash_slice.len())]);
        Ok(key)
    }

    pub fn address(&self) -> &str {
        &self.data.address
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn network(&self) -> NetworkType {
        self.data.network
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn wallet_creation_derives_network_prefixed_address() {
        let wallet = Wallet::new(NetworkType::Testnet, Some("Test".to_string())).unwrap();
        assert!(wallet.address().starts_with("TIME0"));
    }

    #[test]
    fn wallet_save_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test-wallet.dat");

        let wallet = Wallet::new(NetworkType::Mainnet, None).unwrap();
        let original_address = wallet.address().to_string();
        wallet.save(&path, "test_password").unwrap();

        let loaded = Wallet::load(&path, "test_password").unwrap();
        assert_eq!(loaded.address(), original_address);
        assert_eq!(loaded.network(), NetworkType::Mainnet);
    }
}
