//! AES-256-GCM credential vault for upstream passwords and LLM API keys.
//!
//! Ciphertext format: `nonce(12) || ciphertext(N) || tag(16)`, base64-encoded
//! for storage in TEXT columns.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::VaultError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A symmetric encryption key shared by all secrets in one deployment.
#[derive(Clone)]
pub struct VaultKey(Vec<u8>);

impl VaultKey {
    /// Build a key from raw bytes. Must be exactly 32 bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, VaultError> {
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey(format!(
                "key length {} != {KEY_LEN}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Decode a key from a base64 string (as read from config/environment).
    pub fn from_base64(s: &str) -> Result<Self, VaultError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| VaultError::InvalidKey(format!("invalid base64: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Generate a fresh random key (for `yourmoment init`-style bootstrapping).
    pub fn generate() -> Self {
        let bytes: Vec<u8> = (0..KEY_LEN).map(|_| rand::random::<u8>()).collect();
        Self(bytes)
    }

    /// Encode this key as base64, for writing into a config file.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

/// Encrypt plaintext, returning a base64-encoded `nonce || ciphertext` blob.
pub fn encrypt(plaintext: &str, key: &VaultKey) -> Result<String, VaultError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| VaultError::Encryption(format!("cipher init failed: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| VaultError::Encryption(format!("encryption failed: {e}")))?;

    let mut blob = nonce.to_vec();
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a blob produced by `encrypt` back into the original plaintext.
pub fn decrypt(blob_b64: &str, key: &VaultKey) -> Result<String, VaultError> {
    let blob = STANDARD
        .decode(blob_b64)
        .map_err(|e| VaultError::Decryption(format!("invalid base64: {e}")))?;

    if blob.len() < NONCE_LEN + 16 {
        return Err(VaultError::Decryption("ciphertext too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| VaultError::Decryption(format!("cipher init failed: {e}")))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| VaultError::Decryption(format!("decryption failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| VaultError::Decryption(format!("decrypted bytes not valid utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> VaultKey {
        VaultKey::from_bytes((0..32).collect()).unwrap()
    }

    #[test]
    fn round_trip_encrypt_decrypt() {
        let key = test_key();
        let plaintext = "hunter2-upstream-password";

        let blob = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&blob, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let key1 = test_key();
        let key2 = VaultKey::from_bytes((32..64).collect()).unwrap();

        let blob = encrypt("secret-api-key", &key1).unwrap();
        assert!(decrypt(&blob, &key2).is_err());
    }

    #[test]
    fn corrupt_ciphertext_fails() {
        let key = test_key();
        let blob = encrypt("secret-api-key", &key).unwrap();

        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let corrupt_b64 = STANDARD.encode(raw);

        assert!(decrypt(&corrupt_b64, &key).is_err());
    }

    #[test]
    fn short_blob_fails() {
        let key = test_key();
        let short_b64 = STANDARD.encode([0u8; 10]);
        assert!(decrypt(&short_b64, &key).is_err());
    }

    #[test]
    fn wrong_key_length_fails() {
        assert!(VaultKey::from_bytes(vec![0u8; 16]).is_err());
    }

    #[test]
    fn base64_round_trip_for_key() {
        let key = VaultKey::generate();
        let encoded = key.to_base64();
        let decoded = VaultKey::from_base64(&encoded).unwrap();
        assert_eq!(decoded.0, key.0);
    }
}
