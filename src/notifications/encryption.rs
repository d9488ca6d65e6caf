use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Invalid key length")]
    InvalidKeyLength,
    #[error("Key is not valid hex: {0}")]
    InvalidKeyEncoding(String),
}

/// A service to handle symmetric encryption for notification channel
/// configurations. Uses AES-256-GCM.
pub struct EncryptionService {
    // The cipher is created from a 32-byte key.
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Creates a new EncryptionService with a 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, EncryptionError> {
        Ok(Self {
            cipher: Aes256Gcm::new_from_slice(key)
                .map_err(|_| EncryptionError::InvalidKeyLength)?,
        })
    }

    /// Creates the service from the 64-hex-char key carried in server config.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, EncryptionError> {
        let key = hex::decode(hex_key)
            .map_err(|e| EncryptionError::InvalidKeyEncoding(e.to_string()))?;
        Self::new(&key)
    }

    /// Encrypts a plaintext byte slice.
    /// Prepends a 12-byte (96-bit) nonce to the ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng); // must be unique per encryption
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut result = nonce.to_vec();
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypts an encrypted byte slice.
    /// Assumes the first 12 bytes are the nonce.
    pub fn decrypt(&self, encrypted_data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if encrypted_data.len() < 12 {
            return Err(EncryptionError::DecryptionFailed(
                "Invalid encrypted data: too short to contain a nonce".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = encrypted_data.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn round_trips_plaintext() {
        let service = EncryptionService::from_hex_key(KEY).unwrap();
        let plaintext = br#"{"type":"telegram","botToken":"t","chatId":"1"}"#;
        let encrypted = service.encrypt(plaintext).unwrap();
        assert_ne!(&encrypted[12..], plaintext.as_slice());
        assert_eq!(service.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let service = EncryptionService::from_hex_key(KEY).unwrap();
        assert!(service.decrypt(&[0u8; 4]).is_err());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(EncryptionService::from_hex_key("not-hex").is_err());
        assert!(EncryptionService::new(&[0u8; 16]).is_err());
    }
}
