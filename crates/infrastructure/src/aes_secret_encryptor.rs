//! AES-256-GCM encryptor for webhook signing secrets at rest.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use clinora_application::SecretEncryptor;
use clinora_core::{AppError, AppResult};
use clinora_domain::{EncryptedSecret, SigningSecret};

/// AES-256-GCM encryptor protecting signing secrets in the database.
#[derive(Clone)]
pub struct AesSecretEncryptor {
    cipher: Aes256Gcm,
}

impl AesSecretEncryptor {
    /// Creates a new encryptor from a 32-byte key.
    #[must_use]
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(key_bytes.into());
        Self { cipher }
    }

    /// Creates a new encryptor from a hex-encoded 32-byte key.
    pub fn from_hex(hex_key: &str) -> AppResult<Self> {
        let decoded = hex::decode(hex_key).map_err(|error| {
            AppError::Validation(format!("invalid WEBHOOK_ENCRYPTION_KEY hex: {error}"))
        })?;

        if decoded.len() != 32 {
            return Err(AppError::Validation(
                "WEBHOOK_ENCRYPTION_KEY must be exactly 32 bytes (64 hex chars)".to_owned(),
            ));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded);
        Ok(Self::new(&key))
    }
}

impl SecretEncryptor for AesSecretEncryptor {
    fn encrypt(&self, secret: &SigningSecret) -> AppResult<EncryptedSecret> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, secret.expose().as_bytes())
            .map_err(|error| AppError::Internal(format!("failed to encrypt secret: {error}")))?;

        // Prepend the 12-byte nonce to the ciphertext for storage.
        let mut result = Vec::with_capacity(nonce.len() + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);
        Ok(EncryptedSecret::new(result))
    }

    fn decrypt(&self, secret: &EncryptedSecret) -> AppResult<SigningSecret> {
        let ciphertext = secret.as_bytes();
        if ciphertext.len() < 12 {
            return Err(AppError::Internal(
                "ciphertext too short: missing nonce".to_owned(),
            ));
        }

        let (nonce_bytes, encrypted) = ciphertext.split_at(12);
        let nonce_array: [u8; 12] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::Internal("nonce must be exactly 12 bytes".to_owned()))?;
        let nonce = Nonce::from(nonce_array);

        let plaintext = self
            .cipher
            .decrypt(&nonce, encrypted)
            .map_err(|error| AppError::Internal(format!("failed to decrypt secret: {error}")))?;

        let value = String::from_utf8(plaintext).map_err(|error| {
            AppError::Internal(format!("decrypted secret is not valid UTF-8: {error}"))
        })?;

        SigningSecret::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() -> AppResult<()> {
        let key = [42u8; 32];
        let encryptor = AesSecretEncryptor::new(&key);

        let secret = SigningSecret::new("whsec_roundtrip")?;
        let encrypted = encryptor.encrypt(&secret)?;
        let decrypted = encryptor.decrypt(&encrypted)?;

        assert_eq!(decrypted.expose(), secret.expose());
        assert_ne!(encrypted.as_bytes(), secret.expose().as_bytes());
        Ok(())
    }

    #[test]
    fn decrypt_with_wrong_key_fails() -> AppResult<()> {
        let encryptor1 = AesSecretEncryptor::new(&[42u8; 32]);
        let encryptor2 = AesSecretEncryptor::new(&[99u8; 32]);

        let encrypted = encryptor1.encrypt(&SigningSecret::new("whsec_roundtrip")?)?;
        assert!(encryptor2.decrypt(&encrypted).is_err());
        Ok(())
    }

    #[test]
    fn from_hex_validates_key_length() {
        assert!(AesSecretEncryptor::from_hex("deadbeef").is_err());
        assert!(AesSecretEncryptor::from_hex("not hex at all").is_err());
        assert!(AesSecretEncryptor::from_hex(&"ab".repeat(32)).is_ok());
    }
}
