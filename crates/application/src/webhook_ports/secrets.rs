use clinora_core::AppResult;
use clinora_domain::{EncryptedSecret, SigningSecret};

/// Port for protecting signing secrets at rest.
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts one plaintext signing secret for storage.
    fn encrypt(&self, secret: &SigningSecret) -> AppResult<EncryptedSecret>;

    /// Decrypts one stored secret back to its plaintext form.
    fn decrypt(&self, secret: &EncryptedSecret) -> AppResult<SigningSecret>;
}
