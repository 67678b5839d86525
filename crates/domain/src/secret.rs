use std::fmt::{Debug, Formatter};

use clinora_core::{AppError, AppResult};

/// Plaintext webhook signing secret.
///
/// Held in memory only long enough to sign a payload or to hand back to the
/// tenant once at creation/rotation time. The `Debug` output is redacted and
/// the type deliberately has no serde support so it cannot end up in logs or
/// serialized payloads by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);

impl SigningSecret {
    /// Wraps a non-empty secret value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "signing secret must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the secret value for signing or for the one-time reveal.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for SigningSecret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("SigningSecret(<redacted>)")
    }
}

/// Encrypted-at-rest signing secret as stored in the registry.
///
/// Opaque ciphertext bytes; only a `SecretEncryptor` implementation can turn
/// this back into a [`SigningSecret`].
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedSecret(Vec<u8>);

impl EncryptedSecret {
    /// Wraps ciphertext bytes produced by a secret encryptor.
    #[must_use]
    pub fn new(ciphertext: Vec<u8>) -> Self {
        Self(ciphertext)
    }

    /// Returns the ciphertext bytes for storage or decryption.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Debug for EncryptedSecret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("EncryptedSecret(<redacted>)")
    }
}
