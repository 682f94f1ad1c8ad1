//! Symmetric encryption for secrets carried inside the flow state.
//!
//! The identity provider's raw ID token (and the verified national
//! identifier) must survive the redirect round trip without being readable
//! by the client, and must be recoverable later in the same logical flow.
//! `FlowCipher` provides that reversible encryption (AES-256-GCM with a
//! fresh random nonce per value), plus a deterministic keyed fingerprint
//! used where only equality matching is ever needed.
//!
//! The cipher secret must be distinct from the codec secret that
//! authenticates the outer state envelope; the server refuses to start
//! when they coincide.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// AES-GCM nonce length in bytes, prepended to every ciphertext.
const NONCE_LEN: usize = 12;

/// Encrypts, decrypts, and fingerprints flow secrets.
#[derive(Clone)]
pub struct FlowCipher {
    cipher: Aes256Gcm,
    fingerprint_key: [u8; 32],
}

impl FlowCipher {
    /// Creates a cipher from the configured secret.
    ///
    /// The AES key is the SHA-256 digest of the secret; the fingerprint key
    /// is derived separately so digests are unrelated to the cipher key.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let key_bytes = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(b":fingerprint");
        let fingerprint_key = hasher.finalize().into();

        Self {
            cipher,
            fingerprint_key,
        }
    }

    /// Encrypts a value, producing a base64 `nonce || ciphertext` blob.
    ///
    /// Each call uses a fresh random nonce, so encrypting the same value
    /// twice yields different blobs.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .expect("encrypt flow secret");

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);
        STANDARD.encode(raw)
    }

    /// Decrypts a blob produced by [`FlowCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] when the blob is not in the expected shape or
    /// fails authentication under this cipher's key. Callers treat this as a
    /// fatal condition for the operation that needed the plaintext; the flow
    /// never proceeds with a missing credential.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let raw = STANDARD.decode(encoded).map_err(|_| CipherError::Malformed)?;
        if raw.len() < NONCE_LEN {
            return Err(CipherError::Malformed);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::Malformed)
    }

    /// Returns a deterministic keyed digest of a value.
    ///
    /// Used for the stored form of the national identifier, which is only
    /// ever matched for equality and never recovered from storage.
    #[must_use]
    pub fn fingerprint(&self, value: &str) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.fingerprint_key)
            .expect("HMAC can take key of any size");
        mac.update(value.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// Errors from decrypting a flow secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    /// The blob was not base64, too short, or did not hold valid UTF-8.
    Malformed,
    /// Authentication failed: wrong key or corrupted ciphertext.
    DecryptionFailed,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed encrypted value"),
            Self::DecryptionFailed => write!(f, "decryption failed"),
        }
    }
}

impl std::error::Error for CipherError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FlowCipher {
        FlowCipher::new("test-encryption-secret")
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("raw-id-token");
        let decrypted = cipher.decrypt(&encrypted).expect("decrypt");
        assert_eq!(decrypted, "raw-id-token");
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let encrypted = cipher().encrypt("raw-id-token");
        assert_ne!(encrypted, "raw-id-token");
    }

    #[test]
    fn encrypting_twice_yields_different_blobs() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same-value"), cipher.encrypt("same-value"));
    }

    #[test]
    fn decrypt_rejects_garbage() {
        assert_eq!(cipher().decrypt("not base64"), Err(CipherError::Malformed));
    }

    #[test]
    fn decrypt_rejects_truncated_blob() {
        assert_eq!(
            cipher().decrypt(&STANDARD.encode([0u8; 4])),
            Err(CipherError::Malformed)
        );
    }

    #[test]
    fn decrypt_rejects_foreign_key() {
        let encrypted = FlowCipher::new("key-a").encrypt("raw-id-token");
        assert_eq!(
            FlowCipher::new("key-b").decrypt(&encrypted),
            Err(CipherError::DecryptionFailed)
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let cipher = cipher();
        assert_eq!(cipher.fingerprint("010180-1234"), cipher.fingerprint("010180-1234"));
    }

    #[test]
    fn fingerprint_differs_per_value_and_key() {
        let cipher = cipher();
        assert_ne!(cipher.fingerprint("010180-1234"), cipher.fingerprint("010180-4321"));
        assert_ne!(
            cipher.fingerprint("010180-1234"),
            FlowCipher::new("other-secret").fingerprint("010180-1234")
        );
    }

    #[test]
    fn fingerprint_does_not_reveal_value() {
        assert!(!cipher().fingerprint("010180-1234").contains("010180"));
    }
}
