//! AES-256-GCM encryption of payment detail records

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::domain::payment_method::{EncryptedBlob, PaymentDetails};
use crate::shared::error::{AppError, AppResult};

const BLOB_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Stateless record cipher.
///
/// Holds only the key schedule, so a clone can be shared freely across tasks.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

impl Encryptor {
    /// Build from the base64 key in configuration
    pub fn from_base64_key(key: &str) -> AppResult<Self> {
        let bytes = BASE64
            .decode(key.trim())
            .map_err(|_| AppError::Config("encryption key is not valid base64".to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|_| AppError::Config(format!("encryption key must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self { cipher })
    }

    /// Encrypt a record under a fresh random nonce
    pub fn encrypt(&self, details: &PaymentDetails) -> AppResult<EncryptedBlob> {
        let plaintext = serde_json::to_vec(details).map_err(|_| AppError::Encryption)?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
            .map_err(|_| AppError::Encryption)?;

        // aes-gcm appends the tag to the ciphertext
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        Ok(EncryptedBlob {
            version: BLOB_VERSION,
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
            tag: BASE64.encode(tag),
        })
    }

    /// Decrypt and authenticate a blob.
    ///
    /// Any malformed part, unknown version or failed tag check yields
    /// `AppError::Decryption` and nothing else.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> AppResult<PaymentDetails> {
        if blob.version != BLOB_VERSION {
            return Err(AppError::Decryption);
        }
        let nonce = BASE64.decode(&blob.nonce).map_err(|_| AppError::Decryption)?;
        let mut sealed = BASE64.decode(&blob.ciphertext).map_err(|_| AppError::Decryption)?;
        let tag = BASE64.decode(&blob.tag).map_err(|_| AppError::Decryption)?;
        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(AppError::Decryption);
        }
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
            .map_err(|_| AppError::Decryption)?;
        serde_json::from_slice(&plaintext).map_err(|_| AppError::Decryption)
    }
}
