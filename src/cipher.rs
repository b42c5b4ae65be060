//! Integrity-checked encryption/decryption using AES-256-CBC + SHA-256
//!
//! Encryption pads the plaintext with PKCS#7, encrypts it under a fresh
//! random IV and appends the SHA-256 digest of the unpadded plaintext. See
//! [`crate::record`] for the exact layout.
//!
//! Decryption treats a padding failure and a digest mismatch as the same
//! error, so callers cannot tell a wrong key from a tampered record.

use crate::error::{ErrorCategory, ErrorKind, FileCipherError, Result};
use crate::key::Key;
use crate::record::{CiphertextRecord, DIGEST_LEN, IV_LEN};
use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const INTEGRITY_FAILURE_MSG: &str = "corrupt input, tampered-with data, or wrong key";

/// SHA-256 of `data`.
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(data).into()
}

/// Constant-time comparison of two digests.
pub fn digests_match(a: &[u8; DIGEST_LEN], b: &[u8; DIGEST_LEN]) -> bool {
    a[..].ct_eq(&b[..]).into()
}

/// Symmetric cipher bound to one key for its whole lifetime.
///
/// The key is never mutated after construction, so a `FileCipher` can be
/// shared between threads and used concurrently.
#[derive(Debug, Clone)]
pub struct FileCipher {
    key: Key,
}

impl FileCipher {
    pub fn new(key: Key) -> Self {
        Self { key }
    }

    /// Build a cipher from raw key bytes, which must be exactly 32 long.
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        Ok(Self::new(Key::from_slice(key)?))
    }

    /// Encrypt plaintext under a random IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CiphertextRecord> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        self.encrypt_with_iv(plaintext, &iv)
    }

    /// Encrypt plaintext under a caller-provided IV.
    ///
    /// This function is ONLY for testing purposes to generate deterministic output.
    /// NEVER use this in production - reusing an IV under the same key leaks
    /// plaintext structure. Always use `encrypt()`.
    pub fn encrypt_with_iv(
        &self,
        plaintext: &[u8],
        iv: &[u8; IV_LEN],
    ) -> Result<CiphertextRecord> {
        let digest = digest(plaintext);

        let ciphertext = Aes256CbcEnc::new(self.key.as_bytes().into(), iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let expected_len = CiphertextRecord::padded_len_for(plaintext.len());
        if ciphertext.len() != expected_len {
            return Err(FileCipherError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!(
                    "ciphertext is {} bytes, expected {}",
                    ciphertext.len(),
                    expected_len
                ),
            ));
        }

        tracing::debug!(
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "encrypted"
        );
        CiphertextRecord::from_parts(*iv, ciphertext, digest)
    }

    /// Parse and decrypt a raw record.
    ///
    /// Format problems are reported before any cryptographic work is done.
    pub fn decrypt(&self, record: &[u8]) -> Result<Vec<u8>> {
        let record = CiphertextRecord::parse(record)?;
        self.decrypt_record(&record)
    }

    /// Decrypt a record and verify its digest.
    ///
    /// All-or-nothing: on failure no plaintext is returned and the recovered
    /// bytes are wiped.
    pub fn decrypt_record(&self, record: &CiphertextRecord) -> Result<Vec<u8>> {
        let plaintext = Aes256CbcDec::new(self.key.as_bytes().into(), record.iv().into())
            .decrypt_padded_vec_mut::<Pkcs7>(record.ciphertext())
            .map_err(|_| {
                tracing::debug!(
                    ciphertext_len = record.ciphertext().len(),
                    "padding check failed"
                );
                integrity_error()
            })?;
        let plaintext = Zeroizing::new(plaintext);

        if !digests_match(&digest(&plaintext), record.digest()) {
            tracing::debug!(
                ciphertext_len = record.ciphertext().len(),
                "digest mismatch"
            );
            return Err(integrity_error());
        }

        tracing::debug!(plaintext_len = plaintext.len(), "decrypted");
        Ok(plaintext.to_vec())
    }
}

fn integrity_error() -> FileCipherError {
    FileCipherError::with_kind(
        ErrorCategory::User,
        ErrorKind::IntegrityFailed,
        INTEGRITY_FAILURE_MSG,
    )
}
