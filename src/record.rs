//! Ciphertext record layout
//!
//! A record is the only thing filecipher ever writes for encrypted data:
//! - iv: 16 bytes
//! - ciphertext: AES-256-CBC output, a non-empty multiple of 16 bytes
//! - digest: 32 bytes, SHA-256 of the original plaintext
//!
//! There is no version byte and no algorithm identifier.

use crate::error::{ErrorCategory, ErrorKind, FileCipherError, Result};

/// Length of the CBC initialization vector in bytes
pub const IV_LEN: usize = 16;

/// AES block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Length of the SHA-256 integrity digest in bytes
pub const DIGEST_LEN: usize = 32;

/// Fixed bytes added around the ciphertext
pub const OVERHEAD: usize = IV_LEN + DIGEST_LEN;

/// Smallest valid record: IV, one padding block, digest
pub const MIN_RECORD_LEN: usize = OVERHEAD + BLOCK_LEN;

/// An owned, validated `iv || ciphertext || digest` record.
#[derive(Clone, PartialEq, Eq)]
pub struct CiphertextRecord {
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    digest: [u8; DIGEST_LEN],
}

impl CiphertextRecord {
    /// Assemble a record from its three regions.
    pub fn from_parts(
        iv: [u8; IV_LEN],
        ciphertext: Vec<u8>,
        digest: [u8; DIGEST_LEN],
    ) -> Result<Self> {
        check_ciphertext_len(ciphertext.len())?;
        Ok(Self {
            iv,
            ciphertext,
            digest,
        })
    }

    /// Validate raw bytes as a record. No cryptographic work happens here.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        check_record_len(bytes.len())?;

        let (iv, rest) = bytes.split_at(IV_LEN);
        let (ciphertext, digest) = rest.split_at(rest.len() - DIGEST_LEN);

        let mut record = Self {
            iv: [0u8; IV_LEN],
            ciphertext: ciphertext.to_vec(),
            digest: [0u8; DIGEST_LEN],
        };
        record.iv.copy_from_slice(iv);
        record.digest.copy_from_slice(digest);
        Ok(record)
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Serialize to the wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.ciphertext);
        bytes.extend_from_slice(&self.digest);
        bytes
    }

    pub fn len(&self) -> usize {
        OVERHEAD + self.ciphertext.len()
    }

    /// Present for API completeness alongside `len()`. Always false, since
    /// construction rejects a record without at least one ciphertext block.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ciphertext length produced for a plaintext of `plaintext_len` bytes.
    ///
    /// PKCS#7 always adds between 1 and 16 bytes, so an exact multiple of
    /// the block size gains a whole extra block.
    pub fn padded_len_for(plaintext_len: usize) -> usize {
        (plaintext_len / BLOCK_LEN + 1) * BLOCK_LEN
    }
}

impl std::fmt::Debug for CiphertextRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiphertextRecord")
            .field("len", &self.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn check_record_len(len: usize) -> Result<()> {
    if len < MIN_RECORD_LEN {
        return Err(FileCipherError::with_kind(
            ErrorCategory::User,
            ErrorKind::Truncated,
            format!(
                "record is {} bytes, smaller than the minimum of {}; likely truncated",
                len, MIN_RECORD_LEN
            ),
        ));
    }
    check_ciphertext_len(len - OVERHEAD)
}

fn check_ciphertext_len(len: usize) -> Result<()> {
    if len == 0 || len % BLOCK_LEN != 0 {
        return Err(FileCipherError::with_kind(
            ErrorCategory::User,
            ErrorKind::Misaligned,
            format!(
                "ciphertext region is {} bytes, not a non-empty multiple of {}",
                len, BLOCK_LEN
            ),
        ));
    }
    Ok(())
}
