//! filecipher - key-file based whole-file encryption
//!
//! Records are AES-256-CBC ciphertext under a random IV, followed by the
//! SHA-256 digest of the plaintext so that decryption can prove it recovered
//! exactly what was encrypted.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod error;
pub mod file_ops;
pub mod key;
pub mod record;

pub use cipher::FileCipher;
pub use error::{ErrorCategory, ErrorKind, FileCipherError, Result};
pub use key::Key;
pub use record::CiphertextRecord;
