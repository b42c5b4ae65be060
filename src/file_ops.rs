//! File encryption/decryption operations
//!
//! This module provides whole-file operations for encrypting, decrypting,
//! updating and verifying files in the filecipher record format. Files are
//! read fully into memory; there is no streaming.

use crate::cipher::{self, FileCipher};
use crate::error::{ErrorCategory, ErrorKind, FileCipherError, Result};
use crate::key::KeySource;
use crate::record::{CiphertextRecord, DIGEST_LEN};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use zeroize::Zeroizing;

/// Encrypt a file with a key
///
/// Reads plaintext from `input_path`, encrypts it using a key from
/// `key_source`, and writes the record to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    key_source: &mut dyn KeySource,
) -> Result<()> {
    let plaintext = Zeroizing::new(fs::read(input_path).map_err(|e| read_error(input_path, e))?);
    let cipher = FileCipher::new(key_source.read_key()?);
    let record = cipher
        .encrypt(&plaintext)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_secure(output_path, &record.to_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    tracing::info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = plaintext.len(),
        "encrypted file"
    );
    Ok(())
}

/// Decrypt a file with a key
///
/// Reads a record from `input_path`, decrypts it using a key from
/// `key_source`, and writes the plaintext to `output_path`. Nothing is
/// written unless the record passes every integrity check.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    key_source: &mut dyn KeySource,
) -> Result<()> {
    let record = read_record(input_path)?;
    let cipher = FileCipher::new(key_source.read_key()?);
    let plaintext = Zeroizing::new(
        cipher
            .decrypt_record(&record)
            .map_err(|e| e.with_context("failed to decrypt"))?,
    );
    write_file_secure(output_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    tracing::info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = plaintext.len(),
        "decrypted file"
    );
    Ok(())
}

/// Update an encrypted file with new plaintext under the same key
///
/// This function:
/// 1. Decrypts the existing file at `crypt_path` to validate the key
/// 2. Reads new plaintext from `plain_path`
/// 3. Encrypts the new plaintext with the validated key
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// The atomic write ensures that either the old file or the new file exists,
/// never a partial/corrupted file.
///
/// The key validation prevents accidentally re-encrypting under a different key.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    key_source: &mut dyn KeySource,
) -> Result<()> {
    let record = read_record(crypt_path)?;
    let cipher = FileCipher::new(key_source.read_key()?);

    // Validate key by decrypting existing file (discard plaintext)
    drop(Zeroizing::new(
        cipher
            .decrypt_record(&record)
            .map_err(|e| e.with_context("failed to decrypt"))?,
    ));

    // Great, let's re-write it (atomically).
    let crypt_dir = match crypt_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => {
            return Err(FileCipherError::with_kind(
                ErrorCategory::User,
                ErrorKind::Io,
                "crypt_path has no parent directory",
            ));
        }
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(crypt_dir)
        .map_err(|e| internal_io("failed to create tempfile", e))?;
    let new_plaintext =
        Zeroizing::new(fs::read(plain_path).map_err(|e| read_error(plain_path, e))?);
    let new_record = cipher
        .encrypt(&new_plaintext)
        .map_err(|e| e.with_context("failed to encrypt"))?;

    temp_file
        .write_all(&new_record.to_bytes())
        .map_err(|e| internal_io("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| internal_io("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| internal_io("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| internal_io("failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| internal_io("failed to set tempfile permissions", e))?;
    }
    temp_file.persist(crypt_path).map_err(|e| {
        internal_io(
            format!("failed to rename to target file {}", crypt_path.display()),
            e.error,
        )
    })?;

    tracing::info!(
        input = %plain_path.display(),
        output = %crypt_path.display(),
        bytes = new_plaintext.len(),
        "updated encrypted file"
    );
    Ok(())
}

/// Check a plaintext file against the digest stored in an encrypted file
///
/// This is an out-of-band integrity check and needs no key: it only proves
/// that `plain_path` holds the same bytes that were encrypted into
/// `crypt_path`.
pub fn verify_file(plain_path: &Path, crypt_path: &Path) -> Result<()> {
    let record = read_record(crypt_path)?;
    let actual = digest_file(plain_path)?;

    if !cipher::digests_match(&actual, record.digest()) {
        return Err(FileCipherError::with_kind(
            ErrorCategory::User,
            ErrorKind::IntegrityFailed,
            format!(
                "digest of {} does not match the digest stored in {}",
                plain_path.display(),
                crypt_path.display()
            ),
        ));
    }

    tracing::info!(
        plain = %plain_path.display(),
        crypt = %crypt_path.display(),
        "digests match"
    );
    Ok(())
}

/// SHA-256 of a file's full contents.
pub fn digest_file(path: &Path) -> Result<[u8; DIGEST_LEN]> {
    let data = Zeroizing::new(fs::read(path).map_err(|e| read_error(path, e))?);
    Ok(cipher::digest(&data))
}

fn read_record(path: &Path) -> Result<CiphertextRecord> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "read record");
    CiphertextRecord::parse(&bytes)
        .map_err(|e| e.with_context(format!("{} is not a valid record", path.display())))
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        FileCipherError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to open {}", path.display()),
            e,
        )
    })?;

    // mode() only applies on creation; an existing file keeps its old mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                internal_io(
                    format!("failed to set permissions on {}", path.display()),
                    e,
                )
            })?;
    }

    file.write_all(contents)
        .map_err(|e| internal_io(format!("failed to write {}", path.display()), e))?;
    Ok(())
}

fn internal_io(msg: impl Into<String>, err: io::Error) -> FileCipherError {
    FileCipherError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}

fn read_error(path: &Path, err: io::Error) -> FileCipherError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    FileCipherError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
