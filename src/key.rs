//! Key material and the sources it can be read from

use crate::error::{ErrorCategory, ErrorKind, FileCipherError, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Length of an AES-256 key in bytes
pub const KEY_LEN: usize = 32;

/// A 256-bit secret key, wiped from memory when dropped.
#[derive(Clone)]
pub struct Key {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl Key {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Generate a fresh key from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut *bytes);
        Self { bytes }
    }

    /// Build a key from caller-supplied bytes, which must be exactly 32 long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(FileCipherError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyLength,
                format!(
                    "key must be exactly {} bytes, got {}",
                    KEY_LEN,
                    bytes.len()
                ),
            ));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key([REDACTED])")
    }
}

/// Persist a key as a raw 32-byte file.
///
/// Refuses to overwrite an existing file, since that would orphan whatever
/// was encrypted under the old key. The file is created with mode 0o600 on
/// Unix systems.
pub fn write_key_file(path: &Path, key: &Key) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        let category = if e.kind() == io::ErrorKind::AlreadyExists {
            ErrorCategory::User
        } else {
            ErrorCategory::Internal
        };
        FileCipherError::with_kind_and_source(
            category,
            ErrorKind::Io,
            format!("failed to create key file {}", path.display()),
            e,
        )
    })?;

    file.write_all(key.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| {
            FileCipherError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write key file {}", path.display()),
                e,
            )
        })?;

    tracing::debug!(path = %path.display(), "wrote key file");
    Ok(())
}

/// Trait for obtaining a key from some collaborator
pub trait KeySource {
    fn read_key(&mut self) -> Result<Key>;
}

/// Returns a fixed key (for testing)
pub struct ConstantKeySource {
    key: Key,
}

impl ConstantKeySource {
    pub fn new(key: Key) -> Self {
        Self { key }
    }
}

impl KeySource for ConstantKeySource {
    fn read_key(&mut self) -> Result<Key> {
        Ok(self.key.clone())
    }
}

/// Reads a raw key file
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeySource for FileKeySource {
    fn read_key(&mut self) -> Result<Key> {
        let data = Zeroizing::new(fs::read(&self.path).map_err(|e| {
            let category = if e.kind() == io::ErrorKind::NotFound {
                ErrorCategory::User
            } else {
                ErrorCategory::Internal
            };
            FileCipherError::with_kind_and_source(
                category,
                ErrorKind::KeyUnavailable,
                format!("failed to read key file {}", self.path.display()),
                e,
            )
        })?);
        tracing::debug!(path = %self.path.display(), "read key file");
        Key::from_slice(&data)
            .map_err(|e| e.with_context(format!("invalid key file {}", self.path.display())))
    }
}

/// Reads a raw key from any io::Read source
pub struct ReaderKeySource {
    reader: Box<dyn Read>,
}

impl ReaderKeySource {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl KeySource for ReaderKeySource {
    fn read_key(&mut self) -> Result<Key> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            FileCipherError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyUnavailable,
                format!("error reading key: {}", e),
                e,
            )
        })?;
        Key::from_slice(&data)
    }
}

/// Wraps another KeySource and caches the result
///
/// Provides "at most once" semantics - the upstream source is called only
/// until it first succeeds, and subsequent calls return the cached key.
pub struct CachingKeySource {
    upstream: Box<dyn KeySource>,
    cached: Option<Key>,
}

impl CachingKeySource {
    pub fn new(upstream: Box<dyn KeySource>) -> Self {
        Self {
            upstream,
            cached: None,
        }
    }
}

impl KeySource for CachingKeySource {
    fn read_key(&mut self) -> Result<Key> {
        if let Some(key) = &self.cached {
            return Ok(key.clone());
        }
        let key = self.upstream.read_key()?;
        self.cached = Some(key.clone());
        Ok(key)
    }
}
