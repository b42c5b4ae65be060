//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the filecipher binary
fn filecipher_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_filecipher"))
}

/// Run filecipher with the given key file
fn run_with_key_file(key_file: &Path, args: &[&str]) -> Output {
    Command::new(filecipher_bin())
        .arg("--key-file")
        .arg(key_file)
        .args(args)
        .env_remove("FILECIPHER_KEY_FILE")
        .output()
        .unwrap()
}

/// Run filecipher with the raw key on stdin
fn run_with_key_stdin(key: &[u8], args: &[&str]) -> Output {
    let mut child = Command::new(filecipher_bin())
        .arg("--key-stdin")
        .args(args)
        .env_remove("FILECIPHER_KEY_FILE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., file not found)
        let _ = stdin.write_all(key);
    }

    child.wait_with_output().unwrap()
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}

fn keygen(dir: &Path) -> PathBuf {
    let key_path = dir.join("file.key");
    let result = Command::new(filecipher_bin())
        .args(["keygen", "-o", key_path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(
        result.status.success(),
        "keygen failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    key_path
}

fn assert_success(result: &Output, what: &str) {
    assert!(
        result.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&result.stderr)
    );
}

#[test]
fn test_keygen_writes_32_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    assert_eq!(fs::read(&key_path).unwrap().len(), 32);
}

#[test]
fn test_keygen_refuses_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let original = fs::read(&key_path).unwrap();

    let result = Command::new(filecipher_bin())
        .args(["keygen", "-o", key_path.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!result.status.success());
    assert_eq!(fs::read(&key_path).unwrap(), original);
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let plaintext_path = testdata_path("hello.txt");
    let encrypted_path = temp_dir.path().join("hello.txt.enc");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    let result = run_with_key_file(
        &key_path,
        &[
            "encrypt",
            "-i",
            plaintext_path.to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "encrypt");

    let result = run_with_key_file(
        &key_path,
        &[
            "decrypt",
            "-i",
            encrypted_path.to_str().unwrap(),
            "-o",
            decrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "decrypt");

    let decrypted = fs::read(&decrypted_path).unwrap();
    let expected = fs::read(&plaintext_path).unwrap();
    assert_eq!(decrypted, expected);
}

#[test]
fn test_key_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let encrypted_path = temp_dir.path().join("hello.txt.enc");

    let result = Command::new(filecipher_bin())
        .env("FILECIPHER_KEY_FILE", &key_path)
        .args([
            "e",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert_success(&result, "encrypt");
    assert!(encrypted_path.exists());
}

#[test]
fn test_key_from_stdin() {
    let temp_dir = TempDir::new().unwrap();
    let key = [0x24u8; 32];
    let encrypted_path = temp_dir.path().join("hello.txt.enc");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    let result = run_with_key_stdin(
        &key,
        &[
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "encrypt");

    let result = run_with_key_stdin(
        &key,
        &[
            "decrypt",
            "-i",
            encrypted_path.to_str().unwrap(),
            "-o",
            decrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "decrypt");

    assert_eq!(
        fs::read(&decrypted_path).unwrap(),
        fs::read(testdata_path("hello.txt")).unwrap()
    );
}

#[test]
fn test_key_stdin_overrides_environment() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let key = [0x42u8; 32];
    let encrypted_path = temp_dir.path().join("hello.txt.enc");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    let mut child = Command::new(filecipher_bin())
        .env("FILECIPHER_KEY_FILE", &key_path)
        .args([
            "--key-stdin",
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        let _ = stdin.write_all(&key);
    }
    let result = child.wait_with_output().unwrap();
    assert_success(&result, "encrypt");

    // The record must be under the stdin key, not the key file.
    let result = run_with_key_stdin(
        &key,
        &[
            "decrypt",
            "-i",
            encrypted_path.to_str().unwrap(),
            "-o",
            decrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "decrypt");
    assert_eq!(
        fs::read(&decrypted_path).unwrap(),
        fs::read(testdata_path("hello.txt")).unwrap()
    );
}

#[test]
fn test_short_key_on_stdin_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let encrypted_path = temp_dir.path().join("hello.txt.enc");

    let result = run_with_key_stdin(
        b"too short",
        &[
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("key must be exactly 32 bytes"), "{}", stderr);
    assert!(!encrypted_path.exists());
}

#[test]
fn test_missing_key_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let result = Command::new(filecipher_bin())
        .env_remove("FILECIPHER_KEY_FILE")
        .args([
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            temp_dir.path().join("out").to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("no key given"));
}

#[test]
fn test_decrypt_with_wrong_key() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let other_dir = TempDir::new().unwrap();
    let other_key_path = keygen(other_dir.path());
    let encrypted_path = temp_dir.path().join("hello.txt.enc");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    let result = run_with_key_file(
        &key_path,
        &[
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "encrypt");

    let result = run_with_key_file(
        &other_key_path,
        &[
            "decrypt",
            "-i",
            encrypted_path.to_str().unwrap(),
            "-o",
            decrypted_path.to_str().unwrap(),
        ],
    );

    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("corrupt input, tampered-with data, or wrong key"),
        "{}",
        stderr
    );
    assert!(!decrypted_path.exists());
}

#[test]
fn test_decrypt_tampered_file() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let encrypted_path = temp_dir.path().join("hello.txt.enc");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    let result = run_with_key_file(
        &key_path,
        &[
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "encrypt");

    let mut bytes = fs::read(&encrypted_path).unwrap();
    bytes[20] ^= 0x80;
    fs::write(&encrypted_path, &bytes).unwrap();

    let result = run_with_key_file(
        &key_path,
        &[
            "decrypt",
            "-i",
            encrypted_path.to_str().unwrap(),
            "-o",
            decrypted_path.to_str().unwrap(),
        ],
    );

    assert!(!result.status.success());
    assert!(!decrypted_path.exists());
}

#[test]
fn test_update_and_verify() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());
    let encrypted_path = temp_dir.path().join("notes.enc");
    let new_plain_path = temp_dir.path().join("notes-v2.txt");
    fs::write(&new_plain_path, b"second version").unwrap();

    let result = run_with_key_file(
        &key_path,
        &[
            "encrypt",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "encrypt");

    let result = run_with_key_file(
        &key_path,
        &[
            "update",
            "-i",
            new_plain_path.to_str().unwrap(),
            "-o",
            encrypted_path.to_str().unwrap(),
        ],
    );
    assert_success(&result, "update");

    let result = Command::new(filecipher_bin())
        .args([
            "verify",
            "-i",
            new_plain_path.to_str().unwrap(),
            "-c",
            encrypted_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert_success(&result, "verify");
    assert_eq!(String::from_utf8_lossy(&result.stdout).trim(), "digests match");

    let result = Command::new(filecipher_bin())
        .args([
            "verify",
            "-i",
            testdata_path("hello.txt").to_str().unwrap(),
            "-c",
            encrypted_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn test_conflicting_key_options() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = keygen(temp_dir.path());

    let result = Command::new(filecipher_bin())
        .arg("--key-file")
        .arg(&key_path)
        .args(["--key-stdin", "encrypt", "-i", "a", "-o", "b"])
        .output()
        .unwrap();

    assert_eq!(result.status.code(), Some(2));
}
