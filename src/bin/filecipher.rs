//! filecipher CLI - key-file based file encryption
//!
//! Command-line interface for generating keys and for encrypting, decrypting
//! and verifying files with AES-256-CBC plus an embedded SHA-256 digest.

use clap::parser::ValueSource;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use filecipher::error::{ErrorCategory, ErrorKind, FileCipherError, Result};
use filecipher::file_ops;
use filecipher::key::{self, FileKeySource, Key, KeySource, ReaderKeySource};

#[derive(Parser)]
#[command(name = "filecipher")]
#[command(version)]
#[command(about = "Key-file based file encryption.", long_about = None)]
struct Cli {
    /// Path to the 32-byte key file
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "FILECIPHER_KEY_FILE"
    )]
    key_file: Option<PathBuf>,

    /// Read the raw 32-byte key from stdin instead of from a key file.
    /// Overrides FILECIPHER_KEY_FILE.
    #[arg(long, global = true)]
    key_stdin: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG
    /// takes precedence when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new random key and write it to a file
    Keygen {
        /// Path to write the key to; must not already exist
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the encrypted record to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file whose contents is to be decrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the decrypted contents to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Update an encrypted file with new content, while validating
    /// that the key is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing encrypted file to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Check a plaintext file against the digest stored in an encrypted file
    Verify {
        /// Path to the plaintext file
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the encrypted file holding the expected digest
        #[arg(short, long, value_name = "FILE")]
        crypt: PathBuf,
    },
}

fn main() {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    let key_file = cli.key_file.as_deref();
    let result = match cli.command {
        Commands::Keygen { output } => key::write_key_file(&output, &Key::generate()),
        Commands::Encrypt { input, output } => get_key_source(key_file, cli.key_stdin)
            .and_then(|mut source| file_ops::encrypt_file(&input, &output, &mut *source)),
        Commands::Decrypt { input, output } => get_key_source(key_file, cli.key_stdin)
            .and_then(|mut source| file_ops::decrypt_file(&input, &output, &mut *source)),
        Commands::Update { input, output } => get_key_source(key_file, cli.key_stdin)
            .and_then(|mut source| file_ops::update_file(&input, &output, &mut *source)),
        Commands::Verify { input, crypt } => {
            file_ops::verify_file(&input, &crypt).map(|()| println!("digests match"))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

/// Parse arguments, rejecting --key-stdin combined with an explicit
/// --key-file. A key file taken from FILECIPHER_KEY_FILE is simply ignored
/// when --key-stdin is given.
fn parse_cli() -> Cli {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    if cli.key_stdin && matches.value_source("key_file") == Some(ValueSource::CommandLine) {
        Cli::command()
            .error(
                clap::error::ErrorKind::ArgumentConflict,
                "the argument '--key-stdin' cannot be used with '--key-file <FILE>'",
            )
            .exit();
    }
    cli
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("warning: failed to initialise logging: {}", e);
    }
}

fn get_key_source(key_file: Option<&Path>, use_stdin: bool) -> Result<Box<dyn KeySource>> {
    if use_stdin {
        return Ok(Box::new(ReaderKeySource::new(Box::new(std::io::stdin()))));
    }
    match key_file {
        Some(path) => Ok(Box::new(FileKeySource::new(path))),
        None => Err(FileCipherError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyUnavailable,
            "no key given; use --key-file, FILECIPHER_KEY_FILE or --key-stdin",
        )),
    }
}

fn error_chain(err: &FileCipherError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}
