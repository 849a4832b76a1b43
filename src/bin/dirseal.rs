//! dirseal CLI - password-based in-place encryption of a directory tree
//!
//! Encrypts every regular file under a root into `<name>.enc` envelopes
//! (Argon2id + ChaCha20-Poly1305), or decrypts every envelope back.

use clap::{ArgGroup, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

use dirseal::discovery::Selector;
use dirseal::passphrase::{
    ConfirmingPassphraseReader, LinePairPassphraseReader, PassphraseReader,
    ReaderPassphraseReader, TerminalPassphraseReader,
};
use dirseal::pipeline::{self, Mode};

#[derive(Parser)]
#[command(name = "dirseal")]
#[command(version)]
#[command(about = "Password-based in-place encryption of a directory tree.", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["encrypt", "decrypt"])))]
struct Cli {
    /// Encrypt every file under the root, replacing it with <name>.enc
    #[arg(short, long)]
    encrypt: bool,

    /// Decrypt every <name>.enc file under the root, replacing it with <name>
    #[arg(short, long)]
    decrypt: bool,

    /// Directory whose files are processed
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Read password from stdin instead of from terminal. When encrypting,
    /// stdin must hold the password and its confirmation on separate lines
    #[arg(long)]
    passphrase_stdin: bool,

    /// Log each step, not just per-file results
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log failures
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.encrypt {
            Mode::Encrypt
        } else {
            Mode::Decrypt
        }
    }

    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .with_max_level(cli.log_level())
        .init();

    if !cli.root.is_dir() {
        eprintln!("Error: {} is not a directory", cli.root.display());
        return ExitCode::FAILURE;
    }

    let mode = cli.mode();
    let mut reader = get_passphrase_reader(mode, cli.passphrase_stdin);
    let password = match reader.read_passphrase() {
        Ok(password) => password,
        Err(e) => {
            eprintln!("Error: {}", e.chain_message());
            return ExitCode::FAILURE;
        }
    };

    let selector = Selector::for_current_exe(mode);
    let report = pipeline::run(&cli.root, &selector, &password);
    drop(password);

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "Error: {} of {} files failed to {}",
            report.failed.len(),
            report.failed.len() + report.succeeded.len(),
            mode
        );
        ExitCode::FAILURE
    }
}

fn get_passphrase_reader(mode: Mode, use_stdin: bool) -> Box<dyn PassphraseReader> {
    match (mode, use_stdin) {
        (Mode::Encrypt, true) => Box::new(LinePairPassphraseReader::stdin()),
        (Mode::Encrypt, false) => Box::new(ConfirmingPassphraseReader::terminal()),
        (Mode::Decrypt, true) => Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin()))),
        (Mode::Decrypt, false) => Box::new(TerminalPassphraseReader::default()),
    }
}
