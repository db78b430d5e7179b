use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod check;
mod remote;
mod setup;

const DEFAULT_URL: &str = "http://127.0.0.1:8000";

/// Face capture validation: cascade setup, local checks and daemon requests.
#[derive(Parser)]
#[command(name = "facecap", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the frontal-face Haar cascade.
    Setup {
        /// Destination directory (default: per-user or system model dir).
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Expected SHA-256 of the cascade file.
        #[arg(long, env = "FACECAP_CASCADE_SHA256")]
        sha256: Option<String>,
    },
    /// Run the capture checks on a local image file.
    Check {
        /// Image file (JPEG, PNG, ...).
        file: PathBuf,

        /// Cascade XML (default: cascade in the model dir).
        #[arg(long, env = "FACECAP_CASCADE_PATH")]
        cascade: Option<PathBuf>,

        /// Where accepted captures are written.
        #[arg(long, default_value = "captured_faces")]
        capture_dir: PathBuf,

        /// Minimum mean brightness (0-255).
        #[arg(long, default_value = "80")]
        brightness: f64,

        /// Minimum Laplacian variance.
        #[arg(long, default_value = "120")]
        blur: f64,
    },
    /// Send an image file to a running facecapd.
    Verify {
        /// Image file (JPEG, PNG, ...).
        file: PathBuf,

        /// Daemon base URL.
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
    /// Show daemon health.
    Status {
        /// Daemon base URL.
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but the capture was rejected.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Setup { model_dir, sha256 } => {
            setup::run(model_dir, sha256.as_deref())?;
            Ok(true)
        }
        Command::Check {
            file,
            cascade,
            capture_dir,
            brightness,
            blur,
        } => check::run(&check::CheckArgs {
            file,
            cascade,
            capture_dir,
            brightness,
            blur,
        }),
        Command::Verify { file, url } => remote::verify(&file, &url),
        Command::Status { url } => remote::status(&url),
    }
}
