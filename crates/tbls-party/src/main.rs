//! TBLS Party CLI
//!
//! Command-line interface for threshold BLS operations:
//! - Distributed Key Generation (DKG) among in-process parties
//! - Signature share generation from a persisted key share
//! - Threshold aggregation and verification

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tbls_core::keygen::DkgCoordinator;
use tbls_core::provider::{Bn254Party, Bn254Provider};
use tbls_core::sign::{collect_signatures, Signer};
use tbls_core::store::{self, ShareStore};
use tbls_core::verify::Aggregator;
use tbls_core::{message_digest, PartyId, ThresholdConfig, DEFAULT_PARTIES, DEFAULT_THRESHOLD};
use tracing::{info, warn, Level};

/// TBLS Party - threshold BLS key generation, signing and verification
#[derive(Parser)]
#[command(name = "tbls-party")]
#[command(about = "Threshold BLS key generation, share signing and verification")]
#[command(version)]
struct Cli {
    /// Directory for key share and signature records
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run distributed key generation and save the key share record
    Keygen {
        /// Number of parties
        #[arg(short, long, default_value_t = DEFAULT_PARTIES)]
        n: usize,

        /// Threshold (t-of-n)
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        t: usize,

        /// Abort key generation after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Also write one file per party holding only its share
        #[arg(long)]
        split: bool,
    },

    /// Produce signature shares, one per key share file
    Sign {
        /// Key share files; each signs with its first share
        #[arg(short, long = "config", required = true, num_args = 1..)]
        configs: Vec<PathBuf>,

        /// Message to sign; its SHA-256 digest is signed
        #[arg(short, long)]
        message: String,
    },

    /// Aggregate signature shares and verify the group signature
    Verify {
        /// Signature share record
        #[arg(short, long)]
        sigs: PathBuf,

        /// Message that was signed
        #[arg(short, long)]
        message: String,

        /// Participating party IDs (comma-separated); all when omitted
        #[arg(short, long)]
        parties: Option<String>,

        /// Key share record to take the threshold public key from
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show key share record info
    Info {
        /// Key share file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen {
            n,
            t,
            timeout_secs,
            split,
        } => {
            run_keygen(&cli.dest, n, t, Duration::from_secs(timeout_secs), split).await?;
        }
        Commands::Sign {
            ref configs,
            ref message,
        } => {
            run_sign(&cli.dest, configs, message)?;
        }
        Commands::Verify {
            ref sigs,
            ref message,
            ref parties,
            ref config,
        } => {
            run_verify(sigs, message, parties.as_deref(), config.as_deref())?;
        }
        Commands::Info { ref config } => {
            show_info(config)?;
        }
    }

    Ok(())
}

async fn run_keygen(dest: &Path, n: usize, t: usize, timeout: Duration, split: bool) -> Result<()> {
    info!(n_parties = n, threshold = t, "Starting DKG");

    let config = ThresholdConfig::new(n, t)?;
    let coordinator = DkgCoordinator::new(config, &Bn254Provider)?.with_timeout(timeout);
    let outcome = coordinator
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    for failure in outcome.failures() {
        warn!(party = failure.party, reason = %failure.reason, "Party failed");
    }
    let record = outcome.into_record().context("key generation did not complete")?;

    let store = ShareStore::new(dest);
    let path = store.save(&record)?;
    info!(path = ?path, "DKG completed, key share record saved");
    println!("Key shares: {}", path.display());

    if split {
        for path in store.save_per_party(&record)? {
            println!("Party share: {}", path.display());
        }
    }

    println!(
        "Threshold Public Key: {}",
        hex::encode(record.threshold_public_key_bytes()?)
    );

    Ok(())
}

fn run_sign(dest: &Path, configs: &[PathBuf], message: &str) -> Result<()> {
    let signers = configs
        .iter()
        .map(|path| {
            Signer::<Bn254Party>::load(path, &Bn254Provider)
                .with_context(|| format!("loading {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let digest = message_digest(message.as_bytes());
    info!(
        parties = ?signers.iter().map(|s| s.party_id()).collect::<Vec<_>>(),
        digest = hex::encode(digest),
        "Signing"
    );

    let record = collect_signatures(&signers, &digest)?;
    let path = ShareStore::new(dest).save_signatures(&record)?;

    for entry in &record.sigs {
        println!("Party {}: {}", entry.party_id, entry.sig);
    }
    println!("Signature shares: {}", path.display());

    Ok(())
}

fn run_verify(
    sigs_path: &Path,
    message: &str,
    parties: Option<&str>,
    config: Option<&Path>,
) -> Result<()> {
    let sigs = store::load_signatures(sigs_path)?;

    let aggregator = match config {
        Some(path) => Aggregator::from_record(&Bn254Provider, &store::load(path)?)?,
        None => Aggregator::from_signatures(&Bn254Provider, &sigs)?,
    };

    let ids: Vec<PartyId> = match parties {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().parse())
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("parsing party IDs")?,
        None => Vec::new(),
    };

    let digest = message_digest(message.as_bytes());
    if !aggregator.verify_record(&digest, &sigs, &ids) {
        bail!("signature rejected");
    }

    info!(parties = ?ids, "Signature verified");
    println!("Signature: valid");

    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let record = store::load(path)?;

    println!("Key Share Record Info:");
    println!("  N Parties: {}", record.total_parties);
    println!("  Threshold: {}", record.threshold);
    println!(
        "  Threshold Public Key: {}",
        hex::encode(record.threshold_public_key_bytes()?)
    );
    println!(
        "  Party IDs: {:?}",
        record.shares.iter().map(|e| e.party_id).collect::<Vec<_>>()
    );

    Ok(())
}
