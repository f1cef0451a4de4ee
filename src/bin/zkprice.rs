//! zkprice CLI
//!
//! Runs attestation rounds against the local ledger, computes commitments
//! offline, dry-runs payloads and queries recorded attestations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use zkprice::config::AttestorConfig;
use zkprice::ledger::{AttestationPayload, LocalLedger, OnChainVerifier};
use zkprice::oracle::{unix_now, PriceSource, StaticPriceSource};
use zkprice::pipeline::AttestationPipeline;
use zkprice::publisher::{AttemptStatus, KeySigner, TransactionSigner, SIGNING_KEY_ENV};
use zkprice::storage::FileStore;
use zkprice::utils::crypto::{Hash, KeyPair};
use zkprice::zkp::{AssetRegistry, CommitmentBinder, NativeProofSystem, ProofDigest};

/// zkprice - zero-knowledge price attestation
#[derive(Parser)]
#[command(name = "zkprice")]
#[command(version = zkprice::VERSION)]
#[command(about = "Attest asset prices with consensus proofs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "ZKPRICE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one attestation round with fixed quotes
    Attest {
        /// Asset identifier
        #[arg(short, long)]
        asset: String,

        /// One quote per independent source (7 decimals)
        #[arg(short, long = "price", required = true, num_args = 1..)]
        prices: Vec<u64>,

        /// Observation time (defaults to now)
        #[arg(short, long)]
        timestamp: Option<u64>,

        /// Use a throwaway ledger instead of the data directory
        #[arg(long)]
        in_memory: bool,
    },

    /// Compute a commitment without touching the ledger
    Commitment {
        /// Asset identifier
        #[arg(short, long)]
        asset: String,

        /// Price (7 decimals)
        #[arg(short, long)]
        price: u64,

        /// Timestamp (unix seconds)
        #[arg(short, long)]
        timestamp: u64,

        /// Keccak256 proof digest (hex)
        #[arg(short = 'd', long)]
        proof_digest: String,
    },

    /// Dry-run a JSON attestation payload against the local ledger
    VerifyPayload {
        /// Payload file
        file: PathBuf,
    },

    /// Query recorded attestations
    #[command(subcommand)]
    Query(QueryCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Key management
    #[command(subcommand)]
    Keys(KeysCommands),
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Latest attested price for an asset
    LastPrice {
        /// Asset identifier
        asset: String,
    },

    /// Audit metadata of an attestation
    Attestation {
        /// Attestation id
        id: u64,
    },

    /// Whether a proof digest has been used
    Proof {
        /// Keccak256 proof digest (hex)
        digest: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Validate the effective configuration
    Validate,
}

#[derive(Subcommand)]
enum KeysCommands {
    /// Generate a new attestor key
    Generate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "zkprice=debug" } else { "zkprice=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Attest {
            asset,
            prices,
            timestamp,
            in_memory,
        } => cmd_attest(cli, asset, prices, *timestamp, *in_memory, term).await,
        Commands::Commitment {
            asset,
            price,
            timestamp,
            proof_digest,
        } => cmd_commitment(cli, asset, *price, *timestamp, proof_digest, term),
        Commands::VerifyPayload { file } => cmd_verify_payload(cli, file, term),
        Commands::Query(cmd) => cmd_query(cli, cmd, term),
        Commands::Config(cmd) => cmd_config(cli, cmd, term),
        Commands::Keys(KeysCommands::Generate) => cmd_keys_generate(term),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn cmd_attest(
    cli: &Cli,
    asset: &str,
    prices: &[u64],
    timestamp: Option<u64>,
    in_memory: bool,
    term: &Term,
) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let signer = Arc::new(match std::env::var(SIGNING_KEY_ENV) {
        Ok(_) => KeySigner::from_env().context("reading signing key")?,
        Err(_) if in_memory => KeySigner::generate(),
        Err(_) => bail!("{} must be set to attest against a persistent ledger", SIGNING_KEY_ENV),
    });

    let ledger: Arc<dyn zkprice::ledger::LedgerClient> = if in_memory {
        Arc::new(LocalLedger::in_memory(signer.public_key(), config.verifier)?)
    } else {
        Arc::new(LocalLedger::open(config.ledger_dir(), signer.public_key(), config.verifier)?)
    };

    let observed_at = timestamp.unwrap_or_else(unix_now);
    let sources: Vec<Arc<dyn PriceSource>> = prices
        .iter()
        .enumerate()
        .map(|(i, price)| {
            Arc::new(StaticPriceSource::new(format!("static-{}", i), asset, *price).at(observed_at))
                as Arc<dyn PriceSource>
        })
        .collect();

    let pipeline = AttestationPipeline::from_config(
        &config,
        sources,
        Arc::new(NativeProofSystem::new(config.scale)),
        ledger,
        signer,
    )?;

    let spinner = create_spinner(&format!("Attesting {}...", asset));
    let result = pipeline.run_round(asset).await;
    spinner.finish_and_clear();
    let report = result?;

    let proof = &report.proof;
    let _ = term.write_line(&format!("{} Consensus proof for {}", style("→").cyan(), style(asset).bold()));
    let _ = term.write_line(&format!(
        "  Average: {}",
        style(format!("${}", config.scale.output_as_decimal(proof.averaged_price()))).green()
    ));
    let _ = term.write_line(&format!("  Proof digest: {}", style(proof.proof_digest()).dim()));
    let _ = term.write_line(&format!("  Commitment: {}", style(report.commitment.value()).yellow()));

    let attempt = &report.attempt;
    if let Some(tx_ref) = attempt.ledger_tx_ref() {
        let _ = term.write_line(&format!("  Tx: {}", style(tx_ref).dim()));
    }
    match attempt.status() {
        AttemptStatus::Confirmed { attestation_id } => {
            let _ = term.write_line(&format!(
                "{} Attestation {} confirmed",
                style("✓").green(),
                style(attestation_id).yellow()
            ));
            Ok(())
        }
        AttemptStatus::Failed(reason) => bail!("attestation failed: {}", reason),
        status => bail!("attestation ended in non-terminal status {:?}", status),
    }
}

fn cmd_commitment(
    cli: &Cli,
    asset: &str,
    price: u64,
    timestamp: u64,
    proof_digest: &str,
    term: &Term,
) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let registry = AssetRegistry::from_config(&config)?;
    let digest = ProofDigest::from_hash(Hash::from_hex(proof_digest)?);

    let commitment = CommitmentBinder::new(Arc::new(registry)).bind(price, timestamp, asset, &digest)?;

    let _ = term.write_line(&format!("{} Commitment ({:?})", style("→").cyan(), commitment.format()));
    let _ = term.write_line(&format!("  Value: {}", style(commitment.value()).yellow()));
    let _ = term.write_line(&format!("  Bytes: {}", hex::encode(commitment.to_bytes())));
    Ok(())
}

fn cmd_verify_payload(cli: &Cli, file: &Path, term: &Term) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let payload: AttestationPayload = serde_json::from_str(&content).context("parsing payload")?;

    let verifier = open_verifier(&config)?;
    match verifier.check(&payload)? {
        None => {
            let _ = term.write_line(&format!("{} Payload would be accepted", style("✓").green()));
        }
        Some(reason) => {
            let _ = term.write_line(&format!(
                "{} Payload would be rejected: {} (code {})",
                style("✗").red(),
                style(reason).red().bold(),
                reason.code()
            ));
        }
    }
    Ok(())
}

fn cmd_query(cli: &Cli, cmd: &QueryCommands, term: &Term) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let verifier = open_verifier(&config)?;

    match cmd {
        QueryCommands::LastPrice { asset } => match verifier.last_price(asset)? {
            Some(record) => {
                let _ = term.write_line(&format!(
                    "{} {} = {} at {} (attestation {})",
                    style("→").cyan(),
                    style(asset).bold(),
                    style(format!("${}", config.scale.price_as_decimal(record.price))).green(),
                    format_time(record.timestamp),
                    record.attestation_id
                ));
            }
            None => {
                let _ = term.write_line(&format!("{} No price recorded for {}", style("ℹ").blue(), asset));
            }
        },
        QueryCommands::Attestation { id } => match verifier.attestation_metadata(*id)? {
            Some(meta) => {
                let _ = term.write_line(&serde_json::to_string_pretty(&meta)?);
            }
            None => {
                let _ = term.write_line(&format!("{} Attestation {} not found", style("ℹ").blue(), id));
            }
        },
        QueryCommands::Proof { digest } => {
            let digest = ProofDigest::from_hash(Hash::from_hex(digest)?);
            match verifier.proof_usage_timestamp(&digest)? {
                Some(ts) => {
                    let _ = term.write_line(&format!("{} Proof used at {}", style("⚠").yellow(), format_time(ts)));
                }
                None => {
                    let _ = term.write_line(&format!("{} Proof unused", style("✓").green()));
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(cli: &Cli, cmd: &ConfigCommands, term: &Term) -> anyhow::Result<()> {
    let path = config_path(cli);

    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AttestorConfig::default().save(&path)?;
            let _ = term.write_line(&format!(
                "{} Wrote {}",
                style("✓").green(),
                style(path.display()).yellow()
            ));
        }
        ConfigCommands::Show => {
            let config = load_config(cli)?;
            let _ = term.write_line(&serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Validate => {
            load_config(cli)?.validate()?;
            let _ = term.write_line(&format!("{} Configuration is valid", style("✓").green()));
        }
    }
    Ok(())
}

fn cmd_keys_generate(term: &Term) -> anyhow::Result<()> {
    let keys = KeyPair::generate();
    let _ = term.write_line(&format!("{} New attestor key", style("→").cyan()));
    let _ = term.write_line(&format!("  Public:  {}", style(keys.public_key()).yellow()));
    let _ = term.write_line(&format!("  {}={}", SIGNING_KEY_ENV, keys.private_key().to_hex()));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(AttestorConfig::default_path)
}

fn load_config(cli: &Cli) -> anyhow::Result<AttestorConfig> {
    let path = config_path(cli);
    let config = if path.exists() {
        AttestorConfig::load(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        AttestorConfig::default()
    };
    Ok(config.with_env_overrides())
}

fn open_verifier(config: &AttestorConfig) -> anyhow::Result<OnChainVerifier<FileStore>> {
    Ok(OnChainVerifier::new(FileStore::new(config.ledger_dir())?, config.verifier)?)
}

fn format_time(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
