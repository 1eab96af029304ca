use std::{
    fs,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use custody_core::Principal;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::CustodyConfig;
use session::{read_script, Session};

#[derive(Parser)]
#[command(
    name = "custody",
    version,
    about = "Host for the custody ledger: replay calls, manage keys and principals"
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an Ed25519 keypair and the principal it maps to.
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the principal for a public key or a label.
    Principal {
        /// 32-byte Ed25519 public key in hex.
        #[arg(long, conflicts_with = "label", required_unless_present = "label")]
        pk_hex: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },
    /// Replay a JSON-lines script of calls against a fresh ledger.
    Run {
        script: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, conflicts_with = "owner_label")]
        owner: Option<Principal>,
        #[arg(long)]
        owner_label: Option<String>,
        /// Write emitted events here, one JSON object per line.
        #[arg(long)]
        journal: Option<PathBuf>,
    },
}

//==================== helpers ====================//

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn write_all(p: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(p, bytes).with_context(|| format!("write {}", p.display()))
}

//==================== keys & principals ====================//

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();
    let principal = Principal::from_verifying_key(&pk);

    write_all(&out_dir.join("sk.hex"), hex::encode(sk_bytes).as_bytes())?;
    write_all(&out_dir.join("pk.hex"), hex::encode(pk.as_bytes()).as_bytes())?;
    write_all(&out_dir.join("principal.hex"), principal.to_hex().as_bytes())?;
    info!(out_dir = %out_dir.display(), %principal, "keypair written");
    println!("{principal}");
    Ok(())
}

fn principal_from_pk_hex(pk_hex: &str) -> Result<Principal> {
    let bytes = hex::decode(pk_hex.trim()).context("invalid --pk-hex")?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("--pk-hex must be 32 bytes, got {}", bytes.len()))?;
    let key = VerifyingKey::from_bytes(&bytes).context("--pk-hex is not a valid Ed25519 key")?;
    Ok(Principal::from_verifying_key(&key))
}

fn principal_cmd(pk_hex: Option<&str>, label: Option<&str>) -> Result<()> {
    let principal = match (pk_hex, label) {
        (Some(pk_hex), _) => principal_from_pk_hex(pk_hex)?,
        (None, Some(label)) => Principal::from_label(label),
        (None, None) => bail!("pass --pk-hex or --label"),
    };
    println!("{principal}");
    Ok(())
}

//==================== replay ====================//

fn run_cmd(
    script: &Path,
    config: Option<&Path>,
    owner: Option<Principal>,
    owner_label: Option<String>,
    journal: Option<&Path>,
) -> Result<()> {
    let config = match config {
        Some(path) => CustodyConfig::load(path)?,
        None => CustodyConfig::default(),
    }
    .with_overrides(owner, owner_label);

    let file = fs::File::open(script).with_context(|| format!("open {}", script.display()))?;
    let calls = read_script(BufReader::new(file))?;
    let mut session = Session::new(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (line, call) in &calls {
        let record = session.record(*line, call);
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    }

    if let Some(path) = journal {
        let mut buf = Vec::new();
        for event in session.journal() {
            serde_json::to_writer(&mut buf, event)?;
            buf.push(b'\n');
        }
        write_all(path, &buf)?;
        info!(path = %path.display(), events = session.journal().len(), "journal written");
    }

    let summary = session.summary();
    serde_json::to_writer(&mut out, &serde_json::json!({ "summary": &summary }))?;
    writeln!(out)?;
    out.flush()?;

    if !summary.consistent {
        bail!(
            "ledger inconsistent: total_funds={} contract_balance={}",
            summary.total_funds,
            summary.contract_balance
        );
    }
    Ok(())
}

//==================== main ====================//

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Keygen { out_dir } => keygen_cmd(&out_dir),
        Command::Principal { pk_hex, label } => principal_cmd(pk_hex.as_deref(), label.as_deref()),
        Command::Run {
            script,
            config,
            owner,
            owner_label,
            journal,
        } => run_cmd(
            &script,
            config.as_deref(),
            owner,
            owner_label,
            journal.as_deref(),
        ),
    }
}
