use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use hashprobe::cracker::{self, CrackConfig, DEFAULT_SALTS, DEFAULT_WORDLIST};
use hashprobe::scanner::{self, ProbeConfig};
use hashprobe::services::{self, PortRange, ServiceTable};
use hashprobe::types::ScanReport;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// hashprobe — SHA-1 wordlist password recovery and a service-aware TCP port probe.
#[derive(Debug, Clone, Parser)]
#[command(name = "hashprobe", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_level: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Recover the plaintext behind a SHA-1 digest from a wordlist.
    Crack(CrackArgs),
    /// Print the SHA-1 digest of a password, optionally salted.
    Hash(HashArgs),
    /// Probe a host for open TCP ports with known services.
    Scan(ScanArgs),
}

#[derive(Debug, Clone, Args)]
struct CrackArgs {
    /// Lower-case hex SHA-1 digest to recover.
    digest: String,

    /// Also try every known salt prepended and appended to each candidate.
    #[arg(long)]
    salts: bool,

    /// Candidate wordlist, one password per line.
    #[arg(long, default_value = DEFAULT_WORDLIST)]
    wordlist: PathBuf,

    /// Salt list, one salt per line.
    #[arg(long = "salt-file", default_value = DEFAULT_SALTS)]
    salt_file: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct HashArgs {
    password: String,

    /// Salt to combine with the password (prepended unless --append).
    #[arg(long)]
    salt: Option<String>,

    /// Append the salt instead of prepending it.
    #[arg(long, requires = "salt")]
    append: bool,
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Hostname or literal IPv4 address.
    target: String,

    /// Inclusive port range, e.g. 440-450, or a single port.
    range: String,

    /// Print the host/service report instead of the bare port list.
    #[arg(long)]
    verbose: bool,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Max concurrent TCP connect attempts (1 = sequential).
    #[arg(long, default_value_t = 64)]
    concurrency: usize,

    /// Service table file (`<port> <name>` per line). Defaults to the built-in table.
    #[arg(long)]
    services: Option<PathBuf>,

    /// Write the structured report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.log_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Crack(args) => run_crack(args),
        Command::Hash(args) => {
            run_hash(args);
            Ok(ExitCode::SUCCESS)
        }
        Command::Scan(args) => run_scan(args).await,
    }
}

fn run_crack(args: CrackArgs) -> Result<ExitCode> {
    let config = CrackConfig {
        wordlist: args.wordlist,
        salts: args.salt_file,
    };
    let outcome = cracker::crack_with(args.digest.trim(), &config, args.salts)?;
    println!("{outcome}");
    Ok(if outcome.password().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_hash(args: HashArgs) {
    let password = args.password.as_bytes();
    let digest = match args.salt.as_deref().map(str::as_bytes) {
        Some(salt) if args.append => cracker::sha1_hex_concat(password, salt),
        Some(salt) => cracker::sha1_hex_concat(salt, password),
        None => cracker::sha1_hex(password),
    };
    println!("{digest}");
}

async fn run_scan(args: ScanArgs) -> Result<ExitCode> {
    let range = PortRange::parse(&args.range)?;
    let services = match args.services.as_deref() {
        Some(path) => services::load_services_from_path(path)?,
        None => ServiceTable::well_known(),
    };
    let config = ProbeConfig {
        timeout: Duration::from_millis(args.timeout_ms),
        concurrency: args.concurrency,
    };

    // Ctrl-C stops scheduling new attempts; ports already confirmed are still reported.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let report =
        match scanner::scan_ports_with_cancel(&args.target, range, &services, &config, cancel)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                println!("Error: {e}");
                return Ok(ExitCode::from(2));
            }
        };

    println!("{}", scanner::shape_output(&report, args.verbose, &services));
    if report.cancelled {
        eprintln!("Scan interrupted; results are partial.");
    }

    if let Some(path) = args.output.as_deref() {
        if let Err(e) = write_report_json(path, &report) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            eprintln!("Wrote JSON report to {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
