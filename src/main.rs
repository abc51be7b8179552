//! binttl demo
//!
//! Writes three expiring bins against an in-memory store, lets one of them
//! expire, then sweeps the set and prints what was reclaimed.

use binttl::config::ScanPolicy;
use binttl::store::Key;
use binttl::{ExpireBin, ExpireBinModule, MemoryStore, SystemClock, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const NAMESPACE: &str = "test";
const SET: &str = "expireBin";
const BIN: &str = "TestBin";

/// Demo configuration
struct Config {
    /// TTL of the short-lived bin, in seconds
    ttl: i64,
    /// How long to wait before reading again, in seconds
    wait: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self { ttl: 5, wait: 7 }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--ttl" | "-t" => {
                    config.ttl = parse_value(&args, i, "--ttl");
                    i += 2;
                }
                "--wait" | "-w" => {
                    config.wait = parse_value(&args, i, "--wait");
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("binttl version {}", binttl::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        if config.ttl < 0 {
            eprintln!("Error: --ttl must not be negative");
            std::process::exit(1);
        }

        config
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}: {}", flag, raw);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
binttl - per-bin expiration demo

USAGE:
    binttl [OPTIONS]

OPTIONS:
    -t, --ttl <SECS>     TTL of the short-lived bin (default: 5)
    -w, --wait <SECS>    Seconds to wait before reading again (default: 7)
    -v, --version        Print version information
    -h, --help           Print this help message

Set RUST_LOG=binttl=debug for per-record sweep logging.
"#
    );
}

fn render(values: &[Option<Value>]) -> String {
    values
        .iter()
        .map(|v| match v {
            Some(value) => value.to_string(),
            None => "(absent)".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let store = Arc::new(MemoryStore::new());
    store.register(Arc::new(ExpireBinModule::new(Arc::new(SystemClock))))?;
    info!("In-memory store ready");

    let client = ExpireBin::new(store.clone());
    let keys = [
        Key::new(NAMESPACE, SET, "eb1"),
        Key::new(NAMESPACE, SET, "eb2"),
        Key::new(NAMESPACE, SET, "eb3"),
    ];

    info!("Creating expire bins...");
    client.put(&keys[0], BIN, "Hello World", -1, true)?;
    client.put(&keys[1], BIN, "I don't expire", -1, true)?;
    client.put(&keys[2], BIN, "I will expire soon", config.ttl, true)?;

    info!("Getting expire bins...");
    for key in &keys {
        let values = client.get(key, &[BIN])?;
        let ttl = client.ttl(key, BIN)?;
        info!(key = %key, ttl = ?ttl, "{}", render(&values));
    }

    info!("Waiting {}s for {} to expire...", config.wait, keys[2]);
    tokio::time::sleep(Duration::from_secs(config.wait)).await;

    info!("Getting expire bins again...");
    for key in &keys {
        let values = client.get(key, &[BIN])?;
        info!(key = %key, "{}", render(&values));
    }

    info!("Cleaning bins...");
    let sweeper = client.sweeper();
    let bins = vec![BIN.to_string()];
    let report = tokio::task::spawn_blocking(move || {
        sweeper.sweep(&ScanPolicy::default(), NAMESPACE, SET, &bins)
    })
    .await??;

    if !report.is_complete() {
        warn!(failed = report.failures.len(), "Some records could not be cleaned");
    }
    info!(
        scanned = report.records_scanned,
        purged = report.bins_purged,
        "Clean finished"
    );

    let stats = store.stats();
    info!(
        records = stats.records,
        commits = stats.commits,
        "Store stats"
    );

    Ok(())
}
