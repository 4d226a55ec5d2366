use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_PAYLOAD: &str = r#"{"key":"hello","value":"world"}"#;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[value(name = "human", alias = "human-readable")]
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) to stdout.
    Json,
    /// One CSV row per request.
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "rpcbench",
    author,
    version,
    about = "Load generator for signed JSON-RPC chain endpoints",
    long_about = "rpcbench sends signed contract-call transactions to a JSON-RPC chain endpoint from a pool of concurrent workers and reports latency and throughput.\n\nEach worker signs with its own ed25519 key unless --key points at a key file.",
    after_help = "Examples:\n  rpcbench run -n 1000 -c 20 --write-url http://localhost:46658/rpc\n  rpcbench run -z 30s -c 8 -q 50 --raw-request\n  rpcbench genkey --key ./priv.key"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against a chain endpoint
    Run(Box<RunArgs>),

    /// Write a new base64 ed25519 keypair to a file
    Genkey(GenkeyArgs),
}

#[derive(Debug, Args)]
pub struct GenkeyArgs {
    /// Destination file
    #[arg(short = 'k', long)]
    pub key: PathBuf,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Number of requests to run
    #[arg(short = 'n', long, default_value_t = 200)]
    pub requests: u64,

    /// Number of workers to run concurrently
    #[arg(short = 'c', long, default_value_t = 50)]
    pub concurrency: u64,

    /// Rate limit per worker, in requests per second (0 disables it)
    #[arg(short = 'q', long, default_value_t = 0.0)]
    pub qps: f64,

    /// Per-request timeout in seconds (0 waits indefinitely)
    #[arg(short = 't', long, default_value_t = 20)]
    pub timeout: u64,

    /// Run for this long instead of a fixed number of requests (e.g. 10s, 1m)
    #[arg(short = 'z', long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Endpoint receiving `broadcast_tx_commit`
    #[arg(
        long,
        env = "RPCBENCH_WRITE_URL",
        default_value = "http://localhost:46658/rpc"
    )]
    pub write_url: String,

    /// Endpoint answering `nonce` queries
    #[arg(
        long,
        env = "RPCBENCH_READ_URL",
        default_value = "http://localhost:46658/query"
    )]
    pub read_url: String,

    #[arg(long, default_value = "default")]
    pub chain_id: String,

    /// Contract to call
    #[arg(long, default_value = "SimpleStore")]
    pub contract: String,

    /// Contract method to call
    #[arg(long, default_value = "Set")]
    pub method: String,

    /// Private key file, or `genkey` for an ephemeral key per worker
    #[arg(short = 'p', long, default_value = "genkey")]
    pub key: String,

    /// Sign transactions locally with sequence numbers tracked per worker
    #[arg(long)]
    pub raw_request: bool,

    #[arg(long)]
    pub disable_keepalive: bool,

    /// Send `accept-encoding: identity`
    #[arg(long)]
    pub disable_compression: bool,

    /// Use HTTP/2 (prior knowledge)
    #[arg(long)]
    pub h2: bool,

    /// Plain HTTP proxy (host:port)
    #[arg(short = 'x', long)]
    pub proxy: Option<String>,

    /// Contract call payload
    #[arg(short = 'd', long, conflicts_with = "payload_file")]
    pub payload: Option<String>,

    /// Read the contract call payload from a file
    #[arg(short = 'D', long)]
    pub payload_file: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Exit with code 20 when any request failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Log debug events to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
