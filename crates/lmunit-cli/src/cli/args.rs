use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::dataset::{InputFormat, UnitTestMode};

#[derive(Parser)]
#[command(
    name = "lmunit",
    version,
    about = "Score model responses against natural-language unit tests with the LMUnit API"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit a batch of requests and write one outcome per row
    Run(RunArgs),
    /// Print the stock unit-test catalog as JSON
    Catalog,
    Version,
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    /// JSONL input file
    #[arg(long, short)]
    pub input: PathBuf,

    /// Input row shape
    #[arg(long, value_enum, default_value = "requests")]
    pub format: InputFormat,

    /// How dialogue rows get their unit test
    #[arg(long = "mode-unit-test", value_enum, default_value = "default")]
    pub mode: UnitTestMode,

    /// JSON object of extra `{"subset": "question"}` entries
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Where to write outcome records (stdout when omitted)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Only process the first N rows
    #[arg(long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub client: ClientArgs,
}

/// Client settings. Each flag falls back to its environment variable, then to the default.
#[derive(Parser, Clone, Debug, Default)]
pub struct ClientArgs {
    /// Scoring endpoint
    #[arg(long, env = "LMUNIT_URL")]
    pub url: Option<String>,

    /// API key for the scoring endpoint
    #[arg(long, env = "LMUNIT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Requests per second
    #[arg(long, env = "LMUNIT_RATE_LIMIT")]
    pub rate_limit: Option<u32>,

    /// Attempts per request
    #[arg(long, env = "LMUNIT_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Backoff base in seconds
    #[arg(long, env = "LMUNIT_BASE_DELAY")]
    pub base_delay: Option<f64>,

    /// Per-attempt timeout in seconds
    #[arg(long, env = "LMUNIT_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Deadline for the whole batch in seconds
    #[arg(long, env = "LMUNIT_BATCH_DEADLINE")]
    pub batch_deadline: Option<f64>,
}
