use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(name = "attestor", version, about = "Repository compliance analysis: signals, controls, graded findings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file (defaults to ./attestor.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server with the stale-run sweeper
    Serve(ServeArgs),
    /// Analyze a local directory and print the findings summary
    Analyze(AnalyzeArgs),
    /// Query an analysis run on a running server
    Status(StatusArgs),
    /// List stored findings for a snapshot
    Findings(FindingsArgs),
    /// Fail runs whose heartbeat went stale (one pass)
    Sweep(SweepArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Listen address
    #[arg(long)]
    pub host: Option<String>,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Args, Clone)]
pub struct AnalyzeArgs {
    /// Extracted repository directory to analyze
    pub path: String,

    /// Framework to assess against (repeatable)
    #[arg(short, long = "framework")]
    pub frameworks: Vec<String>,

    /// Analysis depth: structure_only, security_relevant, full
    #[arg(long)]
    pub depth: Option<String>,

    /// Organization that owns the snapshot
    #[arg(long, default_value = "local")]
    pub org: String,

    /// User recorded on the run and audit entries
    #[arg(long, default_value = "cli")]
    pub user: String,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    /// Analysis run ID
    pub run_id: String,

    /// Server base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,

    /// Organization header sent with the request
    #[arg(long, default_value = "local")]
    pub org: String,

    /// User header sent with the request
    #[arg(long, default_value = "cli")]
    pub user: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Continuously poll until the run finishes
    #[arg(long)]
    pub follow: bool,

    /// Poll interval in seconds
    #[arg(long, default_value = "5")]
    pub interval: u64,
}

#[derive(Args, Clone)]
pub struct FindingsArgs {
    /// Snapshot ID
    pub snapshot_id: String,

    /// Organization that owns the snapshot
    #[arg(long, default_value = "local")]
    pub org: String,

    #[arg(long)]
    pub framework: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub confidence: Option<String>,

    #[arg(long)]
    pub control: Option<String>,

    /// Print totals instead of individual findings
    #[arg(long)]
    pub summary: bool,

    #[arg(long, default_value = "1")]
    pub page: u32,

    #[arg(long, default_value = "50")]
    pub limit: u32,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct SweepArgs {
    /// Heartbeat age in seconds after which a run counts as stale
    #[arg(long)]
    pub threshold_secs: Option<u64>,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
