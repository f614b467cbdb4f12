use attestor::cli::{self, Commands};
use attestor::errors::AttestorError;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .init();
    }

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            AttestorError::Config(_) => 2,
            AttestorError::NotFound(_) => 3,
            AttestorError::Conflict(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: cli::Cli) -> Result<(), AttestorError> {
    if let Commands::Validate(args) = cli.command {
        return cli::handle_validate(args).await;
    }

    let config = cli::load_config(cli.config.as_deref()).await?;
    match cli.command {
        Commands::Serve(args) => cli::serve::handle_serve(args, config).await,
        Commands::Analyze(args) => cli::analyze::handle_analyze(args, config).await,
        Commands::Status(args) => cli::status::handle_status(args, config).await,
        Commands::Findings(args) => cli::findings::handle_findings(args, config).await,
        Commands::Sweep(args) => cli::sweep::handle_sweep(args, config).await,
        Commands::Validate(args) => cli::handle_validate(args).await,
    }
}
