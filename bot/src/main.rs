use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use muicebot::cli::{Cli, Commands};
use muicebot::handlers::{self, CommandContext};

/// Initialize tracing with the given verbosity level
///
/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // RUST_LOG wins when set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = CommandContext::new(cli.config, cli.database, cli.model_config, cli.verbose)?;

    match cli.command {
        Commands::Run { identity } => handlers::run_console(&ctx, &identity).await,
        Commands::Send { message, identity } => handlers::send(&ctx, &identity, &message).await,
        Commands::Configs => handlers::configs(&ctx).await,
        Commands::History { user } => handlers::history(&ctx, &user).await,
    }
}
