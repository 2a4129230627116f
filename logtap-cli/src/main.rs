use clap::Parser;
use colored::Colorize;

use logtap_cli::cli::{Cli, Commands};
use logtap_cli::commands;
use logtap_cli::error::CliError;
use logtap_cli::logging;
use logtap_cli::output::OutputWriter;
use logtap_core::config::{GeneralConfig, LogtapConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            e.exit_code()
        }
    };
    // Exit directly: a pending blocking stdin read would otherwise hold the
    // runtime open after `pipe` is interrupted.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    // Diagnostics settings are best-effort; the command reports config errors itself.
    let mut general = LogtapConfig::load(&cli.config)
        .await
        .map(|config| config.general)
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Some(level) = cli.log_level {
        general.log_level = level;
    }
    logging::init_tracing(&general)?;
    logtap_core::metrics::describe_all();

    tracing::debug!(config = %cli.config.display(), "logtap starting");
    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config.as_path();

    match cli.command {
        Commands::Status(args) => commands::status::execute(args, config_path, &writer).await?,
        Commands::Enable => commands::toggle::execute(true, config_path, &writer).await?,
        Commands::Disable => commands::toggle::execute(false, config_path, &writer).await?,
        Commands::Config(args) => commands::config::execute(args, config_path, &writer).await?,
        Commands::Logdir(args) => commands::logdir::execute(args, config_path, &writer).await?,
        Commands::Pipe(args) => commands::pipe::execute(args, config_path).await?,
        Commands::Run(args) => return commands::run::execute(args, config_path).await,
    }
    Ok(0)
}
