//! Scrivener CLI entry point.

use clap::Parser;

use scrivener::cli::{Cli, Commands};
use scrivener::infrastructure::config::ConfigLoader;
use scrivener::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => scrivener::cli::handle_error(err, cli.json),
    };

    let _guard = match LoggerImpl::init(&config.logging) {
        Ok(guard) => guard,
        Err(err) => scrivener::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Scan {
            text,
            file,
            rules,
            evaluate,
        } => {
            let input = scrivener::cli::commands::scan::ScanInput::from_args(text, file);
            scrivener::cli::commands::scan::execute(&config, input, rules, evaluate, cli.json)
                .await
        }
        Commands::Generate {
            task,
            excerpts,
            output,
        } => {
            scrivener::cli::commands::generate::execute(&config, task, excerpts, output, cli.json)
                .await
        }
        Commands::Optimize {
            scenarios,
            rounds,
            output,
        } => {
            scrivener::cli::commands::optimize::execute(
                &config, scenarios, rounds, output, cli.json,
            )
            .await
        }
    };

    if let Err(err) = result {
        scrivener::cli::handle_error(err, cli.json);
    }
}
