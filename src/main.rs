//! queue-recorder CLI entry point

use std::process::ExitCode;

use clap::Parser;

use queue_recorder::cli::{
    app::{cli_config, load_merged_config, run_recording, RecordOptions, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{log_level, Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use queue_recorder::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(cli.verbose).to_string()),
    )
    .init();

    let presenter = Presenter::new();

    // Handle subcommands
    if let Some(Commands::Config { action }) = cli.command {
        let store = XdgConfigStore::new();
        if let Err(e) = handle_config_command(action, &store, &presenter).await {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
        return ExitCode::SUCCESS;
    }

    // Merge config: defaults < file < cli
    let config = load_merged_config(cli_config(&cli)).await;

    let options = match RecordOptions::from_config(&config) {
        Ok(options) => options,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    run_recording(options).await
}
