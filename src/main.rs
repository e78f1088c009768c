use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voice_console::{
    app,
    cli::{
        handle_remote_command, handle_status_command, handle_token_command, Cli, CliCommand,
        RemoteCommand,
    },
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the console view
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("voice-console {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Token) => handle_token_command(&Config::load(config_path)?).await,
        Some(CliCommand::Toggle) => {
            handle_remote_command(RemoteCommand::Toggle, &Config::load(config_path)?).await
        }
        Some(CliCommand::Connect) => {
            handle_remote_command(RemoteCommand::Connect, &Config::load(config_path)?).await
        }
        Some(CliCommand::Disconnect) => {
            handle_remote_command(RemoteCommand::Disconnect, &Config::load(config_path)?).await
        }
        Some(CliCommand::Status { transcript }) => {
            handle_status_command(&Config::load(config_path)?, transcript).await
        }
        None => app::run_service(Config::load(config_path)?).await,
    }
}
