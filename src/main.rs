use anyhow::Result;
use clap::Parser;
use aircap::app::{Overrides, run_check_command, run_record_command};
use aircap::cli::{Cli, Commands};
use aircap::config::Config;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let overrides = Overrides {
        url: cli.url,
        bucket: cli.bucket,
        prefix: cli.prefix,
        chunk_duration_secs: cli.chunk_duration,
        duration: cli.duration,
    };

    match cli.command {
        None => {
            run_record_command(config, overrides, cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Check) => {
            run_check_command(config, overrides)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        // An explicitly named file must exist.
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()?)?,
    };
    Ok(config.with_env_overrides())
}
