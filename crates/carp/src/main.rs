use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use log::{LevelFilter, debug};

use carp::config::{self, DEFAULT_CONFIG_FILE};
use carp::logging::{self, LogFormat};

const APP_NAME: &str = "carp";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    // Without verbosity flags the configuration file decides, once loaded.
    if let Some(level) = cli.common.log_level_override() {
        logging::init_logging(level, cli.common.log_format());
    }

    match cli.command {
        Command::Check => handle_check(&cli.common),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "CAS authentication reverse proxy.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Configuration file
    #[arg(long, value_name = "PATH", global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
}

impl CommonOpts {
    fn log_level_override(&self) -> Option<LevelFilter> {
        if self.debug {
            return Some(LevelFilter::Debug);
        }
        match self.verbose {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            _ => Some(LevelFilter::Trace),
        }
    }

    fn log_format(&self) -> LogFormat {
        if self.json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration and print it with secrets masked
    Check,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn handle_check(common: &CommonOpts) -> Result<()> {
    debug!("checking configuration {}", common.config.display());
    let configuration = config::load(&common.config)
        .with_context(|| format!("loading configuration {}", common.config.display()))?;
    logging::init_logging(configuration.log_level_filter(), configuration.log_format);
    let redacted = configuration.redacted();

    if common.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&redacted).context("serializing config to JSON")?
        );
    } else {
        println!(
            "{}",
            serde_yaml::to_string(&redacted).context("serializing config to YAML")?
        );
    }
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}
