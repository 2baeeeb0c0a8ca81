//! OUTLOOK: session-driven market outlook scoring.
//!
//! Entry point. Loads `.env` and configuration, initialises structured
//! logging and dispatches one of the subcommands:
//!
//! - `run`: fetch, score and write the artifacts for one session
//! - `validate-config`: check the configuration file and exit
//! - `serve`: expose on-demand outlooks over HTTP

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use outlook::config::AppConfig;
use outlook::runner::{self, Runner};
use outlook::server;

const BANNER: &str = r#"
  ___  _   _ _____ _     ___   ___  _  __
 / _ \| | | |_   _| |   / _ \ / _ \| |/ /
| | | | | | | | | | |  | | | | | | | ' /
| |_| | |_| | | | | |__| |_| | |_| | . \
 \___/ \___/  |_| |_____\___/ \___/|_|\_\

  Bear / Neutral / Bull session scoring
"#;

#[derive(Parser, Debug)]
#[command(name = "outlook")]
#[command(about = "Session-driven Bear/Neutral/Bull market outlook")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml", env = "OUTLOOK_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one session and write its artifacts
    Run {
        /// Session token (PRE, OPEN_CONFIRM, MID, POWER_HOUR, CLOSE, SAT_REVIEW, SUN_WEEKLY)
        #[arg(short, long)]
        session: String,

        /// Output directory (overrides `[data] output_dir`)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Replay a saved snapshot instead of fetching
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Validate the configuration file (exit 0 OK, 1 invalid, 2 missing)
    ValidateConfig,

    /// Serve on-demand outlooks over HTTP
    Serve {
        /// Port (overrides `[server] port`)
        #[arg(short, long, env = "OUTLOOK_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::ValidateConfig => Ok(validate_config(&cli.config)),
        Command::Run {
            session,
            output_dir,
            snapshot,
        } => {
            let (cfg, scenarios) = AppConfig::load(&cli.config)?;
            let provider = runner::build_provider(&cfg, snapshot.as_deref())?;
            let mut runner = Runner::new(cfg, scenarios, provider);
            if let Some(dir) = output_dir {
                runner = runner.with_output_dir(dir);
            }

            let artifacts = runner.run(&session).await?;
            let record = &artifacts.report.record;
            println!("[OK] {record}");
            println!("     json:   {}", artifacts.paths.json.display());
            println!("     report: {}", artifacts.paths.report.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { port } => {
            let (cfg, scenarios) = AppConfig::load(&cli.config)?;
            let port = port.unwrap_or(cfg.server.port);
            let provider = runner::build_provider(&cfg, None)?;

            println!("{BANNER}");
            info!(
                config_version = %cfg.version,
                provider = %provider.name(),
                port,
                "OUTLOOK server starting up"
            );

            server::serve(Runner::new(cfg, scenarios, provider), port).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit 2 when the file is missing, 1 when it fails to parse or validate.
fn validate_config(path: &Path) -> ExitCode {
    if !path.exists() {
        eprintln!("[ERR] Config file not found: {}", path.display());
        return ExitCode::from(2);
    }

    match AppConfig::load(path) {
        Ok((cfg, scenarios)) => {
            println!("[OK] Config valid: {}", path.display());
            println!("     timezone:      {}", cfg.timezone);
            println!("     version:       {}", cfg.version);
            println!("     hold_minutes:  {}", cfg.playbook.hold_minutes);
            println!("     normalization: {:?}", cfg.engine.normalization);
            println!(
                "     default slice: {}",
                if scenarios.default_slice().is_some() { "yes" } else { "no" }
            );
            let overrides: Vec<&str> = scenarios.session_tokens().collect();
            if !overrides.is_empty() {
                println!("     overrides:     {}", overrides.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[ERR] {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("outlook=info"));

    let json_logging = std::env::var("OUTLOOK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
