mod cmd;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;
use whattime_core::Config;

#[derive(Parser)]
#[command(
    name = "whattime",
    about = "Action provider that reports the time at a UTC offset once its timer elapses",
    version,
    propagate_version = true
)]
struct Cli {
    /// Action database path (overrides DB_PATH)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP action provider
    Serve {
        /// Address to bind (default: HOST or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (default: PORT or 5000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List every route the server registers
    ListRoutes,

    /// Delete the action database and start empty
    ResetDb {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = load_config(cli.db_path).and_then(|config| {
        let level = match &cli.command {
            Commands::Serve { .. } => config.log_level.clone(),
            _ => "warn".to_string(),
        };
        logging::init(&config, &level)?;

        match cli.command {
            Commands::Serve { host, port } => cmd::serve::run(config, host, port),
            Commands::ListRoutes => cmd::routes::run(cli.json),
            Commands::ResetDb { yes } => cmd::reset_db::run(&config.db_path, yes),
            Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(db_path: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(path) = db_path {
        config.db_path = path;
    }
    Ok(config)
}
