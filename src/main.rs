use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aedict::commands;

#[derive(Parser)]
#[clap(name = "aedict")]
#[clap(about = "Aedict dictionary downloader and manager")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable informational logging
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List dictionaries available for download
    List,
    /// Show downloaded dictionaries
    Installed,
    /// Download a dictionary (edict, kanjidic or a catalog name)
    Download {
        /// Dictionary to download
        name: String,
    },
    /// Remove all downloaded dictionary files
    Cleanup {
        /// Actually remove files (without this flag, shows what would be removed)
        #[clap(long)]
        confirm: bool,
        /// Do not ask before removing
        #[clap(short, long)]
        yes: bool,
    },
    /// Show or change configuration
    Config {
        /// Store the quick-launch preference read by desktop front ends
        #[clap(long)]
        always_available: Option<bool>,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "aedict=info" } else { "aedict=warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::List => commands::list::list_available(),
        Commands::Installed => commands::list::list_installed(),
        Commands::Download { name } => commands::download::download_dictionary(&name),
        Commands::Cleanup { confirm, yes } => {
            if confirm {
                commands::cleanup::cleanup_execute(yes)
            } else {
                commands::cleanup::cleanup_dry_run()
            }
        }
        Commands::Config { always_available } => match always_available {
            Some(enabled) => commands::config::set_always_available(enabled),
            None => commands::config::show_config(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
