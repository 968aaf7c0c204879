// Entrypoint for the eimg CLI.
// - Keeps `main` small: parse arguments, set up logging, dispatch to
//   the matching handler in `ui`.
// - Returns `anyhow::Result` so any error from the taxonomy exits
//   nonzero with its message.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eimg_cli::download::{self, Target};
use eimg_cli::ui;
use eimg_cli::vault::Vault;

#[derive(Parser)]
#[command(name = "eimg", version, about = "Download Earth images from NASA's EPIC API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set and encrypt the NASA API key (usage: set API=<your_key>)
    Set {
        /// Assignment of the form API=<your_key>
        assignment: String,
    },
    /// Check that the stored API key is accepted by the service
    Validate,
    /// Show the current configuration
    Config,
    /// Download the latest Earth image
    Download {
        /// Output directory (default: the configured output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output filename (default: earth_<timestamp>.png)
        #[arg(short, long)]
        filename: Option<String>,
    },
    /// Download the Earth image for a specific date (YYYY-MM-DD)
    DownloadDate {
        /// Date to download, YYYY-MM-DD
        date: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        filename: Option<String>,
    },
    /// List available image dates, most recent first
    Dates {
        /// How many dates to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show image metadata for the latest images or a specific date
    Metadata {
        /// Date to inspect, YYYY-MM-DD (latest when omitted)
        date: Option<String>,
    },
    /// Securely wipe all stored configuration
    Wipe,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let vault = Vault::open_default();

    match cli.command {
        Command::Set { assignment } => ui::cmd_set(&vault, &assignment),
        Command::Validate => ui::cmd_validate(&vault),
        Command::Config => ui::cmd_config(&vault),
        Command::Download { output, filename } => {
            ui::cmd_download(&vault, Target::Latest, output, filename)
        }
        Command::DownloadDate {
            date,
            output,
            filename,
        } => {
            let date = download::parse_date(&date)?;
            ui::cmd_download(&vault, Target::Date(date), output, filename)
        }
        Command::Dates { limit } => ui::cmd_dates(&vault, limit),
        Command::Metadata { date } => ui::cmd_metadata(&vault, date.as_deref()),
        Command::Wipe => ui::cmd_wipe(&vault),
    }
}
