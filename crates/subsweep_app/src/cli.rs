use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "subsweep",
    version,
    about = "Export your channel subscriptions and unsubscribe in bulk"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the job state file.
    #[arg(long, global = true, env = "SUBSWEEP_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// RON file overriding timing and retry settings.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Log file, written next to terminal output.
    #[arg(long, global = true, default_value = "subsweep.log")]
    pub log_file: PathBuf,

    /// Log debug detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Clone, clap::Args)]
pub struct BrowserArgs {
    /// Run Chromium without a window.
    #[arg(long, global = true)]
    pub headless: bool,

    /// Chromium profile directory; reuse one that is signed in.
    #[arg(long, global = true, env = "SUBSWEEP_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Path to the Chromium or Chrome executable.
    #[arg(long, global = true, env = "SUBSWEEP_CHROME")]
    pub chrome: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape the subscriptions listing into subscriptions_<date>.csv.
    Export {
        /// Directory for the CSV file.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Show which rows of an edited CSV are marked for unsubscription.
    Select {
        csv: PathBuf,
    },
    /// Unsubscribe from every channel marked in the CSV.
    Unsubscribe {
        csv: PathBuf,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the status of the last or current job.
    Status,
    /// Continue a job that was interrupted before it finished.
    Resume,
}
