// sopguard/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sopguard")]
#[command(about = "Validates stock and master data against free-text SOP checklists", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Runs every checklist rule against the stock data
    Run(RunArgs),

    /// 🧭 Shows which operation a single rule sentence resolves to
    Route {
        /// The rule sentence, as written in the checklist
        check: String,

        /// Project directory (where sopguard.yaml lives)
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Static intent plan (YAML) instead of the LLM resolver
        #[arg(long)]
        plan: Option<PathBuf>,
    },

    /// 📚 Prints the operation catalog as JSON
    Tools,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Checklist file (CSV/TSV/Excel with a 'checks' column)
    #[arg(long, short)]
    pub checklist: PathBuf,

    /// Stock table (CSV/TSV/Excel)
    #[arg(long, short)]
    pub stock: PathBuf,

    /// Worksheet of the stock workbook (first sheet by default)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Master data table, required by value_in_master / match_master_on_keys
    #[arg(long, short)]
    pub master: Option<PathBuf>,

    /// Worksheet of the master workbook
    #[arg(long)]
    pub master_sheet: Option<String>,

    /// Goods Receipt (MB51) table
    #[arg(long)]
    pub gr: Option<PathBuf>,

    /// Worksheet of the GR workbook
    #[arg(long)]
    pub gr_sheet: Option<String>,

    /// Static intent plan (YAML) instead of the LLM resolver
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Results file (.csv, .json or .xlsx)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Project directory (where sopguard.yaml lives)
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Reference date for "not in the future" checks (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Exit with code 1 when at least one check fails
    #[arg(long, default_value = "false")]
    pub strict: bool,
}
