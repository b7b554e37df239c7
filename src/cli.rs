// Command-line interface definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dataset::DatasetCategory;

#[derive(Parser, Debug)]
#[command(name = "visascan")]
#[command(about = "Bounded streaming search and statistics over visa disclosure CSV datasets")]
#[command(
    long_about = "Bounded streaming search and statistics over visa disclosure CSV datasets\n\nFiles are read sequentially in fixed-size chunks; scans stop early once a page\nis full or a file/chunk bound is reached, so totals describe the scanned prefix.\n\nDATA FILES:\n  LCA_Disclosure_Data_FY<year>_Q<quarter>.csv\n  H-2A_Disclosure_Data_FY<year>_Q<quarter>.csv\n  H-2B_Disclosure[_Data]_FY<year>_Q<quarter>.csv\n  (optionally compressed as .csv.gz or .csv.zst)\n\nCOMMON EXAMPLES:\n  visascan --data-dir ./dol search --query google --year 2024\n  visascan stats --visa-type H-2A\n  visascan columns --visa-type H-2B"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Directory holding the disclosure files
    #[arg(long = "data-dir", global = true, help_heading = "Data Options")]
    pub data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default locations
    #[arg(long = "config-file", global = true, help_heading = "Configuration Options")]
    pub config_file: Option<PathBuf>,

    /// Ignore configuration files
    #[arg(
        long = "ignore-config",
        global = true,
        help_heading = "Configuration Options",
        conflicts_with = "config_file"
    )]
    pub ignore_config: bool,

    /// Pretty-print JSON output
    #[arg(long = "pretty", global = true, help_heading = "Output Options")]
    pub pretty: bool,

    /// Print scan statistics to stderr
    #[arg(short = 's', long = "stats", global = true, help_heading = "Output Options")]
    pub stats: bool,

    /// Report skipped files, chunks and rows on stderr (repeat for more detail)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true, help_heading = "Output Options")]
    pub verbose: u8,

    /// Disable coloured diagnostics
    #[arg(long = "no-color", global = true, help_heading = "Display Options", overrides_with = "force_color")]
    pub no_color: bool,

    /// Force coloured diagnostics even when stderr is not a terminal
    #[arg(long = "force-color", global = true, help_heading = "Display Options", overrides_with = "no_color")]
    pub force_color: bool,

    /// Disable emoji prefixes
    #[arg(long = "no-emoji", global = true, help_heading = "Display Options")]
    pub no_emoji: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Paginated substring search
    Search(SearchArgs),
    /// Status counts, top employers and average wage
    Stats(StatsArgs),
    /// Column names of a dataset
    Columns(ColumnsArgs),
    /// Dataset categories and years found in the data directory
    Datasets,
    /// Show configuration files and active settings
    ShowConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dataset selection shared by `search` and `stats`
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Dataset category: LCA, H-2A or H-2B
    #[arg(
        long = "visa-type",
        default_value = "LCA",
        value_parser = parse_visa_type,
        help_heading = "Dataset Options"
    )]
    pub visa_type: DatasetCategory,

    /// Fiscal year, e.g. 2024 (unknown years fall back to the default selection)
    #[arg(long = "year", help_heading = "Dataset Options")]
    pub year: Option<String>,

    /// Fiscal quarter within --year, e.g. 2
    #[arg(long = "quarter", help_heading = "Dataset Options")]
    pub quarter: Option<String>,
}

/// Resource bounds overriding configured values
#[derive(Args, Debug, Clone, Default)]
pub struct BoundsArgs {
    /// Rows per chunk
    #[arg(long = "chunk-size", value_parser = parse_positive, help_heading = "Scan Bounds")]
    pub chunk_size: Option<usize>,

    /// Maximum number of files to attempt
    #[arg(long = "max-files", value_parser = parse_positive, help_heading = "Scan Bounds")]
    pub max_files: Option<usize>,

    /// Maximum number of chunks to read per file
    #[arg(long = "max-chunks", value_parser = parse_positive, help_heading = "Scan Bounds")]
    pub max_chunks: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Case-insensitive substring to look for (empty lists the first rows)
    #[arg(short = 'q', long = "query", default_value = "", help_heading = "Search Options")]
    pub query: String,

    /// Only search this column
    #[arg(short = 'c', long = "column", help_heading = "Search Options")]
    pub column: Option<String>,

    /// 1-based page number
    #[arg(short = 'p', long = "page", default_value_t = 1, help_heading = "Search Options")]
    pub page: usize,

    /// Results per page
    #[arg(short = 'l', long = "limit", help_heading = "Search Options")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub bounds: BoundsArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub bounds: BoundsArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ColumnsArgs {
    /// Dataset category: LCA, H-2A or H-2B
    #[arg(long = "visa-type", default_value = "LCA", value_parser = parse_visa_type)]
    pub visa_type: DatasetCategory,
}

fn parse_visa_type(s: &str) -> Result<DatasetCategory, String> {
    s.parse()
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
