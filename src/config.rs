use clap::ValueEnum;
use std::path::PathBuf;

use crate::cli::{BoundsArgs, Cli};
use crate::config_file::{ConfigFile, ScanSection};
use crate::planner::ScanBounds;

pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Main configuration struct for visascan
#[derive(Debug, Clone)]
pub struct VisascanConfig {
    pub data_dir: PathBuf,
    pub scan: ScanSettings,
    pub output: OutputConfig,
}

/// Scan bounds and page size, per operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub search: ScanBounds,
    pub stats: ScanBounds,
    pub search_limit: usize,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub pretty: bool,
    pub stats: bool,
    pub verbose: u8,
    pub color: ColorMode,
    pub emoji: bool,
}

/// Color output mode
#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            search: ScanBounds::SEARCH,
            stats: ScanBounds::STATS,
            search_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ScanSettings {
    /// Apply config file sections over the built-in defaults
    pub fn from_file(file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            search: apply_section(defaults.search, &file.search),
            stats: apply_section(defaults.stats, &file.stats),
            search_limit: file.search.limit.unwrap_or(defaults.search_limit),
        }
    }
}

fn apply_section(bounds: ScanBounds, section: &ScanSection) -> ScanBounds {
    ScanBounds {
        max_files: section.max_files.unwrap_or(bounds.max_files),
        max_chunks_per_file: section.max_chunks.unwrap_or(bounds.max_chunks_per_file),
        chunk_size: section.chunk_size.unwrap_or(bounds.chunk_size),
    }
}

/// Command-line bound flags win over everything else
pub fn apply_overrides(bounds: ScanBounds, args: &BoundsArgs) -> ScanBounds {
    ScanBounds {
        max_files: args.max_files.unwrap_or(bounds.max_files),
        max_chunks_per_file: args.max_chunks.unwrap_or(bounds.max_chunks_per_file),
        chunk_size: args.chunk_size.unwrap_or(bounds.chunk_size),
    }
}

impl VisascanConfig {
    /// Create configuration from CLI arguments layered over a config file
    pub fn from_cli(cli: &Cli, file: &ConfigFile) -> Self {
        let color = if cli.no_color {
            ColorMode::Never
        } else if cli.force_color {
            ColorMode::Always
        } else {
            ColorMode::Auto
        };

        Self {
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.data_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            scan: ScanSettings::from_file(file),
            output: OutputConfig {
                pretty: cli.pretty || file.pretty.unwrap_or(false),
                stats: cli.stats,
                verbose: cli.verbose,
                color,
                emoji: !cli.no_emoji && crate::tty::should_use_emoji_for_stderr(),
            },
        }
    }

    pub fn use_colors(&self) -> bool {
        crate::tty::should_use_colors_with_mode(&self.output.color)
    }

    pub fn format_error_message(&self, message: &str) -> String {
        format_message(MessageKind::Error, message, self.use_colors(), self.output.emoji)
    }

    pub fn format_warning_message(&self, message: &str) -> String {
        format_message(MessageKind::Warning, message, self.use_colors(), self.output.emoji)
    }

    pub fn format_info_message(&self, message: &str) -> String {
        format_message(MessageKind::Info, message, self.use_colors(), self.output.emoji)
    }
}

impl Default for VisascanConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            scan: ScanSettings::default(),
            output: OutputConfig {
                pretty: false,
                stats: false,
                verbose: 0,
                color: ColorMode::Auto,
                emoji: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Error,
    Warning,
    Info,
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

fn format_message(kind: MessageKind, message: &str, use_colors: bool, use_emoji: bool) -> String {
    let prefix = match (use_emoji, kind) {
        (true, MessageKind::Info) => "🔹",
        (true, _) => "⚠️",
        (false, _) => "visascan:",
    };
    if !use_colors {
        return format!("{} {}", prefix, message);
    }
    let color = match kind {
        MessageKind::Error => RED,
        MessageKind::Warning => YELLOW,
        MessageKind::Info => CYAN,
    };
    format!("{}{} {}{}", color, prefix, message, RESET)
}

/// Error message for contexts without a loaded config (signal thread, config loading)
pub fn format_error_message_auto(message: &str) -> String {
    format_message(
        MessageKind::Error,
        message,
        crate::tty::should_use_colors_with_mode(&ColorMode::Auto),
        crate::tty::should_use_emoji_for_stderr(),
    )
}

pub fn format_warning_message_auto(message: &str) -> String {
    format_message(
        MessageKind::Warning,
        message,
        crate::tty::should_use_colors_with_mode(&ColorMode::Auto),
        crate::tty::should_use_emoji_for_stderr(),
    )
}

pub fn format_info_message_auto(message: &str) -> String {
    format_message(
        MessageKind::Info,
        message,
        crate::tty::should_use_colors_with_mode(&ColorMode::Auto),
        crate::tty::should_use_emoji_for_stderr(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_plain_message_format() {
        assert_eq!(
            format_message(MessageKind::Error, "boom", false, false),
            "visascan: boom"
        );
        assert_eq!(format_message(MessageKind::Info, "done", false, true), "🔹 done");
    }

    #[test]
    fn test_coloured_message_format() {
        let msg = format_message(MessageKind::Warning, "careful", true, false);
        assert!(msg.starts_with(YELLOW));
        assert!(msg.ends_with(RESET));
        assert!(msg.contains("visascan: careful"));
    }

    #[test]
    fn test_layering_cli_over_file_over_defaults() {
        let file = ConfigFile::parse_ini_content(
            "data-dir = /from/file\n[search]\nmax-files = 9\nlimit = 50\n[stats]\nchunk-size = 100\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["visascan", "--data-dir", "/from/cli", "--no-color", "datasets"]);
        let config = VisascanConfig::from_cli(&cli, &file);

        assert_eq!(config.data_dir, PathBuf::from("/from/cli"));
        assert_eq!(config.output.color, ColorMode::Never);
        assert_eq!(config.scan.search.max_files, 9);
        assert_eq!(config.scan.search.max_chunks_per_file, 5);
        assert_eq!(config.scan.search_limit, 50);
        assert_eq!(config.scan.stats.chunk_size, 100);
        assert_eq!(config.scan.stats.max_files, 1);

        let cli = Cli::parse_from(["visascan", "datasets"]);
        assert_eq!(
            VisascanConfig::from_cli(&cli, &file).data_dir,
            PathBuf::from("/from/file")
        );
    }

    #[test]
    fn test_bound_flags_override() {
        let args = BoundsArgs {
            chunk_size: Some(2),
            max_files: None,
            max_chunks: Some(1),
        };
        let bounds = apply_overrides(ScanBounds::STATS, &args);
        assert_eq!(bounds.chunk_size, 2);
        assert_eq!(bounds.max_files, 1);
        assert_eq!(bounds.max_chunks_per_file, 1);
    }
}
