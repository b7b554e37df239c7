use anyhow::Result;
use clap::{CommandFactory, Parser};
use crossbeam_channel::{unbounded, Receiver};
use serde::Serialize;

use visascan::cli::{Cli, Command};
use visascan::config::{apply_overrides, format_error_message_auto};
use visascan::config_file::ConfigFile;
use visascan::error_handling::IssueKind;
use visascan::platform::{Ctrl, ExitCode, SafeStdout, SignalHandler};
use visascan::service::{self, SearchRequest, StatsRequest};
use visascan::{DatasetIndex, ScanSummary, StopReason, VisascanConfig};

fn main() {
    // Shutdown requests from the signal handler reach running scans through this channel
    let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();

    let _signal_handler = match SignalHandler::new(ctrl_tx) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!(
                "{}",
                format_error_message_auto(&format!("Failed to initialize signal handling: {}", e))
            );
            ExitCode::GeneralError.exit();
        }
    };

    // clap exits with code 2 on invalid usage
    let cli = Cli::parse();

    match &cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "visascan", &mut std::io::stdout());
            return;
        }
        Command::ShowConfig => {
            ConfigFile::show_config(cli.config_file.as_deref());
            return;
        }
        _ => {}
    }

    let file_config = if cli.ignore_config {
        ConfigFile::default()
    } else {
        match ConfigFile::load_with_custom_path(cli.config_file.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", format_error_message_auto(&format!("{:#}", e)));
                ExitCode::GeneralError.exit();
            }
        }
    };

    let config = VisascanConfig::from_cli(&cli, &file_config);
    let mut stdout = SafeStdout::new();

    if let Err(e) = run(&cli.command, &config, &ctrl_rx, &mut stdout) {
        eprintln!("{}", config.format_error_message(&format!("{:#}", e)));
        ExitCode::GeneralError.exit();
    }

    if let Some(code) = SignalHandler::termination_exit_code() {
        code.exit();
    }
}

fn run(
    command: &Command,
    config: &VisascanConfig,
    ctrl_rx: &Receiver<Ctrl>,
    stdout: &mut SafeStdout,
) -> Result<()> {
    match command {
        Command::Search(args) => {
            let index = load_index(config)?;
            let request = SearchRequest {
                category: args.dataset.visa_type,
                year: args.dataset.year.clone(),
                quarter: args.dataset.quarter.clone(),
                query: args.query.clone(),
                column: args.column.clone(),
                page: args.page,
                limit: args.limit.unwrap_or(config.scan.search_limit),
            };
            let bounds = apply_overrides(config.scan.search, &args.bounds);

            let output = service::search(&index, &request, bounds, Some(ctrl_rx));
            report_scan(config, &output.summary);
            write_json(stdout, &output.page, config.output.pretty)
        }
        Command::Stats(args) => {
            let index = load_index(config)?;
            let request = StatsRequest {
                category: args.dataset.visa_type,
                year: args.dataset.year.clone(),
                quarter: args.dataset.quarter.clone(),
            };
            let bounds = apply_overrides(config.scan.stats, &args.bounds);

            let output = service::stats(&index, &request, bounds, Some(ctrl_rx));
            report_scan(config, &output.summary);
            write_json(stdout, &output.report, config.output.pretty)
        }
        Command::Columns(args) => {
            let index = load_index(config)?;
            let columns = service::columns(&index, args.visa_type)?;
            write_json(stdout, &columns, config.output.pretty)
        }
        Command::Datasets => {
            let index = load_index(config)?;
            write_json(stdout, &service::datasets(&index), config.output.pretty)
        }
        // Handled before configuration is loaded
        Command::ShowConfig | Command::Completions { .. } => Ok(()),
    }
}

fn load_index(config: &VisascanConfig) -> Result<DatasetIndex> {
    let index = DatasetIndex::scan_dir(&config.data_dir)?;
    if index.is_empty() && config.output.verbose > 0 {
        eprintln!(
            "{}",
            config.format_warning_message(&format!(
                "No dataset files found in '{}'",
                config.data_dir.display()
            ))
        );
    }
    Ok(index)
}

/// Diagnostics for one scan, on stderr
fn report_scan(config: &VisascanConfig, summary: &ScanSummary) {
    if config.output.verbose > 0 {
        for issue in summary.issues.iter() {
            eprintln!("{}", config.format_warning_message(&issue.to_string()));
        }
        if config.output.verbose > 1 {
            eprintln!(
                "{}",
                config.format_info_message(&format!("Scan stopped: {}", summary.stop))
            );
        }
    } else if !summary.issues.is_empty() {
        let kinds = [
            IssueKind::FileUnreadable,
            IssueKind::ChunkSkipped,
            IssueKind::RowsDropped,
            IssueKind::ValuesExcluded,
        ];
        let counts: Vec<String> = kinds
            .iter()
            .filter(|kind| summary.issues.count(**kind) > 0)
            .map(|kind| format!("{} {}", summary.issues.count(*kind), kind))
            .collect();
        eprintln!(
            "{}",
            config.format_warning_message(&format!(
                "Scan issues: {} (use -v for details)",
                counts.join(", ")
            ))
        );
    }

    if summary.stop == StopReason::Cancelled {
        eprintln!(
            "{}",
            config.format_warning_message("Scan cancelled, results are partial")
        );
    }

    if config.output.stats {
        eprintln!("{}", config.format_info_message(&summary.stats.format_stats()));
        if let Some(issues) = summary.issues.generate_summary() {
            eprintln!("{}", config.format_info_message(&format!("Issues: {}", issues)));
        }
    }
}

fn write_json<T: Serialize>(stdout: &mut SafeStdout, value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    stdout.writeln(&text)?;
    stdout.flush()
}
