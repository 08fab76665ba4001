use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use libgaze_cleaner::batch_status::BatchStatus;
use libgaze_cleaner::config::Config;
use libgaze_cleaner::process::{clean_directory, process, stat_directory, stat_per_trial};
use libgaze_cleaner::replay::load_plan;
use libgaze_cleaner::stats::TrialSummary;
use libgaze_cleaner::table::TableFormat;

fn path_arg() -> Arg {
    Arg::new("path")
        .short('p')
        .long("path")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Path to the config file")
}

fn cli() -> Command {
    Command::new("gaze_cleaner_cli")
        .about("Clean eye-tracker ASC logs into frame tables and summarize them")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("new")
                .about("Make a template configuration yaml file")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Clean and summarize using a configuration yaml file")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("clean")
                .about("Clean every ASC log of a directory")
                .arg(
                    Arg::new("source")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory containing the ASC logs"),
                )
                .arg(
                    Arg::new("destination")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory the tables are written to"),
                )
                .arg(
                    Arg::new("include_header")
                        .value_parser(value_parser!(bool))
                        .default_value("false")
                        .help("Write a header line in every table (true/false)"),
                ),
        )
        .subcommand(
            Command::new("stat")
                .about("Summarize the tables of a directory")
                .arg(
                    Arg::new("directory")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory containing the tables"),
                )
                .arg(
                    Arg::new("per_trial")
                        .long("per-trial")
                        .action(ArgAction::SetTrue)
                        .help("Report every trial on its own"),
                )
                .arg(
                    Arg::new("ignore_incomplete")
                        .long("ignore-incomplete")
                        .action(ArgAction::SetTrue)
                        .help("Stop reading a table at its first incomplete frame"),
                )
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .help("Regex the table file names must match"),
                )
                .arg(
                    Arg::new("min_trial")
                        .long("min-trial")
                        .value_parser(value_parser!(u64))
                        .help("Only include trials with an id greater than this"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check a table against its directory of frame images")
                .arg(
                    Arg::new("table")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Table file to check"),
                )
                .arg(
                    Arg::new("asset_dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory containing the frame images"),
                ),
        )
}

fn get_path(matches: &ArgMatches, id: &str) -> PathBuf {
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

fn make_template_config(path: &Path) -> ExitCode {
    log::info!("Making a template config at {}...", path.display());
    match Config::default().write_config_file(path) {
        Ok(()) => {
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_config(path: &Path, pb: &ProgressBar) -> ExitCode {
    // Load our config
    log::info!("Loading config from {}...", path.display());
    let config = match Config::read_config_file(path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("ASC Path: {}", config.asc_path.display());
    log::info!("Table Path: {}", config.table_path.display());
    log::info!("Include Header: {}", config.table_format.include_header);
    log::info!("Per Trial: {}", config.per_trial);
    log::info!("Ignore Incomplete: {}", config.ignore_incomplete);

    match process(&config, |status| update_progress(pb, &status)) {
        Ok(report) => {
            if let Some(per_trial) = report.per_trial {
                log_trial_summaries(&per_trial.trials);
            }
            if report.clean.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                log::error!("{} files failed to clean", report.clean.failed.len());
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            log::error!("Processing failed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_clean(matches: &ArgMatches, pb: &ProgressBar) -> ExitCode {
    let config = Config {
        asc_path: get_path(matches, "source"),
        table_path: get_path(matches, "destination"),
        table_format: TableFormat {
            include_header: matches
                .get_one::<bool>("include_header")
                .copied()
                .unwrap_or(false),
            ..Default::default()
        },
        ..Default::default()
    };
    match clean_directory(&config, |status| update_progress(pb, &status)) {
        Ok(report) => {
            log::info!(
                "Cleaned {} files, {} failed.",
                report.cleaned.len(),
                report.failed.len()
            );
            if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            log::error!("Cleaning failed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_stat(matches: &ArgMatches, pb: &ProgressBar) -> ExitCode {
    let config = Config {
        table_path: get_path(matches, "directory"),
        file_pattern: matches.get_one::<String>("pattern").cloned(),
        min_trial_id: matches.get_one::<u64>("min_trial").copied(),
        ignore_incomplete: matches.get_flag("ignore_incomplete"),
        per_trial: matches.get_flag("per_trial"),
        ..Default::default()
    };

    if config.per_trial {
        match stat_per_trial(&config, |status| update_progress(pb, &status)) {
            Ok(result) => {
                log_trial_summaries(&result.trials);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        }
    } else {
        match stat_directory(&config, |status| update_progress(pb, &status)) {
            Ok(result) => {
                for line in result.to_string().lines() {
                    log::info!("{line}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        }
    }
}

fn run_check(matches: &ArgMatches) -> ExitCode {
    let table_path = get_path(matches, "table");
    let asset_dir = get_path(matches, "asset_dir");
    match load_plan(&table_path, &asset_dir, &TableFormat::default()) {
        Ok(plan) => {
            log::info!(
                "{} frames, {} missing images, {} ignored files",
                plan.frames.len(),
                plan.missing_assets.len(),
                plan.ignored_assets.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn log_trial_summaries(trials: &BTreeMap<u64, TrialSummary>) {
    match serde_yaml::to_string(trials) {
        Ok(yaml_str) => {
            for line in yaml_str.lines() {
                log::info!("{line}");
            }
        }
        Err(e) => log::error!("{e}"),
    }
}

fn update_progress(pb: &ProgressBar, status: &BatchStatus) {
    pb.set_position((status.progress * 100.0) as u64);
    pb.set_message(status.file_name.clone());
}

fn main() -> ExitCode {
    // Create a cli
    let matches = cli().get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));

    let code = match matches.subcommand() {
        Some(("new", sub)) => make_template_config(&get_path(sub, "path")),
        Some(("run", sub)) => run_config(&get_path(sub, "path"), &pb),
        Some(("clean", sub)) => run_clean(sub, &pb),
        Some(("stat", sub)) => run_stat(sub, &pb),
        Some(("check", sub)) => run_check(sub),
        _ => ExitCode::FAILURE,
    };

    pb.finish();

    log::info!("Done.");
    code
}
