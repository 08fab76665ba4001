use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use super::asc_reader::{AscParser, ParsedLog};
use super::batch_status::{BatchStage, BatchStatus};
use super::config::Config;
use super::error::ProcessorError;
use super::file_filter::{trial_id_from_name, FileFilter};
use super::meta_writer::{
    is_meta_file, write_trial_summaries, MetaRecord, MetaWriter, TRIAL_SUMMARY_NAME,
};
use super::stats::{aggregate, TrialSummary};
use super::table::{read_table_file, write_table_file};

const TABLE_EXTENSIONS: [&str; 2] = ["txt", "csv"];

/// Outcome of cleaning a directory of ASC logs
#[derive(Debug, Default)]
pub struct CleanReport {
    pub cleaned: Vec<MetaRecord>,
    pub failed: Vec<(PathBuf, String)>,
    pub meta_path: Option<PathBuf>,
}

/// Statistics merged over every matching table of a directory
#[derive(Debug, Default)]
pub struct DirectorySummary {
    pub files: usize,
    pub failed: Vec<(PathBuf, String)>,
    pub summary: TrialSummary,
}

/// Statistics for each trial of a directory
#[derive(Debug, Default)]
pub struct PerTrialSummary {
    pub trials: BTreeMap<u64, TrialSummary>,
    pub failed: Vec<(PathBuf, String)>,
}

fn fmt_extreme(value: Option<i64>) -> String {
    value.map_or_else(|| String::from("n/a"), |v| v.to_string())
}

impl Display for DirectorySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = &self.summary;
        writeln!(f, "Statistics results from {} files", self.files)?;
        writeln!(f, "Episodes: {}", s.total_episode)?;
        writeln!(f, "Frames: {}", s.total_frame)?;
        writeln!(f, "Game play time: {}", s.total_time_ms)?;
        writeln!(
            f,
            "Lowest cumulative reward: {}",
            fmt_extreme(s.lowest_cumulative_reward)
        )?;
        writeln!(
            f,
            "Highest cumulative reward: {}",
            fmt_extreme(s.highest_cumulative_reward)
        )?;
        writeln!(f, "Lowest score: {}", fmt_extreme(s.lowest_score))?;
        write!(f, "Highest score: {}", fmt_extreme(s.highest_score))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Parse one ASC log and write its table into the configured table directory
pub fn clean_file(
    parser: &AscParser,
    asc_path: &Path,
    config: &Config,
) -> Result<ParsedLog, ProcessorError> {
    // Header lines may carry paths in the recording machine's codepage
    let bytes = std::fs::read(asc_path)?;
    let contents = String::from_utf8_lossy(&bytes);
    let parsed = parser
        .parse_log(contents.lines())
        .map_err(|e| ProcessorError::ParseError(asc_path.to_path_buf(), e))?;

    config.create_table_directory()?;
    let table_path = config.get_table_file_name(asc_path);
    write_table_file(&parsed.table, &config.table_format, &table_path)
        .map_err(|e| ProcessorError::TableError(table_path.clone(), e))?;
    log::info!(
        "Wrote {} frames to {}",
        parsed.table.len(),
        table_path.display()
    );
    Ok(parsed)
}

/// Clean every ASC log of the source directory.
///
/// A file that fails (including a duplicate episode or score) is logged and recorded in
/// the report; the rest of the batch still runs. The metadata side-channel is written
/// for the files that succeeded.
pub fn clean_directory<F: FnMut(BatchStatus)>(
    config: &Config,
    mut on_status: F,
) -> Result<CleanReport, ProcessorError> {
    let files = config.get_asc_files()?;
    let total_bytes = files.iter().fold(0, |sum, path| {
        sum + path.metadata().map(|m| m.len()).unwrap_or(0)
    });
    log::info!(
        "Found {} ASC files, total size: {}",
        files.len(),
        human_bytes::human_bytes(total_bytes as f64)
    );

    config.create_table_directory()?;
    let parser =
        AscParser::new().map_err(|e| ProcessorError::ParseError(config.asc_path.clone(), e))?;

    let mut report = CleanReport::default();
    on_status(BatchStatus::new(0.0, "", BatchStage::Cleaning));
    for (idx, path) in files.iter().enumerate() {
        let file_name = file_name_of(path);
        log::info!("Processing asc file: {}", path.display());
        match clean_file(&parser, path, config) {
            Ok(parsed) => report
                .cleaned
                .push(MetaRecord::new(&file_name, parsed.metadata)),
            Err(e) => {
                log::error!("{e}");
                log::warn!("Skipping {file_name}");
                report.failed.push((path.clone(), e.to_string()));
            }
        }
        on_status(BatchStatus::after_file(
            idx + 1,
            files.len(),
            &file_name,
            BatchStage::Cleaning,
        ));
    }

    if !report.cleaned.is_empty() {
        let writer = MetaWriter::new(&config.table_path);
        writer.write(&report.cleaned)?;
        log::info!("Wrote metadata to {}", writer.yaml_path().display());
        report.meta_path = Some(writer.yaml_path().to_path_buf());
    }
    Ok(report)
}

/// Table files of a directory accepted by the filter, sorted by name
pub fn collect_table_files(
    directory: &Path,
    filter: &FileFilter,
) -> Result<Vec<PathBuf>, ProcessorError> {
    if !directory.is_dir() {
        return Err(ProcessorError::BadDirectory(directory.to_path_buf()));
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for item in directory.read_dir()? {
        let item_path = item?.path();
        let is_table = item_path
            .extension()
            .is_some_and(|ext| TABLE_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)));
        if item_path.is_file()
            && is_table
            && !is_meta_file(&file_name_of(&item_path))
            && filter.matches(&item_path)
        {
            files.push(item_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read and summarize every matching table. Unreadable tables are logged and skipped.
fn summarize_tables<F, G>(
    config: &Config,
    mut on_status: F,
    mut on_summary: G,
) -> Result<Vec<(PathBuf, String)>, ProcessorError>
where
    F: FnMut(BatchStatus),
    G: FnMut(&Path, TrialSummary),
{
    let filter = config.file_filter()?;
    let files = collect_table_files(&config.table_path, &filter)?;
    let mode = config.aggregate_mode();
    let mut failed = Vec::new();

    on_status(BatchStatus::new(0.0, "", BatchStage::Statistics));
    for (idx, path) in files.iter().enumerate() {
        let file_name = file_name_of(path);
        log::info!("Processing csv file: {file_name}");
        match read_table_file(path, &config.table_format) {
            Ok(table) => on_summary(path, aggregate(&table, mode, config.ignore_incomplete)),
            Err(e) => {
                let e = ProcessorError::TableError(path.clone(), e);
                log::error!("{e}");
                failed.push((path.clone(), e.to_string()));
            }
        }
        on_status(BatchStatus::after_file(
            idx + 1,
            files.len(),
            &file_name,
            BatchStage::Statistics,
        ));
    }
    Ok(failed)
}

/// Statistics over every matching table of the table directory, merged into one summary.
/// Episodes never span files.
pub fn stat_directory<F: FnMut(BatchStatus)>(
    config: &Config,
    on_status: F,
) -> Result<DirectorySummary, ProcessorError> {
    let mut files = 0;
    let mut merged = TrialSummary::default();
    let failed = summarize_tables(config, on_status, |_, summary| {
        files += 1;
        merged.merge(&summary);
    })?;
    Ok(DirectorySummary {
        files,
        failed,
        summary: merged,
    })
}

/// Statistics for each trial of the table directory, keyed by the trial id at the start of
/// each file name
pub fn stat_per_trial<F: FnMut(BatchStatus)>(
    config: &Config,
    on_status: F,
) -> Result<PerTrialSummary, ProcessorError> {
    let mut trials: BTreeMap<u64, TrialSummary> = BTreeMap::new();
    let failed = summarize_tables(config, on_status, |path, summary| {
        let file_name = file_name_of(path);
        let Some(trial_id) = trial_id_from_name(&file_name) else {
            log::warn!("{file_name} does not start with a trial id, skipping...");
            return;
        };
        if let Some(existing) = trials.get_mut(&trial_id) {
            log::warn!("Trial {trial_id} appears in more than one file; merging {file_name}");
            existing.merge(&summary);
        } else {
            trials.insert(trial_id, summary);
        }
    })?;
    Ok(PerTrialSummary { trials, failed })
}

/// Outcome of a full configured run
#[derive(Debug)]
pub struct RunReport {
    pub clean: CleanReport,
    pub totals: Option<DirectorySummary>,
    pub per_trial: Option<PerTrialSummary>,
}

/// Clean the source directory, then summarize the written tables.
///
/// In per-trial mode the summaries are also exported next to the tables.
pub fn process<F: FnMut(BatchStatus)>(
    config: &Config,
    mut on_status: F,
) -> Result<RunReport, ProcessorError> {
    let clean = clean_directory(config, &mut on_status)?;
    log::info!(
        "Cleaned {} files, {} failed.",
        clean.cleaned.len(),
        clean.failed.len()
    );

    if config.per_trial {
        let per_trial = stat_per_trial(config, &mut on_status)?;
        let summary_path = config.table_path.join(TRIAL_SUMMARY_NAME);
        write_trial_summaries(&summary_path, &per_trial.trials)?;
        log::info!("Wrote trial summaries to {}", summary_path.display());
        Ok(RunReport {
            clean,
            totals: None,
            per_trial: Some(per_trial),
        })
    } else {
        let totals = stat_directory(config, &mut on_status)?;
        for line in totals.to_string().lines() {
            log::info!("{line}");
        }
        Ok(RunReport {
            clean,
            totals: Some(totals),
            per_trial: None,
        })
    }
}
