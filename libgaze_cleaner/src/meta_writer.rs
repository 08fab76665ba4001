use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::error::MetaWriterError;
use super::file_filter::trial_id_from_name;
use super::frame::FileMetadata;
use super::stats::TrialSummary;

const META_SUFFIX: &str = "_meta";
/// File name of the per-trial summary export
pub const TRIAL_SUMMARY_NAME: &str = "trial_summary.csv";
const META_HEADER: &str = "trial_id,file_name,avg_error,max_error,low_sample_rate,total_frame";
const SUMMARY_HEADER: &str = "trial_id,lowest_score,highest_score,lowest_cumulative_reward,highest_cumulative_reward,total_episode,total_frame,total_time_ms";

/// Quality metadata of one cleaned log, keyed by its trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub trial_id: Option<u64>,
    pub file_name: String,
    pub metadata: FileMetadata,
}

impl MetaRecord {
    pub fn new(file_name: &str, metadata: FileMetadata) -> Self {
        Self {
            trial_id: trial_id_from_name(file_name),
            file_name: file_name.to_string(),
            metadata,
        }
    }
}

/// Side-channel files share a directory with the tables but are not tables
pub fn is_meta_file(file_name: &str) -> bool {
    file_name == TRIAL_SUMMARY_NAME
        || file_name.ends_with(&format!("{META_SUFFIX}.yml"))
        || file_name.ends_with(&format!("{META_SUFFIX}.csv"))
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the per-batch metadata side-channel next to the cleaned tables.
///
/// Every batch gets its own pair of files named after the time the writer was made:
/// `<unix millis>_meta.yml` and `<unix millis>_meta.csv`.
#[derive(Debug)]
pub struct MetaWriter {
    yaml_path: PathBuf,
    csv_path: PathBuf,
}

impl MetaWriter {
    pub fn new(directory: &Path) -> Self {
        let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Self::with_stem(directory, &millis.to_string())
    }

    pub fn with_stem(directory: &Path, stem: &str) -> Self {
        Self {
            yaml_path: directory.join(format!("{stem}{META_SUFFIX}.yml")),
            csv_path: directory.join(format!("{stem}{META_SUFFIX}.csv")),
        }
    }

    pub fn yaml_path(&self) -> &Path {
        &self.yaml_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Write both side-channel files, ordered by trial id then file name
    pub fn write(&self, records: &[MetaRecord]) -> Result<(), MetaWriterError> {
        let mut sorted = records.to_vec();
        sorted.sort_by(|a, b| {
            a.trial_id
                .cmp(&b.trial_id)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        let yaml_str = serde_yaml::to_string(&sorted)?;
        std::fs::write(&self.yaml_path, yaml_str)?;

        let mut writer = BufWriter::new(File::create(&self.csv_path)?);
        writeln!(writer, "{META_HEADER}")?;
        for record in sorted.iter() {
            writeln!(
                writer,
                "{},{},{},{},{},{}",
                cell(record.trial_id),
                record.file_name,
                cell(record.metadata.avg_error),
                cell(record.metadata.max_error),
                record.metadata.low_sample_rate,
                record.metadata.total_frame
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Export per-trial statistics as CSV keyed by trial id
pub fn write_trial_summaries(
    path: &Path,
    summaries: &BTreeMap<u64, TrialSummary>,
) -> Result<(), MetaWriterError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{SUMMARY_HEADER}")?;
    for (trial_id, summary) in summaries.iter() {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            trial_id,
            cell(summary.lowest_score),
            cell(summary.highest_score),
            cell(summary.lowest_cumulative_reward),
            cell(summary.highest_cumulative_reward),
            summary.total_episode,
            summary.total_frame,
            summary.total_time_ms
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(total_frame: usize, avg_error: Option<f64>) -> FileMetadata {
        FileMetadata {
            avg_error,
            max_error: avg_error.map(|e| e * 2.0),
            low_sample_rate: String::from("1.5%"),
            total_frame,
        }
    }

    #[test]
    fn test_write_batch_metadata() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("{e}"),
        };
        let writer = MetaWriter::with_stem(dir.path(), "1551846098049");
        let records = vec![
            MetaRecord::new("250_KM_1.asc", metadata(3000, None)),
            MetaRecord::new("191_JAW_2.asc", metadata(5000, Some(0.5))),
        ];
        if let Err(e) = writer.write(&records) {
            panic!("{e}");
        }
        assert!(writer.yaml_path().ends_with("1551846098049_meta.yml"));

        let csv = match std::fs::read_to_string(writer.csv_path()) {
            Ok(s) => s,
            Err(e) => panic!("{e}"),
        };
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], META_HEADER);
        assert_eq!(lines[1], "191,191_JAW_2.asc,0.5,1,1.5%,5000");
        assert_eq!(lines[2], "250,250_KM_1.asc,,,1.5%,3000");

        let yaml = match std::fs::read_to_string(writer.yaml_path()) {
            Ok(s) => s,
            Err(e) => panic!("{e}"),
        };
        let read_back: Vec<MetaRecord> = match serde_yaml::from_str(&yaml) {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].trial_id, Some(191));
        assert_eq!(read_back[1].metadata, metadata(3000, None));
    }

    #[test]
    fn test_is_meta_file() {
        assert!(is_meta_file("1551846098049_meta.csv"));
        assert!(is_meta_file("1551846098049_meta.yml"));
        assert!(is_meta_file(TRIAL_SUMMARY_NAME));
        assert!(!is_meta_file("191_JAW_9955253_Jun-25-14-35-04.txt"));
    }

    #[test]
    fn test_write_trial_summaries() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("{e}"),
        };
        let path = dir.path().join("summary.csv");
        let mut summaries = BTreeMap::new();
        summaries.insert(
            12,
            TrialSummary {
                lowest_score: Some(0),
                highest_score: Some(50),
                lowest_cumulative_reward: Some(-2),
                highest_cumulative_reward: Some(10),
                total_episode: 3,
                total_frame: 8,
                total_time_ms: 131,
            },
        );
        summaries.insert(3, TrialSummary::default());
        if let Err(e) = write_trial_summaries(&path, &summaries) {
            panic!("{e}");
        }
        let csv = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => panic!("{e}"),
        };
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "3,,,,,0,0,0");
        assert_eq!(lines[2], "12,0,50,-2,10,3,8,131");
    }
}
