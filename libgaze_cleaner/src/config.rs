use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::file_filter::FileFilter;
use super::stats::AggregateMode;
use super::table::TableFormat;

const ASC_EXTENSION: &str = "asc";

/// Structure representing the application configuration. Contains pathing and batch options
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub asc_path: PathBuf,
    pub table_path: PathBuf,
    pub table_format: TableFormat,
    pub plain_text: bool,
    pub file_pattern: Option<String>,
    pub min_trial_id: Option<u64>,
    pub ignore_incomplete: bool,
    pub per_trial: bool,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            asc_path: PathBuf::from("None"),
            table_path: PathBuf::from("None"),
            table_format: TableFormat::default(),
            plain_text: true,
            file_pattern: None,
            min_trial_id: None,
            ignore_incomplete: false,
            per_trial: false,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// All ASC logs in the source directory, sorted by name
    pub fn get_asc_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.asc_path.exists() {
            return Err(ConfigError::BadFilePath(self.asc_path.clone()));
        }
        let mut files: Vec<PathBuf> = Vec::new();
        for item in self.asc_path.read_dir()? {
            let item_path = item?.path();
            let is_asc = item_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(ASC_EXTENSION));
            if item_path.is_file() && is_asc {
                files.push(item_path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Get the path of the table written for an ASC log.
    ///
    /// The stem is everything up to the first '.' of the log's file name.
    pub fn get_table_file_name(&self, asc_file: &Path) -> PathBuf {
        let file_name = asc_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = file_name.split('.').next().unwrap_or_default();
        let extension = if self.plain_text { "txt" } else { "csv" };
        self.table_path.join(format!("{stem}.{extension}"))
    }

    /// Create the table directory if needed
    pub fn create_table_directory(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.table_path)?;
        Ok(())
    }

    pub fn file_filter(&self) -> Result<FileFilter, ConfigError> {
        FileFilter::new(self.file_pattern.as_deref(), self.min_trial_id)
    }

    pub fn aggregate_mode(&self) -> AggregateMode {
        if self.per_trial {
            AggregateMode::PerTrial
        } else {
            AggregateMode::Total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("{e}"),
        };
        let path = dir.path().join("config.yml");
        let config = Config {
            asc_path: PathBuf::from("/data/asc"),
            table_path: PathBuf::from("/data/csv"),
            min_trial_id: Some(150),
            ..Default::default()
        };
        if let Err(e) = config.write_config_file(&path) {
            panic!("{e}");
        }
        match Config::read_config_file(&path) {
            Ok(read) => assert_eq!(read, config),
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn test_missing_config() {
        assert!(matches!(
            Config::read_config_file(Path::new("/definitely/not/here.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_table_file_name() {
        let mut config = Config {
            table_path: PathBuf::from("/out"),
            ..Default::default()
        };
        let asc = Path::new("/in/191_JAW_9955253_Jun-25-14-35-04.asc");
        assert_eq!(
            config.get_table_file_name(asc),
            PathBuf::from("/out/191_JAW_9955253_Jun-25-14-35-04.txt")
        );
        config.plain_text = false;
        assert_eq!(
            config.get_table_file_name(Path::new("/in/12_a.b.asc")),
            PathBuf::from("/out/12_a.csv")
        );
    }
}
