use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameIdError {
    #[error("Frame id {0} is missing the '_' between session tag and sequence number")]
    MissingSeparator(String),
    #[error("Frame id {0} has an empty session tag")]
    EmptyTag(String),
    #[error("Frame id {0} has an invalid sequence number: {1}")]
    BadSequence(String, std::num::ParseIntError),
}

#[derive(Debug, Error)]
pub enum AscParseError {
    #[error("There is more than 1 episode for frame id {0}. Not supposed to happen.")]
    DuplicateEpisode(String),
    #[error("There is more than 1 score for frame id {0}. Not supposed to happen.")]
    DuplicateScore(String),
    #[error("AscParser failed to compile a message pattern: {0}")]
    PatternError(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Table line {0} has {1} fields; expected {exp}", exp = crate::table::FIELDS_PER_LINE)]
    BadFileFormat(usize, usize),
    #[error("Table line {0} has a bad frame id: {1}")]
    BadFrameId(usize, FrameIdError),
    #[error("Table line {0} repeats frame id {1}")]
    DuplicateFrame(usize, String),
    #[error("Table line {0} failed to parse an integer: {1}")]
    BadInteger(usize, std::num::ParseIntError),
    #[error("Table line {0} failed to parse a gaze position: {1}")]
    BadFloat(usize, std::num::ParseFloatError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid file pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum MetaWriterError {
    #[error("MetaWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("MetaWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Replay failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Replay could not open asset directory {0:?} as it does not exist")]
    BadAssetPath(PathBuf),
    #[error("Replay failed due to Table error: {0}")]
    TableError(#[from] TableError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed on {0:?} due to AscParser error: {1}")]
    ParseError(PathBuf, AscParseError),
    #[error("Processor failed on {0:?} due to Table error: {1}")]
    TableError(PathBuf, TableError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to MetaWriter error: {0}")]
    MetaWriterError(#[from] MetaWriterError),
    #[error("Processor could not find directory {0:?}")]
    BadDirectory(PathBuf),
    #[error("Processor failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}
