use regex::Regex;
use std::path::Path;

use super::error::ConfigError;

/// The trial id is the leading run of digits in a file name, e.g. 191 for
/// `191_JAW_9955253_Jun-25-14-35-04.txt`
pub fn trial_id_from_name(file_name: &str) -> Option<u64> {
    let digits: String = file_name.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().ok()
}

/// Decides which files of a directory take part in a batch
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pattern: Option<Regex>,
    min_trial_id: Option<u64>,
}

impl FileFilter {
    /// The pattern has to match at the start of the file name
    pub fn new(pattern: Option<&str>, min_trial_id: Option<u64>) -> Result<Self, ConfigError> {
        let pattern = match pattern {
            Some(p) => Some(Regex::new(p)?),
            None => None,
        };
        Ok(Self {
            pattern,
            min_trial_id,
        })
    }

    pub fn matches_name(&self, file_name: &str) -> bool {
        if let Some(pattern) = &self.pattern {
            match pattern.find(file_name) {
                Some(m) if m.start() == 0 => (),
                _ => return false,
            }
        }
        if let Some(min) = self.min_trial_id {
            match trial_id_from_name(file_name) {
                Some(id) if id > min => (),
                _ => return false,
            }
        }
        true
    }

    pub fn matches(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => self.matches_name(&name.to_string_lossy()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_id() {
        assert_eq!(
            trial_id_from_name("191_JAW_9955253_Jun-25-14-35-04.txt"),
            Some(191)
        );
        assert_eq!(trial_id_from_name("7.txt"), Some(7));
        assert_eq!(trial_id_from_name("meta.yml"), None);
    }

    #[test]
    fn test_filter() {
        let everything = FileFilter::default();
        assert!(everything.matches_name("anything"));

        let filter = match FileFilter::new(Some(r"\d+_"), Some(100)) {
            Ok(f) => f,
            Err(e) => panic!("{e}"),
        };
        assert!(filter.matches_name("191_JAW.txt"));
        assert!(!filter.matches_name("100_JAW.txt"));
        assert!(!filter.matches_name("x191_JAW.txt"));
        assert!(filter.matches(Path::new("/data/csv/250_KM.txt")));
    }

    #[test]
    fn test_bad_pattern() {
        assert!(matches!(
            FileFilter::new(Some("("), None),
            Err(ConfigError::BadPattern(_))
        ));
    }
}
