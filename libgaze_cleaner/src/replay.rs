use fxhash::FxHashSet;
use std::path::Path;

use super::error::ReplayError;
use super::frame::{FrameId, FrameTable, GazePosition};
use super::table::{read_table_file, TableFormat};

const ASSET_EXTENSION: &str = ".png";

/// One frame of a replay, with the asset that shows it
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayFrame {
    pub id: FrameId,
    pub asset_name: String,
    pub gaze_samples: Vec<GazePosition>,
    pub duration_ms: Option<i64>,
}

/// The frames of a trial in playback order, checked against the recorded frame images.
///
/// Frames are ordered by sequence number regardless of the order of the table.
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    pub frames: Vec<ReplayFrame>,
    pub missing_assets: Vec<FrameId>,
    pub ignored_assets: Vec<String>,
}

impl ReplayPlan {
    pub fn new<I, S>(table: &FrameTable, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = ReplayPlan::default();
        let mut available: FxHashSet<String> = FxHashSet::default();
        for asset in assets {
            let asset = asset.as_ref();
            if asset.ends_with(ASSET_EXTENSION) {
                available.insert(asset.to_string());
            } else {
                log::warn!("{asset} is not a PNG file. Deleting it from the frames list");
                plan.ignored_assets.push(asset.to_string());
            }
        }

        let mut records: Vec<_> = table.iter().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        for record in records {
            let asset_name = format!("{}{ASSET_EXTENSION}", record.id);
            if !available.contains(&asset_name) {
                log::warn!("No corresponding png file for frame id {}", record.id);
                plan.missing_assets.push(record.id.clone());
            }
            plan.frames.push(ReplayFrame {
                id: record.id.clone(),
                asset_name,
                gaze_samples: record.gaze_samples.clone(),
                duration_ms: record.duration_ms,
            });
        }
        plan
    }

    pub fn has_warnings(&self) -> bool {
        !self.missing_assets.is_empty() || !self.ignored_assets.is_empty()
    }
}

/// File names in an asset directory, sorted
pub fn list_assets(directory: &Path) -> Result<Vec<String>, ReplayError> {
    if !directory.is_dir() {
        return Err(ReplayError::BadAssetPath(directory.to_path_buf()));
    }
    let mut names: Vec<String> = Vec::new();
    for item in directory.read_dir()? {
        let item = item?;
        if item.path().is_file() {
            names.push(item.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Read a table and check it against the frame images of `asset_directory`
pub fn load_plan(
    table_path: &Path,
    asset_directory: &Path,
    format: &TableFormat,
) -> Result<ReplayPlan, ReplayError> {
    let assets = list_assets(asset_directory)?;
    let table = read_table_file(table_path, format)?;
    Ok(ReplayPlan::new(&table, assets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameRecord;

    fn table(sequences: &[u64]) -> FrameTable {
        let mut table = FrameTable::new();
        for seq in sequences {
            let mut record = FrameRecord::new(FrameId::new("RZ_2394668", *seq));
            record.duration_ms = Some(*seq as i64);
            let _ = table.push(record);
        }
        table
    }

    #[test]
    fn test_plan_orders_and_checks() {
        let table = table(&[10, 2, 1]);
        let assets = ["RZ_2394668_1.png", "RZ_2394668_10.png", "notes.txt"];
        let plan = ReplayPlan::new(&table, assets);
        let order: Vec<u64> = plan.frames.iter().map(|f| f.id.sequence).collect();
        assert_eq!(order, vec![1, 2, 10]);
        assert_eq!(plan.frames[2].asset_name, "RZ_2394668_10.png");
        assert_eq!(plan.missing_assets, vec![FrameId::new("RZ_2394668", 2)]);
        assert_eq!(plan.ignored_assets, vec![String::from("notes.txt")]);
        assert!(plan.has_warnings());
    }

    #[test]
    fn test_list_assets() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("{e}"),
        };
        for name in ["b_2.png", "b_1.png"] {
            if let Err(e) = std::fs::write(dir.path().join(name), b"") {
                panic!("{e}");
            }
        }
        match list_assets(dir.path()) {
            Ok(names) => assert_eq!(names, vec!["b_1.png", "b_2.png"]),
            Err(e) => panic!("{e}"),
        }
        assert!(matches!(
            list_assets(&dir.path().join("missing")),
            Err(ReplayError::BadAssetPath(_))
        ));
    }

    #[test]
    fn test_load_plan() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("{e}"),
        };
        let table_path = dir.path().join("12_AB.txt");
        if let Err(e) = std::fs::write(
            &table_path,
            "AB_2,1,0,16,0,1,null\nAB_1,1,0,16,0,1,1.0 2.0\n",
        ) {
            panic!("{e}");
        }
        if let Err(e) = std::fs::write(dir.path().join("AB_1.png"), b"") {
            panic!("{e}");
        }
        let plan = match load_plan(&table_path, dir.path(), &TableFormat::default()) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(plan.frames[0].id, FrameId::new("AB", 1));
        assert_eq!(plan.missing_assets, vec![FrameId::new("AB", 2)]);
        // the table itself is not an image
        assert_eq!(plan.ignored_assets, vec![String::from("12_AB.txt")]);

        assert!(matches!(
            load_plan(&dir.path().join("none.txt"), dir.path(), &TableFormat::default()),
            Err(ReplayError::TableError(_))
        ));
    }
}
