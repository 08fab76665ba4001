use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use super::error::FrameIdError;

/// Identifier of one on-screen frame: the recorder's session tag (UTID) and the
/// frame sequence number announced by the frame-boundary message.
///
/// FrameIds order by sequence number; the tag only breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameId {
    pub session_tag: String,
    pub sequence: u64,
}

impl FrameId {
    pub fn new(session_tag: &str, sequence: u64) -> Self {
        Self {
            session_tag: session_tag.to_string(),
            sequence,
        }
    }
}

impl Ord for FrameId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.session_tag.cmp(&other.session_tag))
    }
}

impl PartialOrd for FrameId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.session_tag, self.sequence)
    }
}

impl FromStr for FrameId {
    type Err = FrameIdError;

    /// Session tags may themselves contain underscores, so the sequence number is
    /// whatever follows the last one
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, sequence) = s
            .rsplit_once('_')
            .ok_or_else(|| FrameIdError::MissingSeparator(s.to_string()))?;
        if tag.is_empty() {
            return Err(FrameIdError::EmptyTag(s.to_string()));
        }
        let sequence = sequence
            .parse::<u64>()
            .map_err(|e| FrameIdError::BadSequence(s.to_string(), e))?;
        Ok(Self::new(tag, sequence))
    }
}

/// A single gaze sample in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazePosition {
    pub x: f64,
    pub y: f64,
}

impl GazePosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Everything recorded for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub id: FrameId,
    pub gaze_samples: Vec<GazePosition>,
    pub action: Option<i64>,
    pub duration_ms: Option<i64>,
    pub reward: Option<i64>,
    pub episode_id: Option<i64>,
    pub score: Option<i64>,
}

impl FrameRecord {
    pub fn new(id: FrameId) -> Self {
        Self {
            id,
            gaze_samples: Vec::new(),
            action: None,
            duration_ms: None,
            reward: None,
            episode_id: None,
            score: None,
        }
    }

    /// A frame is complete when every field the statistics depend on is present
    pub fn is_complete(&self) -> bool {
        self.duration_ms.is_some()
            && self.reward.is_some()
            && self.episode_id.is_some()
            && self.score.is_some()
    }
}

/// FrameRecords in arrival order, indexed by FrameId.
///
/// This is the canonical order for everything downstream of the parser: the
/// table writer emits it and the aggregator consumes it.
#[derive(Debug, Clone, Default)]
pub struct FrameTable {
    records: Vec<FrameRecord>,
    index: FxHashMap<FrameId, usize>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns the record back if its FrameId is already present.
    pub fn push(&mut self, record: FrameRecord) -> Result<usize, FrameRecord> {
        if self.index.contains_key(&record.id) {
            return Err(record);
        }
        let position = self.records.len();
        self.index.insert(record.id.clone(), position);
        self.records.push(record);
        Ok(position)
    }

    pub fn get(&self, id: &FrameId) -> Option<&FrameRecord> {
        self.index.get(id).map(|idx| &self.records[*idx])
    }

    pub fn position(&self, id: &FrameId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrameRecord> {
        self.records.iter()
    }

    /// FrameIds in arrival order
    pub fn frame_ids(&self) -> impl Iterator<Item = &FrameId> {
        self.records.iter().map(|r| &r.id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a FrameTable {
    type Item = &'a FrameRecord;
    type IntoIter = std::slice::Iter<'a, FrameRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// File-level quality information gathered while parsing one ASC log
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    pub avg_error: Option<f64>,
    pub max_error: Option<f64>,
    pub low_sample_rate: String,
    pub total_frame: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_round_trip() {
        let id = FrameId::new("RZ_2394668", 3);
        assert_eq!(id.to_string(), "RZ_2394668_3");
        let parsed: FrameId = match "RZ_2394668_3".parse() {
            Ok(id) => id,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_frame_id_errors() {
        assert!(matches!(
            "nounderscore".parse::<FrameId>(),
            Err(FrameIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            "_12".parse::<FrameId>(),
            Err(FrameIdError::EmptyTag(_))
        ));
        assert!(matches!(
            "tag_x".parse::<FrameId>(),
            Err(FrameIdError::BadSequence(_, _))
        ));
    }

    #[test]
    fn test_frame_id_orders_by_sequence() {
        let mut ids = vec![
            FrameId::new("b", 10),
            FrameId::new("a", 2),
            FrameId::new("c", 1),
        ];
        ids.sort();
        let sequences: Vec<u64> = ids.iter().map(|id| id.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 10]);
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let mut table = FrameTable::new();
        assert_eq!(table.push(FrameRecord::new(FrameId::new("t", 1))), Ok(0));
        assert_eq!(table.push(FrameRecord::new(FrameId::new("t", 2))), Ok(1));
        assert!(table.push(FrameRecord::new(FrameId::new("t", 1))).is_err());
        assert_eq!(table.len(), 2);
        assert_eq!(table.position(&FrameId::new("t", 2)), Some(1));
    }
}
