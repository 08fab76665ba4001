use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::error::TableError;
use super::frame::{FrameId, FrameRecord, FrameTable, GazePosition};

/// Number of fields on every table line
pub const FIELDS_PER_LINE: usize = 7;
/// Token written for any absent value, including an empty gaze list
pub const NULL_TOKEN: &str = "null";

const HEADER_FIELDS: [&str; FIELDS_PER_LINE] = [
    "frame_id",
    "episode_id",
    "score",
    "duration_ms",
    "unclipped_reward",
    "action",
    "gaze_positions",
];

/// How a FrameTable is laid out on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFormat {
    pub separator: String,
    pub position_separator: String,
    pub include_header: bool,
    /// Round gaze positions to this many decimals when writing
    pub precision: Option<usize>,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            separator: String::from(","),
            position_separator: String::from(" "),
            include_header: false,
            precision: None,
        }
    }
}

impl TableFormat {
    pub fn header(&self) -> String {
        HEADER_FIELDS.join(&self.separator)
    }

    fn format_position(&self, value: f64) -> String {
        match self.precision {
            Some(p) => format!("{value:.p$}"),
            // Debug keeps the trailing ".0" on whole numbers
            None => format!("{value:?}"),
        }
    }

    /// Render one record as a table line (without the line ending)
    pub fn render_line(&self, record: &FrameRecord) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(FIELDS_PER_LINE);
        fields.push(record.id.to_string());
        for value in [
            record.episode_id,
            record.score,
            record.duration_ms,
            record.reward,
            record.action,
        ] {
            fields.push(value.map_or_else(|| String::from(NULL_TOKEN), |v| v.to_string()));
        }
        if record.gaze_samples.is_empty() {
            fields.push(String::from(NULL_TOKEN));
        } else {
            let positions: Vec<String> = record
                .gaze_samples
                .iter()
                .flat_map(|p| [self.format_position(p.x), self.format_position(p.y)])
                .collect();
            fields.push(positions.join(&self.position_separator));
        }
        fields.join(&self.separator)
    }
}

/// Write a table, in arrival order, to any writer
pub fn write_table<W: Write>(
    table: &FrameTable,
    format: &TableFormat,
    writer: &mut W,
) -> Result<(), TableError> {
    if format.include_header {
        writeln!(writer, "{}", format.header())?;
    }
    for record in table {
        writeln!(writer, "{}", format.render_line(record))?;
    }
    Ok(())
}

/// Write a table to a file, replacing whatever was there
pub fn write_table_file(
    table: &FrameTable,
    format: &TableFormat,
    path: &Path,
) -> Result<(), TableError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_table(table, format, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn parse_optional(field: &str, line_number: usize) -> Result<Option<i64>, TableError> {
    let field = field.trim();
    if field == NULL_TOKEN {
        return Ok(None);
    }
    field
        .parse::<i64>()
        .map(Some)
        .map_err(|e| TableError::BadInteger(line_number, e))
}

fn parse_positions(
    field: &str,
    position_separator: &str,
    line_number: usize,
) -> Result<Vec<GazePosition>, TableError> {
    let field = field.trim();
    // Written for both an empty and a missing gaze list
    if field == NULL_TOKEN || field.is_empty() {
        return Ok(Vec::new());
    }
    let values = field
        .split(position_separator)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| TableError::BadFloat(line_number, e))?;
    if values.len() % 2 != 0 {
        log::warn!(
            "Table line {line_number} has an unpaired gaze coordinate; dropping the last value"
        );
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| GazePosition::new(pair[0], pair[1]))
        .collect())
}

/// Rebuild a FrameTable from the lines of a previously written table.
///
/// The first line is treated as a header if it names the frame id column.
pub fn parse_table<I, S>(lines: I, format: &TableFormat) -> Result<FrameTable, TableError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut table = FrameTable::new();
    for (idx, line) in lines.into_iter().enumerate() {
        let line_number = idx + 1;
        let line = line.as_ref().trim_end_matches(['\r', '\n']);
        if idx == 0 && (line.contains("frame_id") || line.contains("frameid")) {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(format.separator.as_str()).collect();
        if fields.len() != FIELDS_PER_LINE {
            return Err(TableError::BadFileFormat(line_number, fields.len()));
        }

        let id = fields[0]
            .trim()
            .parse::<FrameId>()
            .map_err(|e| TableError::BadFrameId(line_number, e))?;
        let record = FrameRecord {
            id,
            episode_id: parse_optional(fields[1], line_number)?,
            score: parse_optional(fields[2], line_number)?,
            duration_ms: parse_optional(fields[3], line_number)?,
            reward: parse_optional(fields[4], line_number)?,
            action: parse_optional(fields[5], line_number)?,
            gaze_samples: parse_positions(fields[6], &format.position_separator, line_number)?,
        };
        table
            .push(record)
            .map_err(|r| TableError::DuplicateFrame(line_number, r.id.to_string()))?;
    }
    Ok(table)
}

/// Read a table file back into memory
pub fn read_table_file(path: &Path, format: &TableFormat) -> Result<FrameTable, TableError> {
    let bytes = std::fs::read(path)?;
    parse_table(String::from_utf8_lossy(&bytes).lines(), format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> FrameTable {
        let mut table = FrameTable::new();
        let mut first = FrameRecord::new(FrameId::new("RZ_2394668", 1));
        first.gaze_samples = vec![GazePosition::new(512.26, 384.0), GazePosition::new(-3.5, 7.125)];
        first.action = Some(3);
        first.duration_ms = Some(50);
        first.reward = Some(0);
        first.episode_id = Some(1);
        first.score = Some(0);
        let mut second = FrameRecord::new(FrameId::new("RZ_2394668", 2));
        second.reward = Some(-2);
        second.episode_id = Some(1);
        let _ = table.push(first);
        let _ = table.push(second);
        table
    }

    #[test]
    fn test_render_line() {
        let table = sample_table();
        let format = TableFormat::default();
        assert_eq!(
            format.render_line(&table.records()[0]),
            "RZ_2394668_1,1,0,50,0,3,512.26 384.0 -3.5 7.125"
        );
        assert_eq!(
            format.render_line(&table.records()[1]),
            "RZ_2394668_2,1,null,null,-2,null,null"
        );
    }

    #[test]
    fn test_write_then_read() {
        let table = sample_table();
        let format = TableFormat {
            include_header: true,
            ..Default::default()
        };
        let mut buffer: Vec<u8> = Vec::new();
        if let Err(e) = write_table(&table, &format, &mut buffer) {
            panic!("{e}");
        }
        let text = String::from_utf8_lossy(&buffer).to_string();
        assert!(text.starts_with("frame_id,episode_id,score,duration_ms,unclipped_reward,action,gaze_positions\n"));

        let read_back = match parse_table(text.lines(), &format) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(read_back.records(), table.records());
    }

    #[test]
    fn test_custom_separators_and_precision() {
        let table = sample_table();
        let format = TableFormat {
            separator: String::from("\t"),
            position_separator: String::from(";"),
            include_header: false,
            precision: Some(1),
        };
        let line = format.render_line(&table.records()[0]);
        assert_eq!(line, "RZ_2394668_1\t1\t0\t50\t0\t3\t512.3;384.0;-3.5;7.1");
        let read_back = match parse_table([line], &format) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(
            read_back.records()[0].gaze_samples,
            vec![GazePosition::new(512.3, 384.0), GazePosition::new(-3.5, 7.1)]
        );
    }

    #[test]
    fn test_empty_gaze_collapses_to_null() {
        let mut with_empty = FrameRecord::new(FrameId::new("t", 1));
        with_empty.gaze_samples = Vec::new();
        let untouched = FrameRecord::new(FrameId::new("t", 1));
        let format = TableFormat::default();
        assert_eq!(format.render_line(&with_empty), "t_1,null,null,null,null,null,null");
        assert_eq!(format.render_line(&with_empty), format.render_line(&untouched));

        let read_back = match parse_table(["t_1,null,null,null,null,null,null"], &format) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        };
        assert!(read_back.records()[0].gaze_samples.is_empty());
    }

    #[test]
    fn test_reads_legacy_header_and_windows_endings() {
        let lines = [
            "frameid,episode_id,score,duration,unclipped_reward,action,pos\r",
            "ab_7,2,10,16,1,0,1.5 2.5 3.5\r",
            "",
        ];
        let table = match parse_table(lines, &TableFormat::default()) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(table.len(), 1);
        let record = &table.records()[0];
        assert_eq!(record.id, FrameId::new("ab", 7));
        assert_eq!(record.score, Some(10));
        // the unpaired trailing value is dropped
        assert_eq!(record.gaze_samples, vec![GazePosition::new(1.5, 2.5)]);
    }

    #[test]
    fn test_read_file_with_latin1_header() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("{e}"),
        };
        let path = dir.path().join("12_AB.txt");
        let contents = b"frame_id,episode_id,score,duration_ms,r\xe9compense,action,gaze_positions\nAB_1,1,0,16,0,1,1.0 2.0\n";
        if let Err(e) = std::fs::write(&path, contents) {
            panic!("{e}");
        }
        let table = match read_table_file(&path, &TableFormat::default()) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].gaze_samples, vec![GazePosition::new(1.0, 2.0)]);
    }

    #[test]
    fn test_bad_lines() {
        let format = TableFormat::default();
        assert!(matches!(
            parse_table(["a_1,1,2"], &format),
            Err(TableError::BadFileFormat(1, 3))
        ));
        assert!(matches!(
            parse_table(["a_1,x,null,null,null,null,null"], &format),
            Err(TableError::BadInteger(1, _))
        ));
        assert!(matches!(
            parse_table(["a1,1,null,null,null,null,null"], &format),
            Err(TableError::BadFrameId(1, _))
        ));
        assert!(matches!(
            parse_table(
                [
                    "a_1,1,null,null,null,null,null",
                    "a_1,1,null,null,null,null,null"
                ],
                &format
            ),
            Err(TableError::DuplicateFrame(2, _))
        ));
    }
}
