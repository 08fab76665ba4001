use fxhash::FxHashMap;
use regex::{Captures, Regex};
use std::fmt::Display;
use std::str::FromStr;

use super::error::AscParseError;
use super::frame::{FileMetadata, FrameId, FrameRecord, FrameTable, GazePosition};

/// Frames with fewer gaze samples than this count towards the low sample rate
pub const LOW_SAMPLE_THRESHOLD: usize = 10;
/// Logs with fewer frames than this were probably not a full session
pub const MIN_EXPECTED_FRAMES: usize = 1000;
/// Label used for messages that arrive before the first frame boundary
pub const BEFORE_FIRST_FRAME: &str = "BEFORE-FIRST-FRAME";

const FLOAT_PATTERN: &str = r"[-+]?[0-9]*\.?[0-9]+";

/// A non-fatal data-quality problem found while parsing an ASC log
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    DuplicateAction {
        frame: String,
        kept: i64,
        discarded: i64,
    },
    DuplicateReward {
        frame: String,
        discarded: i64,
    },
    RepeatedFrameBoundary(FrameId),
    MalformedLine {
        line_number: usize,
        reason: String,
    },
    FewFrames(usize),
    LowSampleRate {
        low_frames: usize,
        rate: String,
        total_frame: usize,
    },
}

impl Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateAction {
                frame,
                kept,
                discarded,
            } => write!(
                f,
                "there is more than 1 action for frame id {frame} (kept {kept}, discarded {discarded}). Not supposed to happen."
            ),
            Self::DuplicateReward { frame, discarded } => write!(
                f,
                "there is more than 1 reward for frame id {frame} (discarded {discarded}). Not supposed to happen."
            ),
            Self::RepeatedFrameBoundary(id) => {
                write!(f, "frame id {id} was announced more than once")
            }
            Self::MalformedLine {
                line_number,
                reason,
            } => write!(f, "line {line_number} was ignored: {reason}"),
            Self::FewFrames(n) => write!(
                f,
                "did you provide the correct ASC file? Because the data for only {n} frames is detected"
            ),
            Self::LowSampleRate {
                low_frames,
                rate,
                total_frame,
            } => write!(
                f,
                "{low_frames} frames have less than {LOW_SAMPLE_THRESHOLD} gaze samples. ({rate}, total frame: {total_frame})"
            ),
        }
    }
}

/// One classified line of an ASC log
#[derive(Debug, Clone, PartialEq)]
pub enum AscLine {
    Gaze(GazePosition),
    FrameBoundary {
        timestamp: i64,
        sequence: u64,
        session_tag: String,
    },
    Action(i64),
    Reward(i64),
    Episode(i64),
    Score(i64),
    Validation {
        avg_error: f64,
        max_error: f64,
    },
    /// Matched a message pattern but a value could not be read
    Malformed {
        line_number: usize,
        reason: String,
    },
    Other,
}

/// The result of parsing one ASC log
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub table: FrameTable,
    pub metadata: FileMetadata,
    pub warnings: Vec<ParseWarning>,
}

/// Whether a field has been written for a frame. A filled slot may still hold no value,
/// which is how the before-first-frame entry starts out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot<T> {
    Vacant,
    Filled(Option<T>),
}

impl<T: Copy> Slot<T> {
    fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }

    fn value(&self) -> Option<T> {
        match self {
            Self::Vacant => None,
            Self::Filled(v) => *v,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingFrame {
    id: Option<FrameId>,
    gaze_samples: Vec<GazePosition>,
    action: Option<i64>,
    duration_ms: Slot<i64>,
    reward: Slot<i64>,
    episode_id: Slot<i64>,
    score: Slot<i64>,
}

impl PendingFrame {
    fn before_first_frame() -> Self {
        Self {
            id: None,
            gaze_samples: Vec::new(),
            action: None,
            duration_ms: Slot::Filled(None),
            reward: Slot::Filled(None),
            episode_id: Slot::Filled(None),
            score: Slot::Filled(None),
        }
    }

    fn new(id: FrameId) -> Self {
        Self {
            id: Some(id),
            gaze_samples: Vec::new(),
            action: None,
            duration_ms: Slot::Vacant,
            reward: Slot::Vacant,
            episode_id: Slot::Vacant,
            score: Slot::Vacant,
        }
    }

    fn label(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => String::from(BEFORE_FIRST_FRAME),
        }
    }
}

/// Running state of one parse. Created per log and consumed by `finish`.
#[derive(Debug)]
struct ParseState {
    // Index 0 is the before-first-frame entry
    frames: Vec<PendingFrame>,
    index: FxHashMap<FrameId, usize>,
    current: usize,
    boundary_timestamp: i64,
    avg_error: Option<f64>,
    max_error: Option<f64>,
    warnings: Vec<ParseWarning>,
}

impl ParseState {
    fn new() -> Self {
        Self {
            frames: vec![PendingFrame::before_first_frame()],
            index: FxHashMap::default(),
            current: 0,
            boundary_timestamp: 0,
            avg_error: None,
            max_error: None,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: ParseWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    fn apply(&mut self, line: AscLine) -> Result<(), AscParseError> {
        match line {
            AscLine::Gaze(position) => self.frames[self.current].gaze_samples.push(position),
            AscLine::FrameBoundary {
                timestamp,
                sequence,
                session_tag,
            } => self.open_frame(timestamp, FrameId::new(&session_tag, sequence)),
            AscLine::Action(action) => {
                let frame = &mut self.frames[self.current];
                if let Some(kept) = frame.action {
                    let warning = ParseWarning::DuplicateAction {
                        frame: frame.label(),
                        kept,
                        discarded: action,
                    };
                    self.warn(warning);
                } else {
                    frame.action = Some(action);
                }
            }
            AscLine::Reward(reward) => {
                let frame = &mut self.frames[self.current];
                if frame.reward.is_filled() {
                    let warning = ParseWarning::DuplicateReward {
                        frame: frame.label(),
                        discarded: reward,
                    };
                    self.warn(warning);
                } else {
                    frame.reward = Slot::Filled(Some(reward));
                }
            }
            AscLine::Episode(episode) => {
                let frame = &mut self.frames[self.current];
                if frame.episode_id.is_filled() {
                    return Err(AscParseError::DuplicateEpisode(frame.label()));
                }
                frame.episode_id = Slot::Filled(Some(episode));
            }
            AscLine::Score(score) => {
                let frame = &mut self.frames[self.current];
                if frame.score.is_filled() {
                    return Err(AscParseError::DuplicateScore(frame.label()));
                }
                frame.score = Slot::Filled(Some(score));
            }
            AscLine::Validation {
                avg_error,
                max_error,
            } => {
                // Only the validation after the last calibration matters
                self.avg_error = Some(avg_error);
                self.max_error = Some(max_error);
            }
            AscLine::Malformed {
                line_number,
                reason,
            } => self.warn(ParseWarning::MalformedLine {
                line_number,
                reason,
            }),
            AscLine::Other => (),
        }
        Ok(())
    }

    /// A frame boundary closes the duration of the frame before it
    fn open_frame(&mut self, timestamp: i64, id: FrameId) {
        self.frames[self.current].duration_ms =
            Slot::Filled(Some(timestamp - self.boundary_timestamp));
        self.boundary_timestamp = timestamp;

        if let Some(&position) = self.index.get(&id) {
            let frame = &mut self.frames[position];
            frame.gaze_samples.clear();
            frame.action = None;
            self.current = position;
            self.warn(ParseWarning::RepeatedFrameBoundary(id));
        } else {
            self.current = self.frames.len();
            self.index.insert(id.clone(), self.current);
            self.frames.push(PendingFrame::new(id));
        }
    }

    fn finish(mut self) -> ParsedLog {
        // The tracker keeps sampling after the game ends
        self.frames[self.current].gaze_samples.clear();

        let n_seen = self.frames.len();
        if n_seen < MIN_EXPECTED_FRAMES {
            self.warn(ParseWarning::FewFrames(n_seen));
        }

        let total_frame = n_seen - 1;
        let low_frames = self
            .frames
            .iter()
            .filter(|f| f.gaze_samples.len() < LOW_SAMPLE_THRESHOLD)
            .count();
        let rate = if total_frame == 0 {
            0.0
        } else {
            100.0 * low_frames as f64 / total_frame as f64
        };
        let low_sample_rate = format!("{rate:.1}%");
        self.warn(ParseWarning::LowSampleRate {
            low_frames,
            rate: low_sample_rate.clone(),
            total_frame,
        });

        let mut table = FrameTable::new();
        for frame in self.frames.into_iter().skip(1) {
            let Some(id) = frame.id else { continue };
            // ids are unique by construction of the index
            let _ = table.push(FrameRecord {
                id,
                gaze_samples: frame.gaze_samples,
                action: frame.action,
                duration_ms: frame.duration_ms.value(),
                reward: frame.reward.value(),
                episode_id: frame.episode_id.value(),
                score: frame.score.value(),
            });
        }

        ParsedLog {
            table,
            metadata: FileMetadata {
                avg_error: self.avg_error,
                max_error: self.max_error,
                low_sample_rate,
                total_frame,
            },
            warnings: self.warnings,
        }
    }
}

/// AscParser holds the compiled message patterns for the eye-tracker log.
///
/// Patterns are tested in a fixed priority order: a gaze sample line and a message
/// line can both start with an integer, so the first matching pattern wins.
#[derive(Debug, Clone)]
pub struct AscParser {
    gaze: Regex,
    frame_boundary: Regex,
    action: Regex,
    reward: Regex,
    episode: Regex,
    score: Regex,
    validation: Regex,
}

impl AscParser {
    pub fn new() -> Result<Self, AscParseError> {
        Ok(Self {
            gaze: Regex::new(&format!(r"^(\d+)\s+({FLOAT_PATTERN})\s+({FLOAT_PATTERN})"))?,
            frame_boundary: Regex::new(r"^MSG\s+(\d+)\s+SCR_RECORDER FRAMEID (\d+) UTID (\w+)")?,
            action: Regex::new(r"^MSG\s+(\d+)\s+key_pressed atari_action (\d+)")?,
            reward: Regex::new(r"^MSG\s+(\d+)\s+reward (\d+)")?,
            episode: Regex::new(r"^MSG\s+(\d+)\s+episode (\d+)")?,
            score: Regex::new(r"^MSG\s+(\d+)\s+score (\d+)")?,
            validation: Regex::new(&format!(
                r"^MSG\s+(\d+)\s+!CAL\sVALIDATION.+ERROR\s+({FLOAT_PATTERN})\s+avg\.\s+({FLOAT_PATTERN})\s+max\s+OFFSET.+"
            ))?,
        })
    }

    /// Classify a single line. A line whose values do not fit their types is reported
    /// as `Malformed` rather than failing the log.
    pub fn classify(&self, line_number: usize, line: &str) -> AscLine {
        match self.match_line(line) {
            Ok(classified) => classified,
            Err(reason) => AscLine::Malformed {
                line_number,
                reason,
            },
        }
    }

    fn match_line(&self, line: &str) -> Result<AscLine, String> {
        if let Some(caps) = self.gaze.captures(line) {
            return Ok(AscLine::Gaze(GazePosition::new(
                float_group(&caps, 2)?,
                float_group(&caps, 3)?,
            )));
        }
        if let Some(caps) = self.frame_boundary.captures(line) {
            return Ok(AscLine::FrameBoundary {
                timestamp: int_group(&caps, 1)?,
                sequence: int_group(&caps, 2)?,
                session_tag: caps[3].to_string(),
            });
        }
        if let Some(caps) = self.action.captures(line) {
            return Ok(AscLine::Action(int_group(&caps, 2)?));
        }
        if let Some(caps) = self.reward.captures(line) {
            return Ok(AscLine::Reward(int_group(&caps, 2)?));
        }
        if let Some(caps) = self.episode.captures(line) {
            return Ok(AscLine::Episode(int_group(&caps, 2)?));
        }
        if let Some(caps) = self.score.captures(line) {
            return Ok(AscLine::Score(int_group(&caps, 2)?));
        }
        if let Some(caps) = self.validation.captures(line) {
            return Ok(AscLine::Validation {
                avg_error: float_group(&caps, 2)?,
                max_error: float_group(&caps, 3)?,
            });
        }
        Ok(AscLine::Other)
    }

    /// Parse the lines of one recording session into per-frame records.
    ///
    /// Returns an error (and no table) if a frame is assigned a second episode id or
    /// score. Every other anomaly is reported in `ParsedLog::warnings`.
    pub fn parse_log<I, S>(&self, lines: I) -> Result<ParsedLog, AscParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = ParseState::new();
        for (line_number, line) in lines.into_iter().enumerate() {
            let classified = self.classify(line_number + 1, line.as_ref());
            state.apply(classified)?;
        }
        Ok(state.finish())
    }
}

/// Parse a whole ASC log with a freshly built parser
pub fn parse_log<I, S>(lines: I) -> Result<ParsedLog, AscParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    AscParser::new()?.parse_log(lines)
}

fn int_group<T>(caps: &Captures, group: usize) -> Result<T, String>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    caps[group]
        .parse::<T>()
        .map_err(|e| format!("bad integer {}: {e}", &caps[group]))
}

fn float_group(caps: &Captures, group: usize) -> Result<f64, String> {
    caps[group]
        .parse::<f64>()
        .map_err(|e| format!("bad float {}: {e}", &caps[group]))
}
