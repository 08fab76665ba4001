//! # gaze_cleaner
//!
//! gaze_cleaner is the data cleaning and statistics pipeline for the Atari gaze dataset,
//! written in Rust. It takes the ASC logs exported from the eye tracker, one per trial,
//! and turns each of them into a per-frame table: the gaze positions recorded while the
//! frame was on screen, the action taken, how long the frame was shown, the unclipped
//! reward, the episode and the score. The tables can then be summarized per episode and
//! per trial.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./gaze_cleaner_cli` from the
//! top level repository. The library is `libgaze_cleaner`; the CLI source shows how to
//! drive it.
//!
//! ## Configuration
//!
//! A configuration file is YAML:
//!
//! ```yml
//! asc_path: None
//! table_path: None
//! table_format:
//!   separator: ','
//!   position_separator: ' '
//!   include_header: false
//!   precision: null
//! plain_text: true
//! file_pattern: null
//! min_trial_id: null
//! ignore_incomplete: false
//! per_trial: false
//! ```
//!
//! - `asc_path`: directory containing the `.asc` logs
//! - `table_path`: directory the tables (and metadata) are written to. Created if needed.
//! - `table_format`: field separator, gaze position separator, whether to write a header
//! line, and optionally the number of decimals gaze positions are rounded to
//! - `plain_text`: write tables as `.txt` instead of `.csv`
//! - `file_pattern`: a regex that table file names must match (from the start) to be
//! included in the statistics
//! - `min_trial_id`: only trials with an id greater than this are included in the statistics
//! - `ignore_incomplete`: stop reading a table at the first frame missing its duration,
//! reward, episode or score
//! - `per_trial`: report statistics for each trial instead of one total
//!
//! ## ASC messages
//!
//! Lines are matched in this order, first match wins; everything else is ignored:
//!
//! ```text
//! <timestamp> <x> <y> ...                                  gaze sample
//! MSG <timestamp> SCR_RECORDER FRAMEID <n> UTID <tag>      frame boundary
//! MSG <timestamp> key_pressed atari_action <n>             action
//! MSG <timestamp> reward <n>                               unclipped reward
//! MSG <timestamp> episode <n>                              episode id
//! MSG <timestamp> score <n>                                score
//! MSG <timestamp> !CAL VALIDATION ... ERROR <avg> avg. <max> max OFFSET ...
//! ```
//!
//! A second episode or score message for the same frame is a fatal error for that file.
//! A second action or reward is only a warning; the first value is kept.
//!
//! ## Output
//!
//! One table per log, named after the log, with one line per frame in arrival order:
//!
//! ```text
//! frame_id,episode_id,score,duration_ms,unclipped_reward,action,gaze_positions
//! RZ_2394668_1,1,0,50,0,3,512.26 384.0 511.9 383.2
//! ```
//!
//! Missing values (and empty gaze lists) are written as `null`. Each batch also writes
//! `<unix millis>_meta.yml` and `<unix millis>_meta.csv` with the calibration error,
//! low sample rate and frame count of every log.
pub mod asc_reader;
pub mod batch_status;
pub mod config;
pub mod error;
pub mod file_filter;
pub mod frame;
pub mod meta_writer;
pub mod process;
pub mod replay;
pub mod stats;
pub mod table;
