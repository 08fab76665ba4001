use serde::{Deserialize, Serialize};

use super::frame::FrameRecord;

/// How an episode's score and cumulative reward are reported.
///
/// `Total` keeps the last assigned score and the final reward sum; `PerTrial` keeps
/// the running maximum of each over the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregateMode {
    #[default]
    Total,
    PerTrial,
}

/// Running totals for the episode currently being read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeAccumulator {
    pub episode_id: Option<i64>,
    pub elapsed_ms: i64,
    pub frame_count: u64,
    pub score: i64,
    pub max_score: i64,
    pub cumulative_reward: i64,
    pub max_cumulative_reward: i64,
}

impl EpisodeAccumulator {
    /// Open an episode seeded with its first frame. Missing values seed as zero.
    pub fn start(frame: &FrameRecord) -> Self {
        let score = frame.score.unwrap_or(0);
        let reward = frame.reward.unwrap_or(0);
        Self {
            episode_id: frame.episode_id,
            elapsed_ms: frame.duration_ms.unwrap_or(0),
            frame_count: 1,
            score,
            max_score: score,
            cumulative_reward: reward,
            max_cumulative_reward: reward,
        }
    }

    /// Fold a frame of the same episode. Missing values leave the totals unchanged.
    pub fn absorb(&mut self, frame: &FrameRecord) {
        self.frame_count += 1;
        if let Some(duration) = frame.duration_ms {
            self.elapsed_ms += duration;
        }
        if let Some(reward) = frame.reward {
            self.cumulative_reward += reward;
            self.max_cumulative_reward = self.max_cumulative_reward.max(self.cumulative_reward);
        }
        if let Some(score) = frame.score {
            self.score = score;
            self.max_score = self.max_score.max(score);
        }
    }

    pub fn reported_score(&self, mode: AggregateMode) -> i64 {
        match mode {
            AggregateMode::Total => self.score,
            AggregateMode::PerTrial => self.max_score,
        }
    }

    pub fn reported_reward(&self, mode: AggregateMode) -> i64 {
        match mode {
            AggregateMode::Total => self.cumulative_reward,
            AggregateMode::PerTrial => self.max_cumulative_reward,
        }
    }
}

/// Statistics over the episodes of one trial, or of many trials merged together
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrialSummary {
    pub lowest_score: Option<i64>,
    pub highest_score: Option<i64>,
    pub lowest_cumulative_reward: Option<i64>,
    pub highest_cumulative_reward: Option<i64>,
    pub total_episode: u64,
    pub total_frame: u64,
    pub total_time_ms: i64,
}

fn fold_min(current: Option<i64>, value: i64) -> Option<i64> {
    Some(current.map_or(value, |c| c.min(value)))
}

fn fold_max(current: Option<i64>, value: i64) -> Option<i64> {
    Some(current.map_or(value, |c| c.max(value)))
}

fn merge_with(a: Option<i64>, b: Option<i64>, f: fn(i64, i64) -> i64) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

impl TrialSummary {
    /// Close out a finished episode
    pub fn record_episode(&mut self, episode: &EpisodeAccumulator, mode: AggregateMode) {
        let score = episode.reported_score(mode);
        let reward = episode.reported_reward(mode);
        self.lowest_score = fold_min(self.lowest_score, score);
        self.highest_score = fold_max(self.highest_score, score);
        self.lowest_cumulative_reward = fold_min(self.lowest_cumulative_reward, reward);
        self.highest_cumulative_reward = fold_max(self.highest_cumulative_reward, reward);
        self.total_episode += 1;
        self.total_frame += episode.frame_count;
        self.total_time_ms += episode.elapsed_ms;
    }

    /// Merge another summary (typically another file) into this one
    pub fn merge(&mut self, other: &TrialSummary) {
        self.lowest_score = merge_with(self.lowest_score, other.lowest_score, i64::min);
        self.highest_score = merge_with(self.highest_score, other.highest_score, i64::max);
        self.lowest_cumulative_reward = merge_with(
            self.lowest_cumulative_reward,
            other.lowest_cumulative_reward,
            i64::min,
        );
        self.highest_cumulative_reward = merge_with(
            self.highest_cumulative_reward,
            other.highest_cumulative_reward,
            i64::max,
        );
        self.total_episode += other.total_episode;
        self.total_frame += other.total_frame;
        self.total_time_ms += other.total_time_ms;
    }
}

/// Aggregator folds the frames of one file, in arrival order, into a TrialSummary.
///
/// An episode ends when a frame carries a different episode id; the episode still
/// open when the frames run out has to be closed with `finish`.
#[derive(Debug, Clone)]
pub struct Aggregator {
    mode: AggregateMode,
    ignore_incomplete: bool,
    current: Option<EpisodeAccumulator>,
    summary: TrialSummary,
    stopped: bool,
}

impl Aggregator {
    pub fn new(mode: AggregateMode, ignore_incomplete: bool) -> Self {
        Self {
            mode,
            ignore_incomplete,
            current: None,
            summary: TrialSummary::default(),
            stopped: false,
        }
    }

    /// Feed the next frame. Returns false once the aggregator has stopped accepting
    /// frames (the first incomplete frame when ignoring incomplete frames).
    pub fn push(&mut self, frame: &FrameRecord) -> bool {
        if self.stopped {
            return false;
        }
        if self.ignore_incomplete && !frame.is_complete() {
            log::info!("Stopping at incomplete frame {}", frame.id);
            self.stopped = true;
            return false;
        }

        match (self.current.as_mut(), frame.episode_id) {
            (Some(episode), Some(id)) if episode.episode_id != Some(id) => {
                self.summary.record_episode(episode, self.mode);
                self.current = Some(EpisodeAccumulator::start(frame));
            }
            (Some(episode), _) => episode.absorb(frame),
            (None, _) => self.current = Some(EpisodeAccumulator::start(frame)),
        }
        true
    }

    /// Close the last open episode and return the summary
    pub fn finish(mut self) -> TrialSummary {
        if let Some(episode) = self.current.take() {
            self.summary.record_episode(&episode, self.mode);
        }
        self.summary
    }
}

/// Summarize the frames of one file
pub fn aggregate<'a, I>(frames: I, mode: AggregateMode, ignore_incomplete: bool) -> TrialSummary
where
    I: IntoIterator<Item = &'a FrameRecord>,
{
    let mut aggregator = Aggregator::new(mode, ignore_incomplete);
    for frame in frames {
        if !aggregator.push(frame) {
            break;
        }
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameId;

    fn frame(
        seq: u64,
        episode: Option<i64>,
        score: Option<i64>,
        reward: Option<i64>,
        duration: Option<i64>,
    ) -> FrameRecord {
        let mut record = FrameRecord::new(FrameId::new("t", seq));
        record.episode_id = episode;
        record.score = score;
        record.reward = reward;
        record.duration_ms = duration;
        record
    }

    /// Three episodes: scores 10->50, 0->30 and 20->20 with reward sums 5, -2 and 10
    fn three_episodes() -> Vec<FrameRecord> {
        let rows = [
            (1, 10, 2, 16),
            (1, 30, 0, 17),
            (1, 50, 3, 16),
            (2, 0, -2, 16),
            (2, 15, 0, 17),
            (2, 30, 0, 16),
            (3, 20, 4, 17),
            (3, 20, 6, 16),
        ];
        rows.iter()
            .enumerate()
            .map(|(i, (e, s, r, d))| frame(i as u64 + 1, Some(*e), Some(*s), Some(*r), Some(*d)))
            .collect()
    }

    #[test]
    fn test_three_episode_trial() {
        let frames = three_episodes();
        for mode in [AggregateMode::Total, AggregateMode::PerTrial] {
            let summary = aggregate(&frames, mode, false);
            assert_eq!(summary.total_episode, 3);
            assert_eq!(summary.total_frame, 8);
            assert_eq!(summary.total_time_ms, 131);
            // episode 2 ends (and peaks) at 30, so episode 3's 20 is the lowest
            assert_eq!(summary.lowest_score, Some(20));
            assert_eq!(summary.highest_score, Some(50));
            assert_eq!(summary.lowest_cumulative_reward, Some(-2));
            assert_eq!(summary.highest_cumulative_reward, Some(10));
        }
    }

    #[test]
    fn test_modes_differ_on_falling_values() {
        let frames = vec![
            frame(1, Some(1), Some(40), Some(5), Some(10)),
            frame(2, Some(1), Some(10), Some(-4), Some(10)),
        ];
        let total = aggregate(&frames, AggregateMode::Total, false);
        assert_eq!(total.highest_score, Some(10));
        assert_eq!(total.highest_cumulative_reward, Some(1));
        let per_trial = aggregate(&frames, AggregateMode::PerTrial, false);
        assert_eq!(per_trial.highest_score, Some(40));
        assert_eq!(per_trial.highest_cumulative_reward, Some(5));
    }

    #[test]
    fn test_missing_values_leave_totals() {
        let frames = vec![
            frame(1, Some(4), Some(7), None, Some(20)),
            frame(2, None, None, Some(3), None),
            frame(3, Some(4), None, Some(1), Some(5)),
        ];
        let summary = aggregate(&frames, AggregateMode::Total, false);
        assert_eq!(summary.total_episode, 1);
        assert_eq!(summary.total_frame, 3);
        assert_eq!(summary.total_time_ms, 25);
        assert_eq!(summary.lowest_score, Some(7));
        assert_eq!(summary.highest_cumulative_reward, Some(4));
    }

    #[test]
    fn test_ignore_incomplete_truncates() {
        let mut frames: Vec<FrameRecord> = (1..=10)
            .map(|i| frame(i, Some(1), Some(i as i64), Some(1), Some(10)))
            .collect();
        frames[4].score = None;

        let truncated = aggregate(&frames, AggregateMode::Total, true);
        assert_eq!(truncated.total_frame, 4);
        assert_eq!(truncated.total_time_ms, 40);
        assert_eq!(truncated.highest_score, Some(4));
        assert_eq!(truncated.highest_cumulative_reward, Some(4));

        let full = aggregate(&frames, AggregateMode::Total, false);
        assert_eq!(full.total_frame, 10);
        assert_eq!(full.highest_score, Some(10));
    }

    #[test]
    fn test_no_frames() {
        let frames: Vec<FrameRecord> = Vec::new();
        let summary = aggregate(&frames, AggregateMode::Total, false);
        assert_eq!(summary, TrialSummary::default());
    }

    #[test]
    fn test_merge() {
        let frames = three_episodes();
        let mut merged = aggregate(&frames[..3], AggregateMode::Total, false);
        merged.merge(&aggregate(&frames[3..], AggregateMode::Total, false));
        assert_eq!(merged, aggregate(&frames, AggregateMode::Total, false));
        merged.merge(&TrialSummary::default());
        assert_eq!(merged.total_episode, 3);
    }
}
