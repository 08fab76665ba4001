/// Which part of a batch produced a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStage {
    #[default]
    Cleaning,
    Statistics,
}

/// Progress of a directory batch, reported after every file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchStatus {
    pub progress: f32,
    pub file_name: String,
    pub stage: BatchStage,
}

impl BatchStatus {
    pub fn new(progress: f32, file_name: &str, stage: BatchStage) -> Self {
        Self {
            progress,
            file_name: file_name.to_string(),
            stage,
        }
    }

    /// Status after `done` of `total` files
    pub fn after_file(done: usize, total: usize, file_name: &str, stage: BatchStage) -> Self {
        let progress = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        Self::new(progress, file_name, stage)
    }
}
