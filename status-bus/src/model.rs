//! Task status records and the stage model.
//!
//! Serialized forms are part of the persisted state and the subscribe
//! channel; keep them stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion stages in execution order, plus terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Cloning,
    Analyzing,
    Parsing,
    Embedding,
    Storing,
    Validating,
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl Stage {
    /// Position in the forward-only ordering.
    pub fn order(self) -> u8 {
        use Stage::*;
        match self {
            Queued => 0,
            Cloning => 1,
            Analyzing => 2,
            Parsing => 3,
            Embedding => 4,
            Storing => 5,
            Validating => 6,
            Completed | CompletedWithWarnings | Failed => 7,
        }
    }

    /// Overall-progress percent range this stage spans.
    pub fn progress_range(self) -> (u8, u8) {
        use Stage::*;
        match self {
            Queued => (0, 0),
            Cloning => (0, 20),
            Analyzing => (20, 40),
            Parsing => (40, 80),
            Embedding => (80, 85),
            Storing => (85, 95),
            Validating => (95, 100),
            Completed | CompletedWithWarnings => (100, 100),
            Failed => (0, 100),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::CompletedWithWarnings | Stage::Failed)
    }
}

/// One entry of the stage history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Counters for the stage currently running.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageProgress {
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub processed_items: Option<u64>,
    #[serde(default)]
    pub rate_per_sec: Option<f64>,
    #[serde(default)]
    pub current_item: Option<String>,
}

/// One recorded error, recoverable or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub stage: Stage,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub file_path: Option<String>,
    pub recoverable: bool,
}

/// The per-task record: every published update is this, self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub repository_name: String,
    /// Mirrors `current_stage`; terminal states land here too.
    pub status: Stage,
    pub current_stage: Stage,
    pub overall_progress: u8,
    pub stage_history: Vec<StageEvent>,
    pub current_stage_progress: StageProgress,
    pub errors: Vec<TaskError>,
    pub warnings: Vec<String>,
    /// Cause string for `failed` (e.g. "cancelled", "source_unavailable").
    #[serde(default)]
    pub failure_cause: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskStatus {
    pub fn new(task_id: String, repository_name: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            repository_name,
            status: Stage::Queued,
            current_stage: Stage::Queued,
            overall_progress: 0,
            stage_history: vec![StageEvent {
                stage: Stage::Queued,
                started_at: now,
                completed_at: None,
            }],
            current_stage_progress: StageProgress::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            failure_cause: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_strictly_forward() {
        let stages = [
            Stage::Queued,
            Stage::Cloning,
            Stage::Analyzing,
            Stage::Parsing,
            Stage::Embedding,
            Stage::Storing,
            Stage::Validating,
            Stage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].order() < pair[1].order() || pair[1].order() == 7);
        }
    }

    #[test]
    fn progress_ranges_tile_zero_to_hundred() {
        let sequence = [
            Stage::Cloning,
            Stage::Analyzing,
            Stage::Parsing,
            Stage::Embedding,
            Stage::Storing,
            Stage::Validating,
        ];
        let mut last_hi = 0;
        for s in sequence {
            let (lo, hi) = s.progress_range();
            assert_eq!(lo, last_hi);
            assert!(hi > lo);
            last_hi = hi;
        }
        assert_eq!(last_hi, 100);
    }

    #[test]
    fn record_round_trips_through_json() {
        let status = TaskStatus::new(String::from("t-1"), String::from("shop"));
        let json = serde_json::to_string(&status).unwrap();
        let back: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id, "t-1");
        assert_eq!(back.status, Stage::Queued);
        assert_eq!(back.stage_history.len(), 1);
    }
}
