//! Durable per-task progress state with poll and subscribe access.
//!
//! Single point of truth for ingestion progress. Writers go through the bus
//! (one serialized writer per `task_id` via the registry lock); readers
//! either poll [`StatusBus::get`] or subscribe to the broadcast channel.
//! Every published update is the complete record, so missed intermediate
//! updates cost nothing.
//!
//! Updates are monotonic: stage transitions only move forward and
//! `overall_progress` never decreases. Records are snapshotted to disk after
//! every publish and reloaded on startup, so state survives a process
//! restart at "last known" (in-flight work is not replayed).

mod model;

pub use model::{Stage, StageEvent, StageProgress, TaskError, TaskStatus};

use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub struct StatusBus {
    inner: Mutex<HashMap<String, TaskStatus>>,
    tx: broadcast::Sender<TaskStatus>,
    state_dir: Option<PathBuf>,
}

impl StatusBus {
    /// In-memory bus with optional snapshot directory.
    pub fn new(state_dir: Option<PathBuf>) -> Self {
        let mut map = HashMap::new();
        if let Some(dir) = &state_dir {
            map = load_snapshots(dir);
        }
        let (tx, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(map),
            tx,
            state_dir,
        }
    }

    /// Register a new task in `queued`.
    pub fn create_task(&self, task_id: &str, repository_name: &str) -> TaskStatus {
        let status = TaskStatus::new(task_id.to_string(), repository_name.to_string());
        self.publish(status.clone());
        status
    }

    /// Move a task to `stage`. Backward transitions are ignored (monotonic).
    pub fn transition(&self, task_id: &str, stage: Stage) {
        self.mutate(task_id, |s| {
            if stage.order() <= s.current_stage.order() && !stage.is_terminal() {
                debug!(
                    "status: ignoring backward transition {:?} -> {:?} for {}",
                    s.current_stage, stage, task_id
                );
                return false;
            }
            if s.is_terminal() {
                return false;
            }
            let now = Utc::now();
            if let Some(open) = s.stage_history.last_mut() {
                if open.completed_at.is_none() {
                    open.completed_at = Some(now);
                }
            }
            s.stage_history.push(StageEvent {
                stage,
                started_at: now,
                completed_at: None,
            });
            s.current_stage = stage;
            s.status = stage;
            s.current_stage_progress = StageProgress::default();
            let (lo, _) = stage.progress_range();
            s.overall_progress = s.overall_progress.max(lo);
            true
        });
    }

    /// Report within-stage progress as a fraction in `[0, 1]` plus counters.
    pub fn update_progress(&self, task_id: &str, fraction: f32, progress: StageProgress) {
        self.mutate(task_id, |s| {
            let (lo, hi) = s.current_stage.progress_range();
            let span = (hi - lo) as f32;
            let pct = lo as f32 + span * fraction.clamp(0.0, 1.0);
            s.overall_progress = s.overall_progress.max(pct.round() as u8);
            s.current_stage_progress = progress;
            true
        });
    }

    pub fn record_warning(&self, task_id: &str, warning: impl Into<String>) {
        let warning = warning.into();
        self.mutate(task_id, |s| {
            s.warnings.push(warning.clone());
            true
        });
    }

    pub fn record_error(&self, task_id: &str, error: TaskError) {
        self.mutate(task_id, |s| {
            s.errors.push(error.clone());
            true
        });
    }

    /// Terminal success; `with_warnings` selects `completed_with_warnings`.
    pub fn finish_completed(&self, task_id: &str, with_warnings: bool) {
        let stage = if with_warnings {
            Stage::CompletedWithWarnings
        } else {
            Stage::Completed
        };
        self.mutate(task_id, |s| {
            if s.is_terminal() {
                return false;
            }
            close_history(s);
            s.current_stage = stage;
            s.status = stage;
            s.overall_progress = 100;
            s.completed_at = Some(Utc::now());
            true
        });
    }

    /// Terminal failure with a cause string (e.g. "cancelled").
    pub fn finish_failed(&self, task_id: &str, cause: impl Into<String>) {
        let cause = cause.into();
        self.mutate(task_id, |s| {
            if s.is_terminal() {
                return false;
            }
            close_history(s);
            s.current_stage = Stage::Failed;
            s.status = Stage::Failed;
            s.failure_cause = Some(cause.clone());
            s.completed_at = Some(Utc::now());
            true
        });
    }

    /// Poll access.
    pub fn get(&self, task_id: &str) -> Option<TaskStatus> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(task_id).cloned())
    }

    pub fn all(&self) -> Vec<TaskStatus> {
        self.inner
            .lock()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribe access; each message is a full record.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskStatus> {
        self.tx.subscribe()
    }

    fn mutate(&self, task_id: &str, f: impl FnOnce(&mut TaskStatus) -> bool) {
        let updated = {
            let mut map = match self.inner.lock() {
                Ok(m) => m,
                Err(poisoned) => poisoned.into_inner(),
            };
            match map.get_mut(task_id) {
                Some(status) => {
                    if f(status) {
                        status.updated_at = Utc::now();
                        Some(status.clone())
                    } else {
                        None
                    }
                }
                None => {
                    warn!("status: unknown task '{}'", task_id);
                    None
                }
            }
        };
        if let Some(status) = updated {
            self.publish(status);
        }
    }

    fn publish(&self, status: TaskStatus) {
        {
            let mut map = match self.inner.lock() {
                Ok(m) => m,
                Err(poisoned) => poisoned.into_inner(),
            };
            map.insert(status.task_id.clone(), status.clone());
        }
        self.snapshot(&status);
        // No subscribers is fine.
        let _ = self.tx.send(status);
    }

    fn snapshot(&self, status: &TaskStatus) {
        let Some(dir) = &self.state_dir else {
            return;
        };
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("status: cannot create state dir {}: {}", dir.display(), e);
            return;
        }
        let path = dir.join(format!("task_status_{}.json", status.task_id));
        match serde_json::to_vec_pretty(status) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&path, bytes) {
                    warn!("status: snapshot write failed {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("status: snapshot serialize failed: {}", e),
        }
    }
}

fn close_history(s: &mut TaskStatus) {
    if let Some(open) = s.stage_history.last_mut() {
        if open.completed_at.is_none() {
            open.completed_at = Some(Utc::now());
        }
    }
}

fn load_snapshots(dir: &std::path::Path) -> HashMap<String, TaskStatus> {
    let mut map = HashMap::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return map;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<TaskStatus>(&text).ok())
        {
            Some(status) => {
                map.insert(status.task_id.clone(), status);
            }
            None => warn!("status: skipping unreadable snapshot {}", path.display()),
        }
    }
    debug!("status: loaded {} snapshots", map.len());
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic_across_updates() {
        let bus = StatusBus::new(None);
        bus.create_task("t1", "shop");

        let mut observed = Vec::new();
        bus.transition("t1", Stage::Cloning);
        observed.push(bus.get("t1").unwrap().overall_progress);
        bus.update_progress("t1", 0.5, StageProgress::default());
        observed.push(bus.get("t1").unwrap().overall_progress);
        bus.transition("t1", Stage::Analyzing);
        observed.push(bus.get("t1").unwrap().overall_progress);
        // A late, smaller fraction must not move progress backward.
        bus.update_progress("t1", 0.0, StageProgress::default());
        observed.push(bus.get("t1").unwrap().overall_progress);
        bus.transition("t1", Stage::Parsing);
        bus.update_progress("t1", 1.0, StageProgress::default());
        observed.push(bus.get("t1").unwrap().overall_progress);

        for pair in observed.windows(2) {
            assert!(pair[0] <= pair[1], "progress decreased: {observed:?}");
        }
    }

    #[test]
    fn backward_transitions_are_ignored() {
        let bus = StatusBus::new(None);
        bus.create_task("t1", "shop");
        bus.transition("t1", Stage::Parsing);
        bus.transition("t1", Stage::Cloning); // ignored
        assert_eq!(bus.get("t1").unwrap().current_stage, Stage::Parsing);
    }

    #[test]
    fn terminal_states_stick() {
        let bus = StatusBus::new(None);
        bus.create_task("t1", "shop");
        bus.transition("t1", Stage::Parsing);
        bus.finish_failed("t1", "cancelled");

        let s = bus.get("t1").unwrap();
        assert_eq!(s.status, Stage::Failed);
        assert_eq!(s.failure_cause.as_deref(), Some("cancelled"));

        bus.transition("t1", Stage::Storing); // ignored after terminal
        assert_eq!(bus.get("t1").unwrap().status, Stage::Failed);
    }

    #[test]
    fn stage_history_tracks_transitions() {
        let bus = StatusBus::new(None);
        bus.create_task("t1", "shop");
        bus.transition("t1", Stage::Cloning);
        bus.transition("t1", Stage::Analyzing);

        let s = bus.get("t1").unwrap();
        let stages: Vec<Stage> = s.stage_history.iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec![Stage::Queued, Stage::Cloning, Stage::Analyzing]);
        // all but the open one are closed
        assert!(s.stage_history[0].completed_at.is_some());
        assert!(s.stage_history[1].completed_at.is_some());
        assert!(s.stage_history[2].completed_at.is_none());
    }

    #[test]
    fn snapshots_survive_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();

        {
            let bus = StatusBus::new(Some(dir.clone()));
            bus.create_task("t9", "shop");
            bus.transition("t9", Stage::Embedding);
            bus.record_warning("t9", "parser warning: web/broken.jsp");
        }

        let revived = StatusBus::new(Some(dir));
        let s = revived.get("t9").unwrap();
        assert_eq!(s.current_stage, Stage::Embedding);
        assert_eq!(s.warnings.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_self_contained_updates() {
        let bus = StatusBus::new(None);
        let mut rx = bus.subscribe();
        bus.create_task("t1", "shop");
        bus.transition("t1", Stage::Cloning);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.task_id, "t1");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.current_stage, Stage::Cloning);
        assert_eq!(second.repository_name, "shop");
    }
}
