// ABOUTME: Step and run result types produced by the script runner
// ABOUTME: Records timing, status and emitted line counts for a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub action: String,
    pub label: String,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub lines_emitted: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    PartialSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub script_name: String,
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    pub lines_emitted: usize,
}

impl StepResult {
    pub fn new(index: usize, action: String, label: String) -> Self {
        Self {
            index,
            action,
            label,
            status: StepStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            lines_emitted: 0,
            error: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = StepStatus::Running;
        self.start_time = Utc::now();
    }

    pub fn mark_completed(&mut self, status: StepStatus, lines_emitted: usize, error: Option<String>) {
        self.status = status;
        self.end_time = Some(Utc::now());
        self.duration = Some(
            (Utc::now() - self.start_time)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self.lines_emitted = lines_emitted;
        self.error = error;
    }

    pub fn is_successful(&self) -> bool {
        self.status == StepStatus::Success
    }
}

impl RunResult {
    pub fn new(script_name: String, run_id: String) -> Self {
        Self {
            script_name,
            run_id,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            status: RunStatus::Running,
            steps: Vec::new(),
            lines_emitted: 0,
        }
    }

    pub fn add_step_result(&mut self, result: StepResult) {
        self.lines_emitted += result.lines_emitted;
        self.steps.push(result);
    }

    pub fn steps_executed(&self) -> usize {
        self.steps.len()
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }

    pub fn mark_completed(&mut self) {
        self.end_time = Some(Utc::now());
        self.duration = Some(
            (Utc::now() - self.start_time)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );

        let failed = self.failed_steps();
        self.status = if failed == 0 {
            RunStatus::Success
        } else if failed == self.steps.len() {
            RunStatus::Failed
        } else {
            RunStatus::PartialSuccess
        };
    }

    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_from_steps() {
        let mut run = RunResult::new("demo".to_string(), "id".to_string());
        let mut ok = StepResult::new(0, "emit".to_string(), "#0 emit".to_string());
        ok.mark_completed(StepStatus::Success, 2, None);
        run.add_step_result(ok);
        run.mark_completed();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.lines_emitted, 2);

        let mut bad = StepResult::new(1, "csv".to_string(), "#1 csv".to_string());
        bad.mark_completed(StepStatus::Failed, 0, Some("boom".to_string()));
        run.add_step_result(bad);
        run.mark_completed();
        assert_eq!(run.status, RunStatus::PartialSuccess);
        assert_eq!(run.failed_steps(), 1);
        assert!(run.duration.is_some());
    }
}
