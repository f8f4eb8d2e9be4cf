/*
 *  Copyright 2025 Vellum Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Run history records.
//!
//! Every notebook execution produces exactly one run record, created when
//! the run starts and finalized when it ends, whether the run succeeded,
//! failed, or aborted on an unexpected error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    #[default]
    Manual,
    Schedule,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Manual => write!(f, "manual"),
            Trigger::Schedule => write!(f, "schedule"),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Success,
    Failed,
}

/// A run record. `state` stays `None` while the run executes; finalization
/// fills `finished_at`, `state`, the cell-count snapshot and `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub notebook_id: Uuid,
    /// Set when the run was fired by a schedule.
    pub schedule_id: Option<Uuid>,
    pub name: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: Option<RunState>,
    pub duration_seconds: Option<f64>,
    /// Human-readable outcome, e.g. "8/10 cells succeeded".
    pub message: Option<String>,
    pub cell_total: usize,
    pub failed_cells: usize,
    /// Identifiers of mails sent by mail cells during this run.
    pub mail_ids: Vec<Uuid>,
}

impl Run {
    /// True when the run completed without a run-level failure. Individual
    /// cell errors do not fail the run; check `failed_cells` for those.
    pub fn succeeded(&self) -> bool {
        self.state == Some(RunState::Success)
    }
}

/// Values for opening a run record.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub notebook_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub name: String,
    pub trigger: Trigger,
}

impl NewRun {
    /// A manual or scheduled run named after the notebook and start time.
    pub fn new(notebook_id: Uuid, trigger: Trigger, notebook_name: &str) -> Self {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        Self {
            notebook_id,
            schedule_id: None,
            name: format!("{notebook_name} @ {stamp}"),
            trigger,
        }
    }

    /// Attaches the firing schedule to the run record.
    pub fn from_schedule(mut self, schedule_id: Uuid) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Trigger::Manual).unwrap(), "\"manual\"");
        assert_eq!(
            serde_json::to_string(&Trigger::Schedule).unwrap(),
            "\"schedule\""
        );
    }

    #[test]
    fn run_success_predicate() {
        let run = Run {
            id: Uuid::new_v4(),
            notebook_id: Uuid::new_v4(),
            schedule_id: None,
            name: "report @ 2025-06-01 12:00:00".into(),
            trigger: Trigger::Manual,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
            state: Some(RunState::Success),
            duration_seconds: Some(0.4),
            message: Some("3/3 cells succeeded".into()),
            cell_total: 3,
            failed_cells: 0,
            mail_ids: Vec::new(),
        };
        assert!(run.succeeded());
    }

    #[test]
    fn new_run_carries_schedule_id() {
        let sid = Uuid::new_v4();
        let new = NewRun::new(Uuid::new_v4(), Trigger::Schedule, "report").from_schedule(sid);
        assert_eq!(new.schedule_id, Some(sid));
        assert!(new.name.starts_with("report @ "));
    }
}
