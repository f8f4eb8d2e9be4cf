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

//! Interval-based schedule firing.
//!
//! [`Scheduler::run_due_schedules`] is the host-driven tick: it selects
//! active schedules whose `next_run` has arrived (ascending, bounded by
//! the configured batch size), deactivates schedules whose end time has
//! passed, and fires the rest through the [`NotebookRunner`]. A schedule
//! advances (`last_run`, `run_count`, `next_run`) only when its run
//! completes; one schedule's failure never stops the others.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RunError, StoreError};
use crate::models::Schedule;
use crate::runner::NotebookRunner;

/// Outcome of one scheduler tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Schedules fired successfully.
    pub fired: Vec<Uuid>,
    /// Schedules deactivated because their end time passed.
    pub expired: Vec<Uuid>,
    /// Schedules whose run failed; they stay due and retry next tick.
    pub failed: Vec<Uuid>,
}

/// Fires due schedules through a [`NotebookRunner`].
pub struct Scheduler {
    runner: NotebookRunner,
}

impl Scheduler {
    pub fn new(runner: NotebookRunner) -> Self {
        Self { runner }
    }

    /// Processes every schedule due at `now`.
    pub async fn run_due_schedules(&self, now: DateTime<Utc>) -> Result<TickSummary, StoreError> {
        let store = self.runner.store().clone();
        let batch = store
            .due_schedules(now, self.runner.config().schedule_batch_size())
            .await?;
        let mut summary = TickSummary::default();

        for mut schedule in batch {
            if schedule.is_expired(now) {
                schedule.active = false;
                schedule.next_run = None;
                store.update_schedule(schedule.clone()).await?;
                info!(schedule = %schedule.id, "schedule expired, deactivated");
                summary.expired.push(schedule.id);
                continue;
            }

            match self.fire(&mut schedule, now).await {
                Ok(()) => {
                    store.update_schedule(schedule.clone()).await?;
                    summary.fired.push(schedule.id);
                }
                Err(err) => {
                    warn!(schedule = %schedule.id, error = %err, "scheduled run failed");
                    summary.failed.push(schedule.id);
                }
            }
        }
        Ok(summary)
    }

    async fn fire(&self, schedule: &mut Schedule, now: DateTime<Utc>) -> Result<(), RunError> {
        let run = self
            .runner
            .run_from_schedule(schedule.notebook_id, schedule.id)
            .await?;
        info!(schedule = %schedule.id, run = %run.id, "schedule fired");

        schedule.last_run = Some(now);
        schedule.run_count += 1;
        schedule.next_run = Some(schedule.add_interval(now));
        Ok(())
    }
}
