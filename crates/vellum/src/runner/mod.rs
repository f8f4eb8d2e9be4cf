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

//! Whole-notebook execution.
//!
//! [`NotebookRunner::run`] executes a notebook's cells in ascending
//! sequence order, sharing one execution context across all of them. Each
//! run opens a run record before the first cell and finalizes it on every
//! exit path: clean completion, a store failure mid-run, anything. Cell
//! failures are recorded on the cell and do not abort the run; only
//! failures escaping the per-cell boundary mark the run failed and are
//! re-raised after finalization.

mod cell;

pub use cell::CellRunner;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::{ConfigError, RunError};
use crate::mail::MailTransport;
use crate::models::{
    DataSource, ExecutionMode, NewRun, Notebook, Run, RunState, Trigger,
};
use crate::query::QueryExecutor;
use crate::script::ScriptEngine;
use crate::store::NotebookStore;

/// Executes notebooks against a store, a script engine and an optional
/// mail transport.
#[derive(Clone)]
pub struct NotebookRunner {
    store: Arc<dyn NotebookStore>,
    engine: Arc<dyn ScriptEngine>,
    mailer: Option<Arc<dyn MailTransport>>,
    executor: QueryExecutor,
    config: EngineConfig,
}

impl NotebookRunner {
    pub fn new(
        store: Arc<dyn NotebookStore>,
        engine: Arc<dyn ScriptEngine>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            engine,
            mailer: None,
            executor: QueryExecutor::new(),
            config,
        }
    }

    /// Attaches a mail transport for mail cells.
    pub fn with_mailer(mut self, mailer: Arc<dyn MailTransport>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn store(&self) -> &Arc<dyn NotebookStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a notebook now.
    ///
    /// Manual triggers on a scheduled-mode notebook are refused: with no
    /// active schedule the notebook is misconfigured
    /// ([`ConfigError::NoActiveSchedule`]); with one, ad hoc execution is
    /// not allowed ([`ConfigError::ScheduledExecutionOnly`]).
    pub async fn run(&self, notebook_id: Uuid, trigger: Trigger) -> Result<Run, RunError> {
        self.run_inner(notebook_id, trigger, None).await
    }

    /// Runs a notebook on behalf of a schedule firing.
    pub(crate) async fn run_from_schedule(
        &self,
        notebook_id: Uuid,
        schedule_id: Uuid,
    ) -> Result<Run, RunError> {
        self.run_inner(notebook_id, Trigger::Schedule, Some(schedule_id))
            .await
    }

    async fn run_inner(
        &self,
        notebook_id: Uuid,
        trigger: Trigger,
        schedule_id: Option<Uuid>,
    ) -> Result<Run, RunError> {
        let notebook = self.store.get_notebook(notebook_id).await?;

        if trigger == Trigger::Manual && notebook.execution_mode == ExecutionMode::Scheduled {
            let err = match self.store.active_schedule(notebook_id).await? {
                None => ConfigError::NoActiveSchedule(notebook_id),
                Some(_) => ConfigError::ScheduledExecutionOnly(notebook_id),
            };
            return Err(err.into());
        }

        let mut new_run = NewRun::new(notebook_id, trigger, &notebook.name);
        if let Some(schedule_id) = schedule_id {
            new_run = new_run.from_schedule(schedule_id);
        }
        let run = self.store.create_run(new_run).await?;
        info!(notebook = %notebook.name, run = %run.id, %trigger, "run started");

        let mut context = ExecutionContext::new(notebook_id);
        let outcome = self.execute_cells(&notebook, &mut context).await;

        // Finalization happens on every path before the error is re-raised.
        let run = self.finalize(run, &context, &outcome).await?;
        match outcome {
            Ok(()) => {
                info!(run = %run.id, message = run.message.as_deref().unwrap_or(""), "run finished");
                Ok(run)
            }
            Err(err) => {
                error!(run = %run.id, error = %err, "run failed");
                Err(err)
            }
        }
    }

    async fn execute_cells(
        &self,
        notebook: &Notebook,
        context: &mut ExecutionContext,
    ) -> Result<(), RunError> {
        let source = self.resolve_data_source(notebook).await?;
        let cells = self.store.list_cells(notebook.id).await?;
        let runner = CellRunner::new(
            self.store.as_ref(),
            &self.executor,
            self.engine.as_ref(),
            self.mailer.as_deref(),
            self.config.cell_timeout(),
        );

        for cell in &cells {
            runner
                .run_cell(notebook, cell, context, source.as_ref())
                .await?;
        }

        let mut finished = self.store.get_notebook(notebook.id).await?;
        finished.last_run = Some(Utc::now());
        self.store.update_notebook(finished).await?;
        Ok(())
    }

    async fn resolve_data_source(
        &self,
        notebook: &Notebook,
    ) -> Result<Option<DataSource>, RunError> {
        let source_id = notebook
            .data_source_id
            .or(self.config.default_data_source_id());
        match source_id {
            Some(id) => Ok(Some(self.store.get_data_source(id).await?)),
            None => Ok(None),
        }
    }

    async fn finalize(
        &self,
        mut run: Run,
        context: &ExecutionContext,
        outcome: &Result<(), RunError>,
    ) -> Result<Run, RunError> {
        let finished_at = Utc::now();
        run.finished_at = Some(finished_at);
        run.duration_seconds = Some(
            (finished_at - run.started_at).num_milliseconds() as f64 / 1000.0,
        );

        let stats = self
            .store
            .get_notebook(run.notebook_id)
            .await
            .map(|n| n.stats)
            .unwrap_or_default();
        run.cell_total = stats.cell_total;
        run.failed_cells = stats.failed_count;

        // Mail ids reported by mail cells through their structured output.
        let mut mail_ids: BTreeSet<Uuid> = BTreeSet::new();
        for entry in context.entries() {
            if let Some(ids) = entry
                .data
                .as_ref()
                .and_then(|d| d.get("sent_mail_ids"))
                .and_then(|v| v.as_array())
            {
                mail_ids.extend(
                    ids.iter()
                        .filter_map(|v| v.as_str())
                        .filter_map(|s| Uuid::parse_str(s).ok()),
                );
            }
        }
        run.mail_ids = mail_ids.into_iter().collect();

        match outcome {
            Ok(()) => {
                run.state = Some(RunState::Success);
                run.message = Some(format!(
                    "{}/{} cells succeeded",
                    stats.success_count, stats.cell_total
                ));
            }
            Err(err) => {
                run.state = Some(RunState::Failed);
                run.message = Some(err.to_string());
            }
        }

        self.store.update_run(run.clone()).await?;
        Ok(run)
    }
}
