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

//! Single-cell execution.
//!
//! [`CellRunner::run_cell`] dispatches on the cell kind, times the
//! execution, catches any [`CellError`] as an error output on the cell
//! (the run continues), persists the output, and appends one entry to the
//! run's execution context. Every dispatch is bounded by the configured
//! cell timeout.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::context::{ExecutionContext, ResultEntry};
use crate::error::{CellError, QueryError, RunError};
use crate::mail::MailTransport;
use crate::models::{Cell, CellKind, CellStatus, DataSource, Notebook};
use crate::query::QueryExecutor;
use crate::render::{fallback::escape_html, render_markdown};
use crate::script::{ScriptEngine, ScriptScope};
use crate::store::NotebookStore;

/// What one dispatch produced before persistence.
struct CellOutcome {
    text: String,
    html: String,
    data: Option<Value>,
}

pub struct CellRunner<'a> {
    store: &'a dyn NotebookStore,
    executor: &'a QueryExecutor,
    engine: &'a dyn ScriptEngine,
    mailer: Option<&'a dyn MailTransport>,
    timeout: Duration,
}

impl<'a> CellRunner<'a> {
    pub fn new(
        store: &'a dyn NotebookStore,
        executor: &'a QueryExecutor,
        engine: &'a dyn ScriptEngine,
        mailer: Option<&'a dyn MailTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            executor,
            engine,
            mailer,
            timeout,
        }
    }

    /// Executes one cell, persists its output, and records its result in
    /// the context. Cell failures become error output; only store failures
    /// escape.
    pub async fn run_cell(
        &self,
        notebook: &Notebook,
        cell: &Cell,
        context: &mut ExecutionContext,
        source: Option<&DataSource>,
    ) -> Result<Cell, RunError> {
        debug!(cell = %cell.id, kind = %cell.kind, sequence = cell.sequence, "running cell");
        let started = Instant::now();

        let dispatch = self.dispatch(notebook, cell, context, source);
        let outcome = match tokio::time::timeout(self.timeout, dispatch).await {
            Ok(result) => result,
            Err(_) => Err(CellError::Timeout(self.timeout)),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let (status, outcome) = match outcome {
            Ok(outcome) => (CellStatus::Success, outcome),
            Err(err) => {
                warn!(cell = %cell.id, error = %err, "cell failed");
                let text = err.to_string();
                let html = format!("<pre class='text-danger'>{}</pre>", escape_html(&text));
                (
                    CellStatus::Error,
                    CellOutcome {
                        text,
                        html,
                        data: None,
                    },
                )
            }
        };

        let mut updated = cell.clone();
        updated.status = status;
        updated.output.text = outcome.text;
        updated.output.html = outcome.html;
        updated.output.data = outcome.data;
        updated.last_run = Some(Utc::now());
        updated.elapsed_ms = elapsed_ms;
        self.store.update_cell(updated.clone()).await?;

        context.record(ResultEntry {
            cell_id: updated.id,
            sequence: updated.sequence,
            label: updated.label(),
            kind: updated.kind,
            status: updated.status,
            text: updated.output.text.clone(),
            data: updated.output.data.clone(),
        });
        Ok(updated)
    }

    async fn dispatch(
        &self,
        notebook: &Notebook,
        cell: &Cell,
        context: &ExecutionContext,
        source: Option<&DataSource>,
    ) -> Result<CellOutcome, CellError> {
        match cell.kind {
            CellKind::Markdown => Ok(CellOutcome {
                text: cell.input_source.clone(),
                html: render_markdown(&cell.input_source),
                data: None,
            }),
            // Rich text is already HTML; pass it through both ways.
            CellKind::RichText => Ok(CellOutcome {
                text: cell.input_source.clone(),
                html: cell.input_source.clone(),
                data: None,
            }),
            CellKind::Python => {
                let scope = ScriptScope::new(notebook, cell, context, self.store, None);
                self.engine.eval(&cell.input_source, &scope).await?;
                let text = scope.output();
                Ok(CellOutcome {
                    html: format!("<pre>{}</pre>", escape_html(&text)),
                    text,
                    data: None,
                })
            }
            CellKind::Mail => {
                let scope =
                    ScriptScope::new(notebook, cell, context, self.store, self.mailer);
                self.engine.eval(&cell.input_source, &scope).await?;
                let sent = scope.sent_mail_ids();
                let stdout = scope.output();
                let text = if stdout.is_empty() {
                    format!("Sent {} mails", sent.len())
                } else {
                    stdout
                };
                Ok(CellOutcome {
                    html: format!("<pre>{}</pre>", escape_html(&text)),
                    text,
                    data: Some(json!({ "sent_mail_ids": sent })),
                })
            }
            CellKind::Sql => {
                let source = source.ok_or(QueryError::MissingDataSource)?;
                let output = self.executor.execute(source, &cell.input_source).await?;
                Ok(CellOutcome {
                    text: output.render_text(),
                    html: output.render_html(),
                    data: output.structured(),
                })
            }
        }
    }
}
