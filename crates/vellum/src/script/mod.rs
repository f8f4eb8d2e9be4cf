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

//! Script evaluation for python and mail cells.
//!
//! The engine core never links a language runtime. Script cells go through
//! the [`ScriptEngine`] trait; the `python` feature provides a pyo3-backed
//! implementation, tests provide mocks, and embedding hosts can bring
//! their own. The engine receives a [`ScriptScope`] that exposes exactly
//! what cell programs may touch: the notebook, the cell, earlier results,
//! a print sink, and (for mail cells) the mail transport.

#[cfg(feature = "python")]
pub mod python;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::context::{CellIdentifier, ExecutionContext, ResultEntry};
use crate::error::MailError;
use crate::mail::{MailTransport, OutgoingMail};
use crate::models::{Cell, Notebook};
use crate::store::NotebookStore;

/// Script evaluation failures.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The cell program raised.
    #[error("script error: {0}")]
    Evaluation(String),

    /// No script engine was configured for this build.
    #[error("python scripting is not available (no script engine configured)")]
    EngineUnavailable,

    /// A `send_mail` call inside the script failed.
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Everything a cell program may reach during evaluation.
///
/// Print output and sent-mail ids accumulate behind locks so engines can
/// report them from blocking threads.
pub struct ScriptScope<'a> {
    pub notebook: &'a Notebook,
    pub cell: &'a Cell,
    context: &'a ExecutionContext,
    store: &'a dyn NotebookStore,
    mailer: Option<&'a dyn MailTransport>,
    prints: Mutex<Vec<String>>,
    sent_mail_ids: Mutex<Vec<Uuid>>,
}

impl<'a> ScriptScope<'a> {
    pub fn new(
        notebook: &'a Notebook,
        cell: &'a Cell,
        context: &'a ExecutionContext,
        store: &'a dyn NotebookStore,
        mailer: Option<&'a dyn MailTransport>,
    ) -> Self {
        Self {
            notebook,
            cell,
            context,
            store,
            mailer,
            prints: Mutex::new(Vec::new()),
            sent_mail_ids: Mutex::new(Vec::new()),
        }
    }

    /// Appends one line of print output.
    pub fn print(&self, line: impl Into<String>) {
        self.prints.lock().push(line.into());
    }

    /// Accumulated print output, newline-joined and trimmed.
    pub fn output(&self) -> String {
        self.prints.lock().join("\n").trim().to_string()
    }

    /// The most recent result of this run.
    pub fn last_result(&self) -> Option<ResultEntry> {
        self.context.last_result().cloned()
    }

    /// All results of this run, in execution order.
    pub fn cell_results(&self) -> Vec<ResultEntry> {
        self.context.entries().to_vec()
    }

    /// Resolves an earlier cell's result by label or sequence, falling
    /// back to its last persisted output.
    pub async fn get_cell_result(&self, identifier: &CellIdentifier) -> Option<ResultEntry> {
        self.context.get_cell_result(self.store, identifier).await
    }

    /// Persisted outputs of every cell in the notebook, in sequence order.
    /// Engines that evaluate off the async runtime snapshot these up front
    /// so lookups can still fall back to persisted results. Store failures
    /// yield an empty set.
    pub async fn persisted_results(&self) -> Vec<ResultEntry> {
        match self.store.list_cells(self.notebook.id).await {
            Ok(cells) => cells.iter().map(ResultEntry::from_persisted).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Sends a message through the configured transport and records its
    /// id. Only mail cells receive a scope with a transport.
    pub async fn send_mail(&self, mail: OutgoingMail) -> Result<Uuid, MailError> {
        let mailer = self.mailer.ok_or(MailError::TransportUnavailable)?;
        let id = mailer.create_and_send(mail).await?;
        self.sent_mail_ids.lock().push(id);
        Ok(id)
    }

    /// Mail ids sent so far in this evaluation.
    pub fn sent_mail_ids(&self) -> Vec<Uuid> {
        self.sent_mail_ids.lock().clone()
    }
}

/// Evaluates one cell program. Print output lands in the scope; the
/// returned unit means the program completed without raising.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    async fn eval(&self, source: &str, scope: &ScriptScope<'_>) -> Result<(), ScriptError>;
}

/// Stand-in engine for builds with no language runtime; every evaluation
/// fails with [`ScriptError::EngineUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScriptEngine;

#[async_trait]
impl ScriptEngine for NoScriptEngine {
    async fn eval(&self, _source: &str, _scope: &ScriptScope<'_>) -> Result<(), ScriptError> {
        Err(ScriptError::EngineUnavailable)
    }
}
