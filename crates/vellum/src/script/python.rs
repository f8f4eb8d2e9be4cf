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

//! PyO3-backed [`ScriptEngine`].
//!
//! Cell programs run as CPython code with a scope holding `notebook`,
//! `cell`, `cell_results`, `last_result`, `get_cell_result(identifier)`
//! and, for mail cells, `send_mail(...)`. `get_cell_result` checks this
//! run's results first and falls back to outputs persisted before the
//! run. All GIL work happens inside `tokio::task::spawn_blocking`; mail
//! requests collected during the script are dispatched through the async
//! transport after the GIL is released.

use std::ffi::CString;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyTuple};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::spawn_blocking;

use super::{ScriptEngine, ScriptError, ScriptScope};
use crate::context::{label_sequence, ResultEntry};
use crate::mail::{OutgoingMail, Recipients};
use crate::models::{Cell, CellStatus, ExportFile, Notebook};

/// Serializable view of a [`ResultEntry`] as cell programs see it.
#[derive(Debug, Clone, Serialize)]
struct EntryView {
    sequence: i32,
    label: Option<String>,
    status: String,
    text: String,
    data: Option<Value>,
}

impl EntryView {
    fn from_entry(entry: &ResultEntry) -> Self {
        Self {
            sequence: entry.sequence,
            label: entry.label.clone(),
            status: match entry.status {
                CellStatus::Pending => "pending".to_string(),
                CellStatus::Success => "success".to_string(),
                CellStatus::Error => "error".to_string(),
            },
            text: entry.text.clone(),
            data: entry.data.clone(),
        }
    }
}

/// A `send_mail(...)` call captured from inside the script.
#[derive(Debug, Clone, Deserialize)]
struct MailRequest {
    subject: String,
    email_to: Value,
    #[serde(default)]
    body_html: Option<String>,
    #[serde(default)]
    body_text: Option<String>,
    #[serde(default)]
    email_cc: Option<Value>,
    #[serde(default)]
    email_bcc: Option<Value>,
    /// `[{name, content}]`, content base64-encoded.
    #[serde(default)]
    attachments: Vec<AttachmentRequest>,
    #[serde(default = "default_auto_send")]
    auto_send: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct AttachmentRequest {
    name: String,
    content: String,
}

fn default_auto_send() -> bool {
    true
}

fn recipients_from(value: &Value) -> Recipients {
    match value {
        Value::Array(items) => Recipients::List(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|v| v.to_string())
                .collect(),
        ),
        Value::String(text) => Recipients::Text(text.clone()),
        other => Recipients::Text(other.to_string()),
    }
}

impl MailRequest {
    fn into_outgoing(self) -> Result<OutgoingMail, ScriptError> {
        let mut mail = OutgoingMail::build(
            self.subject,
            recipients_from(&self.email_to),
            self.body_html,
            self.body_text,
        )
        .map_err(ScriptError::Mail)?;
        if let Some(cc) = &self.email_cc {
            mail = mail.cc(recipients_from(cc));
        }
        if let Some(bcc) = &self.email_bcc {
            mail = mail.bcc(recipients_from(bcc));
        }
        for attachment in self.attachments {
            mail = mail.attach(ExportFile {
                filename: attachment.name,
                content_b64: attachment.content,
            });
        }
        Ok(mail.auto_send(self.auto_send))
    }
}

/// What the blocking evaluation hands back to the async side.
struct EvalOutcome {
    stdout: String,
    mail_requests: Vec<MailRequest>,
}

/// Everything the blocking evaluation needs, snapshotted on the async
/// side before the GIL is taken.
struct EvalInput {
    source: String,
    notebook: Notebook,
    cell: Cell,
    /// Results recorded so far in this run, execution order.
    entries: Vec<EntryView>,
    /// Persisted outputs of every notebook cell, the fallback for lookups
    /// that miss this run's results.
    persisted: Vec<EntryView>,
    allow_mail: bool,
}

/// Freshest in-run match first, then the persisted snapshot.
fn find_entry<'a>(
    in_run: &'a [EntryView],
    persisted: &'a [EntryView],
    sequence: Option<i32>,
    label: Option<&str>,
) -> Option<&'a EntryView> {
    let matches = |e: &EntryView| match (sequence, label) {
        (Some(n), None) => e.sequence == n,
        (parsed, Some(l)) => {
            e.label.as_deref() == Some(l) || parsed.is_some_and(|n| e.sequence == n)
        }
        (None, None) => false,
    };
    in_run
        .iter()
        .rev()
        .find(|e| matches(e))
        .or_else(|| persisted.iter().find(|e| matches(e)))
}

// Wrapper that captures print output around the cell program.
const RUNNER: &str = r#"
import io as _io, contextlib as _contextlib
_buf = _io.StringIO()
with _contextlib.redirect_stdout(_buf):
    exec(compile(_source, "<cell>", "exec"), globals(), locals())
_stdout = _buf.getvalue()
"#;

fn run_blocking(input: EvalInput) -> Result<EvalOutcome, ScriptError> {
    let collected: Arc<Mutex<Vec<MailRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let collected_in_py = collected.clone();
    let lookup_entries = input.entries.clone();
    let fallback_entries = input.persisted.clone();

    let stdout = Python::with_gil(|py| -> PyResult<String> {
        let locals = PyDict::new(py);
        locals.set_item("_source", &input.source)?;
        locals.set_item("notebook", pythonize::pythonize(py, &input.notebook)?)?;
        locals.set_item("cell", pythonize::pythonize(py, &input.cell)?)?;
        locals.set_item("cell_results", pythonize::pythonize(py, &input.entries)?)?;
        locals.set_item(
            "last_result",
            pythonize::pythonize(py, &input.entries.last())?,
        )?;

        let get_cell_result = PyCFunction::new_closure(
            py,
            None,
            None,
            move |args: &Bound<'_, PyTuple>, _kwargs: Option<&Bound<'_, PyDict>>| {
                let py = args.py();
                let identifier = args.get_item(0)?;
                let found = if let Ok(sequence) = identifier.extract::<i32>() {
                    find_entry(&lookup_entries, &fallback_entries, Some(sequence), None)
                } else if let Ok(label) = identifier.extract::<String>() {
                    find_entry(
                        &lookup_entries,
                        &fallback_entries,
                        label_sequence(&label),
                        Some(label.as_str()),
                    )
                } else {
                    None
                };
                Ok(pythonize::pythonize(py, &found)?.unbind())
            },
        )?;
        locals.set_item("get_cell_result", get_cell_result)?;

        if input.allow_mail {
            let send_mail = PyCFunction::new_closure(
                py,
                None,
                None,
                move |args: &Bound<'_, PyTuple>, kwargs: Option<&Bound<'_, PyDict>>| {
                    let kwargs = kwargs.ok_or_else(|| {
                        pyo3::exceptions::PyTypeError::new_err(
                            "send_mail takes keyword arguments only",
                        )
                    })?;
                    if !args.is_empty() {
                        return Err(pyo3::exceptions::PyTypeError::new_err(
                            "send_mail takes keyword arguments only",
                        ));
                    }
                    let request: MailRequest =
                        pythonize::depythonize(kwargs).map_err(|e| {
                            pyo3::exceptions::PyValueError::new_err(format!(
                                "invalid send_mail arguments: {e}"
                            ))
                        })?;
                    collected_in_py.lock().push(request);
                    Ok(())
                },
            )?;
            locals.set_item("send_mail", send_mail)?;
        }

        let runner = CString::new(RUNNER).expect("runner source has no NUL bytes");
        py.run(runner.as_c_str(), None, Some(&locals))?;
        let stdout: String = locals
            .get_item("_stdout")?
            .map(|v| v.extract())
            .transpose()?
            .unwrap_or_default();
        Ok(stdout)
    })
    .map_err(|e| ScriptError::Evaluation(e.to_string()))?;

    let mail_requests = std::mem::take(&mut *collected.lock());
    Ok(EvalOutcome {
        stdout,
        mail_requests,
    })
}

/// CPython script engine. Requires `pyo3`'s auto-initialized interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyScriptEngine;

impl PyScriptEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptEngine for PyScriptEngine {
    async fn eval(&self, source: &str, scope: &ScriptScope<'_>) -> Result<(), ScriptError> {
        // Snapshot in-run results and persisted outputs before releasing
        // to the blocking pool; the interpreter never touches the store.
        let entries: Vec<EntryView> = scope
            .cell_results()
            .iter()
            .map(EntryView::from_entry)
            .collect();
        let persisted: Vec<EntryView> = scope
            .persisted_results()
            .await
            .iter()
            .map(EntryView::from_entry)
            .collect();
        let input = EvalInput {
            source: source.to_string(),
            notebook: scope.notebook.clone(),
            cell: scope.cell.clone(),
            entries,
            persisted,
            allow_mail: scope.cell.kind == crate::models::CellKind::Mail,
        };

        let outcome = spawn_blocking(move || run_blocking(input))
            .await
            .map_err(|e| ScriptError::Evaluation(format!("blocking task failed: {e}")))??;

        for line in outcome.stdout.lines() {
            scope.print(line);
        }
        for request in outcome.mail_requests {
            let mail = request.into_outgoing()?;
            scope.send_mail(mail).await?;
        }
        Ok(())
    }
}
