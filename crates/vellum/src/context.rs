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

//! The run-scoped execution context.
//!
//! Every notebook run builds one [`ExecutionContext`] and threads it through
//! the cells in sequence order. Each executed cell appends a
//! [`ResultEntry`]; later cells can look results up by label (`In [20]` or a
//! custom label) or by sequence number. The context is never persisted —
//! when a lookup misses, the cell's last persisted output is used instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Cell, CellKind, CellStatus};
use crate::store::NotebookStore;

/// One cell's result as seen by later cells in the same run.
#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub cell_id: Uuid,
    pub sequence: i32,
    /// `In [N]` for executable cells; markdown cells have none.
    pub label: Option<String>,
    pub kind: CellKind,
    pub status: CellStatus,
    /// Raw text result.
    pub text: String,
    /// Structured result (tabular records, mail ids), when the cell
    /// produced one.
    pub data: Option<Value>,
}

impl ResultEntry {
    /// Synthesizes an entry from a cell's persisted output.
    pub fn from_persisted(cell: &Cell) -> Self {
        Self {
            cell_id: cell.id,
            sequence: cell.sequence,
            label: cell.label(),
            kind: cell.kind,
            status: cell.status,
            text: cell.output.text.clone(),
            data: cell.output.data.clone(),
        }
    }
}

/// How a cell result is addressed from another cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellIdentifier {
    /// Matched against cell sequences.
    Sequence(i32),
    /// An `In [N]` label or a custom label string.
    Label(String),
}

impl From<i32> for CellIdentifier {
    fn from(sequence: i32) -> Self {
        CellIdentifier::Sequence(sequence)
    }
}

impl From<&str> for CellIdentifier {
    fn from(label: &str) -> Self {
        CellIdentifier::Label(label.to_string())
    }
}

static IN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^In\s*\[\s*(\d+)\s*\]$").expect("valid In-label regex"));

/// Parses the sequence out of an `In [N]` label string.
pub(crate) fn label_sequence(label: &str) -> Option<i32> {
    IN_LABEL
        .captures(label)
        .and_then(|caps| caps[1].parse::<i32>().ok())
}

/// Run-scoped registry of executed-cell results.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    notebook_id: Uuid,
    /// Entries in execution order; re-executed cells append a fresh entry,
    /// and lookups return the freshest match.
    entries: Vec<ResultEntry>,
}

impl ExecutionContext {
    pub fn new(notebook_id: Uuid) -> Self {
        Self {
            notebook_id,
            entries: Vec::new(),
        }
    }

    pub fn notebook_id(&self) -> Uuid {
        self.notebook_id
    }

    /// Appends one executed cell's result.
    pub fn record(&mut self, entry: ResultEntry) {
        self.entries.push(entry);
    }

    /// The most recently recorded result, if any cell has executed.
    pub fn last_result(&self) -> Option<&ResultEntry> {
        self.entries.last()
    }

    /// All recorded results in execution order.
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// Looks an entry up in this run's results only. Returns the freshest
    /// match.
    pub fn find(&self, identifier: &CellIdentifier) -> Option<&ResultEntry> {
        let sequence = match identifier {
            CellIdentifier::Sequence(n) => Some(*n),
            CellIdentifier::Label(s) => label_sequence(s),
        };
        self.entries.iter().rev().find(|e| match identifier {
            CellIdentifier::Sequence(_) => Some(e.sequence) == sequence,
            CellIdentifier::Label(s) => {
                e.label.as_deref() == Some(s.as_str()) || Some(e.sequence) == sequence
            }
        })
    }

    /// Resolves a cell result: this run's context first, then the cell's
    /// last persisted output.
    pub async fn get_cell_result(
        &self,
        store: &dyn NotebookStore,
        identifier: &CellIdentifier,
    ) -> Option<ResultEntry> {
        if let Some(entry) = self.find(identifier) {
            return Some(entry.clone());
        }
        let cells = store.list_cells(self.notebook_id).await.ok()?;
        let sequence = match identifier {
            CellIdentifier::Sequence(n) => Some(*n),
            CellIdentifier::Label(s) => label_sequence(s),
        };
        cells
            .iter()
            .find(|c| match identifier {
                CellIdentifier::Sequence(_) => Some(c.sequence) == sequence,
                CellIdentifier::Label(s) => {
                    c.label().as_deref() == Some(s.as_str()) || Some(c.sequence) == sequence
                }
            })
            .map(ResultEntry::from_persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sequence: i32, text: &str) -> ResultEntry {
        ResultEntry {
            cell_id: Uuid::new_v4(),
            sequence,
            label: Some(format!("In [{sequence}]")),
            kind: CellKind::Python,
            status: CellStatus::Success,
            text: text.to_string(),
            data: None,
        }
    }

    #[test]
    fn lookup_by_label_and_sequence() {
        let mut ctx = ExecutionContext::new(Uuid::new_v4());
        ctx.record(entry(10, "ten"));
        ctx.record(entry(20, "twenty"));

        assert_eq!(ctx.find(&CellIdentifier::from("In [10]")).unwrap().text, "ten");
        assert_eq!(ctx.find(&CellIdentifier::from(20)).unwrap().text, "twenty");
        assert!(ctx.find(&CellIdentifier::from(30)).is_none());
    }

    #[test]
    fn label_spacing_is_tolerated() {
        let mut ctx = ExecutionContext::new(Uuid::new_v4());
        ctx.record(entry(10, "ten"));
        assert!(ctx.find(&CellIdentifier::from("In [ 10 ]")).is_some());
    }

    #[test]
    fn reexecution_returns_freshest_entry() {
        let mut ctx = ExecutionContext::new(Uuid::new_v4());
        ctx.record(entry(10, "first"));
        ctx.record(entry(10, "second"));
        assert_eq!(ctx.find(&CellIdentifier::from(10)).unwrap().text, "second");
        assert_eq!(ctx.last_result().unwrap().text, "second");
    }
}
