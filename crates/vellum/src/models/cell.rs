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

//! The cell record: one typed unit of notebook input and output.
//!
//! Cells belong to exactly one notebook and carry a `sequence` that
//! establishes execution order. New cells default to the notebook's highest
//! sequence plus 10, leaving gaps so cells can be inserted or reordered
//! without renumbering siblings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spacing between default-assigned cell sequences.
pub const SEQUENCE_STEP: i32 = 10;

/// The kind of program or text a cell holds, dispatched on by the cell
/// runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Python,
    Sql,
    Mail,
    RichText,
}

impl CellKind {
    /// True for cell kinds executed through the script engine.
    pub fn is_script(&self) -> bool {
        matches!(self, CellKind::Python | CellKind::Mail)
    }
}

// The wire name for rich text cells is "richtext", not "rich_text".
impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CellKind::Markdown => "markdown",
            CellKind::Python => "python",
            CellKind::Sql => "sql",
            CellKind::Mail => "mail",
            CellKind::RichText => "richtext",
        };
        f.write_str(name)
    }
}

/// Execution state of a cell's last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    #[default]
    Pending,
    Success,
    Error,
}

/// A binary export produced by a cell run, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFile {
    pub filename: String,
    pub content_b64: String,
}

impl ExportFile {
    /// Encodes raw bytes into an export file.
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::Engine as _;
        Self {
            filename: filename.into(),
            content_b64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Output fields overwritten on each cell run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellOutput {
    /// Raw text result.
    pub text: String,
    /// Rendered HTML result.
    pub html: String,
    /// Optional binary export.
    pub file: Option<ExportFile>,
    /// Optional structured (tabular) result.
    pub data: Option<serde_json::Value>,
}

/// A cell record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: Uuid,
    pub notebook_id: Uuid,
    pub sequence: i32,
    pub kind: CellKind,
    /// The cell's program or text. Required.
    pub input_source: String,
    pub output: CellOutput,
    pub status: CellStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub elapsed_ms: f64,
}

impl Cell {
    /// The cell's display label, `In [sequence]`. Markdown cells have no
    /// label.
    pub fn label(&self) -> Option<String> {
        if self.kind == CellKind::Markdown {
            None
        } else {
            Some(format!("In [{}]", self.sequence))
        }
    }
}

/// Values for creating a cell record.
///
/// When `sequence` is `None` the store assigns `max existing sequence in the
/// notebook + 10`.
#[derive(Debug, Clone)]
pub struct NewCell {
    pub notebook_id: Uuid,
    pub sequence: Option<i32>,
    pub kind: CellKind,
    pub input_source: String,
}

impl NewCell {
    /// Creates a new cell value with a store-assigned sequence.
    pub fn new(notebook_id: Uuid, kind: CellKind, input_source: impl Into<String>) -> Self {
        Self {
            notebook_id,
            sequence: None,
            kind,
            input_source: input_source.into(),
        }
    }

    /// Pins the cell to an explicit sequence.
    pub fn at_sequence(mut self, sequence: i32) -> Self {
        self.sequence = Some(sequence);
        self
    }
}
