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

//! Notebook import and export.
//!
//! The interchange document is versioned JSON carrying the notebook's
//! identity fields and its cells' inputs (never outputs or run history).
//! Imported cells keep their exported sequences; cells without one get
//! the store's default spacing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CellKind, ExecutionMode, NewCell, NewNotebook, Notebook};
use crate::store::NotebookStore;

pub const EXPORT_VERSION: &str = "1.0";

/// The versioned interchange document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub notebook: NotebookHeader,
    pub cells: Vec<CellEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookHeader {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEntry {
    #[serde(default)]
    pub sequence: Option<i32>,
    pub cell_type: CellKind,
    #[serde(default)]
    pub input_source: String,
}

/// Exports a notebook and its cell inputs, cells in sequence order.
pub async fn export_notebook(
    store: &dyn NotebookStore,
    notebook_id: Uuid,
) -> Result<NotebookDocument, StoreError> {
    let notebook = store.get_notebook(notebook_id).await?;
    let cells = store.list_cells(notebook_id).await?;
    Ok(NotebookDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at: Utc::now(),
        notebook: NotebookHeader {
            name: notebook.name,
            description: notebook.description,
            execution_mode: notebook.execution_mode,
        },
        cells: cells
            .into_iter()
            .map(|cell| CellEntry {
                sequence: Some(cell.sequence),
                cell_type: cell.kind,
                input_source: cell.input_source,
            })
            .collect(),
    })
}

/// Creates a notebook and its cells from an interchange document.
///
/// `data_source_id` attaches a source to the imported notebook; the
/// document itself never carries one.
pub async fn import_notebook(
    store: &dyn NotebookStore,
    document: &NotebookDocument,
    data_source_id: Option<Uuid>,
) -> Result<Notebook, StoreError> {
    let notebook = store
        .create_notebook(NewNotebook {
            name: document.notebook.name.clone(),
            description: document.notebook.description.clone(),
            owner: None,
            data_source_id,
            execution_mode: document.notebook.execution_mode,
        })
        .await?;

    for entry in &document.cells {
        let mut new_cell = NewCell::new(notebook.id, entry.cell_type, entry.input_source.clone());
        new_cell.sequence = entry.sequence;
        store.create_cell(new_cell).await?;
    }
    store.get_notebook(notebook.id).await
}
