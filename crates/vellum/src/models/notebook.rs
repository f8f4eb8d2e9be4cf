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

//! The notebook record: an ordered collection of cells with an optional
//! data source, an execution mode, and denormalized cell statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a notebook is allowed to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Runs whenever the caller asks.
    #[default]
    Immediate,
    /// Runs only through its active schedule.
    Scheduled,
}

/// Denormalized cell statistics, recomputed by the store from cell states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookStats {
    /// Total number of cells.
    pub cell_total: usize,
    /// Cells whose last run succeeded.
    pub success_count: usize,
    /// Cells whose last run errored.
    pub failed_count: usize,
}

/// A notebook record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Owning user, opaque to the engine.
    pub owner: Option<String>,
    pub data_source_id: Option<Uuid>,
    pub execution_mode: ExecutionMode,
    pub last_run: Option<DateTime<Utc>>,
    pub stats: NotebookStats,
    pub created_at: DateTime<Utc>,
}

/// Values for creating a notebook record.
#[derive(Debug, Clone, Default)]
pub struct NewNotebook {
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub data_source_id: Option<Uuid>,
    pub execution_mode: ExecutionMode,
}

impl NewNotebook {
    /// Convenience constructor for a named notebook with defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Computes the name for a duplicate of `name`.
///
/// First copy gets a ` copy1` suffix; later copies increment the trailing
/// counter (`report copy1` -> `report copy2`).
pub(crate) fn duplicate_name(name: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static COPY_SUFFIX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"copy(\d+)$").expect("valid copy-suffix regex"));

    if let Some(caps) = COPY_SUFFIX.captures(name) {
        let num: u64 = caps[1].parse().unwrap_or(0);
        let base = COPY_SUFFIX.replace(name, "").trim_end().to_string();
        format!("{} copy{}", base, num + 1)
    } else {
        format!("{} copy1", name.trim_end())
    }
}
