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

//! CSV file sources.
//!
//! A CSV source ignores the query text and returns the whole file as a
//! headerless table: every record, including the first, is data. Always
//! compiled; CSV support is not feature-gated.

use std::path::PathBuf;

use tokio::task::spawn_blocking;

use super::{QueryOutput, TabularResult};
use crate::error::QueryError;
use crate::models::DataSource;

fn path_of(source: &DataSource) -> Result<PathBuf, QueryError> {
    source
        .csv_path
        .as_deref()
        .map(PathBuf::from)
        .ok_or(QueryError::CsvPathMissing)
}

fn read(path: PathBuf) -> Result<TabularResult, QueryError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)
        .map_err(|e| QueryError::Csv(e.to_string()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| QueryError::Csv(e.to_string()))?;
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }
    Ok(TabularResult {
        columns: Vec::new(),
        rows,
    })
}

pub(super) async fn execute(source: &DataSource) -> Result<QueryOutput, QueryError> {
    let path = path_of(source)?;
    let table = spawn_blocking(move || read(path))
        .await
        .map_err(|e| QueryError::Csv(format!("blocking task failed: {e}")))??;
    Ok(QueryOutput::Table(table))
}

pub(super) async fn probe(source: &DataSource) -> Result<String, QueryError> {
    let path = path_of(source)?;
    let table = spawn_blocking(move || read(path))
        .await
        .map_err(|e| QueryError::Csv(format!("blocking task failed: {e}")))??;
    Ok(format!("CSV readable: {} row(s)", table.rows.len()))
}
