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

//! Oracle backend.
//!
//! The oracle crate is synchronous (ODPI-C), so each call runs on the
//! blocking pool.

use tokio::task::spawn_blocking;

use super::{is_row_returning, QueryOutput, TabularResult};
use crate::error::QueryError;
use crate::models::DataSource;

fn connect(source: &DataSource) -> Result<oracle::Connection, QueryError> {
    let username = source.username.as_deref().unwrap_or_default();
    let password = source.password.as_deref().unwrap_or_default();
    oracle::Connection::connect(username, password, source.oracle_connect_string())
        .map_err(|e| QueryError::Connection(e.to_string()))
}

fn run(source: &DataSource, query: &str) -> Result<QueryOutput, QueryError> {
    let conn = connect(source)?;

    if is_row_returning(query) {
        let result_set = conn
            .query(query, &[])
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let columns: Vec<String> = result_set
            .column_info()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let mut rows = Vec::new();
        for row in result_set {
            let row = row.map_err(|e| QueryError::Execution(e.to_string()))?;
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: Option<String> = row
                    .get(i)
                    .map_err(|e| QueryError::Execution(e.to_string()))?;
                values.push(value.unwrap_or_default());
            }
            rows.push(values);
        }
        Ok(QueryOutput::Table(TabularResult { columns, rows }))
    } else {
        let statement = conn
            .execute(query, &[])
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let affected = statement
            .row_count()
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        conn.commit()
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        Ok(QueryOutput::RowsAffected(affected))
    }
}

pub(super) async fn execute(
    source: &DataSource,
    query: &str,
) -> Result<QueryOutput, QueryError> {
    let source = source.clone();
    let query = query.to_string();
    spawn_blocking(move || run(&source, &query))
        .await
        .map_err(|e| QueryError::Execution(format!("blocking task failed: {e}")))?
}

pub(super) async fn probe(source: &DataSource) -> Result<String, QueryError> {
    match execute(source, "SELECT banner FROM v$version").await? {
        QueryOutput::Table(table) => Ok(table
            .rows
            .first()
            .and_then(|r| r.first())
            .cloned()
            .unwrap_or_default()),
        QueryOutput::RowsAffected(_) => Ok("connected".to_string()),
    }
}
