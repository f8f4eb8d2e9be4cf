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

//! PostgreSQL backend.
//!
//! Queries run over the simple query protocol so arbitrary notebook SQL
//! (including multi-statement text) executes without preparation, and all
//! values come back as text. The connection lives for exactly one call.

use tokio_postgres::{NoTls, SimpleQueryMessage};
use tracing::debug;

use super::{QueryOutput, TabularResult};
use crate::error::QueryError;
use crate::models::DataSource;

async fn connect(source: &DataSource) -> Result<tokio_postgres::Client, QueryError> {
    let dsn = source.postgres_dsn();
    let (client, connection) = tokio_postgres::connect(&dsn, NoTls)
        .await
        .map_err(|e| QueryError::Connection(e.to_string()))?;
    // The connection task finishes when the client drops.
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("postgres connection closed: {e}");
        }
    });
    Ok(client)
}

fn collect(messages: Vec<SimpleQueryMessage>) -> QueryOutput {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut affected: u64 = 0;

    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(description) => {
                columns = description.iter().map(|c| c.name().to_string()).collect();
            }
            SimpleQueryMessage::Row(row) => {
                if columns.is_empty() {
                    columns = row
                        .columns()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect();
                }
                rows.push(
                    (0..row.len())
                        .map(|i| row.get(i).unwrap_or("").to_string())
                        .collect(),
                );
            }
            SimpleQueryMessage::CommandComplete(count) => affected += count,
            _ => {}
        }
    }

    if columns.is_empty() {
        QueryOutput::RowsAffected(affected)
    } else {
        QueryOutput::Table(TabularResult { columns, rows })
    }
}

pub(super) async fn execute(
    source: &DataSource,
    query: &str,
) -> Result<QueryOutput, QueryError> {
    let client = connect(source).await?;
    let messages = client
        .simple_query(query)
        .await
        .map_err(|e| QueryError::Execution(e.to_string()))?;
    Ok(collect(messages))
}

pub(super) async fn probe(source: &DataSource) -> Result<String, QueryError> {
    match execute(source, "SELECT version()").await? {
        QueryOutput::Table(table) => Ok(table
            .rows
            .first()
            .and_then(|r| r.first())
            .cloned()
            .unwrap_or_default()),
        QueryOutput::RowsAffected(_) => Ok("connected".to_string()),
    }
}
