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

//! Query execution against configured data sources.
//!
//! [`QueryExecutor::execute`] dispatches on the source's backend type,
//! opens a connection scoped to the single call, runs the statement as
//! text, and returns either a [`TabularResult`] (when the backend reported
//! column metadata) or a rows-affected count. Backend drivers are cargo
//! features; executing against a backend compiled out of this build fails
//! with [`QueryError::DriverUnavailable`].

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::QueryError;
use crate::models::{DataSource, SourceType};
use crate::render::fallback::escape_html;

#[cfg(feature = "mssql")]
mod mssql;
#[cfg(feature = "oracle")]
mod oracle;
#[cfg(feature = "postgres")]
mod postgres;

mod csv_source;

/// A row-returning query result.
///
/// Headerless sources (CSV files) leave `columns` empty; renderings then
/// omit the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    /// Comma-joined text rendering, header first when present.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if !self.columns.is_empty() {
            lines.push(self.columns.join(", "));
        }
        for row in &self.rows {
            lines.push(row.join(", "));
        }
        lines.join("\n")
    }

    /// HTML table rendering with escaped cell values.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table class=\"cell-result\">");
        if !self.columns.is_empty() {
            html.push_str("<thead><tr>");
            for column in &self.columns {
                html.push_str(&format!("<th>{}</th>", escape_html(column)));
            }
            html.push_str("</tr></thead>");
        }
        html.push_str("<tbody>");
        for row in &self.rows {
            html.push_str("<tr>");
            for value in row {
                html.push_str(&format!("<td>{}</td>", escape_html(value)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
        html
    }

    /// One JSON object per row, keyed by column name. Headerless results
    /// have no record form.
    pub fn to_records(&self) -> Option<Value> {
        if self.columns.is_empty() {
            return None;
        }
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (column, value) in self.columns.iter().zip(row) {
                    record.insert(column.clone(), Value::String(value.clone()));
                }
                Value::Object(record)
            })
            .collect();
        Some(Value::Array(records))
    }
}

/// What a query produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Table(TabularResult),
    RowsAffected(u64),
}

impl QueryOutput {
    pub fn render_text(&self) -> String {
        match self {
            QueryOutput::Table(table) => table.to_text(),
            QueryOutput::RowsAffected(n) => format!("{n} row(s) affected"),
        }
    }

    pub fn render_html(&self) -> String {
        match self {
            QueryOutput::Table(table) => table.to_html(),
            QueryOutput::RowsAffected(n) => format!("<p>{n} row(s) affected</p>"),
        }
    }

    /// Structured records for the execution context; row counts and
    /// headerless tables carry none.
    pub fn structured(&self) -> Option<Value> {
        match self {
            QueryOutput::Table(table) => table.to_records(),
            QueryOutput::RowsAffected(_) => None,
        }
    }
}

/// True when the statement's leading keyword means it returns rows.
///
/// Used by backends whose wire protocol needs to know up front whether to
/// read a row stream or an affected count.
pub(crate) fn is_row_returning(query: &str) -> bool {
    let first = query
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(first.as_str(), "select" | "with" | "show" | "explain")
}

/// Decodes a binary column value as UTF-8, falling back to hex.
pub(crate) fn stringify_binary(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(bytes),
    }
}

/// Executes statements against data sources, one scoped connection per
/// call.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `query` against `source`.
    pub async fn execute(
        &self,
        source: &DataSource,
        query: &str,
    ) -> Result<QueryOutput, QueryError> {
        debug!(source = %source.name, backend = ?source.source_type, "executing query");
        match source.source_type {
            SourceType::None => Err(QueryError::SourceIsNone),
            SourceType::Csv => csv_source::execute(source).await,
            SourceType::Postgresql => {
                #[cfg(feature = "postgres")]
                {
                    postgres::execute(source, query).await
                }
                #[cfg(not(feature = "postgres"))]
                {
                    Err(QueryError::DriverUnavailable {
                        backend: "PostgreSQL",
                        feature: "postgres",
                    })
                }
            }
            SourceType::Mssql => {
                #[cfg(feature = "mssql")]
                {
                    mssql::execute(source, query).await
                }
                #[cfg(not(feature = "mssql"))]
                {
                    Err(QueryError::DriverUnavailable {
                        backend: "SQL Server",
                        feature: "mssql",
                    })
                }
            }
            SourceType::Oracle => {
                #[cfg(feature = "oracle")]
                {
                    oracle::execute(source, query).await
                }
                #[cfg(not(feature = "oracle"))]
                {
                    Err(QueryError::DriverUnavailable {
                        backend: "Oracle",
                        feature: "oracle",
                    })
                }
            }
        }
    }

    /// Probes connectivity and returns the backend's version banner (or a
    /// readability note for CSV sources).
    pub async fn test_connection(&self, source: &DataSource) -> Result<String, QueryError> {
        match source.source_type {
            SourceType::None => Err(QueryError::SourceIsNone),
            SourceType::Csv => csv_source::probe(source).await,
            SourceType::Postgresql => {
                #[cfg(feature = "postgres")]
                {
                    postgres::probe(source).await
                }
                #[cfg(not(feature = "postgres"))]
                {
                    Err(QueryError::DriverUnavailable {
                        backend: "PostgreSQL",
                        feature: "postgres",
                    })
                }
            }
            SourceType::Mssql => {
                #[cfg(feature = "mssql")]
                {
                    mssql::probe(source).await
                }
                #[cfg(not(feature = "mssql"))]
                {
                    Err(QueryError::DriverUnavailable {
                        backend: "SQL Server",
                        feature: "mssql",
                    })
                }
            }
            SourceType::Oracle => {
                #[cfg(feature = "oracle")]
                {
                    oracle::probe(source).await
                }
                #[cfg(not(feature = "oracle"))]
                {
                    Err(QueryError::DriverUnavailable {
                        backend: "Oracle",
                        feature: "oracle",
                    })
                }
            }
        }
    }
}
