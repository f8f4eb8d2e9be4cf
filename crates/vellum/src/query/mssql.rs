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

//! SQL Server backend over tiberius.
//!
//! The TDS protocol distinguishes row streams from DONE counts up front, so
//! the statement's leading keyword decides whether we read rows or an
//! affected count.

use tiberius::{AuthMethod, Client, ColumnData, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{is_row_returning, stringify_binary, QueryOutput, TabularResult};
use crate::error::QueryError;
use crate::models::DataSource;

fn build_config(source: &DataSource) -> Result<Config, QueryError> {
    // Discrete fields win; the legacy connection string is the fallback.
    if source.host.is_some() {
        let mut config = Config::new();
        if let Some(host) = source.host.as_deref() {
            config.host(host);
        }
        if let Some(port) = source.effective_port() {
            config.port(port);
        }
        if let Some(database) = source.database.as_deref() {
            config.database(database);
        }
        if let (Some(user), Some(password)) =
            (source.username.as_deref(), source.password.as_deref())
        {
            config.authentication(AuthMethod::sql_server(user, password));
        }
        config.trust_cert();
        Ok(config)
    } else if let Some(raw) = source.connection_string.as_deref() {
        Config::from_ado_string(raw).map_err(|e| QueryError::InvalidDescriptor(e.to_string()))
    } else {
        Err(QueryError::InvalidDescriptor(
            "SQL Server sources need a host or a connection string".to_string(),
        ))
    }
}

async fn connect(source: &DataSource) -> Result<Client<Compat<TcpStream>>, QueryError> {
    let config = build_config(source)?;
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| QueryError::Connection(e.to_string()))?;
    tcp.set_nodelay(true)
        .map_err(|e| QueryError::Connection(e.to_string()))?;
    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| QueryError::Connection(e.to_string()))
}

fn stringify(value: &ColumnData<'_>) -> String {
    match value {
        ColumnData::U8(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::I16(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::I32(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::I64(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::F32(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::F64(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::Bit(v) => v.map(|b| b.to_string()).unwrap_or_default(),
        ColumnData::String(v) => v.as_deref().unwrap_or_default().to_string(),
        ColumnData::Guid(v) => v.map(|g| g.to_string()).unwrap_or_default(),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()).unwrap_or_default(),
        ColumnData::Binary(v) => v
            .as_deref()
            .map(stringify_binary)
            .unwrap_or_default(),
        other => format!("{other:?}"),
    }
}

pub(super) async fn execute(
    source: &DataSource,
    query: &str,
) -> Result<QueryOutput, QueryError> {
    let mut client = connect(source).await?;

    if is_row_returning(query) {
        let mut stream = client
            .simple_query(query)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let columns: Vec<String> = stream
            .columns()
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        if columns.is_empty() {
            return Ok(QueryOutput::RowsAffected(rows.len() as u64));
        }
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| stringify(&v)).collect())
            .collect();
        Ok(QueryOutput::Table(TabularResult { columns, rows }))
    } else {
        let result = client
            .execute(query, &[])
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        Ok(QueryOutput::RowsAffected(result.total()))
    }
}

pub(super) async fn probe(source: &DataSource) -> Result<String, QueryError> {
    match execute(source, "SELECT @@VERSION").await? {
        QueryOutput::Table(table) => Ok(table
            .rows
            .first()
            .and_then(|r| r.first())
            .cloned()
            .unwrap_or_default()),
        QueryOutput::RowsAffected(_) => Ok("connected".to_string()),
    }
}
