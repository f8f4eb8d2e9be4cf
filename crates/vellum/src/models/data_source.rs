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

//! Data source connection profiles.
//!
//! A data source is either a native database (PostgreSQL, Oracle, MSSQL)
//! described by discrete host/port/database/schema/credential fields, a CSV
//! file path, or `none`. Connection descriptors are built from the discrete
//! fields; a legacy raw connection string is honored as a fallback,
//! including translation of JDBC-style PostgreSQL URLs into native
//! key-value DSNs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The backend a data source connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// No data source; SQL cells are rejected.
    None,
    #[default]
    Postgresql,
    Oracle,
    Csv,
    Mssql,
}

impl SourceType {
    /// Well-known default port for the backend, if it has one.
    ///
    /// The `mysql` entry in [`default_port_for`] exists only for legacy
    /// profiles imported from older installations.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            SourceType::Postgresql => Some(5432),
            SourceType::Oracle => Some(1521),
            SourceType::Mssql => Some(1433),
            SourceType::None | SourceType::Csv => None,
        }
    }
}

/// Default port for a backend named by its legacy string tag.
pub fn default_port_for(source_type: &str) -> Option<u16> {
    match source_type {
        "postgresql" => Some(5432),
        "oracle" => Some(1521),
        "mssql" => Some(1433),
        "mysql" => Some(3306),
        _ => None,
    }
}

/// A data source record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    pub source_type: SourceType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Absolute path to the file when `source_type` is CSV.
    pub csv_path: Option<String>,
    /// Legacy raw connection string, used when discrete fields are absent.
    pub connection_string: Option<String>,
    pub description: Option<String>,
}

impl DataSource {
    /// The effective port: explicit, or the backend default.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.source_type.default_port())
    }

    /// Builds a PostgreSQL key-value DSN (`host=... port=... dbname=...`).
    ///
    /// Discrete fields win; otherwise the legacy connection string is used,
    /// with JDBC-style URLs translated, and missing credentials / schema
    /// appended.
    pub fn postgres_dsn(&self) -> String {
        if let (Some(host), Some(database)) = (self.host.as_deref(), self.database.as_deref()) {
            let mut parts = vec![format!("host={}", host)];
            if let Some(port) = self.effective_port() {
                parts.push(format!("port={}", port));
            }
            parts.push(format!("dbname={}", database));
            if let Some(user) = self.username.as_deref() {
                parts.push(format!("user={}", user));
            }
            if let Some(password) = self.password.as_deref() {
                parts.push(format!("password={}", password));
            }
            if let Some(schema) = self.schema.as_deref() {
                // Quote the options value so it is not split on spaces.
                parts.push(format!("options='-c search_path={}'", schema));
            }
            return parts.join(" ");
        }

        let mut dsn = self.connection_string.clone().unwrap_or_default();
        if dsn.starts_with("jdbc:postgresql://") {
            dsn = jdbc_to_kv_dsn(&dsn);
        }
        if !dsn.contains("user=") {
            if let (Some(user), Some(password)) =
                (self.username.as_deref(), self.password.as_deref())
            {
                dsn.push_str(&format!(" user={} password={}", user, password));
            }
        }
        if !dsn.contains("search_path") {
            if let Some(schema) = self.schema.as_deref() {
                dsn.push_str(&format!(" options='-c search_path={}'", schema));
            }
        }
        dsn.trim().to_string()
    }

    /// Builds an Oracle easy-connect descriptor (`//host:port/service`).
    pub fn oracle_connect_string(&self) -> String {
        let host = self.host.as_deref().unwrap_or("localhost");
        let port = self.effective_port().unwrap_or(1521);
        match self.database.as_deref() {
            Some(service) => format!("//{}:{}/{}", host, port, service),
            None => format!("//{}:{}", host, port),
        }
    }
}

/// Translates `jdbc:postgresql://host:port/db?user=X&password=Y` into a
/// native key-value DSN.
fn jdbc_to_kv_dsn(jdbc_url: &str) -> String {
    let native = jdbc_url.trim_start_matches("jdbc:");
    let parsed = match url::Url::parse(native) {
        Ok(parsed) => parsed,
        // Not a parseable URL; pass it through and let the driver complain.
        Err(_) => return jdbc_url.to_string(),
    };

    let host = parsed.host_str().unwrap_or("localhost");
    let port = parsed.port().unwrap_or(5432);
    let database = parsed.path().trim_start_matches('/');

    let mut user = String::new();
    let mut password = String::new();
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "user" => user = value.into_owned(),
            "password" => password = value.into_owned(),
            _ => {}
        }
    }

    format!(
        "host={} port={} dbname={} user={} password={}",
        host, port, database, user, password
    )
}

/// Values for creating a data source record.
#[derive(Debug, Clone, Default)]
pub struct NewDataSource {
    pub name: String,
    pub source_type: SourceType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub csv_path: Option<String>,
    pub connection_string: Option<String>,
    pub description: Option<String>,
}

impl NewDataSource {
    /// Creates a profile of the given type with a name and nothing else.
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
            ..Default::default()
        }
    }
}
