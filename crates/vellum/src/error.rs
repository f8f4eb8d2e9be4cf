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

//! Error types for the notebook engine.
//!
//! Each failure domain gets its own enum:
//!
//! - [`ConfigError`] — pre-flight failures surfaced before any execution
//!   starts. No run record is created when one of these fires.
//! - [`StoreError`] — record-layer failures (missing records, constraint
//!   violations).
//! - [`QueryError`] — data-source connectivity and query failures.
//! - [`MailError`] — mail construction and transport failures.
//! - [`CellError`] — any failure inside one cell's program, query, or mail
//!   send. Caught per cell by the cell runner, recorded on the cell, and
//!   never aborts the run.
//! - [`RunError`] — anything escaping the per-cell boundary. Marks the run
//!   failed and is re-raised to the caller after run finalization.

use thiserror::Error;
use uuid::Uuid;

use crate::script::ScriptError;

/// Pre-flight configuration failures, surfaced before execution starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The notebook is in scheduled mode but has no active schedule.
    #[error("notebook {0} is in scheduled mode but has no active schedule")]
    NoActiveSchedule(Uuid),

    /// The notebook is in scheduled mode; ad hoc execution is refused.
    #[error("notebook {0} is in scheduled mode and will run on its schedule")]
    ScheduledExecutionOnly(Uuid),
}

/// Record-layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// A standing constraint was violated by a write.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Data-source connectivity and query execution failures.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No data source is configured on the notebook.
    #[error("no data source configured for this notebook")]
    MissingDataSource,

    /// The configured data source has type `none`.
    #[error("SQL cells require a real data source (not 'No Data Source')")]
    SourceIsNone,

    /// The backend driver was not compiled into this build.
    #[error("{backend} support is not compiled in (enable the `{feature}` feature)")]
    DriverUnavailable {
        backend: &'static str,
        feature: &'static str,
    },

    /// The connection descriptor could not be built from the source fields.
    #[error("invalid connection configuration: {0}")]
    InvalidDescriptor(String),

    /// The backend was unreachable or rejected the connection.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The statement itself failed.
    #[error("query failed: {0}")]
    Execution(String),

    /// The CSV source has no file path configured.
    #[error("CSV path not configured")]
    CsvPathMissing,

    /// The CSV file could not be read or parsed.
    #[error("CSV file read failed: {0}")]
    Csv(String),
}

/// Mail construction and transport failures.
#[derive(Debug, Error)]
pub enum MailError {
    /// `send_mail` requires both a subject and at least one recipient.
    #[error("both subject and recipients (email_to) are required to send mail")]
    MissingSubjectOrRecipients,

    /// No mail transport was configured on the runner.
    #[error("no mail transport configured")]
    TransportUnavailable,

    /// The transport failed to build or send the message.
    #[error("mail transport error: {0}")]
    Transport(String),
}

/// Any failure inside one cell's program, query, or mail send.
///
/// These are caught by the cell runner: the cell is marked `error` with the
/// failure message and the run moves on to the next cell.
#[derive(Debug, Error)]
pub enum CellError {
    /// A script (python/mail) cell failed during evaluation.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A SQL cell's query failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A mail cell failed to construct or send a message.
    #[error(transparent)]
    Mail(#[from] MailError),

    /// The cell exceeded the configured execution timeout.
    #[error("cell execution timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A failure that escaped the per-cell boundary.
///
/// Per-cell failures are recorded and swallowed; only these abort the run,
/// mark it failed, and are re-raised after finalization.
#[derive(Debug, Error)]
pub enum RunError {
    /// Pre-flight configuration failure. The run record is never created.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The record layer failed while reading cells or writing results.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything else unexpected at the run level.
    #[error("unexpected run failure: {0}")]
    Unexpected(String),
}
