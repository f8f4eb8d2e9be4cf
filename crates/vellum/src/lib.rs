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

//! Vellum is an embeddable notebook execution engine: ordered cells of
//! markdown, python, SQL, mail and rich text, executed in sequence against
//! pluggable data sources, with results flowing between cells through a
//! run-scoped execution context.
//!
//! # Features
//!
//! - **Typed cells**: markdown and rich text render; python and mail cells
//!   evaluate through a pluggable [`ScriptEngine`](script::ScriptEngine);
//!   SQL cells execute against the notebook's data source.
//! - **Cross-cell results**: each cell's output is addressable from later
//!   cells by `In [N]` label or sequence, with fallback to the last
//!   persisted output.
//! - **Multi-backend queries**: PostgreSQL, SQL Server, Oracle and CSV
//!   sources behind cargo features, one scoped connection per statement.
//! - **Run history**: every execution opens a run record and finalizes it
//!   whatever happens, with cell counts, duration and sent-mail ids.
//! - **Interval scheduling**: at most one active schedule per notebook,
//!   fired by a host-driven tick with per-schedule failure isolation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vellum::{
//!     EngineConfig, MemoryStore, NewCell, NewNotebook, NotebookRunner,
//!     NotebookStore, Trigger,
//! };
//! use vellum::models::CellKind;
//! use vellum::script::NoScriptEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let notebook = store.create_notebook(NewNotebook::named("report")).await?;
//! store
//!     .create_cell(NewCell::new(notebook.id, CellKind::Markdown, "# Hello"))
//!     .await?;
//!
//! let runner = NotebookRunner::new(
//!     store.clone(),
//!     Arc::new(NoScriptEngine),
//!     EngineConfig::default(),
//! );
//! let run = runner.run(notebook.id, Trigger::Manual).await?;
//! assert!(run.succeeded());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod mail;
pub mod models;
pub mod query;
pub mod render;
pub mod runner;
pub mod scheduler;
pub mod script;
pub mod store;
pub mod transfer;

pub use config::EngineConfig;
pub use context::{CellIdentifier, ExecutionContext, ResultEntry};
pub use error::{CellError, ConfigError, MailError, QueryError, RunError, StoreError};
pub use mail::{MailTransport, OutgoingMail, Recipients, RecordingMailer};
pub use models::{
    Cell, CellKind, CellStatus, DataSource, ExecutionMode, IntervalUnit, NewCell,
    NewDataSource, NewNotebook, NewSchedule, Notebook, Run, RunState, Schedule, SourceType,
    Trigger,
};
pub use query::{QueryExecutor, QueryOutput, TabularResult};
pub use render::render_markdown;
pub use runner::NotebookRunner;
pub use scheduler::{Scheduler, TickSummary};
pub use store::{MemoryStore, NotebookStore};
pub use transfer::{export_notebook, import_notebook, NotebookDocument};
