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

//! Domain records the engine operates on.
//!
//! The engine treats these as addressable mutable records behind the
//! [`NotebookStore`](crate::store::NotebookStore) trait; persistence
//! mechanics belong to the embedding host.

pub mod cell;
pub mod data_source;
pub mod notebook;
pub mod run;
pub mod schedule;

pub use cell::{Cell, CellKind, CellOutput, CellStatus, ExportFile, NewCell};
pub use data_source::{DataSource, NewDataSource, SourceType};
pub use notebook::{ExecutionMode, NewNotebook, Notebook, NotebookStats};
pub use run::{NewRun, Run, RunState, Trigger};
pub use schedule::{IntervalUnit, NewSchedule, Schedule};
