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

//! Record storage behind the [`NotebookStore`] trait.
//!
//! The engine never talks to a database directly; embedding hosts provide a
//! store implementation and the engine goes through it for every read and
//! write. [`MemoryStore`] is the in-process implementation used by tests
//! and by hosts that keep notebooks ephemeral.
//!
//! The store enforces the standing record constraints:
//!
//! - new cells without an explicit sequence get `max existing + 10`;
//! - a SQL cell's notebook must reference a data source whose type is not
//!   `none`;
//! - a notebook has at most one active schedule;
//! - schedule edits touching the recurrence recompute `next_run`;
//! - deleting a notebook cascades to its cells, schedules and runs;
//! - notebook cell statistics are recomputed after every cell write.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::cell::SEQUENCE_STEP;
use crate::models::notebook::duplicate_name;
use crate::models::{
    Cell, CellKind, CellOutput, CellStatus, DataSource, NewCell, NewDataSource, NewNotebook,
    NewRun, NewSchedule, Notebook, NotebookStats, Run, Schedule, SourceType,
};

/// Record storage seam between the engine and the embedding host.
#[async_trait]
pub trait NotebookStore: Send + Sync {
    // Notebooks
    async fn create_notebook(&self, new: NewNotebook) -> Result<Notebook, StoreError>;
    async fn get_notebook(&self, id: Uuid) -> Result<Notebook, StoreError>;
    async fn update_notebook(&self, notebook: Notebook) -> Result<(), StoreError>;
    /// Deletes the notebook and cascades to its cells, schedules and runs.
    async fn delete_notebook(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError>;
    /// Duplicates a notebook and its cell inputs under a `copyN` name; the
    /// copies start pending with empty outputs.
    async fn duplicate_notebook(&self, id: Uuid) -> Result<Notebook, StoreError>;

    // Cells
    async fn create_cell(&self, new: NewCell) -> Result<Cell, StoreError>;
    async fn get_cell(&self, id: Uuid) -> Result<Cell, StoreError>;
    async fn update_cell(&self, cell: Cell) -> Result<(), StoreError>;
    async fn delete_cell(&self, id: Uuid) -> Result<(), StoreError>;
    /// Cells of a notebook in ascending sequence order.
    async fn list_cells(&self, notebook_id: Uuid) -> Result<Vec<Cell>, StoreError>;
    /// Resets every cell of the notebook to pending with empty output.
    async fn clear_outputs(&self, notebook_id: Uuid) -> Result<(), StoreError>;

    // Data sources
    async fn create_data_source(&self, new: NewDataSource) -> Result<DataSource, StoreError>;
    async fn get_data_source(&self, id: Uuid) -> Result<DataSource, StoreError>;
    async fn update_data_source(&self, source: DataSource) -> Result<(), StoreError>;
    async fn delete_data_source(&self, id: Uuid) -> Result<(), StoreError>;

    // Schedules
    async fn create_schedule(&self, new: NewSchedule) -> Result<Schedule, StoreError>;
    async fn get_schedule(&self, id: Uuid) -> Result<Schedule, StoreError>;
    /// Writes a schedule back. Edits touching `active`, `start_datetime`
    /// or the interval recompute `next_run`; writes that leave the
    /// recurrence alone keep the stamp the caller set.
    async fn update_schedule(&self, schedule: Schedule) -> Result<(), StoreError>;
    async fn delete_schedule(&self, id: Uuid) -> Result<(), StoreError>;
    /// The notebook's active schedule, if any.
    async fn active_schedule(&self, notebook_id: Uuid) -> Result<Option<Schedule>, StoreError>;
    /// Active schedules due at `now`, ascending by `next_run`, at most
    /// `limit` of them.
    async fn due_schedules(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Schedule>, StoreError>;

    // Runs
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError>;
    async fn get_run(&self, id: Uuid) -> Result<Run, StoreError>;
    async fn update_run(&self, run: Run) -> Result<(), StoreError>;
    /// Runs of a notebook, most recent first.
    async fn list_runs(&self, notebook_id: Uuid) -> Result<Vec<Run>, StoreError>;
}

#[derive(Default)]
struct Records {
    notebooks: HashMap<Uuid, Notebook>,
    cells: HashMap<Uuid, Cell>,
    data_sources: HashMap<Uuid, DataSource>,
    schedules: HashMap<Uuid, Schedule>,
    runs: HashMap<Uuid, Run>,
}

impl Records {
    fn notebook(&self, id: Uuid) -> Result<&Notebook, StoreError> {
        self.notebooks.get(&id).ok_or(StoreError::NotFound {
            kind: "notebook",
            id,
        })
    }

    fn cells_of(&self, notebook_id: Uuid) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self
            .cells
            .values()
            .filter(|c| c.notebook_id == notebook_id)
            .cloned()
            .collect();
        cells.sort_by_key(|c| (c.sequence, c.id));
        cells
    }

    fn next_sequence(&self, notebook_id: Uuid) -> i32 {
        self.cells
            .values()
            .filter(|c| c.notebook_id == notebook_id)
            .map(|c| c.sequence)
            .max()
            .map_or(SEQUENCE_STEP, |max| max + SEQUENCE_STEP)
    }

    fn recompute_stats(&mut self, notebook_id: Uuid) {
        let mut stats = NotebookStats::default();
        for cell in self.cells.values().filter(|c| c.notebook_id == notebook_id) {
            stats.cell_total += 1;
            match cell.status {
                CellStatus::Success => stats.success_count += 1,
                CellStatus::Error => stats.failed_count += 1,
                CellStatus::Pending => {}
            }
        }
        if let Some(notebook) = self.notebooks.get_mut(&notebook_id) {
            notebook.stats = stats;
        }
    }

    /// SQL cells require the notebook's data source to exist and to have a
    /// real type.
    fn check_sql_source(&self, notebook_id: Uuid, kind: CellKind) -> Result<(), StoreError> {
        if kind != CellKind::Sql {
            return Ok(());
        }
        let notebook = self.notebook(notebook_id)?;
        let source_type = notebook
            .data_source_id
            .and_then(|id| self.data_sources.get(&id))
            .map(|s| s.source_type);
        match source_type {
            Some(t) if t != SourceType::None => Ok(()),
            _ => Err(StoreError::Constraint(
                "SQL cells require a notebook data source that is not 'No Data Source'".into(),
            )),
        }
    }
}

/// In-memory [`NotebookStore`].
///
/// Cloning is cheap; clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Records>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotebookStore for MemoryStore {
    async fn create_notebook(&self, new: NewNotebook) -> Result<Notebook, StoreError> {
        let notebook = Notebook {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            owner: new.owner,
            data_source_id: new.data_source_id,
            execution_mode: new.execution_mode,
            last_run: None,
            stats: NotebookStats::default(),
            created_at: Utc::now(),
        };
        self.records
            .write()
            .notebooks
            .insert(notebook.id, notebook.clone());
        Ok(notebook)
    }

    async fn get_notebook(&self, id: Uuid) -> Result<Notebook, StoreError> {
        self.records.read().notebook(id).cloned()
    }

    async fn update_notebook(&self, notebook: Notebook) -> Result<(), StoreError> {
        let mut records = self.records.write();
        records.notebook(notebook.id)?;
        records.notebooks.insert(notebook.id, notebook);
        Ok(())
    }

    async fn delete_notebook(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write();
        records.notebook(id)?;
        records.notebooks.remove(&id);
        records.cells.retain(|_, c| c.notebook_id != id);
        records.schedules.retain(|_, s| s.notebook_id != id);
        records.runs.retain(|_, r| r.notebook_id != id);
        Ok(())
    }

    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError> {
        let records = self.records.read();
        let mut notebooks: Vec<Notebook> = records.notebooks.values().cloned().collect();
        notebooks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(notebooks)
    }

    async fn duplicate_notebook(&self, id: Uuid) -> Result<Notebook, StoreError> {
        let mut records = self.records.write();
        let original = records.notebook(id)?.clone();

        let mut name = duplicate_name(&original.name);
        while records.notebooks.values().any(|n| n.name == name) {
            name = duplicate_name(&name);
        }

        let copy = Notebook {
            id: Uuid::new_v4(),
            name,
            last_run: None,
            stats: NotebookStats::default(),
            created_at: Utc::now(),
            ..original
        };
        let copy_id = copy.id;
        records.notebooks.insert(copy_id, copy.clone());

        let cells = records.cells_of(id);
        for cell in cells {
            let duplicated = Cell {
                id: Uuid::new_v4(),
                notebook_id: copy_id,
                sequence: cell.sequence,
                kind: cell.kind,
                input_source: cell.input_source,
                output: CellOutput::default(),
                status: CellStatus::Pending,
                last_run: None,
                elapsed_ms: 0.0,
            };
            records.cells.insert(duplicated.id, duplicated);
        }
        records.recompute_stats(copy_id);
        records.notebook(copy_id).cloned()
    }

    async fn create_cell(&self, new: NewCell) -> Result<Cell, StoreError> {
        let mut records = self.records.write();
        records.check_sql_source(new.notebook_id, new.kind)?;
        let sequence = new
            .sequence
            .unwrap_or_else(|| records.next_sequence(new.notebook_id));
        let cell = Cell {
            id: Uuid::new_v4(),
            notebook_id: new.notebook_id,
            sequence,
            kind: new.kind,
            input_source: new.input_source,
            output: CellOutput::default(),
            status: CellStatus::Pending,
            last_run: None,
            elapsed_ms: 0.0,
        };
        records.cells.insert(cell.id, cell.clone());
        records.recompute_stats(cell.notebook_id);
        Ok(cell)
    }

    async fn get_cell(&self, id: Uuid) -> Result<Cell, StoreError> {
        self.records
            .read()
            .cells
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "cell", id })
    }

    async fn update_cell(&self, cell: Cell) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if !records.cells.contains_key(&cell.id) {
            return Err(StoreError::NotFound {
                kind: "cell",
                id: cell.id,
            });
        }
        records.check_sql_source(cell.notebook_id, cell.kind)?;
        let notebook_id = cell.notebook_id;
        records.cells.insert(cell.id, cell);
        records.recompute_stats(notebook_id);
        Ok(())
    }

    async fn delete_cell(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let cell = records
            .cells
            .remove(&id)
            .ok_or(StoreError::NotFound { kind: "cell", id })?;
        records.recompute_stats(cell.notebook_id);
        Ok(())
    }

    async fn list_cells(&self, notebook_id: Uuid) -> Result<Vec<Cell>, StoreError> {
        let records = self.records.read();
        records.notebook(notebook_id)?;
        Ok(records.cells_of(notebook_id))
    }

    async fn clear_outputs(&self, notebook_id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write();
        records.notebook(notebook_id)?;
        for cell in records
            .cells
            .values_mut()
            .filter(|c| c.notebook_id == notebook_id)
        {
            cell.output = CellOutput::default();
            cell.status = CellStatus::Pending;
            cell.last_run = None;
            cell.elapsed_ms = 0.0;
        }
        records.recompute_stats(notebook_id);
        Ok(())
    }

    async fn create_data_source(&self, new: NewDataSource) -> Result<DataSource, StoreError> {
        let source = DataSource {
            id: Uuid::new_v4(),
            name: new.name,
            source_type: new.source_type,
            host: new.host,
            port: new.port,
            database: new.database,
            schema: new.schema,
            username: new.username,
            password: new.password,
            csv_path: new.csv_path,
            connection_string: new.connection_string,
            description: new.description,
        };
        self.records
            .write()
            .data_sources
            .insert(source.id, source.clone());
        Ok(source)
    }

    async fn get_data_source(&self, id: Uuid) -> Result<DataSource, StoreError> {
        self.records
            .read()
            .data_sources
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: "data source",
                id,
            })
    }

    async fn update_data_source(&self, source: DataSource) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if !records.data_sources.contains_key(&source.id) {
            return Err(StoreError::NotFound {
                kind: "data source",
                id: source.id,
            });
        }
        records.data_sources.insert(source.id, source);
        Ok(())
    }

    async fn delete_data_source(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write();
        records.data_sources.remove(&id).ok_or(StoreError::NotFound {
            kind: "data source",
            id,
        })?;
        Ok(())
    }

    async fn create_schedule(&self, new: NewSchedule) -> Result<Schedule, StoreError> {
        let mut records = self.records.write();
        records.notebook(new.notebook_id)?;
        if new.active
            && records
                .schedules
                .values()
                .any(|s| s.notebook_id == new.notebook_id && s.active)
        {
            return Err(StoreError::Constraint(
                "notebook already has an active schedule".into(),
            ));
        }
        let mut schedule = Schedule {
            id: Uuid::new_v4(),
            notebook_id: new.notebook_id,
            name: new.name,
            start_datetime: new.start_datetime,
            end_datetime: new.end_datetime,
            interval_number: new.interval_number.max(1),
            interval_unit: new.interval_unit,
            next_run: None,
            active: new.active,
            last_run: None,
            run_count: 0,
        };
        schedule.next_run = schedule.compute_next_run(Utc::now());
        records.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Schedule, StoreError> {
        self.records
            .read()
            .schedules
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: "schedule",
                id,
            })
    }

    async fn update_schedule(&self, schedule: Schedule) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let previous = records
            .schedules
            .get(&schedule.id)
            .ok_or(StoreError::NotFound {
                kind: "schedule",
                id: schedule.id,
            })?;
        if schedule.active
            && records
                .schedules
                .values()
                .any(|s| s.notebook_id == schedule.notebook_id && s.active && s.id != schedule.id)
        {
            return Err(StoreError::Constraint(
                "notebook already has an active schedule".into(),
            ));
        }
        // Edits to the recurrence invalidate the stored stamp; the
        // scheduler's own advance leaves these fields alone and keeps the
        // next_run it computed.
        let mut schedule = schedule;
        if previous.active != schedule.active
            || previous.start_datetime != schedule.start_datetime
            || previous.interval_number != schedule.interval_number
            || previous.interval_unit != schedule.interval_unit
        {
            schedule.next_run = schedule.compute_next_run(Utc::now());
        }
        records.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<(), StoreError> {
        self.records
            .write()
            .schedules
            .remove(&id)
            .ok_or(StoreError::NotFound {
                kind: "schedule",
                id,
            })?;
        Ok(())
    }

    async fn active_schedule(&self, notebook_id: Uuid) -> Result<Option<Schedule>, StoreError> {
        Ok(self
            .records
            .read()
            .schedules
            .values()
            .find(|s| s.notebook_id == notebook_id && s.active)
            .cloned())
    }

    async fn due_schedules(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Schedule>, StoreError> {
        let records = self.records.read();
        let mut due: Vec<Schedule> = records
            .schedules
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_run);
        due.truncate(limit);
        Ok(due)
    }

    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError> {
        let mut records = self.records.write();
        records.notebook(new.notebook_id)?;
        let run = Run {
            id: Uuid::new_v4(),
            notebook_id: new.notebook_id,
            schedule_id: new.schedule_id,
            name: new.name,
            trigger: new.trigger,
            started_at: Utc::now(),
            finished_at: None,
            state: None,
            duration_seconds: None,
            message: None,
            cell_total: 0,
            failed_cells: 0,
            mail_ids: Vec::new(),
        };
        records.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: Uuid) -> Result<Run, StoreError> {
        self.records
            .read()
            .runs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "run", id })
    }

    async fn update_run(&self, run: Run) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if !records.runs.contains_key(&run.id) {
            return Err(StoreError::NotFound {
                kind: "run",
                id: run.id,
            });
        }
        records.runs.insert(run.id, run);
        Ok(())
    }

    async fn list_runs(&self, notebook_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let records = self.records.read();
        let mut runs: Vec<Run> = records
            .runs
            .values()
            .filter(|r| r.notebook_id == notebook_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntervalUnit;

    async fn notebook_with_store() -> (MemoryStore, Notebook) {
        let store = MemoryStore::new();
        let notebook = store
            .create_notebook(NewNotebook::named("report"))
            .await
            .unwrap();
        (store, notebook)
    }

    #[tokio::test]
    async fn sequences_default_with_step_spacing() {
        let (store, notebook) = notebook_with_store().await;
        let a = store
            .create_cell(NewCell::new(notebook.id, CellKind::Markdown, "# a"))
            .await
            .unwrap();
        let b = store
            .create_cell(NewCell::new(notebook.id, CellKind::Python, "print(1)"))
            .await
            .unwrap();
        let c = store
            .create_cell(NewCell::new(notebook.id, CellKind::Python, "print(2)"))
            .await
            .unwrap();
        assert_eq!((a.sequence, b.sequence, c.sequence), (10, 20, 30));
    }

    #[tokio::test]
    async fn explicit_sequence_is_respected() {
        let (store, notebook) = notebook_with_store().await;
        store
            .create_cell(NewCell::new(notebook.id, CellKind::Markdown, "# a").at_sequence(5))
            .await
            .unwrap();
        let next = store
            .create_cell(NewCell::new(notebook.id, CellKind::Markdown, "# b"))
            .await
            .unwrap();
        assert_eq!(next.sequence, 15);
    }

    #[tokio::test]
    async fn sql_cell_requires_real_data_source() {
        let (store, notebook) = notebook_with_store().await;
        let err = store
            .create_cell(NewCell::new(notebook.id, CellKind::Sql, "select 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let source = store
            .create_data_source(NewDataSource {
                name: "dw".into(),
                source_type: SourceType::None,
                ..Default::default()
            })
            .await
            .unwrap();
        let mut with_none = notebook.clone();
        with_none.data_source_id = Some(source.id);
        store.update_notebook(with_none).await.unwrap();
        let err = store
            .create_cell(NewCell::new(notebook.id, CellKind::Sql, "select 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn single_active_schedule_per_notebook() {
        let (store, notebook) = notebook_with_store().await;
        let start = Utc::now();
        store
            .create_schedule(NewSchedule::new(notebook.id, start, 1, IntervalUnit::Days))
            .await
            .unwrap();
        let err = store
            .create_schedule(NewSchedule::new(notebook.id, start, 1, IntervalUnit::Hours))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        // An inactive second schedule is fine.
        let mut inactive = NewSchedule::new(notebook.id, start, 1, IntervalUnit::Hours);
        inactive.active = false;
        store.create_schedule(inactive).await.unwrap();
    }

    #[tokio::test]
    async fn past_start_schedule_is_due_on_ticks_captured_before_creation() {
        let (store, notebook) = notebook_with_store().await;
        // A tick timestamp taken before the schedule exists must still see
        // a past-start schedule as due.
        let tick = Utc::now();
        let schedule = store
            .create_schedule(NewSchedule::new(
                notebook.id,
                tick - chrono::Duration::hours(2),
                1,
                IntervalUnit::Hours,
            ))
            .await
            .unwrap();
        assert_eq!(schedule.next_run, Some(schedule.start_datetime));

        let due = store.due_schedules(tick, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, schedule.id);
    }

    #[tokio::test]
    async fn reactivating_a_schedule_restores_its_next_run() {
        let (store, notebook) = notebook_with_store().await;
        let start = Utc::now() - chrono::Duration::hours(2);
        let mut new = NewSchedule::new(notebook.id, start, 1, IntervalUnit::Hours);
        new.active = false;
        let mut schedule = store.create_schedule(new).await.unwrap();
        assert_eq!(schedule.next_run, None);

        schedule.active = true;
        store.update_schedule(schedule.clone()).await.unwrap();
        let reloaded = store.get_schedule(schedule.id).await.unwrap();
        assert_eq!(reloaded.next_run, Some(start));
        let due = store.due_schedules(Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);

        // Moving the start into the future pushes next_run with it.
        let mut rescheduled = reloaded;
        rescheduled.start_datetime = Utc::now() + chrono::Duration::days(1);
        store.update_schedule(rescheduled.clone()).await.unwrap();
        let reloaded = store.get_schedule(rescheduled.id).await.unwrap();
        assert!(reloaded.next_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn delete_notebook_cascades_to_cells_and_schedules() {
        let (store, notebook) = notebook_with_store().await;
        let cell = store
            .create_cell(NewCell::new(notebook.id, CellKind::Markdown, "# a"))
            .await
            .unwrap();
        store
            .create_schedule(NewSchedule::new(
                notebook.id,
                Utc::now(),
                1,
                IntervalUnit::Days,
            ))
            .await
            .unwrap();
        store.delete_notebook(notebook.id).await.unwrap();
        assert!(store.get_cell(cell.id).await.is_err());
        assert!(store
            .active_schedule(notebook.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_copies_inputs_and_resets_state() {
        let (store, notebook) = notebook_with_store().await;
        let mut cell = store
            .create_cell(NewCell::new(notebook.id, CellKind::Python, "print(1)"))
            .await
            .unwrap();
        cell.status = CellStatus::Success;
        cell.output.text = "1".into();
        store.update_cell(cell).await.unwrap();

        let copy = store.duplicate_notebook(notebook.id).await.unwrap();
        assert_eq!(copy.name, "report copy1");
        let cells = store.list_cells(copy.id).await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].input_source, "print(1)");
        assert_eq!(cells[0].status, CellStatus::Pending);
        assert!(cells[0].output.text.is_empty());

        let second = store.duplicate_notebook(notebook.id).await.unwrap();
        assert_eq!(second.name, "report copy2");
    }

    #[tokio::test]
    async fn stats_follow_cell_states() {
        let (store, notebook) = notebook_with_store().await;
        let mut a = store
            .create_cell(NewCell::new(notebook.id, CellKind::Python, "x"))
            .await
            .unwrap();
        let mut b = store
            .create_cell(NewCell::new(notebook.id, CellKind::Python, "y"))
            .await
            .unwrap();
        a.status = CellStatus::Success;
        b.status = CellStatus::Error;
        store.update_cell(a).await.unwrap();
        store.update_cell(b).await.unwrap();

        let stats = store.get_notebook(notebook.id).await.unwrap().stats;
        assert_eq!(stats.cell_total, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.failed_count, 1);

        store.clear_outputs(notebook.id).await.unwrap();
        let stats = store.get_notebook(notebook.id).await.unwrap().stats;
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.failed_count, 0);
        assert_eq!(stats.cell_total, 2);
    }
}
