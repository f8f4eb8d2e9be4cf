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

//! Scheduler tick behavior.

use std::sync::Arc;

use chrono::{Duration, Utc};
use vellum::models::{CellKind, ExecutionMode, IntervalUnit};
use vellum::{
    EngineConfig, MemoryStore, NewCell, NewNotebook, NewSchedule, NotebookRunner, NotebookStore,
    RunState, Scheduler, Trigger,
};

use crate::fixtures::{add_cell, run_fixture, FlakyStore, MockScriptEngine};

#[tokio::test]
async fn past_start_fires_on_first_tick_and_advances() {
    let fixture = run_fixture("nightly").await;
    add_cell(&fixture, CellKind::Python, "print tick").await;
    let mut notebook = fixture.notebook.clone();
    notebook.execution_mode = ExecutionMode::Scheduled;
    fixture.store.update_notebook(notebook.clone()).await.unwrap();

    let now = Utc::now();
    let schedule = fixture
        .store
        .create_schedule(NewSchedule::new(
            notebook.id,
            now - Duration::hours(1),
            1,
            IntervalUnit::Days,
        ))
        .await
        .unwrap();
    // Never run, start in the past: due immediately.
    assert!(schedule.next_run.is_some());
    assert!(schedule.next_run.unwrap() <= now);

    let scheduler = Scheduler::new(fixture.runner.clone());
    let summary = scheduler.run_due_schedules(now).await.unwrap();
    assert_eq!(summary.fired, vec![schedule.id]);
    assert!(summary.expired.is_empty());
    assert!(summary.failed.is_empty());

    let advanced = fixture.store.get_schedule(schedule.id).await.unwrap();
    assert_eq!(advanced.last_run, Some(now));
    assert_eq!(advanced.run_count, 1);
    assert_eq!(advanced.next_run, Some(now + Duration::days(1)));

    let runs = fixture.store.list_runs(notebook.id).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].trigger, Trigger::Schedule);
    assert_eq!(runs[0].schedule_id, Some(schedule.id));
    assert_eq!(runs[0].state, Some(RunState::Success));

    // Not due again until the next interval.
    let summary = scheduler.run_due_schedules(now).await.unwrap();
    assert!(summary.fired.is_empty());
}

#[tokio::test]
async fn future_start_is_not_due() {
    let fixture = run_fixture("later").await;
    let now = Utc::now();
    let schedule = fixture
        .store
        .create_schedule(NewSchedule::new(
            fixture.notebook.id,
            now + Duration::hours(2),
            1,
            IntervalUnit::Hours,
        ))
        .await
        .unwrap();
    assert!(schedule.next_run.unwrap() > now);

    let scheduler = Scheduler::new(fixture.runner.clone());
    let summary = scheduler.run_due_schedules(now).await.unwrap();
    assert!(summary.fired.is_empty());
    assert!(fixture
        .store
        .list_runs(fixture.notebook.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn end_dated_schedules_deactivate_instead_of_firing() {
    let fixture = run_fixture("retired").await;
    let now = Utc::now();
    let mut new = NewSchedule::new(
        fixture.notebook.id,
        now - Duration::days(7),
        1,
        IntervalUnit::Days,
    );
    new.end_datetime = Some(now - Duration::days(1));
    let schedule = fixture.store.create_schedule(new).await.unwrap();

    let scheduler = Scheduler::new(fixture.runner.clone());
    let summary = scheduler.run_due_schedules(now).await.unwrap();
    assert_eq!(summary.expired, vec![schedule.id]);
    assert!(summary.fired.is_empty());

    let retired = fixture.store.get_schedule(schedule.id).await.unwrap();
    assert!(!retired.active);
    assert!(retired.next_run.is_none());
    assert!(fixture
        .store
        .list_runs(fixture.notebook.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn one_failing_schedule_does_not_block_the_rest() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let runner = NotebookRunner::new(
        store.clone(),
        Arc::new(MockScriptEngine),
        EngineConfig::default(),
    );
    let now = Utc::now();

    let healthy_notebook = store
        .create_notebook(NewNotebook::named("healthy"))
        .await
        .unwrap();
    store
        .create_cell(NewCell::new(
            healthy_notebook.id,
            CellKind::Python,
            "print ok",
        ))
        .await
        .unwrap();
    let healthy = store
        .create_schedule(NewSchedule::new(
            healthy_notebook.id,
            now - Duration::hours(2),
            1,
            IntervalUnit::Hours,
        ))
        .await
        .unwrap();

    let doomed_notebook = store
        .create_notebook(NewNotebook::named("doomed"))
        .await
        .unwrap();
    store
        .create_cell(NewCell::new(
            doomed_notebook.id,
            CellKind::Python,
            "print ok",
        ))
        .await
        .unwrap();
    let doomed = store
        .create_schedule(NewSchedule::new(
            doomed_notebook.id,
            now - Duration::hours(3),
            1,
            IntervalUnit::Hours,
        ))
        .await
        .unwrap();
    store.break_notebook(doomed_notebook.id);

    let scheduler = Scheduler::new(runner);
    let summary = scheduler.run_due_schedules(now).await.unwrap();
    assert_eq!(summary.fired, vec![healthy.id]);
    assert_eq!(summary.failed, vec![doomed.id]);
    assert!(summary.expired.is_empty());

    // The healthy schedule advanced; the failing one will be retried.
    let advanced = store.get_schedule(healthy.id).await.unwrap();
    assert_eq!(advanced.run_count, 1);
    let stuck = store.get_schedule(doomed.id).await.unwrap();
    assert_eq!(stuck.run_count, 0);
    assert!(stuck.last_run.is_none());
    assert_eq!(stuck.next_run, doomed.next_run);

    assert_eq!(store.list_runs(healthy_notebook.id).await.unwrap().len(), 1);
    // The failing notebook still finalized its run record as failed.
    let doomed_runs = store.list_runs(doomed_notebook.id).await.unwrap();
    assert_eq!(doomed_runs.len(), 1);
    assert_eq!(doomed_runs[0].state, Some(RunState::Failed));
}
