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

//! End-to-end notebook run behavior.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vellum::models::{CellKind, CellStatus, ExecutionMode, IntervalUnit};
use vellum::{
    ConfigError, EngineConfig, MemoryStore, NewCell, NewDataSource, NewNotebook, NewSchedule,
    NotebookRunner, NotebookStore, RunError, RunState, Trigger,
};

use crate::fixtures::{add_cell, run_fixture, FlakyStore, MockScriptEngine};

#[tokio::test]
async fn text_only_notebook_always_succeeds() {
    let fixture = run_fixture("docs").await;
    add_cell(&fixture, CellKind::Markdown, "# Title\n\nbody").await;
    add_cell(&fixture, CellKind::RichText, "<p>already html</p>").await;

    let run = fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();
    assert_eq!(run.state, Some(RunState::Success));
    assert_eq!(run.cell_total, 2);
    assert_eq!(run.failed_cells, 0);

    let cells = fixture.store.list_cells(fixture.notebook.id).await.unwrap();
    assert!(cells[0].output.html.contains("<h1>"));
    assert_eq!(cells[1].output.html, "<p>already html</p>");
    assert!(cells.iter().all(|c| c.status == CellStatus::Success));
    assert!(cells.iter().all(|c| c.last_run.is_some()));
}

#[tokio::test]
async fn failing_cell_does_not_stop_the_run() {
    let fixture = run_fixture("resilient").await;
    add_cell(&fixture, CellKind::Python, "print one").await;
    add_cell(&fixture, CellKind::Python, "print two").await;
    add_cell(&fixture, CellKind::Python, "fail boom").await;
    add_cell(&fixture, CellKind::Python, "print four").await;
    add_cell(&fixture, CellKind::Python, "print five").await;

    let run = fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();
    // The run completes; the failure is recorded on the cell.
    assert_eq!(run.state, Some(RunState::Success));
    assert_eq!(run.cell_total, 5);
    assert_eq!(run.failed_cells, 1);

    let cells = fixture.store.list_cells(fixture.notebook.id).await.unwrap();
    let statuses: Vec<CellStatus> = cells.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            CellStatus::Success,
            CellStatus::Success,
            CellStatus::Error,
            CellStatus::Success,
            CellStatus::Success,
        ]
    );
    assert!(cells[2].output.text.contains("boom"));
    assert!(cells[2].output.html.contains("text-danger"));
    assert_eq!(cells[4].output.text, "five");
}

#[tokio::test]
async fn later_cells_see_earlier_results_by_label() {
    let fixture = run_fixture("context").await;
    let first = add_cell(&fixture, CellKind::Python, "print forty-two").await;
    add_cell(
        &fixture,
        CellKind::Python,
        &format!("recall In [{}]", first.sequence),
    )
    .await;

    fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();
    let cells = fixture.store.list_cells(fixture.notebook.id).await.unwrap();
    assert_eq!(cells[1].output.text, "forty-two");
}

#[tokio::test]
async fn persisted_output_backs_lookups_across_runs() {
    let fixture = run_fixture("persistence").await;
    let producer = add_cell(&fixture, CellKind::Python, "print cached").await;
    fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();

    // The recalling cell sits before the producer in sequence order, so
    // during the second run the producer has not executed yet and the
    // lookup must fall back to its persisted output from the first run.
    fixture
        .store
        .create_cell(
            NewCell::new(
                fixture.notebook.id,
                CellKind::Python,
                format!("recall In [{}]", producer.sequence),
            )
            .at_sequence(producer.sequence - 5),
        )
        .await
        .unwrap();
    fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();
    let cells = fixture.store.list_cells(fixture.notebook.id).await.unwrap();
    assert_eq!(cells[0].output.text, "cached");
}

#[tokio::test]
async fn mail_cells_report_sent_ids_on_the_run() {
    let fixture = run_fixture("mailer").await;
    add_cell(&fixture, CellKind::Mail, "mail digest ops@example.com").await;

    let run = fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();
    assert_eq!(run.mail_ids.len(), 1);

    let messages = fixture.mailer.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1.subject, "digest");
    assert_eq!(messages[0].1.to, "ops@example.com");
    assert_eq!(run.mail_ids[0], messages[0].0);

    let cells = fixture.store.list_cells(fixture.notebook.id).await.unwrap();
    assert_eq!(cells[0].output.text, "Sent 1 mails");
}

#[tokio::test]
async fn slow_cells_time_out_without_failing_the_run() {
    let store = Arc::new(MemoryStore::new());
    let notebook = store
        .create_notebook(NewNotebook::named("slow"))
        .await
        .unwrap();
    store
        .create_cell(NewCell::new(notebook.id, CellKind::Python, "sleep 500"))
        .await
        .unwrap();
    let runner = NotebookRunner::new(
        store.clone(),
        Arc::new(MockScriptEngine),
        EngineConfig::builder()
            .cell_timeout(Duration::from_millis(50))
            .build(),
    );

    let run = runner.run(notebook.id, Trigger::Manual).await.unwrap();
    assert_eq!(run.state, Some(RunState::Success));
    assert_eq!(run.failed_cells, 1);
    let cells = store.list_cells(notebook.id).await.unwrap();
    assert!(cells[0].output.text.contains("timed out"));
}

#[tokio::test]
async fn scheduled_mode_refuses_manual_runs() {
    let fixture = run_fixture("nightly").await;
    let mut notebook = fixture.notebook.clone();
    notebook.execution_mode = ExecutionMode::Scheduled;
    fixture.store.update_notebook(notebook.clone()).await.unwrap();

    // Without an active schedule the notebook is misconfigured.
    let err = fixture
        .runner
        .run(notebook.id, Trigger::Manual)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Config(ConfigError::NoActiveSchedule(_))
    ));
    assert!(fixture.store.list_runs(notebook.id).await.unwrap().is_empty());

    // With one, ad hoc execution stays refused.
    fixture
        .store
        .create_schedule(NewSchedule::new(
            notebook.id,
            Utc::now(),
            1,
            IntervalUnit::Days,
        ))
        .await
        .unwrap();
    let err = fixture
        .runner
        .run(notebook.id, Trigger::Manual)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Config(ConfigError::ScheduledExecutionOnly(_))
    ));
}

#[tokio::test]
async fn sql_cells_surface_driver_errors_as_cell_errors() {
    let fixture = run_fixture("queries").await;
    let source = fixture
        .store
        .create_data_source(NewDataSource {
            name: "dw".into(),
            source_type: vellum::SourceType::Postgresql,
            host: Some("127.0.0.1".into()),
            port: Some(1),
            database: Some("nope".into()),
            username: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut notebook = fixture.notebook.clone();
    notebook.data_source_id = Some(source.id);
    fixture.store.update_notebook(notebook).await.unwrap();
    add_cell(&fixture, CellKind::Sql, "select 1").await;

    let run = fixture
        .runner
        .run(fixture.notebook.id, Trigger::Manual)
        .await
        .unwrap();
    // The connection failure is a cell error, not a run failure.
    assert_eq!(run.state, Some(RunState::Success));
    assert_eq!(run.failed_cells, 1);
    let cells = fixture.store.list_cells(fixture.notebook.id).await.unwrap();
    assert_eq!(cells[0].status, CellStatus::Error);
    assert!(cells[0].output.text.contains("connection failed"));
}

#[tokio::test]
async fn escaped_errors_fail_the_run_after_finalization() {
    let flaky = Arc::new(FlakyStore::new(MemoryStore::new()));
    let notebook = flaky
        .create_notebook(NewNotebook::named("fragile"))
        .await
        .unwrap();
    flaky
        .create_cell(NewCell::new(notebook.id, CellKind::Python, "print ok"))
        .await
        .unwrap();
    let runner = NotebookRunner::new(
        flaky.clone(),
        Arc::new(MockScriptEngine),
        EngineConfig::default(),
    );

    flaky.break_notebook(notebook.id);
    let err = runner.run(notebook.id, Trigger::Manual).await.unwrap_err();
    assert!(matches!(err, RunError::Store(_)));

    // The run record was still finalized as failed.
    let runs = flaky.list_runs(notebook.id).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].state, Some(RunState::Failed));
    assert!(runs[0].finished_at.is_some());
    assert!(runs[0]
        .message
        .as_deref()
        .unwrap_or("")
        .contains("storage offline"));
}
