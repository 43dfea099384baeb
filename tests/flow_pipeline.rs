//! End-to-end tests driving a real `Flow` over the local filesystem
//! adapters and an in-memory journal: no mocks below the Home/Store
//! boundary.

use std::sync::Arc;

use flux_adapters::{HomeRegistry, LocalHomeSpec, LocalStore, NdjsonCodec};
use flux_core::home::Home;
use flux_core::progress::FlowOutcome;
use flux_core::store::WriteStrategy;
use flux_core::Format;
use flux_domain::{FlowConfig, RunType, WatermarkConfig};
use flux_persistence::{InMemoryJournal, Journal};
use flux_runtime::{run_coordinator, CoordinatorConfig, Flow};

fn write_ndjson(dir: &std::path::Path, file_name: &str, rows: &[serde_json::Value]) {
    std::fs::create_dir_all(dir).unwrap();
    let body = rows.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("\n");
    std::fs::write(dir.join(file_name), body).unwrap();
}

fn row(id: i64, updated_at: i64) -> serde_json::Value {
    serde_json::json!({"id": id, "updated_at": updated_at})
}

fn flow_config(name: &str, input: &str, output: &str, queue_size: usize) -> FlowConfig {
    FlowConfig {
        name: name.to_string(),
        home_spec: format!("local:{input}"),
        store_spec: format!("local:{output}"),
        queue_size,
        timeout_seconds: 30,
        entity_name: Some(name.to_string()),
        run_type: RunType::FullDrop,
        watermark_config: None,
    }
}

fn local_home(path: &str, batch_size: usize) -> Arc<dyn Home> {
    HomeRegistry::with_default_codec().build_local(LocalHomeSpec { path: path.to_string(), format: Format::Ndjson, batch_size }).unwrap()
}

fn local_store(path: &str, entity: &str, batch_size: usize) -> LocalStore<NdjsonCodec> {
    LocalStore::new(path.to_string(), Some(entity.to_string()), Format::Ndjson, batch_size, "part_{sequence:020d}".to_string(), WriteStrategy::DirectInsert, Arc::new(NdjsonCodec))
}

#[tokio::test]
async fn happy_path_moves_every_row_from_input_to_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_ndjson(&input, "part_1.ndjson", &[row(1, 100), row(2, 200), row(3, 300)]);

    let output = dir.path().join("output");
    let config = flow_config("orders", input.to_str().unwrap(), output.to_str().unwrap(), 10);
    let home = local_home(input.to_str().unwrap(), 2);
    let store = local_store(output.to_str().unwrap(), "orders", 2);
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());

    let flow = Flow::new(config, "test-coordinator", home, store, journal);
    let summary = flow.run().await;

    assert_eq!(summary.status, FlowOutcome::Succeeded);
    assert_eq!(summary.row_count, 3);

    let final_dir = output.join("orders");
    let files: Vec<_> = std::fs::read_dir(&final_dir).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(files.len(), 2, "3 rows at batch_size 2 should flush as a full chunk plus a residual chunk");
}

#[tokio::test]
async fn mismatched_home_and_store_batch_sizes_still_preserve_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let rows: Vec<serde_json::Value> = (0..7).map(|i| row(i, i * 10)).collect();
    write_ndjson(&input, "part_1.ndjson", &rows);

    let output = dir.path().join("output");
    let config = flow_config("widgets", input.to_str().unwrap(), output.to_str().unwrap(), 10);
    // Home yields 3-row batches, Store flushes in chunks of 4: the
    // buffer must accumulate across producer batch boundaries.
    let home = local_home(input.to_str().unwrap(), 3);
    let store = local_store(output.to_str().unwrap(), "widgets", 4);
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());

    let flow = Flow::new(config, "test-coordinator", home, store, journal);
    let summary = flow.run().await;

    assert_eq!(summary.status, FlowOutcome::Succeeded);
    assert_eq!(summary.row_count, 7);
}

#[tokio::test]
async fn missing_input_directory_fails_the_flow_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("does-not-exist");
    let output = dir.path().join("output");
    let config = flow_config("ghosts", input.to_str().unwrap(), output.to_str().unwrap(), 10);
    let home = local_home(input.to_str().unwrap(), 10);
    let store = local_store(output.to_str().unwrap(), "ghosts", 10);
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());

    let flow = Flow::new(config, "test-coordinator", home, store, journal);
    let summary = flow.run().await;

    assert_eq!(summary.status, FlowOutcome::Failed);
    assert!(summary.error.is_some());
    assert_eq!(journal.last_successful_watermark("ghosts", Some("ghosts")).await.unwrap(), None);
}

#[tokio::test]
async fn incremental_run_resumes_from_the_last_successful_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_ndjson(&input, "part_1.ndjson", &[row(1, 100), row(2, 200)]);

    let output = dir.path().join("output");
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
    let watermark_config = WatermarkConfig::new("updated_at");

    let mut config = flow_config("events", input.to_str().unwrap(), output.to_str().unwrap(), 10);
    config.run_type = RunType::Incremental;
    config.watermark_config = Some(watermark_config.clone());

    let home = local_home(input.to_str().unwrap(), 10);
    let store = local_store(output.to_str().unwrap(), "events", 10);
    let summary = Flow::new(config.clone(), "test-coordinator", home, store, Arc::clone(&journal)).run().await;
    assert_eq!(summary.status, FlowOutcome::Succeeded);
    assert_eq!(summary.row_count, 2);

    // `LocalHome` has no native watermark-pushdown support, so the
    // second run falls back to a full re-read; the watermark tracker
    // still advances correctly from the newly observed rows.
    let watermark_after_first_run = journal.last_successful_watermark("events", Some("events")).await.unwrap();
    assert!(watermark_after_first_run.is_some());

    write_ndjson(&input, "part_2.ndjson", &[row(3, 300)]);
    let home = local_home(input.to_str().unwrap(), 10);
    let store = local_store(output.to_str().unwrap(), "events", 10);
    let summary = Flow::new(config, "test-coordinator", home, store, Arc::clone(&journal)).run().await;
    assert_eq!(summary.status, FlowOutcome::Succeeded);

    let watermark_after_second_run = journal.last_successful_watermark("events", Some("events")).await.unwrap();
    assert!(watermark_after_second_run > watermark_after_first_run);
}

#[tokio::test]
async fn full_drop_run_clears_prior_output_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let output = dir.path().join("output");

    write_ndjson(&input, "part_1.ndjson", &[row(1, 100), row(2, 200)]);
    let config = flow_config("snapshot", input.to_str().unwrap(), output.to_str().unwrap(), 10);
    let home = local_home(input.to_str().unwrap(), 10);
    let store = local_store(output.to_str().unwrap(), "snapshot", 10);
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
    Flow::new(config.clone(), "test-coordinator", home, store, Arc::clone(&journal)).run().await;

    let final_dir = output.join("snapshot");
    let first_run_files = std::fs::read_dir(&final_dir).unwrap().count();
    assert_eq!(first_run_files, 1);

    // Second run replaces the input entirely with a single smaller row set.
    std::fs::remove_dir_all(&input).unwrap();
    write_ndjson(&input, "part_1.ndjson", &[row(9, 900)]);
    let home = local_home(input.to_str().unwrap(), 10);
    let store = local_store(output.to_str().unwrap(), "snapshot", 10);
    let summary = Flow::new(config, "test-coordinator", home, store, journal).run().await;

    assert_eq!(summary.status, FlowOutcome::Succeeded);
    assert_eq!(summary.row_count, 1);
    let second_run_files: Vec<_> = std::fs::read_dir(&final_dir).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(second_run_files.len(), 1, "full_drop must remove the previous run's output, not append to it");
}

#[tokio::test]
async fn coordinator_runs_independent_flows_concurrently_and_reports_each() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["orders", "customers", "invoices"] {
        let input = dir.path().join(name).join("input");
        write_ndjson(&input, "part_1.ndjson", &[row(1, 10), row(2, 20)]);
    }

    let flows: Vec<FlowConfig> = ["orders", "customers", "invoices"]
        .iter()
        .map(|name| {
            let input = dir.path().join(name).join("input");
            let output = dir.path().join(name).join("output");
            flow_config(name, input.to_str().unwrap(), output.to_str().unwrap(), 10)
        })
        .collect();

    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
    let dir_path = dir.path().to_path_buf();
    let coordinator_config = CoordinatorConfig { name: "batch".to_string(), max_concurrent: 2, continue_on_error: true, dry_run: false };

    let summary = run_coordinator(&coordinator_config, flows, move |flow_config| {
        let journal = Arc::clone(&journal);
        let entity = flow_config.entity_name.clone().unwrap();
        let input = dir_path.join(&entity).join("input");
        let output = dir_path.join(&entity).join("output");
        let home = local_home(input.to_str().unwrap(), 10);
        let store = local_store(output.to_str().unwrap(), &entity, 10);
        async move { Flow::new(flow_config, "batch", home, store, journal).run().await }
    })
    .await;

    assert_eq!(summary.flows.len(), 3);
    assert!(!summary.any_failed());
    for flow in &summary.flows {
        assert_eq!(flow.status, FlowOutcome::Succeeded);
        assert_eq!(flow.row_count, 2);
    }
}
