//! Minimal demo binary: runs a two-flow Coordinator against the local
//! Home/Store adapters and prints a one-line summary per flow. Project
//! loading and a real argument surface are external collaborators.

use std::sync::Arc;

use flux_adapters::{HomeRegistry, LocalHomeSpec, LocalStore, NdjsonCodec};
use flux_core::store::WriteStrategy;
use flux_core::{exit_code_for, Format};
use flux_domain::{FlowConfig, RunType};
use flux_persistence::InMemoryJournal;
use flux_runtime::{run_coordinator, CoordinatorConfig, Flow};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let journal: Arc<InMemoryJournal> = Arc::new(InMemoryJournal::new());
    let registry = HomeRegistry::with_default_codec();

    let flows = vec![FlowConfig {
        name: "demo".to_string(),
        home_spec: "local:./demos/input".to_string(),
        store_spec: "local:./demos/output".to_string(),
        queue_size: 3,
        timeout_seconds: 30,
        entity_name: Some("demo".to_string()),
        run_type: RunType::FullDrop,
        watermark_config: None,
    }];

    let coordinator_config = CoordinatorConfig { name: "flux-cli-demo".to_string(), max_concurrent: 2, continue_on_error: false, dry_run: false };

    let summary = run_coordinator(&coordinator_config, flows, move |flow_config| {
        let journal = Arc::clone(&journal);
        let home = registry
            .build_local(LocalHomeSpec { path: "./demos/input".to_string(), format: Format::Ndjson, batch_size: 2000 })
            .expect("demo home config is valid");
        let store = LocalStore::new(
            "./demos/output".to_string(),
            flow_config.entity_name.clone(),
            Format::Ndjson,
            2000,
            "demo_{sequence:020d}".to_string(),
            WriteStrategy::DirectInsert,
            Arc::new(NdjsonCodec),
        );
        async move {
            let flow = Flow::new(flow_config, "flux-cli-demo", home, store, journal);
            flow.run().await
        }
    })
    .await;

    for flow in &summary.flows {
        println!("{}: {:?} ({} rows)", flow.name, flow.status, flow.row_count);
    }
    std::process::exit(exit_code_for(&summary));
}
