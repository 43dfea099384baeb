//! Demo entry point: wires a Coordinator over local Home/Store adapters
//! and an in-memory journal, then reports a summary. `cargo run
//! --features pg_demo` swaps in the Postgres-backed journal instead.

use std::sync::Arc;

use flux_adapters::{HomeRegistry, LocalHomeSpec, LocalStore, NdjsonCodec};
use flux_core::store::WriteStrategy;
use flux_core::{exit_code_for, Format};
use flux_domain::{FlowConfig, RunType};
use flux_persistence::Journal;
use flux_runtime::{run_coordinator, CoordinatorConfig, Flow};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let journal = build_journal();
    let registry = HomeRegistry::with_default_codec();

    let flows = vec![
        FlowConfig {
            name: "orders".to_string(),
            home_spec: "local:./demos/orders/input".to_string(),
            store_spec: "local:./demos/orders/output".to_string(),
            queue_size: 5,
            timeout_seconds: 60,
            entity_name: Some("orders".to_string()),
            run_type: RunType::FullDrop,
            watermark_config: None,
        },
        FlowConfig {
            name: "customers".to_string(),
            home_spec: "local:./demos/customers/input".to_string(),
            store_spec: "local:./demos/customers/output".to_string(),
            queue_size: 5,
            timeout_seconds: 60,
            entity_name: Some("customers".to_string()),
            run_type: RunType::FullDrop,
            watermark_config: None,
        },
    ];

    let coordinator_config = CoordinatorConfig { name: "flowline-demo".to_string(), max_concurrent: 2, continue_on_error: true, dry_run: false };

    let summary = run_coordinator(&coordinator_config, flows, move |flow_config| {
        let journal = Arc::clone(&journal);
        let home = registry
            .build_local(LocalHomeSpec {
                path: format!("./demos/{}/input", flow_config.entity_name.clone().unwrap_or_default()),
                format: Format::Ndjson,
                batch_size: 2000,
            })
            .expect("demo flow home config is valid");
        let store = LocalStore::new(
            format!("./demos/{}/output", flow_config.entity_name.clone().unwrap_or_default()),
            flow_config.entity_name.clone(),
            Format::Ndjson,
            2000,
            "part_{sequence:020d}".to_string(),
            WriteStrategy::DirectInsert,
            Arc::new(NdjsonCodec),
        );
        async move {
            let flow = Flow::new(flow_config, "flowline-demo", home, store, journal);
            flow.run().await
        }
    })
    .await;

    for flow in &summary.flows {
        println!("{}: {:?} ({} rows, {}ms)", flow.name, flow.status, flow.row_count, flow.duration_ms);
    }
    std::process::exit(exit_code_for(&summary));
}

#[cfg(not(feature = "pg_demo"))]
fn build_journal() -> Arc<dyn Journal> {
    Arc::new(flux_persistence::InMemoryJournal::new())
}

#[cfg(feature = "pg_demo")]
fn build_journal() -> Arc<dyn Journal> {
    use diesel::r2d2::{self, ConnectionManager};
    use flux_persistence::{PgJournal, PgPool, PoolProvider};

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for the pg_demo feature");
    let manager = ConnectionManager::new(database_url);
    let pool: PgPool = r2d2::Pool::builder().build(manager).expect("failed to build Postgres pool");
    {
        let mut conn = pool.get().expect("failed to check out a connection for migrations");
        flux_persistence::run_pending_migrations(&mut conn).expect("failed to run pending migrations");
    }
    Arc::new(PgJournal::new(PoolProvider { pool }))
}
