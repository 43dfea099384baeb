//! Coordinator: fans out over many Flows with a global concurrency cap,
//! declaration-order start, and a summary at the end.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use flux_core::progress::{CoordinatorSummary, FlowOutcome, FlowSummary};
use flux_domain::FlowConfig;

pub struct CoordinatorConfig {
    pub name: String,
    pub max_concurrent: usize,
    pub continue_on_error: bool,
    pub dry_run: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { name: "coordinator".to_string(), max_concurrent: 1, continue_on_error: false, dry_run: false }
    }
}

#[derive(Debug, Clone)]
pub struct FlowPreview {
    pub name: String,
    pub home_info: String,
    pub store_info: String,
    pub incremental_info: String,
    pub warnings: Vec<String>,
}

/// Runs a fixed, ordered set of Flow futures under a semaphore-bounded
/// concurrency cap. `run_flow` is responsible for producing a
/// `FlowSummary`; the Coordinator itself never inspects Home/Store
/// types directly, keeping it generic over the flow runtime.
pub async fn run_coordinator<F, Fut>(config: &CoordinatorConfig, flows: Vec<FlowConfig>, run_flow: F) -> CoordinatorSummary
where
    F: Fn(FlowConfig) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = FlowSummary> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let run_flow = Arc::new(run_flow);
    let mut joins = JoinSet::new();
    let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));

    for flow_config in flows {
        let semaphore = Arc::clone(&semaphore);
        let run_flow = Arc::clone(&run_flow);
        let cancelled = Arc::clone(&cancelled);
        let continue_on_error = config.continue_on_error;
        let flow_name = flow_config.name.clone();

        joins.spawn(async move {
            if cancelled.load(std::sync::atomic::Ordering::SeqCst) && !continue_on_error {
                return FlowSummary {
                    name: flow_name,
                    status: FlowOutcome::Cancelled,
                    row_count: 0,
                    duration_ms: 0,
                    error: Some("cancelled: an earlier flow failed and continue_on_error is false".to_string()),
                };
            }
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            let summary = run_flow(flow_config).await;
            if summary.status != FlowOutcome::Succeeded && !continue_on_error {
                cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            summary
        });
    }

    let mut summary = CoordinatorSummary::default();
    while let Some(result) = joins.join_next().await {
        match result {
            Ok(flow_summary) => {
                if flow_summary.status != FlowOutcome::Succeeded {
                    warn!(flow = %flow_summary.name, "flow did not succeed: {:?}", flow_summary.error);
                }
                summary.flows.push(flow_summary);
            }
            Err(e) => warn!("flow task panicked or was aborted: {e}"),
        }
    }

    info!(coordinator = %config.name, flows = summary.flows.len(), failed = summary.any_failed(), "coordinator run complete");
    summary
}

/// Dry-run preview: describes each Flow's configuration without
/// opening any resource connections.
pub fn preview(flows: &[FlowConfig]) -> Vec<FlowPreview> {
    flows
        .iter()
        .map(|flow| {
            let mut warnings = Vec::new();
            if let Err(e) = flow.validate() {
                warnings.push(e.to_string());
            }
            FlowPreview {
                name: flow.name.clone(),
                home_info: flow.home_spec.clone(),
                store_info: flow.store_spec.clone(),
                incremental_info: match flow.run_type {
                    flux_domain::RunType::Incremental => format!(
                        "incremental on '{}'",
                        flow.watermark_config.as_ref().map(|w| w.watermark_column.as_str()).unwrap_or("<unconfigured>")
                    ),
                    flux_domain::RunType::FullDrop => "full_drop".to_string(),
                },
                warnings,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_domain::RunType;

    fn flow_config(name: &str) -> FlowConfig {
        FlowConfig {
            name: name.to_string(),
            home_spec: "local://in".to_string(),
            store_spec: "local://out".to_string(),
            queue_size: 3,
            timeout_seconds: 30,
            entity_name: None,
            run_type: RunType::FullDrop,
            watermark_config: None,
        }
    }

    #[tokio::test]
    async fn continue_on_error_false_cancels_pending_flows_after_first_failure() {
        let config = CoordinatorConfig { max_concurrent: 1, continue_on_error: false, ..Default::default() };
        let flows = vec![flow_config("a"), flow_config("b")];

        let summary = run_coordinator(&config, flows, |flow| async move {
            if flow.name == "a" {
                FlowSummary { name: flow.name, status: FlowOutcome::Failed, row_count: 0, duration_ms: 0, error: Some("boom".into()) }
            } else {
                FlowSummary { name: flow.name, status: FlowOutcome::Succeeded, row_count: 10, duration_ms: 0, error: None }
            }
        })
        .await;

        assert_eq!(summary.flows.len(), 2);
        assert!(summary.any_failed());
    }

    #[test]
    fn dry_run_preview_never_touches_resources() {
        let flows = vec![flow_config("a")];
        let previews = preview(&flows);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].name, "a");
    }
}
