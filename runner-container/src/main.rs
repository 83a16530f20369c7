use anyhow::{Context, Result, bail};
use platform_core::config::{PipelineConfig, load_config};
use platform_core::pipeline::Pipeline;
use platform_core::sink::store_from_url;
use platform_core::source::source_from_config;
use platform_core::telemetry::init_tracing;
use tracing::{error, info};

/// Entry point for a one-shot pipeline job on a container platform
/// (Cloud Run jobs, Kubernetes CronJobs, etc.).
///
/// At a high level:
///     Load and validate config.
///     Extract the configured source into a table.
///     Partition and upload it to object storage.
///     Exit non-zero on failure so the scheduler can decide whether to re-run.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::var("PIPELINE_CONFIG_PATH").ok();
    let config = load_config(config_path.as_deref())
        .await
        .context("Failed to load pipeline config")?;
    check_runnable(&config)?;

    let store = match &config.storage {
        Some(storage) => Some(store_from_url(&storage.url)?),
        None => None,
    };
    let source = source_from_config(&config.source);

    info!("Running pipeline for {}", source.describe());
    let mut pipeline = Pipeline::new(config, store, None)?;
    match pipeline.run_source(source.as_ref()).await {
        Ok(report) => {
            info!(
                "Pipeline finished: {} rows, {} objects written",
                report.rows_extracted,
                report.objects_written.len()
            );
            for object in &report.objects_written {
                info!("  {}", object);
            }
            Ok(())
        }
        Err(e) => {
            error!(retryable = e.is_retryable(), "Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}

/// This runner holds no warehouse credentials, so warehouse loads must run
/// from a host that injects a client.
fn check_runnable(config: &PipelineConfig) -> Result<()> {
    if config.warehouse.is_some() {
        bail!("runner-container does not provide a warehouse client; remove the warehouse section");
    }
    Ok(())
}
