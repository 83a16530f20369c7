use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "platform_core=info,runner_container=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineMetrics {
    pub runs: usize,
    pub failed_runs: usize,
    pub rows_extracted: usize,
    pub partitions_built: usize,
    pub objects_written: usize,
    pub rows_loaded: u64,
    pub tables_created: usize,
}
