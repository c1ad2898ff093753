use curate_common::Config;

/// Tuning for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Items examined per scan page.
    pub scan_page_size: usize,
    /// Index lookups in flight at once while resolving a work batch.
    pub resolve_concurrency: usize,
    /// Work messages handed to `process_work` per call.
    pub work_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_page_size: 500,
            resolve_concurrency: 8,
            work_batch_size: 10,
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            scan_page_size: config.scan_page_size.max(1),
            resolve_concurrency: config.resolve_concurrency.max(1),
            work_batch_size: config.work_batch_size.max(1),
        }
    }
}
