use std::sync::Arc;

use usage_client::UsageRecord;

use crate::config::{AppConfig, Credentials};
use crate::pipeline::{Pipeline, PipelineError};
use crate::sinks::{CollectSink, Dataset};
use crate::sources::{PortalSource, UsageCsvFileSource};
use crate::transform;

/// Run one fetch-and-parse pass from the configured source.
///
/// A configured `source.csv_path` replaces the portal; otherwise the
/// credentials are required.
pub async fn load_dataset(cfg: &AppConfig, credentials: Option<&Credentials>) -> Result<Dataset, PipelineError> {
    if let Some(path) = &cfg.source.csv_path {
        tracing::info!(path = %path.display(), "loading usage from file");
        let pipeline: Pipeline<_, UsageRecord, _> = Pipeline {
            source: UsageCsvFileSource::new(path),
            transforms: vec![Arc::new(transform::UsageValidation)],
            sink: CollectSink,
        };
        return pipeline.run().await;
    }

    let credentials = credentials
        .ok_or_else(|| PipelineError::Source("portal credentials are not configured".to_string()))?;

    tracing::info!("loading usage from portal");
    let pipeline: Pipeline<_, UsageRecord, _> = Pipeline {
        source: PortalSource::new(cfg.portal.clone(), credentials.clone()),
        transforms: vec![Arc::new(transform::UsageValidation)],
        sink: CollectSink,
    };
    pipeline.run().await
}
