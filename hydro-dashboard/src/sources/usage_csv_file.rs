use std::path::PathBuf;

use async_stream::try_stream;
use usage_client::UsageRecord;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};
use crate::scraper::parse_usage_document;

/// Offline source: a usage export previously downloaded from the portal.
///
/// Accepts the same documents as the portal path (CSV export, or a saved
/// HTML page with a usage table or JSON payload).
pub struct UsageCsvFileSource {
    path: PathBuf,
}

impl UsageCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<UsageRecord> for UsageCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<UsageRecord> {
        let path = self.path.clone();
        let s = try_stream! {
            let body = tokio::fs::read_to_string(&path).await.map_err(|e| {
                PipelineError::Source(format!("failed to read usage file {}: {e}", path.display()))
            })?;

            let records = match parse_usage_document(&body) {
                Ok(records) => records,
                Err(e) => {
                    metrics::counter!("usage_file_parse_errors_total").increment(1);
                    Err(PipelineError::from(e))?
                }
            };

            metrics::counter!("usage_records_parsed_total").increment(records.len() as u64);
            for record in records {
                yield Envelope::now(record);
            }
        };

        Box::pin(s)
    }
}
