use async_stream::try_stream;
use usage_client::UsageRecord;

use crate::config::{Credentials, PortalConfig};
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};
use crate::scraper::{parse_usage_document, PortalClient, ScrapeError};

/// Logs into the portal with a fresh session on every stream and yields
/// the records of the usage export.
pub struct PortalSource {
    portal: PortalConfig,
    credentials: Credentials,
}

impl PortalSource {
    pub fn new(portal: PortalConfig, credentials: Credentials) -> Self {
        Self {
            portal,
            credentials,
        }
    }
}

async fn fetch_records(portal: &PortalConfig, credentials: &Credentials) -> Result<Vec<UsageRecord>, ScrapeError> {
    let client = PortalClient::new(portal)?;
    let body = client.fetch_usage_export(credentials).await?;
    parse_usage_document(&body)
}

#[async_trait::async_trait]
impl Source<UsageRecord> for PortalSource {
    async fn stream(&self) -> EnvelopeStream<UsageRecord> {
        let portal = self.portal.clone();
        let credentials = self.credentials.clone();

        let s = try_stream! {
            metrics::counter!("portal_fetch_total").increment(1);

            let records = match fetch_records(&portal, &credentials).await {
                Ok(records) => records,
                Err(e) => {
                    metrics::counter!("portal_fetch_failed_total").increment(1);
                    tracing::error!(error = %e, "portal fetch failed");
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
