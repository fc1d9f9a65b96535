use std::time::SystemTime;

use futures::{Stream, StreamExt};
use usage_client::{summarize, TimeOfUse, UsageRecord, UsageSummary};

use crate::pipeline::{Envelope, PipelineError, Sink};
use crate::scraper::ScrapeError;

/// Records of one successful fetch, sorted by timestamp.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<UsageRecord>,
    pub loaded_at: SystemTime,
}

impl Dataset {
    pub fn summary(&self) -> UsageSummary {
        summarize(&self.records)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&UsageRecord, TimeOfUse)> + '_ {
        self.records.iter().map(|r| (r, TimeOfUse::classify(r.ts)))
    }
}

/// Gathers the stream into a `Dataset`.
///
/// The first upstream error fails the whole run, and an empty stream is
/// `NoUsageData`.
#[derive(Clone, Default)]
pub struct CollectSink;

#[async_trait::async_trait]
impl Sink<UsageRecord> for CollectSink {
    type Output = Dataset;

    async fn run<S>(&self, mut input: S) -> Result<Dataset, PipelineError>
    where
        S: Stream<Item = Result<Envelope<UsageRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut records = Vec::new();

        while let Some(item) = input.next().await {
            match item {
                Ok(env) => records.push(env.payload),
                Err(e) => {
                    tracing::error!(error = %e, collected = records.len(), "error in upstream pipeline for CollectSink");
                    return Err(e);
                }
            }
        }

        if records.is_empty() {
            return Err(ScrapeError::NoUsageData("source produced no records".to_string()).into());
        }

        records.sort_by_key(|r| r.ts);
        tracing::info!(records = records.len(), "usage dataset loaded");

        Ok(Dataset {
            records,
            loaded_at: SystemTime::now(),
        })
    }
}
