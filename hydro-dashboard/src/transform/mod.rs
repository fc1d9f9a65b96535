use crate::pipeline::{Envelope, PipelineError, Transform};
use usage_client::UsageRecord;

/// Pure validation of a `UsageRecord`; see `UsageRecord::validate` for the rules.
pub fn validate_usage(env: Envelope<UsageRecord>) -> Result<Envelope<UsageRecord>, PipelineError> {
    env.payload
        .validate()
        .map_err(|e| PipelineError::Transform(format!("record at {}: {e}", env.payload.local_iso())))?;
    Ok(env)
}

#[derive(Clone, Default)]
pub struct UsageValidation;

#[async_trait::async_trait]
impl Transform<UsageRecord, UsageRecord> for UsageValidation {
    async fn apply(
        &self,
        input: Envelope<UsageRecord>,
    ) -> Result<Envelope<UsageRecord>, PipelineError> {
        match validate_usage(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("usage_validation_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
