pub mod aggregate;
pub mod domain;

pub use aggregate::{aggregate, summarize, Metric, TimeBin, UsageBucket, UsageSummary};
pub use domain::usage_record::format_local;
pub use domain::{TimeOfUse, UsageError, UsageRecord};
