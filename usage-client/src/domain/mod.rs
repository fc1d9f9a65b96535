pub mod eastern_time;
pub mod holidays;
pub mod time_of_use;
pub mod usage_record;

pub use time_of_use::{Season, TimeOfUse};
pub use usage_record::{UsageError, UsageRecord};
