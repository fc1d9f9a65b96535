pub mod config;
pub mod dashboard;
pub mod load;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod scraper;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use load::load_dataset;
pub use pipeline::{Envelope, Pipeline};
