pub mod collect;

pub use collect::{CollectSink, Dataset};
