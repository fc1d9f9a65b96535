pub mod portal;
pub mod usage_csv_file;

pub use portal::PortalSource;
pub use usage_csv_file::UsageCsvFileSource;
