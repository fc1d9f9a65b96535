//! Toronto Hydro portal scraping: login form handling, the session handoff
//! to the usage site, and extraction of usage records from what comes back.

pub mod forms;
pub mod portal;
pub mod usage_document;

pub use forms::{extract_form, HtmlForm};
pub use portal::PortalClient;
pub use usage_document::parse_usage_document;

#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("invalid portal URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to load CA bundle {path}: {reason}")]
    CaBundle { path: String, reason: String },
    #[error("login rejected: portal did not redirect after submitting credentials")]
    LoginRejected,
    #[error("usage session handoff failed: expected a redirect from {0}")]
    SessionHandoff(String),
    #[error("unexpected page structure: {0}")]
    UnexpectedMarkup(String),
    #[error("no usage data found: {0}")]
    NoUsageData(String),
    #[error("invalid {column} '{value}' in usage row {row}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}
