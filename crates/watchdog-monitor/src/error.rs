use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
