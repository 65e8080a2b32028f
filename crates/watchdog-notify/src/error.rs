use thiserror::Error;

/// Errors delivering a notification to one channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook returned HTTP {0}")]
    Status(u16),

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
