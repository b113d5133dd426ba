use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to encode upstream payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream returned {status}")]
    Status { status: StatusCode, body: String },

    #[error("upstream stream interrupted: {0}")]
    Stream(String),

    #[error("upstream unavailable after {attempts} attempt(s): {last}")]
    Unavailable {
        attempts: u32,
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// 最后一次失败时后端返回的状态码
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Unavailable { last, .. } => last.status(),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            UpstreamError::Unavailable { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Transport(e.to_string())
    }
}
