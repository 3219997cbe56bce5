//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use flink_sd_common::error::CommonError;
use thiserror::Error;

/// discovery error type
#[derive(Debug, Error)]
pub enum SdError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Unexpected HTTP status {status} from {url}")]
    Status {
        /// Requested URL
        url: String,
        /// Returned status
        status: reqwest::StatusCode,
    },

    /// Response body was not the expected JSON
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        /// Requested URL
        url: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoints of an application could not be resolved
    #[error("Could not resolve endpoints of {app_id}: {reason}")]
    Unresolved {
        /// Application id
        app_id: String,
        /// Why resolution stopped
        reason: String,
    },
}

/// discovery Result型
pub type SdResult<T> = Result<T, SdError>;
