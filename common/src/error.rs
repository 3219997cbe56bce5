//! エラー型定義
//!
//! 共通層の統一エラー型（thiserror使用）

use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommonError {
    /// `host:port` として解釈できないターゲット文字列
    #[error("Invalid endpoint '{0}': expected host:port")]
    InvalidEndpoint(String),

    /// ポート番号の範囲外・数値以外
    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// 共通層のResult型
pub type CommonResult<T> = Result<T, CommonError>;
