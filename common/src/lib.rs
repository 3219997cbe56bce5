//! flink-sd 共通型定義
//!
//! YARN / Flink の REST レスポンス型と、ディスカバリで扱うドメイン型をまとめる。

#![warn(missing_docs)]

/// エラー型定義
pub mod error;

/// YARN / Flink REST API のワイヤ型
pub mod protocol;

/// Application, Endpoint, RunningSnapshot 等のコアデータ型
pub mod types;
