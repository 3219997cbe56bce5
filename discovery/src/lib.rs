//! Flink on YARN service discovery for Prometheus
//!
//! ResourceManager をポーリングして稼働中の Flink アプリケーションを把握し、
//! JobManager / TaskManager のログから PrometheusReporter の待受アドレスを抽出して
//! `file_sd` 用のターゲットファイルを維持する。

#![warn(missing_docs)]

/// 共通型定義（flink-sd-commonの再公開）
pub use flink_sd_common as common;

/// CLIインターフェース
pub mod cli;

/// 設定管理（CLI引数の検証と正規化）
pub mod config;

/// エラー型定義
pub mod error;

/// ログからのエンドポイント抽出
pub mod extractor;

/// Flink JobManager REST クライアント
pub mod flink;

/// 共有HTTPヘルパー
pub mod http;

/// ロギング初期化ユーティリティ
pub mod logging;

/// スナップショット差分とレジストリ収束
pub mod reconciler;

/// ターゲットファイルの書き込み・削除
pub mod registry;

/// ポーリングループと単発実行
pub mod service;

/// Shutdown controller (signal handling)
pub mod shutdown;

/// YARN ResourceManager クライアントとスナップショット取得
pub mod yarn;
