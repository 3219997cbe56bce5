//! ロギング初期化
//!
//! フィルタは `FLINK_SD_LOG_LEVEL`、なければ `RUST_LOG`、どちらも無ければ `info`。
//! 標準出力はターゲット出力に使うため、ログは標準エラーに出す。

use tracing_subscriber::EnvFilter;

/// ログレベル指定の環境変数
pub const LOG_LEVEL_ENV: &str = "FLINK_SD_LOG_LEVEL";

const DEFAULT_FILTER: &str = "info";

/// グローバルサブスクライバを初期化
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directives = filter_directives(
        std::env::var(LOG_LEVEL_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let filter = EnvFilter::try_new(&directives)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()?;
    Ok(())
}

/// 使用するフィルタ文字列を決める
pub fn filter_directives(level: Option<String>, rust_log: Option<String>) -> String {
    [level, rust_log]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}
