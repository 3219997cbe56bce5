//! Configuration management
//!
//! CLI 引数（環境変数フォールバック込み）を検証・正規化して
//! `DiscoveryConfig` にまとめる。起動時エラーはここで全て検出する。

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::{SdError, SdResult};
use crate::extractor::{ExtractorSettings, NoReporterPolicy, PartialPolicy, RetryPolicy};
use crate::yarn::ApplicationFilter;

/// デフォルトのアプリケーション種別
pub const DEFAULT_APPLICATION_TYPE: &str = "Apache Flink";

/// デフォルトのポーリング間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// デフォルトのHTTPタイムアウト
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 検証済みの実行設定
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// ResourceManager のベースURL（スキーム付き、末尾 `/` なし）
    pub rm_address: String,
    /// 単発実行するアプリケーションID
    pub app_id: Option<String>,
    /// 名前フィルタ（先頭一致の正規表現）
    pub name_filter: Option<String>,
    /// アプリケーション種別（`None` で全種別）
    pub application_type: Option<String>,
    /// ターゲットファイルの出力先（`None` で標準出力）
    pub target_dir: Option<PathBuf>,
    /// ポーリング間隔
    pub poll_interval: Duration,
    /// 抽出の再試行
    pub retry: RetryPolicy,
    /// HTTPタイムアウト
    pub request_timeout: Duration,
    /// 1ログあたりの最大走査行数
    pub log_line_budget: Option<usize>,
    /// 部分結果の扱い
    pub partial_policy: PartialPolicy,
    /// Reporter 未設定プロセスの扱い
    pub no_reporter_policy: NoReporterPolicy,
    /// 解決済みアプリケーションを毎サイクル再導出するか
    pub refresh_resolved: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            rm_address: "http://localhost:8088".to_string(),
            app_id: None,
            name_filter: None,
            application_type: Some(DEFAULT_APPLICATION_TYPE.to_string()),
            target_dir: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_line_budget: None,
            partial_policy: PartialPolicy::default(),
            no_reporter_policy: NoReporterPolicy::default(),
            refresh_resolved: true,
        }
    }
}

impl DiscoveryConfig {
    /// CLI 引数から設定を作成
    pub fn from_cli(cli: Cli) -> SdResult<Self> {
        let rm_address = normalize_rm_address(&cli.rm_addr)?;
        let poll_interval = seconds("poll interval", cli.poll_interval)?;
        let retry_interval = seconds("retry interval", cli.retry_interval)?;
        let request_timeout = seconds("request timeout", cli.request_timeout)?;

        if cli.log_line_budget == Some(0) {
            return Err(SdError::Config(
                "log line budget must be greater than zero".to_string(),
            ));
        }

        if let Some(dir) = &cli.target_dir {
            if !dir.is_dir() {
                return Err(SdError::Config(format!(
                    "cannot find target directory {}",
                    dir.display()
                )));
            }
        }

        let app_id = cli
            .app_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let application_type = Some(cli.application_type.trim().to_string())
            .filter(|t| !t.is_empty());

        let config = Self {
            rm_address,
            app_id,
            name_filter: cli.name_filter.filter(|p| !p.is_empty()),
            application_type,
            target_dir: cli.target_dir,
            poll_interval,
            retry: RetryPolicy::new(cli.scrape_retries, retry_interval),
            request_timeout,
            log_line_budget: cli.log_line_budget,
            partial_policy: cli.partial_policy,
            no_reporter_policy: cli.no_reporter_policy,
            refresh_resolved: !cli.no_refresh,
        };

        // 名前フィルタの正規表現を起動時に検証
        ApplicationFilter::from_config(&config)?;

        Ok(config)
    }

    /// 抽出器の設定
    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            retry: self.retry,
            partial_policy: self.partial_policy,
            no_reporter_policy: self.no_reporter_policy,
            line_budget: self.log_line_budget,
        }
    }
}

/// `host:port` / URL を `http(s)://host:port` 形式に揃える
pub fn normalize_rm_address(address: &str) -> SdResult<String> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SdError::Config(
            "resource manager address is empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{trimmed}"))
    }
}

fn seconds(name: &str, value: f64) -> SdResult<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SdError::Config(format!(
            "{name} must be a positive number of seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| SdError::Config(format!("invalid {name} {value}: {e}")))
}
