//! Flink JobManager REST クライアント
//!
//! すべての呼び出しは YARN のトラッキングURL（JobManager Web UI のプロキシ）を起点にする。

use flink_sd_common::protocol::{
    ConfigEntry, FlinkOverview, TaskManagersResponse, JOBMANAGER_RPC_ADDRESS_KEY,
};
use std::time::Duration;

use reqwest::Client;

use crate::error::SdResult;
use crate::http::{get_json, get_lines, LogLines};

/// JobManager REST クライアント
#[derive(Debug, Clone)]
pub struct FlinkClient {
    client: Client,
    log_read_timeout: Duration,
}

/// ログ読み込みの無通信タイムアウトの既定値
pub const DEFAULT_LOG_READ_TIMEOUT: Duration = Duration::from_secs(30);

impl FlinkClient {
    /// 新しいクライアントを作成
    pub fn new(client: Client) -> Self {
        Self {
            client,
            log_read_timeout: DEFAULT_LOG_READ_TIMEOUT,
        }
    }

    /// ログ読み込みの無通信タイムアウトを設定
    pub fn with_log_read_timeout(mut self, timeout: Duration) -> Self {
        self.log_read_timeout = timeout;
        self
    }

    /// `GET {tracking}/overview`
    pub async fn overview(&self, tracking_url: &str) -> SdResult<FlinkOverview> {
        get_json(&self.client, &format!("{}/overview", base(tracking_url))).await
    }

    /// 登録済み TaskManager のID一覧
    ///
    /// `taskmanagers` フィールドが無い場合は空として扱う。
    pub async fn taskmanager_ids(&self, tracking_url: &str) -> SdResult<Vec<String>> {
        let response: TaskManagersResponse =
            get_json(&self.client, &format!("{}/taskmanagers", base(tracking_url))).await?;
        Ok(response
            .taskmanagers
            .unwrap_or_default()
            .into_iter()
            .map(|tm| tm.id)
            .collect())
    }

    /// `GET {tracking}/jobmanager/config`
    pub async fn jobmanager_config(&self, tracking_url: &str) -> SdResult<Vec<ConfigEntry>> {
        get_json(
            &self.client,
            &format!("{}/jobmanager/config", base(tracking_url)),
        )
        .await
    }

    /// JobManager 設定の `jobmanager.rpc.address`
    pub async fn jobmanager_rpc_address(&self, tracking_url: &str) -> SdResult<Option<String>> {
        let entries = self.jobmanager_config(tracking_url).await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.key == JOBMANAGER_RPC_ADDRESS_KEY)
            .map(|entry| entry.value))
    }

    /// JobManager ログのストリーム
    pub async fn jobmanager_log(&self, tracking_url: &str) -> SdResult<LogLines> {
        get_lines(
            &self.client,
            &format!("{}/jobmanager/log", base(tracking_url)),
            self.log_read_timeout,
        )
        .await
    }

    /// TaskManager ログのストリーム
    pub async fn taskmanager_log(&self, tracking_url: &str, taskmanager_id: &str) -> SdResult<LogLines> {
        get_lines(
            &self.client,
            &format!("{}/taskmanagers/{}/log", base(tracking_url), taskmanager_id),
            self.log_read_timeout,
        )
        .await
    }
}

fn base(tracking_url: &str) -> &str {
    tracking_url.trim_end_matches('/')
}
