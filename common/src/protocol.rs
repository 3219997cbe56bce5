//! 通信プロトコル定義
//!
//! YARN ResourceManager REST API と Flink JobManager REST API のレスポンス。
//! 必要なフィールドだけを定義し、欠落しうるものはすべて `Option` / `default` で受ける。

use serde::{Deserialize, Deserializer, Serialize};

/// `GET /ws/v1/cluster/apps` レスポンス
///
/// アプリケーションが1件も無い場合、YARN は `{"apps": null}` を返す。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YarnAppsResponse {
    /// アプリケーション一覧
    #[serde(default)]
    pub apps: Option<YarnAppList>,
}

impl YarnAppsResponse {
    /// 一覧を取り出す（`null` は空として扱う）
    pub fn into_apps(self) -> Vec<YarnApp> {
        self.apps.map(|list| list.app).unwrap_or_default()
    }
}

/// `apps` オブジェクト
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YarnAppList {
    /// 各アプリケーション
    #[serde(default)]
    pub app: Vec<YarnApp>,
}

/// `GET /ws/v1/cluster/apps/{id}` レスポンス
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YarnAppResponse {
    /// アプリケーション情報
    #[serde(default)]
    pub app: Option<YarnApp>,
}

/// YARN アプリケーション
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct YarnApp {
    /// アプリケーションID（例: `application_1700000000000_0001`）
    pub id: String,
    /// 表示名
    #[serde(default)]
    pub name: String,
    /// ライフサイクル状態（`RUNNING` 等）
    #[serde(default)]
    pub state: String,
    /// アプリケーション種別（Flink は `Apache Flink`）
    #[serde(rename = "applicationType", default)]
    pub application_type: String,
    /// JobManager の Web UI（プロキシ）URL
    #[serde(rename = "trackingUrl", default)]
    pub tracking_url: Option<String>,
    /// 稼働中コンテナ数（JobManager分を含む。終了済みでは -1 のことがある）
    #[serde(rename = "runningContainers", default)]
    pub running_containers: Option<i64>,
}

/// `GET /ws/v1/cluster/apps/{id}/appattempts` レスポンス
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppAttemptsResponse {
    /// アテンプト一覧
    #[serde(rename = "appAttempts", default)]
    pub app_attempts: Option<AppAttemptList>,
}

impl AppAttemptsResponse {
    /// 最大アテンプトIDを返す（一覧が空・欠落なら `None`）
    pub fn last_attempt_id(&self) -> Option<u64> {
        self.app_attempts
            .as_ref()
            .and_then(|list| list.app_attempt.iter().map(|a| a.id).max())
    }
}

/// `appAttempts` オブジェクト
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppAttemptList {
    /// 各アテンプト
    #[serde(rename = "appAttempt", default)]
    pub app_attempt: Vec<AppAttempt>,
}

/// アプリケーションアテンプト
#[derive(Debug, Clone, Deserialize)]
pub struct AppAttempt {
    /// アテンプトID（数値または数値文字列）
    #[serde(deserialize_with = "deserialize_attempt_id")]
    pub id: u64,
}

fn deserialize_attempt_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// `GET {trackingUrl}/overview` レスポンス
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlinkOverview {
    /// Flinkバージョン。JobManagerが起動しきっていない間は返らない
    #[serde(rename = "flink-version", default)]
    pub flink_version: Option<String>,
}

/// `GET {trackingUrl}/taskmanagers` レスポンス
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskManagersResponse {
    /// TaskManager一覧
    #[serde(default)]
    pub taskmanagers: Option<Vec<TaskManagerInfo>>,
}

/// TaskManager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskManagerInfo {
    /// TaskManager ID（ログURLのパスに使う）
    pub id: String,
}

/// `GET {trackingUrl}/jobmanager/config` の1エントリ
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigEntry {
    /// 設定キー
    pub key: String,
    /// 設定値
    pub value: String,
}

/// JobManager の RPC アドレスを持つ設定キー
pub const JOBMANAGER_RPC_ADDRESS_KEY: &str = "jobmanager.rpc.address";

/// Prometheus `file_sd` のターゲットグループ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// `host:port` の一覧
    pub targets: Vec<String>,
}
