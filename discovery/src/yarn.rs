//! YARN ResourceManager クライアント
//!
//! 稼働中アプリケーションの一覧とアテンプト履歴を取得し、
//! `RunningSnapshot` を組み立てる。

use flink_sd_common::protocol::{AppAttemptsResponse, YarnApp, YarnAppResponse, YarnAppsResponse};
use flink_sd_common::types::{Application, ApplicationState, RunningSnapshot};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::error::{SdError, SdResult};
use crate::http::get_json;

/// ResourceManager REST クライアント
#[derive(Debug, Clone)]
pub struct YarnClient {
    client: Client,
    base_url: String,
}

impl YarnClient {
    /// 新しいクライアントを作成（`base_url` は正規化済みであること）
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// ResourceManager のベースURL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 全アプリケーションを取得
    pub async fn list_apps(&self) -> SdResult<Vec<YarnApp>> {
        let url = format!("{}/ws/v1/cluster/apps", self.base_url);
        let response: YarnAppsResponse = get_json(&self.client, &url).await?;
        Ok(response.into_apps())
    }

    /// 単一アプリケーションを取得
    pub async fn app(&self, app_id: &str) -> SdResult<Option<YarnApp>> {
        let url = format!("{}/ws/v1/cluster/apps/{}", self.base_url, app_id);
        let response: YarnAppResponse = get_json(&self.client, &url).await?;
        Ok(response.app)
    }

    /// アテンプト履歴を取得
    pub async fn app_attempts(&self, app_id: &str) -> SdResult<AppAttemptsResponse> {
        let url = format!("{}/ws/v1/cluster/apps/{}/appattempts", self.base_url, app_id);
        get_json(&self.client, &url).await
    }
}

/// 監視対象アプリケーションのフィルタ
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    application_type: Option<String>,
    name_pattern: Option<Regex>,
}

impl ApplicationFilter {
    /// フィルタを作成
    ///
    /// 名前パターンは名前の先頭にアンカーされる（前方一致の正規表現）。
    pub fn new(application_type: Option<&str>, name_pattern: Option<&str>) -> SdResult<Self> {
        let name_pattern = name_pattern
            .map(|p| Regex::new(&format!("^(?:{p})")))
            .transpose()
            .map_err(|e| SdError::Config(format!("invalid name filter: {e}")))?;
        Ok(Self {
            application_type: application_type
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            name_pattern,
        })
    }

    /// 設定から作成
    pub fn from_config(config: &DiscoveryConfig) -> SdResult<Self> {
        Self::new(
            config.application_type.as_deref(),
            config.name_filter.as_deref(),
        )
    }

    /// 対象か
    pub fn matches(&self, app: &YarnApp) -> bool {
        let type_ok = self
            .application_type
            .as_deref()
            .map_or(true, |t| app.application_type == t);
        let name_ok = self
            .name_pattern
            .as_ref()
            .map_or(true, |re| re.is_match(&app.name));
        type_ok && name_ok
    }
}

/// 稼働中アプリケーションのスナップショットを取得
///
/// 一覧そのものの取得失敗はエラーとして返す。個々のアプリケーションの
/// アテンプト取得失敗は、そのIDを未検証として記録し他の取得を続ける。
pub async fn fetch_running_snapshot(
    yarn: &YarnClient,
    filter: &ApplicationFilter,
) -> SdResult<RunningSnapshot> {
    let apps = yarn.list_apps().await?;
    let total = apps.len();
    let mut snapshot = RunningSnapshot::new();

    for app in apps
        .into_iter()
        .filter(|app| filter.matches(app))
        .filter(|app| ApplicationState::parse(&app.state).is_running())
    {
        match yarn.app_attempts(&app.id).await {
            Ok(attempts) => match attempts.last_attempt_id() {
                Some(last_attempt_id) => snapshot.insert(Application::from_yarn(app, last_attempt_id)),
                None => {
                    warn!(app_id = %app.id, "Attempt list is empty; skipping application this cycle");
                    snapshot.mark_unverified(app.id);
                }
            },
            Err(e) => {
                warn!(app_id = %app.id, error = %e, "Failed to fetch attempts; skipping application this cycle");
                snapshot.mark_unverified(app.id);
            }
        }
    }

    debug!(
        listed = total,
        running = snapshot.len(),
        unverified = snapshot.unverified().len(),
        "Fetched running snapshot"
    );

    Ok(snapshot)
}
