//! 共通型定義
//!
//! Application, Endpoint, EndpointSet, RunningSnapshot 等のコアデータ型

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;
use crate::protocol::YarnApp;

/// アプリケーションのライフサイクル状態（YARN の `state`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    /// 作成直後
    New,
    /// 永続化中
    NewSaving,
    /// 投入済み
    Submitted,
    /// スケジューラ受理済み
    Accepted,
    /// 稼働中
    Running,
    /// 正常終了
    Finished,
    /// 異常終了
    Failed,
    /// 強制終了
    Killed,
    /// 未知の状態
    #[serde(other)]
    Unknown,
}

impl ApplicationState {
    /// 大文字小文字を区別せずに解釈する
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEW" => Self::New,
            "NEW_SAVING" => Self::NewSaving,
            "SUBMITTED" => Self::Submitted,
            "ACCEPTED" => Self::Accepted,
            "RUNNING" => Self::Running,
            "FINISHED" => Self::Finished,
            "FAILED" => Self::Failed,
            "KILLED" => Self::Killed,
            _ => Self::Unknown,
        }
    }

    /// 稼働中か
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// YARN 上の Flink アプリケーション
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// アプリケーションID
    pub id: String,
    /// 表示名
    pub name: String,
    /// ライフサイクル状態
    pub state: ApplicationState,
    /// アプリケーション種別
    pub application_type: String,
    /// JobManager のベースURL（末尾 `/` なし）
    pub tracking_url: Option<String>,
    /// 稼働中コンテナ数
    pub running_containers: Option<i64>,
    /// 最新アテンプトID。増加は JobManager の再起動を意味する
    pub last_attempt_id: u64,
}

impl Application {
    /// YARN のレスポンスとアテンプトIDから作成
    pub fn from_yarn(app: YarnApp, last_attempt_id: u64) -> Self {
        Self {
            state: ApplicationState::parse(&app.state),
            tracking_url: app.tracking_url.as_deref().and_then(normalize_tracking_url),
            id: app.id,
            name: app.name,
            application_type: app.application_type,
            running_containers: app.running_containers,
            last_attempt_id,
        }
    }
}

/// トラッキングURLの末尾 `/` を取り除く（空文字列は `None`）
pub fn normalize_tracking_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// メトリクススクレイプ先 (`host:port`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// ホスト名またはアドレス
    pub host: String,
    /// PrometheusReporter の待受ポート
    pub port: u16,
}

impl Endpoint {
    /// 新しいエンドポイントを作成
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| CommonError::InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(CommonError::InvalidEndpoint(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| CommonError::InvalidPort(port.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// 1アプリケーションのエンドポイント集合（順序なし・重複なし）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet(BTreeSet<Endpoint>);

impl EndpointSet {
    /// 空の集合を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// エンドポイントを追加（既存なら false）
    pub fn insert(&mut self, endpoint: Endpoint) -> bool {
        self.0.insert(endpoint)
    }

    /// 要素数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 空か
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 含まれるか
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.0.contains(endpoint)
    }

    /// ソート済みのターゲット文字列
    pub fn targets(&self) -> Vec<String> {
        self.0.iter().map(Endpoint::to_string).collect()
    }
}

impl FromIterator<Endpoint> for EndpointSet {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// ResourceManager が「今稼働中」と報告したアプリケーションの集合
///
/// 1アプリケーションIDにつき1レコード。同じIDが複数回現れた場合は
/// アテンプトIDが最大のものを残す。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningSnapshot {
    apps: BTreeMap<String, Application>,
    unverified: BTreeSet<String>,
}

impl RunningSnapshot {
    /// 空のスナップショット
    pub fn new() -> Self {
        Self::default()
    }

    /// アプリケーションを追加
    pub fn insert(&mut self, app: Application) {
        match self.apps.get(&app.id) {
            Some(existing) if existing.last_attempt_id >= app.last_attempt_id => {}
            _ => {
                self.unverified.remove(&app.id);
                self.apps.insert(app.id.clone(), app);
            }
        }
    }

    /// 稼働中だがアテンプト情報を取得できなかったIDを記録
    pub fn mark_unverified(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.apps.contains_key(&id) {
            self.unverified.insert(id);
        }
    }

    /// 前回スナップショットから未検証IDのレコードを引き継ぐ
    ///
    /// 戻り値は引き継いだID。前回も存在しなかったIDは引き継げないので捨てる。
    pub fn carry_forward(&mut self, previous: &RunningSnapshot) -> Vec<String> {
        let mut carried = Vec::new();
        for id in std::mem::take(&mut self.unverified) {
            if let Some(app) = previous.apps.get(&id) {
                self.apps.insert(id.clone(), app.clone());
                carried.push(id);
            }
        }
        carried
    }

    /// IDで取得
    pub fn get(&self, id: &str) -> Option<&Application> {
        self.apps.get(id)
    }

    /// 含まれるか
    pub fn contains(&self, id: &str) -> bool {
        self.apps.contains_key(id)
    }

    /// 稼働中IDを列挙（ソート順）
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.apps.keys()
    }

    /// アプリケーションを列挙
    pub fn apps(&self) -> impl Iterator<Item = &Application> {
        self.apps.values()
    }

    /// 未検証ID
    pub fn unverified(&self) -> &BTreeSet<String> {
        &self.unverified
    }

    /// 稼働中アプリケーション数
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// 空か
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl FromIterator<Application> for RunningSnapshot {
    fn from_iter<I: IntoIterator<Item = Application>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for app in iter {
            snapshot.insert(app);
        }
        snapshot
    }
}
