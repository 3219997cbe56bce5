//! ログからのエンドポイント抽出
//!
//! JobManager と各 TaskManager のログを走査して PrometheusReporter の待受アドレスを集め、
//! アプリケーション単位の `EndpointSet` にまとめる。Reporter はプロセス起動後に
//! 非同期に立ち上がるため、解決は固定間隔で再試行する。
//!
//! 1回の試行は以下の順で行う:
//!
//! 1. ResourceManager からトラッキングURLとコンテナ数を取得
//! 2. `/overview` に `flink-version` が出ていること
//! 3. TaskManager 数 == 稼働コンテナ数 − 1（JobManager分）であること
//! 4. TaskManager ログを同時数の上限付きで並行に走査し、JobManager ログを走査
//! 5. 部分結果をまとめてポリシーを適用

pub mod policy;
pub mod scanner;

use std::fmt;

use async_trait::async_trait;
use flink_sd_common::types::{normalize_tracking_url, ApplicationState, EndpointSet};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::SdResult;
use crate::flink::FlinkClient;
use crate::shutdown::ShutdownController;
use crate::yarn::YarnClient;

pub use policy::{NoReporterPolicy, PartialPolicy, RetryPolicy};
pub use scanner::{scan_log, ReporterMarkers, ScanOptions, ScanOutcome, Signal, SignalMatcher};

/// JobManager を表すプロセス名（ログ出力用）
const MASTER_PROCESS: &str = "jobmanager";

/// 同時に読む TaskManager ログの上限
const MAX_CONCURRENT_LOG_SCANS: usize = 8;

/// 抽出の設定
#[derive(Debug, Clone, Default)]
pub struct ExtractorSettings {
    /// 再試行ポリシー
    pub retry: RetryPolicy,
    /// 部分結果の扱い
    pub partial_policy: PartialPolicy,
    /// Reporter 未設定プロセスの扱い
    pub no_reporter_policy: NoReporterPolicy,
    /// 1ログあたりの最大走査行数
    pub line_budget: Option<usize>,
}

/// 1アプリケーションの解決結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 登録可能なエンドポイント集合
    Resolved(EndpointSet),
    /// 今回のサイクルでは解決できなかった
    Unresolved(UnresolvedReason),
}

/// 未解決の理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// 再試行上限に到達
    RetriesExhausted {
        /// 試行回数
        attempts: u32,
    },
    /// 再試行しても変わらない状態（Reporter 未設定、終了済み等）
    Blocked(String),
    /// シャットダウン要求で中断
    Cancelled,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted { attempts } => write!(f, "gave up after {attempts} attempts"),
            Self::Blocked(reason) => f.write_str(reason),
            Self::Cancelled => f.write_str("shutdown requested"),
        }
    }
}

/// アプリケーションIDからエンドポイント集合を解決する
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// 解決する（再試行を含む）
    async fn resolve(&self, app_id: &str) -> Resolution;
}

/// 1回の試行結果
#[derive(Debug, Clone, PartialEq, Eq)]
enum Attempt {
    Complete(EndpointSet),
    Partial { found: EndpointSet, expected: usize },
    NotReady(String),
    Blocked(String),
}

/// ResourceManager と JobManager に問い合わせてエンドポイントを抽出する
#[derive(Debug, Clone)]
pub struct Extractor {
    yarn: YarnClient,
    flink: FlinkClient,
    markers: ReporterMarkers,
    settings: ExtractorSettings,
    shutdown: ShutdownController,
}

impl Extractor {
    /// 新しい抽出器を作成
    pub fn new(
        yarn: YarnClient,
        flink: FlinkClient,
        settings: ExtractorSettings,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            yarn,
            flink,
            markers: ReporterMarkers,
            settings,
            shutdown,
        }
    }

    /// JobManager のエンドポイントを抽出
    ///
    /// ホストは `jobmanager.rpc.address` を初期値とし、ログにホスト名行があればそちらを優先する。
    pub async fn extract_master_endpoint(&self, tracking_url: &str) -> SdResult<ScanOutcome> {
        let fallback_host = match self.flink.jobmanager_rpc_address(tracking_url).await {
            Ok(address) => address,
            Err(e) => {
                debug!(tracking_url, error = %e, "JobManager config unavailable");
                None
            }
        };

        let lines = self.flink.jobmanager_log(tracking_url).await?;
        let options = ScanOptions {
            fallback_host,
            line_budget: self.settings.line_budget,
        };
        Ok(scan_log(lines, &self.markers, &options).await)
    }

    /// TaskManager のエンドポイントを抽出
    pub async fn extract_worker_endpoint(
        &self,
        tracking_url: &str,
        worker_id: &str,
    ) -> SdResult<ScanOutcome> {
        let lines = self.flink.taskmanager_log(tracking_url, worker_id).await?;
        let options = ScanOptions {
            fallback_host: None,
            line_budget: self.settings.line_budget,
        };
        Ok(scan_log(lines, &self.markers, &options).await)
    }

    /// 再試行付きで解決
    pub async fn resolve_endpoints(&self, app_id: &str) -> Resolution {
        let mut attempts = 0u32;

        loop {
            if self.shutdown.is_shutdown_requested() {
                return Resolution::Unresolved(UnresolvedReason::Cancelled);
            }
            attempts += 1;

            let partial = match self.attempt(app_id).await {
                Attempt::Complete(endpoints) => {
                    info!(
                        app_id,
                        attempts,
                        targets = endpoints.len(),
                        "Resolved metrics endpoints"
                    );
                    return Resolution::Resolved(endpoints);
                }
                Attempt::Blocked(reason) => {
                    warn!(app_id, reason = %reason, "Endpoint extraction stopped");
                    return Resolution::Unresolved(UnresolvedReason::Blocked(reason));
                }
                Attempt::Partial { found, expected } => {
                    debug!(
                        app_id,
                        attempt = attempts,
                        found = found.len(),
                        expected,
                        "Endpoints incomplete"
                    );
                    Some((found, expected))
                }
                Attempt::NotReady(reason) => {
                    debug!(app_id, attempt = attempts, reason = %reason, "Application not ready");
                    None
                }
            };

            if self.settings.retry.is_exhausted(attempts) {
                return self.give_up(app_id, attempts, partial);
            }

            if !self.shutdown.sleep(self.settings.retry.interval).await {
                return Resolution::Unresolved(UnresolvedReason::Cancelled);
            }
        }
    }

    fn give_up(
        &self,
        app_id: &str,
        attempts: u32,
        partial: Option<(EndpointSet, usize)>,
    ) -> Resolution {
        match (self.settings.partial_policy, partial) {
            (PartialPolicy::AllowPartial, Some((found, expected))) if !found.is_empty() => {
                warn!(
                    app_id,
                    found = found.len(),
                    expected,
                    "Registering partial endpoint list"
                );
                Resolution::Resolved(found)
            }
            _ => {
                warn!(app_id, attempts, "Giving up on endpoint extraction for this cycle");
                Resolution::Unresolved(UnresolvedReason::RetriesExhausted { attempts })
            }
        }
    }

    async fn attempt(&self, app_id: &str) -> Attempt {
        let app = match self.yarn.app(app_id).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                return Attempt::NotReady("application not reported by the resource manager".into())
            }
            Err(e) => return Attempt::NotReady(format!("resource manager query failed: {e}")),
        };

        if matches!(
            ApplicationState::parse(&app.state),
            ApplicationState::Finished | ApplicationState::Failed | ApplicationState::Killed
        ) {
            return Attempt::Blocked(format!("application is {}", app.state));
        }

        let Some(tracking_url) = app.tracking_url.as_deref().and_then(normalize_tracking_url)
        else {
            return Attempt::NotReady("tracking URL not published yet".into());
        };

        match self.flink.overview(&tracking_url).await {
            Ok(overview) if overview.flink_version.is_some() => {}
            Ok(_) => return Attempt::NotReady("overview has no flink-version yet".into()),
            Err(e) => return Attempt::NotReady(format!("overview unavailable: {e}")),
        }

        let workers = match self.flink.taskmanager_ids(&tracking_url).await {
            Ok(workers) => workers,
            Err(e) => return Attempt::NotReady(format!("taskmanager list unavailable: {e}")),
        };

        if let Some(running) = app.running_containers {
            if workers.len() as i64 != running - 1 {
                return Attempt::NotReady(format!(
                    "{} taskmanagers listed but {} containers running",
                    workers.len(),
                    running
                ));
            }
        }

        let tracking_url = tracking_url.as_str();
        let worker_futures: Vec<_> = workers
            .iter()
            .map(|worker_id| async move {
                (
                    worker_id.as_str(),
                    self.extract_worker_endpoint(tracking_url, worker_id).await,
                )
            })
            .collect();
        let worker_scans: Vec<_> = stream::iter(worker_futures)
            .buffer_unordered(MAX_CONCURRENT_LOG_SCANS)
            .collect()
            .await;
        let master_scan = self.extract_master_endpoint(tracking_url).await;

        self.combine(app_id, std::iter::once((MASTER_PROCESS, master_scan)).chain(worker_scans))
    }

    fn combine<'a>(
        &self,
        app_id: &str,
        scans: impl Iterator<Item = (&'a str, SdResult<ScanOutcome>)>,
    ) -> Attempt {
        let mut found = EndpointSet::new();
        let mut expected = 0usize;
        let mut resolved = 0usize;
        let mut missing = Vec::new();
        let mut without_reporter = Vec::new();

        for (process, outcome) in scans {
            match outcome {
                Ok(ScanOutcome::Found(endpoint)) => {
                    expected += 1;
                    resolved += 1;
                    found.insert(endpoint);
                }
                Ok(ScanOutcome::NoReporter) => without_reporter.push(process),
                Ok(ScanOutcome::Incomplete) => {
                    expected += 1;
                    missing.push(process);
                }
                Err(e) => {
                    debug!(app_id, process, error = %e, "Log unavailable");
                    expected += 1;
                    missing.push(process);
                }
            }
        }

        if !without_reporter.is_empty() {
            match self.settings.no_reporter_policy {
                NoReporterPolicy::Block => {
                    return Attempt::Blocked(format!(
                        "no metrics reporter configured on {}",
                        without_reporter.join(", ")
                    ));
                }
                NoReporterPolicy::Exclude => {
                    debug!(app_id, processes = ?without_reporter, "Excluding processes without reporter");
                }
            }
        }

        if expected == 0 {
            return Attempt::Blocked("no process has a metrics reporter configured".into());
        }

        if resolved == expected {
            Attempt::Complete(found)
        } else {
            debug!(app_id, missing = ?missing, "Reporter lines not found yet");
            Attempt::Partial { found, expected }
        }
    }
}

#[async_trait]
impl EndpointResolver for Extractor {
    async fn resolve(&self, app_id: &str) -> Resolution {
        self.resolve_endpoints(app_id).await
    }
}
