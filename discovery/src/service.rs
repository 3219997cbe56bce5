//! ポーリングループと単発実行
//!
//! `--app-id` 指定時は1アプリケーションだけ解決して終了し、
//! それ以外は ResourceManager を一定間隔でポーリングし続ける。

use std::time::Duration;

use flink_sd_common::types::EndpointSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::{SdError, SdResult};
use crate::extractor::{EndpointResolver, Extractor, Resolution};
use crate::flink::FlinkClient;
use crate::http::build_client;
use crate::reconciler::{CycleReport, Reconciler};
use crate::registry::{open_registry, TargetRegistry};
use crate::shutdown::ShutdownController;
use crate::yarn::{fetch_running_snapshot, ApplicationFilter, YarnClient};

/// 設定に従って実行
pub async fn run(config: DiscoveryConfig, shutdown: ShutdownController) -> SdResult<()> {
    let client = build_client(config.request_timeout)?;
    let yarn = YarnClient::new(client.clone(), config.rm_address.clone());
    let flink = FlinkClient::new(client).with_log_read_timeout(config.request_timeout);
    let extractor = Extractor::new(
        yarn.clone(),
        flink,
        config.extractor_settings(),
        shutdown.clone(),
    );
    let registry = open_registry(config.target_dir.as_deref())?;

    if let Some(app_id) = config.app_id.as_deref() {
        info!(app_id, rm = %config.rm_address, "Resolving single application");
        run_once(app_id, &extractor, &registry).await?;
        return Ok(());
    }

    let filter = ApplicationFilter::from_config(&config)?;
    let mut reconciler = Reconciler::new(extractor, registry).with_refresh(config.refresh_resolved);

    info!(
        rm = %config.rm_address,
        application_type = config.application_type.as_deref().unwrap_or("*"),
        name_filter = config.name_filter.as_deref().unwrap_or("*"),
        interval_secs = config.poll_interval.as_secs_f64(),
        target_dir = ?config.target_dir,
        "Starting discovery loop"
    );
    run_polling(&yarn, &filter, &mut reconciler, config.poll_interval, &shutdown).await;
    info!("Discovery loop stopped");
    Ok(())
}

/// 1アプリケーションを解決して書き込む
pub async fn run_once<R, T>(app_id: &str, resolver: &R, registry: &T) -> SdResult<EndpointSet>
where
    R: EndpointResolver + ?Sized,
    T: TargetRegistry + ?Sized,
{
    match resolver.resolve(app_id).await {
        Resolution::Resolved(endpoints) => {
            registry.write(app_id, &endpoints)?;
            Ok(endpoints)
        }
        Resolution::Unresolved(reason) => Err(SdError::Unresolved {
            app_id: app_id.to_string(),
            reason: reason.to_string(),
        }),
    }
}

/// 1サイクル分のポーリング
///
/// 一覧取得に失敗した場合はレジストリに触れず `None` を返す。
pub async fn poll_once<R, T>(
    yarn: &YarnClient,
    filter: &ApplicationFilter,
    reconciler: &mut Reconciler<R, T>,
) -> Option<CycleReport>
where
    R: EndpointResolver,
    T: TargetRegistry,
{
    let snapshot = match fetch_running_snapshot(yarn, filter).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(rm = %yarn.base_url(), error = %e, "Failed to list applications; skipping cycle");
            return None;
        }
    };

    let report = reconciler.reconcile(snapshot).await;
    if report.is_quiet() {
        debug!("No registry changes");
    } else {
        info!(
            added = ?report.added,
            removed = ?report.removed,
            restarted = ?report.restarted,
            carried_forward = ?report.carried_forward,
            written = ?report.written,
            deleted = ?report.deleted,
            unresolved = ?report.unresolved,
            changed = ?report.changed,
            "Reconciled targets"
        );
    }
    Some(report)
}

/// シャットダウン要求までポーリングを続ける
pub async fn run_polling<R, T>(
    yarn: &YarnClient,
    filter: &ApplicationFilter,
    reconciler: &mut Reconciler<R, T>,
    poll_interval: Duration,
    shutdown: &ShutdownController,
) where
    R: EndpointResolver,
    T: TargetRegistry,
{
    let mut timer = interval(poll_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = shutdown.wait() => break,
        }
        if shutdown.is_shutdown_requested() {
            break;
        }
        poll_once(yarn, filter, reconciler).await;
    }
}
