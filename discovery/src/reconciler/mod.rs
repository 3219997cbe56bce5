//! レジストリ収束（状態機械）
//!
//! アプリケーションIDごとの状態:
//!
//! ```text
//! unknown → pending → resolved → (restarted → pending) | removed
//! ```
//!
//! 前回スナップショットと既知エンドポイントを保持し、サイクルごとに
//! 追加・削除・再起動・エンドポイント変化をレジストリへ反映する。
//! 再起動時は必ず削除してから書き直す。削除に失敗したIDは、削除が成功するか
//! 新しい内容で上書きされるまで毎サイクル削除を再試行する。

pub mod diff;

use std::collections::{BTreeMap, BTreeSet};

use flink_sd_common::types::{EndpointSet, RunningSnapshot};
use tracing::{debug, error, info, warn};

use crate::extractor::{EndpointResolver, Resolution};
use crate::registry::TargetRegistry;

pub use diff::{diff_snapshots, AttemptChange, SnapshotDiff};

/// 1アプリケーションの追跡状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tracked {
    /// 稼働中だがエンドポイント未解決
    Pending,
    /// ターゲットファイル書き込み済み
    Resolved(EndpointSet),
}

/// 1サイクルの処理結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 新規に検出したID
    pub added: Vec<String>,
    /// 稼働中でなくなったID
    pub removed: Vec<String>,
    /// 再起動を検出したID
    pub restarted: Vec<String>,
    /// アテンプト取得に失敗し前回の状態を引き継いだID
    pub carried_forward: Vec<String>,
    /// ターゲットを書き込んだID
    pub written: Vec<String>,
    /// ターゲットを削除したID
    pub deleted: Vec<String>,
    /// 今回解決できなかったID
    pub unresolved: Vec<String>,
    /// 再導出でエンドポイントが変わったID
    pub changed: Vec<String>,
}

impl CycleReport {
    /// 何も起きなかったか
    pub fn is_quiet(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.restarted.is_empty()
            && self.carried_forward.is_empty()
            && self.written.is_empty()
            && self.deleted.is_empty()
            && self.unresolved.is_empty()
            && self.changed.is_empty()
    }
}

/// スナップショット差分をレジストリに反映する
pub struct Reconciler<R, T> {
    resolver: R,
    registry: T,
    previous: RunningSnapshot,
    tracked: BTreeMap<String, Tracked>,
    pending_deletes: BTreeSet<String>,
    refresh_resolved: bool,
}

impl<R, T> Reconciler<R, T>
where
    R: EndpointResolver,
    T: TargetRegistry,
{
    /// 新しいReconcilerを作成
    pub fn new(resolver: R, registry: T) -> Self {
        Self {
            resolver,
            registry,
            previous: RunningSnapshot::new(),
            tracked: BTreeMap::new(),
            pending_deletes: BTreeSet::new(),
            refresh_resolved: true,
        }
    }

    /// 解決済みアプリケーションの再導出を有効/無効にする
    pub fn with_refresh(mut self, refresh_resolved: bool) -> Self {
        self.refresh_resolved = refresh_resolved;
        self
    }

    /// レジストリ
    pub fn registry(&self) -> &T {
        &self.registry
    }

    /// 前回スナップショット
    pub fn previous(&self) -> &RunningSnapshot {
        &self.previous
    }

    /// IDの追跡状態
    pub fn tracked(&self, app_id: &str) -> Option<&Tracked> {
        self.tracked.get(app_id)
    }

    /// 書き込み済みのID
    pub fn resolved_ids(&self) -> BTreeSet<String> {
        self.tracked
            .iter()
            .filter(|(_, state)| matches!(state, Tracked::Resolved(_)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// 1サイクル分の収束処理
    pub async fn reconcile(&mut self, mut current: RunningSnapshot) -> CycleReport {
        let mut report = CycleReport {
            carried_forward: current.carry_forward(&self.previous),
            ..CycleReport::default()
        };

        let diff = diff_snapshots(&self.previous, &current);
        report.added = diff.added.iter().cloned().collect();
        report.removed = diff.removed.iter().cloned().collect();
        report.restarted = diff.restarted.keys().cloned().collect();

        self.retry_pending_deletes(&mut report);

        for app_id in &diff.removed {
            self.tracked.remove(app_id);
            self.delete_entry(app_id, &mut report);
        }

        let mut handled = BTreeSet::new();

        for (app_id, change) in &diff.restarted {
            info!(
                app_id = %app_id,
                previous_attempt = change.previous,
                current_attempt = change.current,
                "New attempt detected"
            );
            self.delete_entry(app_id, &mut report);
            self.tracked.insert(app_id.clone(), Tracked::Pending);
            self.materialize(app_id, &mut report).await;
            handled.insert(app_id.clone());
        }

        for app_id in &diff.added {
            self.tracked.insert(app_id.clone(), Tracked::Pending);
            self.materialize(app_id, &mut report).await;
            handled.insert(app_id.clone());
        }

        let still_pending: Vec<String> = self
            .tracked
            .iter()
            .filter(|(id, state)| {
                **state == Tracked::Pending && current.contains(id) && !handled.contains(*id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for app_id in &still_pending {
            debug!(app_id = %app_id, "Retrying unresolved application");
            self.materialize(app_id, &mut report).await;
            handled.insert(app_id.clone());
        }

        if self.refresh_resolved {
            let resolved: Vec<(String, EndpointSet)> = self
                .tracked
                .iter()
                .filter(|(id, _)| current.contains(id) && !handled.contains(*id))
                .filter_map(|(id, state)| match state {
                    Tracked::Resolved(endpoints) => Some((id.clone(), endpoints.clone())),
                    Tracked::Pending => None,
                })
                .collect();
            for (app_id, known) in resolved {
                self.refresh(&app_id, known, &mut report).await;
            }
        }

        self.previous = current;
        report
    }

    /// 解決してターゲットを書き込む
    async fn materialize(&mut self, app_id: &str, report: &mut CycleReport) {
        match self.resolver.resolve(app_id).await {
            Resolution::Resolved(endpoints) => match self.registry.write(app_id, &endpoints) {
                Ok(()) => {
                    report.written.push(app_id.to_string());
                    self.pending_deletes.remove(app_id);
                    self.tracked
                        .insert(app_id.to_string(), Tracked::Resolved(endpoints));
                }
                Err(e) => {
                    error!(app_id, error = %e, "Failed to write targets");
                    report.unresolved.push(app_id.to_string());
                }
            },
            Resolution::Unresolved(reason) => {
                warn!(app_id, reason = %reason, "Endpoints not resolved this cycle");
                report.unresolved.push(app_id.to_string());
            }
        }
    }

    /// 解決済みアプリケーションを再導出し、変化があれば削除してから書き直す
    async fn refresh(&mut self, app_id: &str, known: EndpointSet, report: &mut CycleReport) {
        match self.resolver.resolve(app_id).await {
            Resolution::Resolved(endpoints) if endpoints != known => {
                info!(
                    app_id,
                    before = ?known.targets(),
                    after = ?endpoints.targets(),
                    "Endpoints changed"
                );
                self.delete_entry(app_id, report);
                match self.registry.write(app_id, &endpoints) {
                    Ok(()) => {
                        report.changed.push(app_id.to_string());
                        report.written.push(app_id.to_string());
                        self.pending_deletes.remove(app_id);
                        self.tracked
                            .insert(app_id.to_string(), Tracked::Resolved(endpoints));
                    }
                    Err(e) => {
                        error!(app_id, error = %e, "Failed to rewrite targets");
                        report.unresolved.push(app_id.to_string());
                        self.tracked.insert(app_id.to_string(), Tracked::Pending);
                    }
                }
            }
            Resolution::Resolved(_) => {}
            Resolution::Unresolved(reason) => {
                debug!(app_id, reason = %reason, "Refresh skipped; keeping current targets");
            }
        }
    }

    /// 削除する。失敗したIDは削除待ちに残す
    fn delete_entry(&mut self, app_id: &str, report: &mut CycleReport) {
        match self.registry.delete(app_id) {
            Ok(()) => {
                report.deleted.push(app_id.to_string());
                self.pending_deletes.remove(app_id);
            }
            Err(e) => {
                error!(app_id, error = %e, "Failed to delete targets; will retry");
                self.pending_deletes.insert(app_id.to_string());
            }
        }
    }

    /// 削除待ちのIDを再削除する（その後に書き込み済みのIDは除く）
    fn retry_pending_deletes(&mut self, report: &mut CycleReport) {
        let pending: Vec<String> = self.pending_deletes.iter().cloned().collect();
        for app_id in pending {
            if matches!(self.tracked.get(&app_id), Some(Tracked::Resolved(_))) {
                self.pending_deletes.remove(&app_id);
                continue;
            }
            self.delete_entry(&app_id, report);
        }
    }
}
