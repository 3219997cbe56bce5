//! スナップショット差分
//!
//! 前回と今回の `RunningSnapshot` から追加・削除・再起動を求める純粋関数。

use std::collections::{BTreeMap, BTreeSet};

use flink_sd_common::types::RunningSnapshot;

/// アテンプトIDの変化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptChange {
    /// 前回のアテンプトID
    pub previous: u64,
    /// 今回のアテンプトID
    pub current: u64,
}

/// 2つのスナップショットの差分
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// 今回新たに稼働中になったID
    pub added: BTreeSet<String>,
    /// 稼働中でなくなったID
    pub removed: BTreeSet<String>,
    /// 両方に存在し、アテンプトIDが増えたID
    pub restarted: BTreeMap<String, AttemptChange>,
}

impl SnapshotDiff {
    /// 変化が無いか
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.restarted.is_empty()
    }
}

/// 差分を計算
pub fn diff_snapshots(previous: &RunningSnapshot, current: &RunningSnapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for app in current.apps() {
        match previous.get(&app.id) {
            None => {
                diff.added.insert(app.id.clone());
            }
            Some(prev) if app.last_attempt_id > prev.last_attempt_id => {
                diff.restarted.insert(
                    app.id.clone(),
                    AttemptChange {
                        previous: prev.last_attempt_id,
                        current: app.last_attempt_id,
                    },
                );
            }
            Some(_) => {}
        }
    }

    diff.removed = previous
        .ids()
        .filter(|id| !current.contains(id))
        .cloned()
        .collect();

    diff
}
