//! ターゲットレジストリ
//!
//! アプリケーションIDごとに Prometheus `file_sd` のターゲットファイルを1つ持つ。
//! 書き込みは丸ごと置き換え、削除は冪等（存在しなくても成功）。

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flink_sd_common::error::CommonError;
use flink_sd_common::protocol::TargetGroup;
use flink_sd_common::types::EndpointSet;
use tracing::{debug, info};

use crate::error::{SdError, SdResult};

/// ターゲットの永続化先
pub trait TargetRegistry: Send + Sync {
    /// アプリケーションのターゲットを書き込む（既存内容は置き換え）
    fn write(&self, app_id: &str, endpoints: &EndpointSet) -> SdResult<()>;

    /// アプリケーションのターゲットを削除する（存在しなくても成功）
    fn delete(&self, app_id: &str) -> SdResult<()>;
}

impl<T: TargetRegistry + ?Sized> TargetRegistry for Box<T> {
    fn write(&self, app_id: &str, endpoints: &EndpointSet) -> SdResult<()> {
        (**self).write(app_id, endpoints)
    }

    fn delete(&self, app_id: &str) -> SdResult<()> {
        (**self).delete(app_id)
    }
}

/// `[{"targets": [...]}]` 形式にシリアライズ
pub fn render_targets(endpoints: &EndpointSet) -> SdResult<String> {
    let groups = [TargetGroup {
        targets: endpoints.targets(),
    }];
    Ok(serde_json::to_string(&groups)?)
}

/// 出力先ディレクトリ（未指定なら標準出力）に応じたレジストリを開く
pub fn open_registry(target_dir: Option<&Path>) -> SdResult<Box<dyn TargetRegistry>> {
    match target_dir {
        Some(dir) => Ok(Box::new(DirectoryRegistry::open(dir)?)),
        None => Ok(Box::new(StdoutRegistry::stdout())),
    }
}

/// ディレクトリに `{app_id}.json` を置くレジストリ
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    dir: PathBuf,
}

impl DirectoryRegistry {
    /// 既存ディレクトリを開く（存在しなければ設定エラー）
    pub fn open(dir: impl Into<PathBuf>) -> SdResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(SdError::Config(format!(
                "cannot find target directory {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// アプリケーションのターゲットファイルパス
    pub fn path_for(&self, app_id: &str) -> SdResult<PathBuf> {
        validate_app_id(app_id)?;
        Ok(self.dir.join(format!("{app_id}.json")))
    }
}

impl TargetRegistry for DirectoryRegistry {
    fn write(&self, app_id: &str, endpoints: &EndpointSet) -> SdResult<()> {
        let path = self.path_for(app_id)?;
        let content = render_targets(endpoints)?;

        // 一時ファイルに書いてから rename し、途中状態を見せない
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content.as_bytes())?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(path = %path.display(), targets = %content, "Wrote target file");
        Ok(())
    }

    fn delete(&self, app_id: &str) -> SdResult<()> {
        let path = self.path_for(app_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted target file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Target file already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// 1行1アーティファクトで書き出すレジストリ（削除はログのみ）
#[derive(Debug, Default)]
pub struct StreamRegistry<W> {
    out: Mutex<W>,
}

/// 標準出力に書き出すレジストリ
pub type StdoutRegistry = StreamRegistry<io::Stdout>;

impl StreamRegistry<io::Stdout> {
    /// 標準出力へ書き出す
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StreamRegistry<W> {
    /// 任意の書き込み先を使う
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// 書き込み先を取り出す
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> TargetRegistry for StreamRegistry<W> {
    fn write(&self, app_id: &str, endpoints: &EndpointSet) -> SdResult<()> {
        let content = render_targets(endpoints)?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{content}")?;
        out.flush()?;
        debug!(app_id, "Printed targets");
        Ok(())
    }

    fn delete(&self, app_id: &str) -> SdResult<()> {
        info!(app_id, "Application removed");
        Ok(())
    }
}

fn validate_app_id(app_id: &str) -> SdResult<()> {
    let valid = !app_id.is_empty()
        && app_id != "."
        && app_id != ".."
        && !app_id.contains(|c: char| c == '/' || c == '\\');
    if valid {
        Ok(())
    } else {
        Err(CommonError::Validation(format!("unsafe application id '{app_id}'")).into())
    }
}
