//! 运行结束后的附属文件处理
//!
//! 把项目元数据文件原样复制到目标项目目录（`project.json` 中的 `detached`
//! 强制为 `true`），并删除目标目录中的锁文件。

use serde_json::Value;
use slog::{debug, info, warn, Logger};
use std::io;
use std::path::Path;

use utils::error::Result;

use crate::sync::{RunCompleteHook, RunReport};

pub const PROJECT_FILE: &str = "project.json";
pub const SIDECAR_FILES: [&str; 3] = [PROJECT_FILE, "workspaces.json", "job_manifest.json"];
pub const DEFAULT_LOCK_FILE: &str = "cs.lock";

pub struct SidecarFinalizer {
    lock_file: String,
    logger: Logger,
}

impl SidecarFinalizer {
    pub fn new(lock_file: &str, logger: Logger) -> Self {
        Self {
            lock_file: lock_file.to_string(),
            logger,
        }
    }

    /// 复制附属文件并删除锁文件；单个文件的错误只记录日志
    pub async fn finalize(&self, source_root: &Path, project_dir: &Path) {
        for name in SIDECAR_FILES {
            let src = source_root.join(name);
            if !tokio::fs::try_exists(&src).await.unwrap_or(false) {
                debug!(self.logger, "Side-car file not present"; "file" => name);
                continue;
            }

            let dest = project_dir.join(name);
            let copied = if name == PROJECT_FILE {
                copy_detached_project(&src, &dest).await
            } else {
                tokio::fs::copy(&src, &dest).await.map(|_| ())
            };

            match copied {
                Ok(()) => info!(self.logger, "Copied side-car file"; "file" => name),
                Err(err) => warn!(self.logger, "Failed to copy side-car file"; "file" => name, "error" => %err),
            }
        }

        let lock = project_dir.join(&self.lock_file);
        match tokio::fs::remove_file(&lock).await {
            Ok(()) => info!(self.logger, "Removed lock file"; "path" => %lock.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(self.logger, "Failed to remove lock file"; "path" => %lock.display(), "error" => %err),
        }
    }
}

#[async_trait::async_trait]
impl RunCompleteHook for SidecarFinalizer {
    async fn on_run_complete(&self, report: &RunReport) -> Result<()> {
        self.finalize(&report.source_root, &report.project_dir).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sidecar"
    }
}

/// 复制 project.json 并标记为 detached；非对象JSON原样复制
async fn copy_detached_project(src: &Path, dest: &Path) -> io::Result<()> {
    let raw = tokio::fs::read(src).await?;
    let contents = match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Object(mut fields)) => {
            fields.insert("detached".to_string(), Value::Bool(true));
            serde_json::to_vec_pretty(&Value::Object(fields)).map_err(io::Error::other)?
        }
        Ok(_) => raw,
        Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
    };
    tokio::fs::write(dest, contents).await
}
