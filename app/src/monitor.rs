//! 项目监控 - 定期检查基础目录下的各个项目，新文件达到阈值时触发一次传输
//!
//! 标记为 detached 的项目（`project.json` 中 `"detached": true`）不会被扫描。

use serde_json::Value;
use slog::{debug, info, warn, Logger};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use storage::{LocalScanner, ScanProvider};
use utils::app_config::MonitorConfig;
use utils::error::{Error, Result};

use crate::diff::diff;
use crate::sidecar::PROJECT_FILE;
use crate::sync::project_dir;
use crate::transfer::{TransferExecutor, TransferSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    pub base_dir: PathBuf,
    pub dest_root: PathBuf,
    /// 项目顶层文件数达到该值时才触发传输
    pub threshold: usize,
    pub interval: Duration,
}

impl MonitorOptions {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            base_dir: PathBuf::from(&config.base_dir),
            dest_root: PathBuf::from(&config.destination),
            threshold: config.threshold,
            interval: Duration::from_secs(config.interval),
        }
    }
}

/// 单个项目的一次传输结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPass {
    pub project: PathBuf,
    pub summary: TransferSummary,
}

pub struct ProjectMonitor {
    options: MonitorOptions,
    scanner: LocalScanner,
    executor: TransferExecutor,
    logger: Logger,
}

impl ProjectMonitor {
    pub fn new(options: MonitorOptions, executor: TransferExecutor, logger: Logger) -> Self {
        Self {
            options,
            scanner: LocalScanner::new(logger.clone()),
            executor,
            logger,
        }
    }

    /// 检查所有项目一次
    pub async fn poll_once(&self) -> Result<Vec<ProjectPass>> {
        let mut passes = Vec::new();
        for project in self.project_dirs()? {
            if is_project_detached(&project, &self.logger) {
                debug!(self.logger, "Skipping detached project"; "project" => %project.display());
                continue;
            }

            let count = count_top_level_files(&project, &self.logger);
            if count < self.options.threshold {
                debug!(self.logger, "Not enough new files";
                    "project" => %project.display(), "found" => count, "threshold" => self.options.threshold);
                continue;
            }

            info!(self.logger, "New files in project, transferring"; "project" => %project.display(), "found" => count);
            match self.transfer_project(&project).await {
                Ok(summary) => passes.push(ProjectPass { project, summary }),
                Err(err) => {
                    // 单个项目失败不影响其他项目
                    warn!(self.logger, "Project transfer failed";
                        "project" => %project.display(), "error" => %err);
                }
            }
        }
        Ok(passes)
    }

    /// 循环检查，直到 `shutdown` 完成
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            if let Err(err) = self.poll_once().await {
                warn!(self.logger, "Monitor pass failed"; "error" => %err);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.interval) => {}
                _ = shutdown.as_mut() => {
                    info!(self.logger, "Shutdown requested, stopping monitor");
                    return Ok(());
                }
            }
        }
    }

    fn project_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.options.base_dir).map_err(|e| {
            Error::with_source(
                &format!("Cannot list {}", self.options.base_dir.display()),
                Box::new(e),
            )
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    async fn transfer_project(&self, project: &Path) -> Result<TransferSummary> {
        let dest = project_dir(project, &self.options.dest_root)?;
        tokio::fs::create_dir_all(&dest).await?;

        let source = self
            .scanner
            .scan(project, None)
            .await
            .map_err(|e| Error::with_source("Project scan failed", Box::new(e)))?
            .snapshot;
        let present = self
            .scanner
            .scan(&dest, None)
            .await
            .map_err(|e| Error::with_source("Destination scan failed", Box::new(e)))?
            .snapshot;

        let pending = diff(&source, &present);
        Ok(self.executor.sync(pending, project, &dest).await)
    }
}

/// `project.json` 中 `detached` 为 true 时返回 true；文件缺失或无法解析时视为未分离
pub fn is_project_detached(project: &Path, logger: &Logger) -> bool {
    let path = project.join(PROJECT_FILE);
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(_) => return false,
    };
    match serde_json::from_slice::<Value>(&raw) {
        Ok(value) => value.get("detached").and_then(Value::as_bool).unwrap_or(false),
        Err(err) => {
            warn!(logger, "Cannot parse project file"; "path" => %path.display(), "error" => %err);
            false
        }
    }
}

/// 统计项目目录顶层的普通文件数
pub fn count_top_level_files(project: &Path, logger: &Logger) -> usize {
    match std::fs::read_dir(project) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .count(),
        Err(err) => {
            warn!(logger, "Error accessing project"; "project" => %project.display(), "error" => %err);
            0
        }
    }
}
