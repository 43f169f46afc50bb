//! 同步模块 - 扫描、比较、传输的轮询循环

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use utils::app_config::SyncSection;
use utils::error::Result;

use crate::transfer::{RetryPolicy, TransferOptions, TransferSummary};

mod engine;

pub use engine::SyncEngine;

/// 轮询间隔上限
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(600);

/// 轮询循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Scanning,
    Diffing,
    Transferring,
    Done,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Scanning => write!(f, "scanning"),
            SyncState::Diffing => write!(f, "diffing"),
            SyncState::Transferring => write!(f, "transferring"),
            SyncState::Done => write!(f, "done"),
        }
    }
}

/// 同步参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub source_root: PathBuf,
    /// 目标根目录，实际写入 `dest_root/<源目录名>`
    pub dest_root: PathBuf,
    pub poll_interval: Duration,
    /// 连续多少次空轮询后结束
    pub max_retries: u32,
    /// 跳过首次全量传输
    pub resume: bool,
    pub transfer: TransferOptions,
}

impl SyncOptions {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            poll_interval: Duration::from_secs(5),
            max_retries: 3,
            resume: false,
            transfer: TransferOptions::default(),
        }
    }

    /// 设置轮询间隔，超过上限时截断
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.min(MAX_POLL_INTERVAL);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferOptions) -> Self {
        self.transfer = transfer;
        self
    }

    /// 从配置文件的 `[sync]` 段构建；max_retries 同时作为单文件复制的尝试次数
    pub fn from_config(config: &SyncSection) -> Self {
        let concurrency = if config.concurrency == 0 {
            crate::transfer::default_concurrency()
        } else {
            config.concurrency
        };

        Self::new(&config.source, &config.destination)
            .with_poll_interval(Duration::from_secs(config.poll_interval))
            .with_max_retries(config.max_retries)
            .with_resume(config.resume)
            .with_transfer(TransferOptions {
                batch_size: config.batch_size,
                concurrency,
                retry: RetryPolicy {
                    max_attempts: config.max_retries,
                    delay: Duration::from_secs(config.retry_delay),
                },
            })
    }
}

/// 目标项目目录：`dest_root/<source_root的最后一段>`
pub fn project_dir(source_root: &Path, dest_root: &Path) -> Result<PathBuf> {
    let name = source_root.file_name().ok_or_else(|| {
        utils::error::Error::new(&format!(
            "Source path has no directory name: {}",
            source_root.display()
        ))
    })?;
    Ok(dest_root.join(name))
}

/// 本次运行中已尝试传输的路径，只增不减
#[derive(Debug, Clone, Default)]
pub struct TrackedSet {
    paths: HashSet<String>,
}

impl TrackedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, paths: I) {
        self.paths.extend(paths);
    }

    pub fn as_set(&self) -> &HashSet<String> {
        &self.paths
    }
}

/// 一次运行的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub source_root: PathBuf,
    pub project_dir: PathBuf,
    /// 轮询周期数（不含首次全量传输）
    pub cycles: usize,
    pub empty_cycles: usize,
    pub transferred: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failed_batches: usize,
    pub tracked: usize,
    pub interrupted: bool,
}

impl RunReport {
    fn absorb(&mut self, summary: &TransferSummary) {
        self.transferred += summary.succeeded;
        self.failed += summary.failed;
        self.skipped += summary.skipped;
        self.failed_batches += summary.failed_batches;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source          : {}", self.source_root.display())?;
        writeln!(f, "Destination     : {}", self.project_dir.display())?;
        writeln!(f, "Cycles          : {} ({} empty)", self.cycles, self.empty_cycles)?;
        writeln!(f, "Transferred     : {}", self.transferred)?;
        writeln!(f, "Failed          : {}", self.failed)?;
        writeln!(f, "Skipped links   : {}", self.skipped)?;
        writeln!(f, "Failed batches  : {}", self.failed_batches)?;
        write!(
            f,
            "Status          : {}",
            if self.interrupted { "interrupted" } else { "complete" }
        )
    }
}

/// 运行结束钩子 - 正常结束（非中断）后调用
#[async_trait::async_trait]
pub trait RunCompleteHook: Send + Sync {
    async fn on_run_complete(&self, report: &RunReport) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_is_capped() {
        let options = SyncOptions::new("/a", "/b").with_poll_interval(Duration::from_secs(3600));
        assert_eq!(options.poll_interval, MAX_POLL_INTERVAL);
    }

    #[test]
    fn test_project_dir_uses_source_basename() {
        let dir = project_dir(Path::new("/data/P12/"), Path::new("/mnt/copy")).unwrap();
        assert_eq!(dir, PathBuf::from("/mnt/copy/P12"));
        assert!(project_dir(Path::new("/"), Path::new("/mnt/copy")).is_err());
    }

    #[test]
    fn test_from_config_uses_max_retries_for_copies() {
        let section = SyncSection {
            source: "/data/P12".to_string(),
            destination: "/mnt/copy".to_string(),
            poll_interval: 1200,
            max_retries: 4,
            retry_delay: 2,
            batch_size: 50,
            concurrency: 0,
            resume: true,
            lock_file: "cs.lock".to_string(),
            progress: false,
            ledger: false,
            ledger_dir: ".".to_string(),
        };
        let options = SyncOptions::from_config(&section);

        assert_eq!(options.poll_interval, MAX_POLL_INTERVAL);
        assert_eq!(options.transfer.retry.max_attempts, 4);
        assert_eq!(options.transfer.retry.delay, Duration::from_secs(2));
        assert_eq!(options.transfer.batch_size, 50);
        assert!(options.transfer.concurrency >= 1);
        assert!(options.resume);
    }

    #[test]
    fn test_tracked_set_only_grows() {
        let mut tracked = TrackedSet::new();
        tracked.extend(vec!["a".to_string(), "b".to_string()]);
        tracked.extend(vec!["a".to_string()]);
        assert_eq!(tracked.len(), 2);
        assert!(tracked.contains("b"));
    }
}
