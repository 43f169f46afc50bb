//! 传输执行器 - 按批次并发复制文件，单文件失败重试

use slog::{debug, error, info, warn, Logger};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

mod copier;
mod progress;

pub use copier::{FileCopier, LocalCopier};
pub use progress::{ProgressDisplay, ProgressSnapshot, TransferProgress};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// 单文件重试策略：固定间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    pub batch_size: usize,
    /// 同时运行的批次数上限
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: default_concurrency(),
            retry: RetryPolicy::default(),
        }
    }
}

/// 可用并行度，无法获取时为1
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// 单个文件的传输结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub path: String,
    pub success: bool,
    pub attempts: u32,
    /// 最后一次失败的原因
    pub error: Option<String>,
}

/// 一次传输调用的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// 跳过的符号链接，不计入成功或失败
    pub skipped: usize,
    pub failed_batches: usize,
    pub results: Vec<TransferResult>,
}

/// 停止派发新批次的句柄；已开始的批次会执行完毕
#[derive(Debug, Clone, Default)]
pub struct TransferCanceller(Arc<AtomicBool>);

impl TransferCanceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 批次worker共享的只读上下文
#[derive(Clone)]
struct BatchContext {
    source_root: Arc<PathBuf>,
    dest_root: Arc<PathBuf>,
    copier: Arc<dyn FileCopier>,
    retry: RetryPolicy,
    progress: Arc<TransferProgress>,
    logger: Logger,
}

pub struct TransferExecutor {
    options: TransferOptions,
    copier: Arc<dyn FileCopier>,
    canceller: TransferCanceller,
    show_progress: bool,
    logger: Logger,
}

impl TransferExecutor {
    pub fn new(options: TransferOptions, logger: Logger) -> Self {
        Self::with_copier(options, Arc::new(LocalCopier), logger)
    }

    pub fn with_copier(options: TransferOptions, copier: Arc<dyn FileCopier>, logger: Logger) -> Self {
        Self {
            options,
            copier,
            canceller: TransferCanceller::default(),
            show_progress: false,
            logger,
        }
    }

    /// 传输期间在终端显示进度条
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    pub fn canceller(&self) -> TransferCanceller {
        self.canceller.clone()
    }

    /// 停止派发新的批次；已在运行的批次会完成
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// 清除停止标记，之后的传输正常派发
    pub fn reset_cancel(&self) {
        self.canceller.reset();
    }

    /// 复制 `paths`（相对路径）从 `source_root` 到 `dest_root`，等待所有批次完成
    pub async fn sync<I>(&self, paths: I, source_root: &Path, dest_root: &Path) -> TransferSummary
    where
        I: IntoIterator<Item = String>,
    {
        let paths: Vec<String> = paths.into_iter().collect();
        let progress = Arc::new(TransferProgress::new(paths.len()));
        self.sync_with_progress(paths, source_root, dest_root, progress)
            .await
    }

    /// 同 [`sync`](Self::sync)，由调用方持有进度计数器以便轮询
    pub async fn sync_with_progress(
        &self, mut paths: Vec<String>, source_root: &Path, dest_root: &Path,
        progress: Arc<TransferProgress>,
    ) -> TransferSummary {
        paths.sort();
        let total = paths.len();
        if total == 0 {
            return TransferSummary::default();
        }

        let batch_size = self.options.batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let context = BatchContext {
            source_root: Arc::new(source_root.to_path_buf()),
            dest_root: Arc::new(dest_root.to_path_buf()),
            copier: self.copier.clone(),
            retry: self.options.retry,
            progress: progress.clone(),
            logger: self.logger.clone(),
        };

        info!(self.logger, "Starting transfer";
            "files" => total,
            "batches" => total.div_ceil(batch_size),
            "workers" => self.options.concurrency.max(1));
        let display = self
            .show_progress
            .then(|| ProgressDisplay::start(progress.clone()));

        let mut handles = Vec::new();
        for (index, batch) in paths.chunks(batch_size).enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            // 取消可能发生在等待空闲worker期间
            if self.canceller.is_cancelled() {
                warn!(self.logger, "Transfer cancelled, not dispatching remaining batches";
                    "dispatched" => index);
                break;
            }
            let context = context.clone();
            let batch = batch.to_vec();
            let handle = tokio::spawn(async move {
                let results = run_batch(&context, index, batch).await;
                drop(permit);
                results
            });
            handles.push((index, handle));
        }

        let mut summary = TransferSummary {
            results: Vec::with_capacity(total),
            ..Default::default()
        };
        for (index, handle) in handles {
            match handle.await {
                Ok(results) => summary.results.extend(results),
                Err(err) => {
                    progress.record_failed_batch();
                    error!(self.logger, "Batch failed"; "batch" => index, "error" => %err);
                }
            }
        }

        if let Some(display) = display {
            display.finish();
        }

        let counters = progress.snapshot();
        summary.succeeded = summary.results.iter().filter(|r| r.success).count();
        summary.failed = summary.results.len() - summary.succeeded;
        summary.skipped = counters.skipped;
        summary.failed_batches = counters.failed_batches;

        info!(self.logger, "Transfer finished";
            "succeeded" => summary.succeeded,
            "failed" => summary.failed,
            "skipped" => summary.skipped,
            "failed_batches" => summary.failed_batches);
        summary
    }
}

async fn run_batch(context: &BatchContext, index: usize, batch: Vec<String>) -> Vec<TransferResult> {
    let mut results = Vec::with_capacity(batch.len());
    for path in batch {
        if let Some(result) = transfer_file(context, path).await {
            results.push(result);
        }
    }

    context.progress.record_batch();
    let progress = context.progress.snapshot();
    info!(context.logger, "Batch complete";
        "batch" => index,
        "progress" => format!("{:.1}%", progress.percent()),
        "succeeded" => progress.succeeded,
        "failed" => progress.failed);
    results
}

/// 复制单个文件；符号链接返回 None
async fn transfer_file(context: &BatchContext, path: String) -> Option<TransferResult> {
    let src = context.source_root.join(&path);
    let dest = context.dest_root.join(&path);

    if let Ok(meta) = tokio::fs::symlink_metadata(&src).await {
        if meta.file_type().is_symlink() {
            debug!(context.logger, "Skipping symlink"; "path" => %path);
            context.progress.record_skip();
            return None;
        }
    }

    let max_attempts = context.retry.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match copy_once(context, &src, &dest).await {
            Ok(()) => {
                debug!(context.logger, "Copied file"; "path" => %path, "attempts" => attempts);
                context.progress.record_success();
                return Some(TransferResult {
                    path,
                    success: true,
                    attempts,
                    error: None,
                });
            }
            Err(err) if attempts >= max_attempts => {
                error!(context.logger, "Giving up on file";
                    "path" => %path, "attempts" => attempts, "error" => %err);
                context.progress.record_failure();
                return Some(TransferResult {
                    path,
                    success: false,
                    attempts,
                    error: Some(err.to_string()),
                });
            }
            Err(err) => {
                warn!(context.logger, "Copy failed, retrying";
                    "path" => %path, "attempt" => attempts, "max_attempts" => max_attempts, "error" => %err);
                tokio::time::sleep(context.retry.delay).await;
            }
        }
    }
}

async fn copy_once(context: &BatchContext, src: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        // create_dir_all tolerates directories created concurrently by other workers
        tokio::fs::create_dir_all(parent).await?;
    }
    context.copier.copy(src, dest).await
}
