use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const BAR_REFRESH: Duration = Duration::from_millis(100);
const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files ({eta}) {msg}";

/// 传输进度计数器 - 多个worker共享，全部为原子操作
#[derive(Debug, Default)]
pub struct TransferProgress {
    total: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    batches_done: AtomicUsize,
    failed_batches: AtomicUsize,
}

/// 某一时刻的进度读数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub batches_done: usize,
    pub failed_batches: usize,
}

impl ProgressSnapshot {
    /// 已处理（成功、失败或跳过）的文件数
    pub fn handled(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// 已处理文件占总数的百分比
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.handled() as f64 * 100.0 / self.total as f64
    }
}

impl TransferProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_batch(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            batches_done: self.batches_done.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}

/// 终端进度条，定时从 [`TransferProgress`] 读取计数
pub struct ProgressDisplay {
    bar: ProgressBar,
    progress: Arc<TransferProgress>,
    ticker: JoinHandle<()>,
}

impl ProgressDisplay {
    pub fn start(progress: Arc<TransferProgress>) -> Self {
        let bar = ProgressBar::new(progress.total() as u64);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self::with_bar(progress, bar)
    }

    /// 使用调用方提供的进度条（例如 `ProgressBar::hidden()`）
    pub fn with_bar(progress: Arc<TransferProgress>, bar: ProgressBar) -> Self {
        let ticker = {
            let bar = bar.clone();
            let progress = progress.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(BAR_REFRESH);
                loop {
                    interval.tick().await;
                    bar.set_position(progress.snapshot().handled() as u64);
                }
            })
        };
        Self {
            bar,
            progress,
            ticker,
        }
    }

    pub fn finish(self) {
        self.ticker.abort();
        let counters = self.progress.snapshot();
        self.bar.set_position(counters.handled() as u64);
        self.bar.finish_with_message(format!(
            "{} copied, {} failed",
            counters.succeeded, counters.failed
        ));
    }
}

impl Drop for ProgressDisplay {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_counts_every_handled_file() {
        let progress = TransferProgress::new(4);
        progress.record_success();
        progress.record_failure();
        progress.record_skip();
        assert_eq!(progress.snapshot().percent(), 75.0);
    }

    #[test]
    fn empty_transfer_is_complete() {
        assert_eq!(TransferProgress::new(0).snapshot().percent(), 100.0);
    }

    #[tokio::test]
    async fn display_finishes_at_handled_count() {
        let progress = Arc::new(TransferProgress::new(5));
        let bar = ProgressBar::hidden();
        bar.set_length(5);
        let display = ProgressDisplay::with_bar(progress.clone(), bar.clone());

        progress.record_success();
        progress.record_success();
        progress.record_failure();
        display.finish();

        assert_eq!(bar.position(), 3);
        assert!(bar.is_finished());
    }
}
