use slog::{debug, error, info, warn, Logger};
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use storage::{LocalScanner, ScanOutcome, ScanProvider, Snapshot};
use utils::error::{Error, Result};

use super::{project_dir, RunCompleteHook, RunReport, SyncOptions, SyncState, TrackedSet};
use crate::diff::{diff, diff_excluding};
use crate::ledger::SyncLedger;
use crate::transfer::TransferExecutor;

/// 同步引擎 - 单线程轮询循环：休眠、扫描、比较、传输
pub struct SyncEngine {
    options: SyncOptions,
    provider: Arc<dyn ScanProvider>,
    local: LocalScanner,
    executor: TransferExecutor,
    hooks: Vec<Arc<dyn RunCompleteHook>>,
    ledger: Option<SyncLedger>,
    state: SyncState,
    logger: Logger,
}

impl SyncEngine {
    pub fn new(options: SyncOptions, provider: Arc<dyn ScanProvider>, logger: Logger) -> Self {
        let executor = TransferExecutor::new(options.transfer.clone(), logger.clone());
        Self {
            options,
            provider,
            local: LocalScanner::new(logger.clone()),
            executor,
            hooks: Vec::new(),
            ledger: None,
            state: SyncState::Idle,
            logger,
        }
    }

    /// 替换传输执行器（例如注入自定义的 FileCopier）
    pub fn with_executor(mut self, executor: TransferExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// 每次传输后把结果追加到同步清单
    pub fn with_ledger(mut self, ledger: SyncLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn add_hook(&mut self, hook: Arc<dyn RunCompleteHook>) {
        self.hooks.push(hook);
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn transition(&mut self, next: SyncState) {
        debug!(self.logger, "State change"; "from" => %self.state, "to" => %next);
        self.state = next;
    }

    /// 运行直到连续空轮询次数达到 `max_retries`，或 `shutdown` 完成
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.executor.reset_cancel();

        let source_root = tokio::fs::canonicalize(&self.options.source_root)
            .await
            .map_err(|e| {
                Error::with_source(
                    &format!("Cannot open source {}", self.options.source_root.display()),
                    Box::new(e),
                )
            })?;
        // 目标目录以给定的源路径命名（符号链接不解析），"." 之类没有名字的路径才用解析后的名字
        let named_root = if self.options.source_root.file_name().is_some() {
            self.options.source_root.as_path()
        } else {
            source_root.as_path()
        };
        let project_dir = project_dir(named_root, &self.options.dest_root)?;
        tokio::fs::create_dir_all(&project_dir).await?;

        let mut report = RunReport {
            source_root: source_root.clone(),
            project_dir: project_dir.clone(),
            ..Default::default()
        };

        info!(self.logger, "Starting sync";
            "source" => %source_root.display(),
            "destination" => %project_dir.display(),
            "scanner" => self.provider.name(),
            "poll_interval" => self.options.poll_interval.as_secs(),
            "max_retries" => self.options.max_retries);

        let known_destination = self.scan_local(&project_dir).await?;
        let mut tracked = TrackedSet::new();
        let mut checkpoint: Option<f64> = None;

        if !self.options.resume {
            self.transition(SyncState::Scanning);
            let initial = self.scan_local(&source_root).await?;
            self.transition(SyncState::Diffing);
            let pending = diff(&initial, &known_destination);
            info!(self.logger, "Initial pass";
                "found" => initial.len(), "already_present" => initial.len() - pending.len());

            if !pending.is_empty() {
                let interrupted = self
                    .transfer(pending, &mut tracked, &source_root, &project_dir, &mut shutdown, &mut report)
                    .await;
                if interrupted {
                    return Ok(self.finish(report, &tracked).await);
                }
            }
            self.transition(SyncState::Idle);
        }

        let mut empty_cycles: u32 = 0;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                _ = shutdown.as_mut() => {
                    info!(self.logger, "Shutdown requested, stopping sync");
                    report.interrupted = true;
                    break;
                }
            }

            report.cycles += 1;
            self.transition(SyncState::Scanning);
            let scanned = tokio::select! {
                scanned = self.provider.scan(&source_root, checkpoint) => scanned,
                _ = shutdown.as_mut() => {
                    info!(self.logger, "Shutdown requested during scan, stopping sync");
                    report.interrupted = true;
                    break;
                }
            };
            let outcome = match scanned {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(self.logger, "Source scan failed"; "error" => %err);
                    ScanOutcome::default()
                }
            };

            self.transition(SyncState::Diffing);
            let pending = diff_excluding(
                &outcome.snapshot,
                &[tracked.as_set(), known_destination.as_set()],
            );

            if pending.is_empty() {
                empty_cycles += 1;
                report.empty_cycles += 1;
                info!(self.logger, "No new files";
                    "empty_cycles" => empty_cycles, "max_retries" => self.options.max_retries);
                if empty_cycles >= self.options.max_retries {
                    break;
                }
                self.transition(SyncState::Idle);
                continue;
            }

            empty_cycles = 0;
            info!(self.logger, "Found new files"; "count" => pending.len());
            let interrupted = self
                .transfer(pending, &mut tracked, &source_root, &project_dir, &mut shutdown, &mut report)
                .await;
            if let Some(scan_time) = outcome.checkpoint {
                checkpoint = Some(scan_time);
            }
            if interrupted {
                break;
            }
            self.transition(SyncState::Idle);
        }

        Ok(self.finish(report, &tracked).await)
    }

    async fn scan_local(&self, root: &Path) -> Result<Snapshot> {
        let outcome = self.local.scan(root, None).await.map_err(|e| {
            Error::with_source(&format!("Failed to scan {}", root.display()), Box::new(e))
        })?;
        Ok(outcome.snapshot)
    }

    /// 传输一批新路径；返回传输期间是否收到了停止信号
    async fn transfer<F>(
        &mut self, pending: HashSet<String>, tracked: &mut TrackedSet, source_root: &Path,
        project_dir: &Path, shutdown: &mut Pin<&mut F>, report: &mut RunReport,
    ) -> bool
    where
        F: Future<Output = ()>,
    {
        self.transition(SyncState::Transferring);
        let paths: Vec<String> = pending.into_iter().collect();
        tracked.extend(paths.iter().cloned());

        let executor = &self.executor;
        let transfer = executor.sync(paths, source_root, project_dir);
        tokio::pin!(transfer);

        let mut interrupted = false;
        let summary = tokio::select! {
            summary = &mut transfer => summary,
            _ = shutdown.as_mut() => {
                warn!(self.logger, "Shutdown requested, waiting for in-flight batches");
                interrupted = true;
                executor.cancel();
                transfer.await
            }
        };

        report.absorb(&summary);
        if let Some(ledger) = &self.ledger {
            ledger.record(source_root, &summary).await;
        }
        if interrupted {
            report.interrupted = true;
        }
        interrupted
    }

    async fn finish(&mut self, mut report: RunReport, tracked: &TrackedSet) -> RunReport {
        self.transition(SyncState::Done);
        report.tracked = tracked.len();

        info!(self.logger, "Sync finished";
            "cycles" => report.cycles,
            "transferred" => report.transferred,
            "failed" => report.failed,
            "skipped" => report.skipped,
            "interrupted" => report.interrupted);

        if !report.interrupted {
            for hook in &self.hooks {
                if let Err(err) = hook.on_run_complete(&report).await {
                    warn!(self.logger, "Run-complete hook failed"; "hook" => hook.name(), "error" => %err);
                }
            }
        }

        report
    }
}
