//! 同步清单 - 追加记录已同步的文件和失败的文件
//!
//! `sync_log.txt` 每行一个已同步文件的完整源路径；
//! `error_log.txt` 每行一个失败的文件及原因。

use slog::{debug, warn, Logger};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::transfer::TransferSummary;

pub const SYNC_LOG: &str = "sync_log.txt";
pub const ERROR_LOG: &str = "error_log.txt";

pub struct SyncLedger {
    sync_log: PathBuf,
    error_log: PathBuf,
    logger: Logger,
}

impl SyncLedger {
    /// 清单文件位于 `dir` 下
    pub fn new(dir: impl AsRef<Path>, logger: Logger) -> Self {
        let dir = dir.as_ref();
        Self {
            sync_log: dir.join(SYNC_LOG),
            error_log: dir.join(ERROR_LOG),
            logger,
        }
    }

    pub fn sync_log(&self) -> &Path {
        &self.sync_log
    }

    pub fn error_log(&self) -> &Path {
        &self.error_log
    }

    /// 记录一次传输的结果；写入失败只记录日志
    pub async fn record(&self, source_root: &Path, summary: &TransferSummary) {
        let mut synced = String::new();
        let mut failed = String::new();
        for result in &summary.results {
            let full_path = source_root.join(&result.path);
            if result.success {
                synced.push_str(&format!("{}\n", full_path.display()));
            } else {
                failed.push_str(&format!(
                    "{}\t{}\n",
                    full_path.display(),
                    result.error.as_deref().unwrap_or("copy failed")
                ));
            }
        }
        if summary.failed_batches > 0 {
            failed.push_str(&format!(
                "{}\t{} batch(es) aborted before reporting their files\n",
                source_root.display(),
                summary.failed_batches
            ));
        }

        self.append(&self.sync_log, &synced).await;
        self.append(&self.error_log, &failed).await;
    }

    async fn append(&self, path: &Path, contents: &str) {
        if contents.is_empty() {
            return;
        }

        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(contents.as_bytes()).await?;
            file.flush().await
        };
        match written.await {
            Ok(()) => debug!(self.logger, "Ledger updated"; "path" => %path.display()),
            Err(err) => {
                warn!(self.logger, "Cannot write ledger"; "path" => %path.display(), "error" => %err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferResult;
    use std::fs;
    use tempfile::tempdir;

    fn result(path: &str, success: bool) -> TransferResult {
        TransferResult {
            path: path.to_string(),
            success,
            attempts: 1,
            error: (!success).then(|| "permission denied".to_string()),
        }
    }

    #[tokio::test]
    async fn test_record_appends_synced_and_failed_paths() {
        let dir = tempdir().unwrap();
        let ledger = SyncLedger::new(dir.path(), Logger::root(slog::Discard, slog::o!()));
        let root = Path::new("/data/P12");

        let first = TransferSummary {
            succeeded: 1,
            failed: 1,
            results: vec![result("J1/job.json", true), result("J1/locked.bin", false)],
            ..Default::default()
        };
        ledger.record(root, &first).await;
        let second = TransferSummary {
            succeeded: 1,
            results: vec![result("J2/job.json", true)],
            ..Default::default()
        };
        ledger.record(root, &second).await;

        let synced = fs::read_to_string(ledger.sync_log()).unwrap();
        assert_eq!(synced, "/data/P12/J1/job.json\n/data/P12/J2/job.json\n");
        let errors = fs::read_to_string(ledger.error_log()).unwrap();
        assert_eq!(errors, "/data/P12/J1/locked.bin\tpermission denied\n");
    }

    #[tokio::test]
    async fn test_nothing_to_record_creates_no_files() {
        let dir = tempdir().unwrap();
        let ledger = SyncLedger::new(dir.path(), Logger::root(slog::Discard, slog::o!()));
        ledger.record(Path::new("/data/P12"), &TransferSummary::default()).await;

        assert!(!ledger.sync_log().exists());
        assert!(!ledger.error_log().exists());
    }
}
