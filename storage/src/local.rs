use slog::{debug, warn, Logger};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{epoch_seconds, relative_key, Result, ScanOutcome, ScanProvider, Snapshot};

/// 本地扫描器 - 迭代遍历本地目录树
#[derive(Clone)]
pub struct LocalScanner {
    logger: Logger,
}

impl LocalScanner {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// 同步遍历，供阻塞线程池或测试直接调用
    pub fn walk(&self, root: &Path, since: Option<f64>) -> Snapshot {
        walk_tree(root, since, &self.logger)
    }
}

#[async_trait::async_trait]
impl ScanProvider for LocalScanner {
    async fn scan(&self, root: &Path, since: Option<f64>) -> Result<ScanOutcome> {
        let root: PathBuf = root.to_path_buf();
        let logger = self.logger.clone();
        let snapshot = tokio::task::spawn_blocking(move || walk_tree(&root, since, &logger)).await?;
        Ok(ScanOutcome::local(snapshot))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// 遍历 `root`，收集普通文件的相对路径
///
/// 不跟随符号链接，符号链接本身也不计入结果。单个条目的访问错误
/// （权限不足、遍历过程中被删除等）只记录日志并跳过。
pub fn walk_tree(root: &Path, since: Option<f64>, logger: &Logger) -> Snapshot {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .max_open(100);

    let mut paths = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(logger, "Skipping unreadable entry"; "path" => path, "error" => %err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(since) = since {
            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => epoch_seconds(modified),
                Ok(Err(err)) => {
                    warn!(logger, "Skipping entry without mtime"; "path" => %entry.path().display(), "error" => %err);
                    continue;
                }
                Err(err) => {
                    warn!(logger, "Skipping entry without metadata"; "path" => %entry.path().display(), "error" => %err);
                    continue;
                }
            };
            if modified <= since {
                continue;
            }
        }

        match relative_key(root, entry.path()) {
            Some(key) => paths.push(key),
            None => {
                warn!(logger, "Skipping file with a non UTF-8 name"; "path" => %entry.path().display());
            }
        }
    }

    debug!(logger, "Local scan finished"; "root" => %root.display(), "files" => paths.len());
    paths.into_iter().collect()
}
