#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app::transfer::{FileCopier, LocalCopier, RetryPolicy, TransferOptions};
use tempfile::TempDir;
use tokio::sync::Notify;

pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// 快速重试的传输参数
pub fn fast_options(batch_size: usize, concurrency: usize, max_attempts: u32) -> TransferOptions {
    TransferOptions {
        batch_size,
        concurrency,
        retry: RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        },
    }
}

/// 创建 `<tmp>/P12` 项目目录结构，返回临时目录和项目路径
pub fn create_project_tree() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let project = temp_dir.path().join("P12");

    fs::create_dir_all(project.join("J1/gridfs_data")).unwrap();
    fs::create_dir_all(project.join("J2")).unwrap();
    fs::write(project.join("project.json"), br#"{"uid": "P12", "detached": false}"#).unwrap();
    fs::write(project.join("J1/job.json"), b"{}").unwrap();
    fs::write(project.join("J1/gridfs_data/blob"), vec![7u8; 4096]).unwrap();
    fs::write(project.join("J2/job.json"), b"{}").unwrap();

    (temp_dir, project)
}

pub fn file_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = walk(root)
        .into_iter()
        .filter_map(|p| {
            p.strip_prefix(root)
                .ok()
                .map(|r| r.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    names.sort();
    names
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let file_type = entry.file_type().unwrap();
            if file_type.is_dir() {
                files.extend(walk(&entry.path()));
            } else {
                files.push(entry.path());
            }
        }
    }
    files
}

/// 对指定文件名先失败若干次，再交给 LocalCopier
pub struct FlakyCopier {
    remaining_failures: Mutex<HashMap<String, u32>>,
}

impl FlakyCopier {
    pub fn new(failures: &[(&str, u32)]) -> Self {
        Self {
            remaining_failures: Mutex::new(
                failures
                    .iter()
                    .map(|(name, count)| (name.to_string(), *count))
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl FileCopier for FlakyCopier {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<()> {
        let name = src.file_name().unwrap().to_string_lossy().into_owned();
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if let Some(count) = remaining.get_mut(&name) {
                if *count > 0 {
                    *count -= 1;
                    return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
                }
            }
        }
        LocalCopier.copy(src, dest).await
    }
}

/// 遇到指定文件名时panic，模拟批次级别的意外错误
pub struct PanickingCopier {
    pub poison: String,
}

#[async_trait::async_trait]
impl FileCopier for PanickingCopier {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<()> {
        if src.file_name().map(|n| n.to_string_lossy() == self.poison.as_str()) == Some(true) {
            panic!("unexpected batch failure");
        }
        LocalCopier.copy(src, dest).await
    }
}

/// 每个文件先等待 `delay` 再复制，开始复制时通知 `started`
pub struct SlowCopier {
    pub delay: Duration,
    pub started: Arc<Notify>,
}

#[async_trait::async_trait]
impl FileCopier for SlowCopier {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<()> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        LocalCopier.copy(src, dest).await
    }
}
