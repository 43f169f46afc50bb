use filetime::FileTime;
use std::io;
use std::path::Path;

/// 单文件复制能力 - 复制内容及元数据（修改时间、权限位）
#[async_trait::async_trait]
pub trait FileCopier: Send + Sync {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<()>;
}

/// 本地文件系统复制
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCopier;

#[async_trait::async_trait]
impl FileCopier for LocalCopier {
    async fn copy(&self, src: &Path, dest: &Path) -> io::Result<()> {
        let metadata = tokio::fs::metadata(src).await?;

        // tokio::fs::copy 同时复制权限位
        tokio::fs::copy(src, dest).await?;

        let mtime = FileTime::from_last_modification_time(&metadata);
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&dest, mtime))
            .await
            .map_err(io::Error::other)?
    }
}
