pub mod error;
pub mod local;
pub mod protocol;
pub mod remote;
pub mod server;
pub mod snapshot;

pub use error::*;
pub use local::*;
pub use protocol::*;
pub use remote::*;
pub use server::*;
pub use snapshot::*;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// 远程扫描服务的默认端口
pub const DEFAULT_SCAN_PORT: u16 = 18861;

/// 一次扫描的结果：快照以及可选的检查点（仅远程扫描成功时返回）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    pub snapshot: Snapshot,
    pub checkpoint: Option<f64>,
}

impl ScanOutcome {
    /// 本地扫描结果，不携带检查点
    pub fn local(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            checkpoint: None,
        }
    }
}

/// 扫描提供者trait - 本地遍历或委托远程节点
///
/// `since` 为 Unix 时间戳（秒），只返回修改时间严格大于它的文件。
/// 没有符合条件的文件时返回空快照，而不是错误。
#[async_trait::async_trait]
pub trait ScanProvider: Send + Sync {
    async fn scan(&self, root: &Path, since: Option<f64>) -> Result<ScanOutcome>;

    /// 提供者名称，用于日志
    fn name(&self) -> &'static str;
}

/// 将SystemTime转换为Unix时间戳（秒），早于纪元的时间记为0
pub fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// 当前时间的Unix时间戳（秒）
pub fn now_epoch() -> f64 {
    epoch_seconds(SystemTime::now())
}
