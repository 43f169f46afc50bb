pub mod diff;
pub mod ledger;
pub mod monitor;
pub mod sidecar;
pub mod sync;
pub mod transfer;

/// 公共API的prelude模块
/// 用户可以通过 `use app::prelude::*` 来导入最常用的类型
pub mod prelude {
    pub use crate::diff::diff;
    pub use crate::ledger::SyncLedger;
    pub use crate::monitor::{MonitorOptions, ProjectMonitor};
    pub use crate::sidecar::SidecarFinalizer;
    pub use crate::sync::{RunCompleteHook, RunReport, SyncEngine, SyncOptions, SyncState};
    pub use crate::transfer::{
        FileCopier, RetryPolicy, TransferExecutor, TransferOptions, TransferSummary,
    };
    pub use storage::{LocalScanner, RemoteScanner, ScanProvider, Snapshot};
}
