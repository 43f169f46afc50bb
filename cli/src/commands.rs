use std::sync::Arc;
use std::time::Duration;

use app::ledger::SyncLedger;
use app::monitor::{MonitorOptions, ProjectMonitor};
use app::sidecar::SidecarFinalizer;
use app::sync::{SyncEngine, SyncOptions};
use app::transfer::TransferExecutor;
use storage::{LocalScanner, RemoteScanner, ScanProvider, ScanServer};
use utils::app_config::AppConfig;
use utils::error::{Error, Result};

/// Ctrl-C 完成的 future；无法注册信号时永不完成
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}

pub async fn sync_cmd() -> Result<()> {
    let config = AppConfig::fetch()?;
    let logger = slog_scope::logger();

    let provider: Arc<dyn ScanProvider> = if config.remote.enabled {
        log::info!("Using scan server at {}:{}", config.remote.host, config.remote.port);
        Arc::new(
            RemoteScanner::new(&config.remote.host, config.remote.port, logger.clone())
                .with_connect_timeout(Duration::from_secs(config.remote.connect_timeout))
                .with_request_timeout(Duration::from_secs(config.remote.request_timeout)),
        )
    } else {
        Arc::new(LocalScanner::new(logger.clone()))
    };

    let options = SyncOptions::from_config(&config.sync);
    let executor = TransferExecutor::new(options.transfer.clone(), logger.clone())
        .with_progress_bar(config.sync.progress);
    let mut engine = SyncEngine::new(options, provider, logger.clone()).with_executor(executor);
    if config.sync.ledger {
        engine = engine.with_ledger(SyncLedger::new(&config.sync.ledger_dir, logger.clone()));
    }
    engine.add_hook(Arc::new(SidecarFinalizer::new(&config.sync.lock_file, logger)));

    let report = engine.run(ctrl_c()).await?;
    println!("{}", report);

    if report.failed > 0 || report.failed_batches > 0 {
        log::warn!(
            "{} files and {} batches could not be copied",
            report.failed,
            report.failed_batches
        );
    }
    Ok(())
}

pub async fn serve_cmd() -> Result<()> {
    let config = AppConfig::fetch()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let server = ScanServer::bind(&addr, slog_scope::logger())
        .await
        .map_err(|e| Error::with_source(&format!("Cannot listen on {}", addr), Box::new(e)))?;
    server
        .run_until(ctrl_c())
        .await
        .map_err(|e| Error::with_source("Scan server failed", Box::new(e)))?;
    Ok(())
}

pub async fn monitor_cmd() -> Result<()> {
    let config = AppConfig::fetch()?;
    let logger = slog_scope::logger();

    let options = MonitorOptions::from_config(&config.monitor);
    if !options.base_dir.is_dir() {
        return Err(Error::new(&format!(
            "Monitor directory does not exist: {}",
            options.base_dir.display()
        )));
    }

    let transfer = SyncOptions::from_config(&config.sync).transfer;
    let executor =
        TransferExecutor::new(transfer, logger.clone()).with_progress_bar(config.sync.progress);
    ProjectMonitor::new(options, executor, logger).run(ctrl_c()).await
}
