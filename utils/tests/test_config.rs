use std::sync::{Mutex, MutexGuard};

use utils::app_config::*;

// AppConfig is process-global; tests that reset it must not interleave.
static CONFIG_LOCK: Mutex<()> = Mutex::new(());

pub fn initialize() -> MutexGuard<'static, ()> {
    let guard = CONFIG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // Reset to original test configuration
    let config_contents = include_str!("resources/test_config.toml");
    AppConfig::init(Some(config_contents)).unwrap();
    guard
}

#[test]
fn fetch_config() {
    let _guard = initialize();

    // Fetch an instance of Config
    let config = AppConfig::fetch().unwrap();

    assert_eq!(config.log.level, "info");

    assert_eq!(config.sync.source, "/data/P12");
    assert_eq!(config.sync.destination, "/mnt/magellan");
    assert_eq!(config.sync.poll_interval, 30);
    assert_eq!(config.sync.max_retries, 3);
    assert_eq!(config.sync.retry_delay, 5);
    assert_eq!(config.sync.batch_size, 100);
    assert_eq!(config.sync.concurrency, 4);
    assert!(!config.sync.resume);
    assert_eq!(config.sync.lock_file, "cs.lock");

    assert!(config.remote.enabled);
    assert_eq!(config.remote.host, "10.0.0.7");
    assert_eq!(config.remote.port, 18861);

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 18861);

    assert_eq!(config.monitor.threshold, 5);
    assert_eq!(config.monitor.interval, 10);
}

#[test]
fn verify_get() {
    let _guard = initialize();

    assert_eq!(AppConfig::get::<String>("log.level").unwrap(), "info");
    assert_eq!(AppConfig::get::<u64>("sync.poll_interval").unwrap(), 30);
    assert_eq!(AppConfig::get::<u32>("sync.max_retries").unwrap(), 3);
    assert_eq!(AppConfig::get::<usize>("sync.batch_size").unwrap(), 100);
    assert_eq!(AppConfig::get::<bool>("remote.enabled").unwrap(), true);
    assert_eq!(AppConfig::get::<u16>("server.port").unwrap(), 18861);
    assert_eq!(
        AppConfig::get::<String>("monitor.base_dir").unwrap(),
        "CryoSparc/"
    );
}

#[test]
fn verify_set() {
    let _guard = initialize();

    AppConfig::set("log.level", "debug").unwrap();
    AppConfig::set("sync.poll_interval", "60").unwrap();
    AppConfig::set("sync.resume", "true").unwrap();
    AppConfig::set("remote.host", "scanner.local").unwrap();

    // Fetch a new instance of Config
    let config = AppConfig::fetch().unwrap();

    assert_eq!(config.log.level, "debug");
    assert_eq!(config.sync.poll_interval, 60);
    assert!(config.sync.resume);
    assert_eq!(config.remote.host, "scanner.local");
}

#[test]
fn test_nested_configuration_access() {
    let _guard = initialize();

    let log_config = AppConfig::get::<LogConfig>("log").unwrap();
    assert_eq!(log_config.level, "info");

    let sync_config = AppConfig::get::<SyncSection>("sync").unwrap();
    assert_eq!(sync_config.source, "/data/P12");
    assert_eq!(sync_config.concurrency, 4);
    assert!(sync_config.progress);
    assert!(sync_config.ledger);

    let remote_config = AppConfig::get::<RemoteConfig>("remote").unwrap();
    assert_eq!(remote_config.port, 18861);
    assert_eq!(remote_config.connect_timeout, 5);
    assert_eq!(remote_config.request_timeout, 300);

    let monitor_config = AppConfig::get::<MonitorConfig>("monitor").unwrap();
    assert_eq!(monitor_config.destination, "copied_Cryosparc/");
}

#[test]
fn test_config_validation() {
    let _guard = initialize();

    let config = AppConfig::fetch().unwrap();

    assert!(config.sync.batch_size > 0, "Batch size should be positive");
    assert!(config.sync.max_retries > 0, "Max retries should be positive");
    assert!(config.remote.port > 0, "Remote port should be positive");
    assert!(config.monitor.threshold > 0, "Threshold should be positive");
}
