use futures::{SinkExt, StreamExt};
use slog::{debug, info, warn, Logger};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

use crate::{
    ClientCodec, LocalScanner, Result, ScanOutcome, ScanProvider, ScanRequest, ScanResponse,
    Snapshot, StorageError,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

type Connection = Framed<TcpStream, ClientCodec>;

/// 远程扫描器 - 把扫描委托给远程节点，失败时回退到本地扫描
///
/// 只维护"已连接/未连接"两种状态：任何连接或协议错误都会丢弃当前连接，
/// 本次调用改用本地扫描，下一次调用再尝试重新连接。
pub struct RemoteScanner {
    addr: String,
    connect_timeout: Duration,
    /// 一次请求从发送到收到响应的上限
    request_timeout: Duration,
    connection: Mutex<Option<Connection>>,
    fallback: LocalScanner,
    logger: Logger,
}

impl RemoteScanner {
    pub fn new(host: &str, port: u16, logger: Logger) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connection: Mutex::new(None),
            fallback: LocalScanner::new(logger.clone()),
            logger,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    async fn connect(&self) -> Result<Connection> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| StorageError::Remote(format!("connect to {} timed out", self.addr)))??;
        stream.set_nodelay(true)?;
        info!(self.logger, "Connected to remote scanner"; "addr" => %self.addr);
        Ok(Framed::new(stream, ClientCodec::new()))
    }

    async fn request(
        connection: &mut Connection, root: &Path, since: Option<f64>,
    ) -> Result<ScanOutcome> {
        let request = ScanRequest {
            directory: root.to_string_lossy().into_owned(),
            last_scan_time: since,
        };
        connection.send(request).await?;

        match connection.next().await {
            Some(Ok(ScanResponse::Ok { paths, scan_time })) => Ok(ScanOutcome {
                snapshot: paths.into_iter().collect::<Snapshot>(),
                checkpoint: Some(scan_time),
            }),
            Some(Ok(ScanResponse::Error { message })) => Err(StorageError::Remote(message)),
            Some(Err(err)) => Err(err),
            None => Err(StorageError::Remote(
                "connection closed by remote scanner".to_string(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl ScanProvider for RemoteScanner {
    async fn scan(&self, root: &Path, since: Option<f64>) -> Result<ScanOutcome> {
        {
            let mut connection = self.connection.lock().await;

            if connection.is_none() {
                match self.connect().await {
                    Ok(conn) => *connection = Some(conn),
                    Err(err) => {
                        warn!(self.logger, "Remote scanner unreachable, scanning locally";
                            "addr" => %self.addr, "error" => %err);
                    }
                }
            }

            if let Some(conn) = connection.as_mut() {
                let exchange = tokio::time::timeout(self.request_timeout, Self::request(conn, root, since));
                let result = exchange.await.unwrap_or_else(|_| {
                    Err(StorageError::Remote(format!(
                        "no response within {}s",
                        self.request_timeout.as_secs_f64()
                    )))
                });
                match result {
                    Ok(outcome) => {
                        debug!(self.logger, "Remote scan finished";
                            "root" => %root.display(), "files" => outcome.snapshot.len());
                        return Ok(outcome);
                    }
                    Err(err) => {
                        warn!(self.logger, "Remote scan failed, scanning locally";
                            "addr" => %self.addr, "error" => %err);
                        *connection = None;
                    }
                }
            }
        }

        self.fallback.scan(root, since).await
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
