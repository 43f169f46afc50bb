use futures::{SinkExt, StreamExt};
use slog::{debug, error, info, warn, Logger};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

use crate::{now_epoch, LocalScanner, Result, ScanProvider, ScanRequest, ScanResponse, ServerCodec};

/// 远程扫描服务 - 接收扫描请求，在本机遍历目录后返回相对路径列表
pub struct ScanServer {
    listener: TcpListener,
    scanner: Arc<LocalScanner>,
    logger: Logger,
}

impl ScanServer {
    /// 绑定监听地址，例如 `0.0.0.0:18861`
    pub async fn bind(addr: &str, logger: Logger) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            scanner: Arc::new(LocalScanner::new(logger.clone())),
            logger,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 持续接受连接，直到 `shutdown` 完成
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(self.logger, "Scan server listening"; "addr" => %self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let scanner = self.scanner.clone();
                            let logger = self.logger.new(slog::o!("peer" => peer.to_string()));
                            tokio::spawn(handle_connection(stream, scanner, logger));
                        }
                        Err(err) => {
                            // accept errors (EMFILE etc.) are per-connection
                            warn!(self.logger, "Failed to accept connection"; "error" => %err);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!(self.logger, "Scan server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, scanner: Arc<LocalScanner>, logger: Logger) {
    debug!(logger, "Client connected");
    let mut framed = Framed::new(stream, ServerCodec::new());

    while let Some(frame) = framed.next().await {
        let request = match frame {
            Ok(request) => request,
            Err(err) => {
                warn!(logger, "Dropping client after malformed request"; "error" => %err);
                break;
            }
        };

        let response = respond(&scanner, request, &logger).await;
        if let Err(err) = framed.send(response).await {
            warn!(logger, "Failed to send scan response"; "error" => %err);
            break;
        }
    }

    debug!(logger, "Client disconnected");
}

/// 处理单个扫描请求；扫描时间在遍历开始前取得
pub async fn respond(scanner: &LocalScanner, request: ScanRequest, logger: &Logger) -> ScanResponse {
    let scan_time = now_epoch();
    let root = PathBuf::from(&request.directory);
    info!(logger, "Scanning directory"; "directory" => %request.directory);

    match tokio::fs::metadata(&root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return ScanResponse::Error {
                message: format!("not a directory: {}", request.directory),
            };
        }
        Err(err) => {
            error!(logger, "Error scanning directory"; "directory" => %request.directory, "error" => %err);
            return ScanResponse::Error {
                message: format!("cannot access {}: {}", request.directory, err),
            };
        }
    }

    match scanner.scan(&root, request.last_scan_time).await {
        Ok(outcome) => {
            info!(logger, "Scan complete"; "files" => outcome.snapshot.len());
            ScanResponse::Ok {
                paths: outcome.snapshot.into_iter().collect(),
                scan_time,
            }
        }
        Err(err) => {
            error!(logger, "Error scanning directory"; "directory" => %request.directory, "error" => %err);
            ScanResponse::Error {
                message: err.to_string(),
            }
        }
    }
}
