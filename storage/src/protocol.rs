//! 远程扫描协议 - TCP上的长度前缀JSON帧

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::StorageError;

/// 单帧上限，覆盖百万级路径列表
const MAX_FRAME_LENGTH: usize = 256 * 1024 * 1024;

/// 扫描请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// 远程节点上的目录路径
    pub directory: String,
    /// 上次扫描的服务端时间戳，None表示全量扫描
    pub last_scan_time: Option<f64>,
}

/// 扫描响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanResponse {
    Ok {
        /// 相对于 `directory` 的路径
        paths: Vec<String>,
        /// 服务端开始扫描的时间戳
        scan_time: f64,
    },
    Error {
        message: String,
    },
}

/// 编码 `Enc`、解码 `Dec` 的JSON帧编解码器
pub struct JsonCodec<Enc, Dec> {
    length_codec: LengthDelimitedCodec,
    _marker: PhantomData<fn(Enc) -> Dec>,
}

/// 客户端：发送请求，接收响应
pub type ClientCodec = JsonCodec<ScanRequest, ScanResponse>;
/// 服务端：发送响应，接收请求
pub type ServerCodec = JsonCodec<ScanResponse, ScanRequest>;

impl<Enc, Dec> JsonCodec<Enc, Dec> {
    pub fn new() -> Self {
        Self {
            length_codec: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<Enc, Dec> Default for JsonCodec<Enc, Dec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Enc, Dec> fmt::Debug for JsonCodec<Enc, Dec> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("length_codec", &self.length_codec)
            .finish()
    }
}

impl<Enc, Dec: DeserializeOwned> Decoder for JsonCodec<Enc, Dec> {
    type Item = Dec;
    type Error = StorageError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.length_codec.decode(src)? else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_slice(&frame)?))
    }
}

impl<Enc: Serialize, Dec> Encoder<Enc> for JsonCodec<Enc, Dec> {
    type Error = StorageError;

    fn encode(&mut self, item: Enc, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        self.length_codec.encode(Bytes::from(json), dst)?;
        Ok(())
    }
}
