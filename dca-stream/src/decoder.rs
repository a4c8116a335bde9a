// DCA 容器解码器
//
// 首次访问时判断流是否带有 "DCA" 容器头：
// - 带容器头：解析格式版本和JSON元数据，然后逐帧读取
// - 裸帧流：从偏移0开始直接逐帧读取
//
// 元数据只能在读取第一帧之前读取一次，避免在流中途重新解析容器头导致帧错位。

use crate::codec::{decode_frame, read_up_to};
use bytes::{Buf, Bytes};
use common::{DcaError, Metadata, DCA_MAGIC};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tracing::{debug, warn};

/// 解码器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// 尚未判断是否存在容器头
    AwaitingHeaderDecision,
    /// 后续读取均为纯帧解码
    StreamingFrames,
}

/// 支持回退已读字节的读取器
///
/// 用于"窥视"流开头的魔数而不消费它。
struct Rewind<R> {
    pending: Bytes,
    inner: R,
}

impl<R> Rewind<R> {
    fn new(inner: R) -> Self {
        Self {
            pending: Bytes::new(),
            inner,
        }
    }

    /// 将字节放回流的最前面
    fn rewind(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut pending = Vec::with_capacity(bytes.len() + self.pending.len());
        pending.extend_from_slice(bytes);
        pending.extend_from_slice(&self.pending);
        self.pending = Bytes::from(pending);
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Rewind<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pending.has_remaining() {
            let n = this.pending.len().min(buf.remaining());
            buf.put_slice(&this.pending[..n]);
            this.pending.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

/// DCA 容器解码器
///
/// # 示例
///
/// ```rust,ignore
/// let file = tokio::fs::File::open("song.dca").await?;
/// let mut decoder = Decoder::new(file);
///
/// loop {
///     match decoder.next_frame().await {
///         Ok(frame) => sink.send(frame).await?,
///         Err(e) if e.is_end_of_stream() => break,
///         Err(e) => return Err(e.into()),
///     }
/// }
/// ```
pub struct Decoder<R> {
    reader: Rewind<R>,
    state: DecoderState,
    format_version: u8,
    metadata: Option<Metadata>,
    frames_read: u64,
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Rewind::new(reader),
            state: DecoderState::AwaitingHeaderDecision,
            format_version: 0,
            metadata: None,
            frames_read: 0,
        }
    }

    /// 格式版本（无容器头时为0）
    pub fn format_version(&self) -> u8 {
        self.format_version
    }

    /// 元数据（仅在成功解析容器头后存在）
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// 已读取的帧数
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// 读取容器头和元数据
    ///
    /// 只能在读取任何帧之前调用一次，否则返回 `DcaError::NotFirstFrame`。
    ///
    /// 如果流不是以 "DCA" 开头，返回 `DcaError::NotDca`，已读取的字节会被放回，
    /// 调用方可以继续用 [`Decoder::next_frame`] 把它当作裸帧流读取。
    pub async fn read_metadata(&mut self) -> Result<(), DcaError> {
        if self.state != DecoderState::AwaitingHeaderDecision {
            return Err(DcaError::NotFirstFrame);
        }
        self.state = DecoderState::StreamingFrames;

        let mut fingerprint = [0u8; 4];
        let read = read_up_to(&mut self.reader, &mut fingerprint)
            .await
            .map_err(DcaError::Io)?;
        if read == 0 {
            return Err(DcaError::EndOfStream);
        }
        if read < DCA_MAGIC.len() || &fingerprint[..DCA_MAGIC.len()] != DCA_MAGIC {
            self.reader.rewind(&fingerprint[..read]);
            debug!("DCA magic not found, stream left at offset 0");
            return Err(DcaError::NotDca);
        }
        if read < fingerprint.len() {
            return Err(DcaError::TruncatedHeader);
        }

        let version_byte = fingerprint[3];
        let version = (version_byte as char)
            .to_digit(10)
            .ok_or(DcaError::InvalidVersion(version_byte))?;
        self.format_version = version as u8;

        let mut len_buf = [0u8; 4];
        let read = read_up_to(&mut self.reader, &mut len_buf)
            .await
            .map_err(DcaError::Io)?;
        if read < len_buf.len() {
            return Err(DcaError::TruncatedHeader);
        }
        let metadata_len = i32::from_le_bytes(len_buf);
        if metadata_len < 0 {
            return Err(DcaError::InvalidMetadataLength(metadata_len));
        }

        // 按实际到达的数据分配，不信任声明的长度
        let mut json = Vec::new();
        (&mut self.reader)
            .take(metadata_len as u64)
            .read_to_end(&mut json)
            .await
            .map_err(DcaError::Io)?;
        if json.len() < metadata_len as usize {
            return Err(DcaError::TruncatedHeader);
        }

        let metadata: Metadata = serde_json::from_slice(&json).map_err(|e| {
            warn!("Failed to parse DCA metadata: {}", e);
            DcaError::Metadata(e)
        })?;
        self.metadata = Some(metadata);

        debug!(
            "Parsed DCA header: version={}, metadata_len={}",
            self.format_version, metadata_len
        );
        Ok(())
    }

    /// 读取下一帧
    ///
    /// 首次调用时会窥视流开头的3个字节：若为 "DCA" 则先解析容器头，
    /// 否则按裸帧流处理。
    pub async fn next_frame(&mut self) -> Result<Vec<u8>, DcaError> {
        if self.state == DecoderState::AwaitingHeaderDecision {
            let mut magic = [0u8; 3];
            let read = read_up_to(&mut self.reader, &mut magic)
                .await
                .map_err(DcaError::Io)?;
            self.reader.rewind(&magic[..read]);

            if read == magic.len() && &magic == DCA_MAGIC {
                self.read_metadata().await?;
            } else {
                debug!("No DCA header, decoding raw frame stream");
                self.state = DecoderState::StreamingFrames;
            }
        }

        let frame = decode_frame(&mut self.reader).await?;
        self.frames_read += 1;
        Ok(frame)
    }

    /// 转换为帧流
    ///
    /// 流在正常结束时终止；遇到其他错误时先产出该错误再终止。
    pub fn into_frames(self) -> impl Stream<Item = Result<Vec<u8>, DcaError>> {
        futures::stream::unfold(Some(self), |decoder| async move {
            let mut decoder = decoder?;
            match decoder.next_frame().await {
                Ok(frame) => Some((Ok(frame), Some(decoder))),
                Err(e) if e.is_end_of_stream() => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
