// 编码源抽象
//
// 编码源是外部编码管线的输出端：一个可读的字节流（长度前缀帧序列），
// 外加截断/重置操作和只读的编码参数。

use crate::config::EncodeOptions;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

/// 编码源
///
/// 流会话的投递任务独占读取编码源；`truncate` 只会在投递任务结束时由其自身调用。
#[async_trait]
pub trait EncoderSource: AsyncRead + Unpin + Send + 'static {
    /// 释放所有已缓冲但未投递的数据
    async fn truncate(&mut self);

    /// 编码参数
    fn options(&self) -> &EncodeOptions;
}

/// 基于任意 `AsyncRead` 的编码源
///
/// 可包装文件、子进程标准输出或管道。截断后底层读取器被丢弃，后续读取返回流结束。
pub struct ReaderSource<R> {
    reader: Option<R>,
    options: EncodeOptions,
    bytes_read: u64,
}

impl<R> ReaderSource<R> {
    pub fn new(reader: R, options: EncodeOptions) -> Self {
        Self {
            reader: Some(reader),
            options,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn is_truncated(&self) -> bool {
        self.reader.is_none()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ReaderSource<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(reader) = this.reader.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let before = buf.filled().len();
        let result = Pin::new(reader).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = result {
            this.bytes_read += (buf.filled().len() - before) as u64;
        }
        result
    }
}

#[async_trait]
impl<R> EncoderSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn truncate(&mut self) {
        if self.reader.take().is_some() {
            debug!("Encoder source truncated after {} bytes", self.bytes_read);
        }
    }

    fn options(&self) -> &EncodeOptions {
        &self.options
    }
}
