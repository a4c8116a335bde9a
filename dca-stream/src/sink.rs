// 帧接收端抽象
//
// 接收端每次接收一帧；接收可能阻塞（消费方未跟上实时速率）或失败（已关闭）。
// 等待期限由流会话负责施加。

use crate::error::StreamError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// 帧接收端
#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// 接收一帧，接收端关闭时返回 `StreamError::SinkClosed`
    async fn accept(&self, frame: Vec<u8>) -> Result<(), StreamError>;
}

#[async_trait]
impl FrameSink for mpsc::Sender<Vec<u8>> {
    async fn accept(&self, frame: Vec<u8>) -> Result<(), StreamError> {
        self.send(frame).await.map_err(|_| StreamError::SinkClosed)
    }
}

/// 创建有界帧通道
pub fn frame_channel(capacity: usize) -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
    mpsc::channel(capacity)
}
