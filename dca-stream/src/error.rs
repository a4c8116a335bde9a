// DCA 流传输 - 错误类型定义
//
// 会话层错误需要保存在会话状态中并被反复查询，因此实现了 `Clone`，
// 解码层错误通过 `Arc` 共享。

use common::DcaError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 流会话错误类型
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    // ========== 解码错误 ==========
    /// 编码源数据解码失败（包括正常的流结束）
    #[error("Decode error: {0}")]
    Decode(Arc<DcaError>),

    // ========== 投递错误 ==========
    /// 接收端未在期限内接收帧
    #[error("Sink did not accept frame within {0:?}")]
    SinkTimeout(Duration),

    /// 接收端已关闭
    #[error("Sink closed")]
    SinkClosed,

    // ========== 不变量错误 ==========
    /// 同一会话出现第二个投递任务
    #[error("Delivery task is already running")]
    AlreadyRunning,

    // ========== 配置错误 ==========
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// 是否为正常的流结束
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::Decode(e) if e.is_end_of_stream())
    }

    /// 是否为调用方违反不变量（而不是运行时故障）
    pub fn is_fatal_invariant(&self) -> bool {
        matches!(self, StreamError::AlreadyRunning)
    }

    /// 底层解码错误
    pub fn decode_error(&self) -> Option<&DcaError> {
        match self {
            StreamError::Decode(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<DcaError> for StreamError {
    fn from(error: DcaError) -> Self {
        StreamError::Decode(Arc::new(error))
    }
}
