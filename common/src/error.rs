use thiserror::Error;

/// 容器解码错误
#[derive(Error, Debug)]
pub enum DcaError {
    /// 流已正常结束（不是错误）
    #[error("End of stream")]
    EndOfStream,

    #[error("DCA magic header not found, either not dca or raw dca frames")]
    NotDca,

    #[error("Metadata can only be read before the first frame")]
    NotFirstFrame,

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("Truncated header")]
    TruncatedHeader,

    #[error("Invalid frame length: {0}")]
    InvalidFrameLength(i16),

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Invalid format version byte: 0x{0:02x}")]
    InvalidVersion(u8),

    #[error("Invalid metadata length: {0}")]
    InvalidMetadataLength(i32),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl DcaError {
    /// 是否为正常的流结束
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DcaError::EndOfStream)
    }
}

impl From<std::io::Error> for DcaError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::UnexpectedEof => DcaError::EndOfStream,
            _ => DcaError::Io(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, DcaError>;
