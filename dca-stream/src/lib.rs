// DCA 音频流 - 容器解码与实时帧投递
//
// # 核心组件
//
// - `codec`: 单帧解码（长度前缀帧）
// - `Decoder`: 容器解码器，自动识别可选的 "DCA" 容器头与元数据
// - `StreamingSession`: 后台投递任务，带暂停/恢复与接收端超时检测
// - `config`: 配置加载、校验与环境变量覆盖

pub mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod serde_helpers;
pub mod session;
pub mod sink;
pub mod source;

pub use codec::decode_frame;
pub use config::{ConfigManager, EncodeOptions, EnvConfigOverride, LoggingConfig, PlayerConfig, StreamSettings};
pub use decoder::Decoder;
pub use error::StreamError;
pub use session::{PauseAction, SessionState, SessionStatus, StreamingSession};
pub use sink::{frame_channel, FrameSink};
pub use source::{EncoderSource, ReaderSource};

pub use common::{DcaError, Metadata};
