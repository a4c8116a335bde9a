use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 播放器配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// 流会话设置
    #[serde(default)]
    pub stream: StreamSettings,

    /// 编码器输出描述
    #[serde(default)]
    pub encode: EncodeOptions,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// 接收端接收单帧的最长时间
    #[serde(serialize_with = "crate::serde_helpers::serialize_duration")]
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_duration")]
    pub send_timeout: Duration,

    /// `sink::frame_channel` 创建的通道容量
    pub sink_capacity: usize,
}

/// 编码器输出参数
///
/// 只读地描述编码源产出的数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// 单帧播放时长
    #[serde(serialize_with = "crate::serde_helpers::serialize_duration")]
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_duration")]
    pub frame_duration: Duration,

    /// 声道数
    pub channels: u16,

    /// 采样率（Hz）
    pub frame_rate: u32,

    /// 目标码率（kbps）
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令（trace / debug / info / warn / error）
    pub level: String,

    /// 日志行中是否显示事件目标
    pub with_target: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(1),
            sink_capacity: 100,
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_millis(20),
            channels: 2,
            frame_rate: 48_000,
            bitrate_kbps: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl EncodeOptions {
    /// 单帧每声道采样数
    pub fn frame_size(&self) -> u32 {
        (self.frame_rate as u128 * self.frame_duration.as_micros() / 1_000_000) as u32
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        // Opus 只接受 2.5/5/10/20/40/60 ms 的帧长
        const VALID_FRAME_MICROS: [u128; 6] = [2_500, 5_000, 10_000, 20_000, 40_000, 60_000];
        if !VALID_FRAME_MICROS.contains(&self.frame_duration.as_micros()) {
            return Err(StreamError::Config(format!(
                "Unsupported frame duration: {:?}",
                self.frame_duration
            )));
        }

        if self.channels == 0 || self.channels > 2 {
            return Err(StreamError::Config(format!(
                "Channels must be 1 or 2, got {}",
                self.channels
            )));
        }

        if ![8_000, 12_000, 16_000, 24_000, 48_000].contains(&self.frame_rate) {
            return Err(StreamError::Config(format!(
                "Unsupported frame rate: {}",
                self.frame_rate
            )));
        }

        if self.bitrate_kbps == 0 {
            return Err(StreamError::Config(
                "Bitrate must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.stream.send_timeout.is_zero() {
            return Err(StreamError::Config(
                "Send timeout must be greater than 0".to_string(),
            ));
        }

        if self.stream.sink_capacity == 0 {
            return Err(StreamError::Config(
                "Sink capacity must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.is_empty() {
            return Err(StreamError::Config(
                "Log level cannot be empty".to_string(),
            ));
        }

        self.encode.validate()
    }
}

/// 配置管理器：加载、保存与校验
pub struct ConfigManager {
    config_path: PathBuf,
    config: PlayerConfig,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: PlayerConfig::default(),
        }
    }

    /// 从文件加载配置，文件不存在时写出默认配置
    pub async fn load(&mut self) -> Result<(), StreamError> {
        if !self.config_path.exists() {
            self.save().await?;
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| StreamError::Config(format!("Failed to read config file: {}", e)))?;

        let config: PlayerConfig = toml::from_str(&content)
            .map_err(|e| StreamError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save(&self) -> Result<(), StreamError> {
        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| StreamError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StreamError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        tokio::fs::write(&self.config_path, content)
            .await
            .map_err(|e| StreamError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: PlayerConfig) -> Result<(), StreamError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }
}

/// 基于环境变量的配置覆盖
pub struct EnvConfigOverride;

impl EnvConfigOverride {
    /// 把环境变量覆盖应用到配置
    pub fn apply_overrides(config: &mut PlayerConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from<F>(config: &mut PlayerConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(millis) = lookup("DCA_SEND_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            config.stream.send_timeout = Duration::from_millis(millis);
        }

        if let Some(millis) = lookup("DCA_FRAME_DURATION_MS").and_then(|v| v.parse::<u64>().ok())
        {
            config.encode.frame_duration = Duration::from_millis(millis);
        }

        if let Some(channels) = lookup("DCA_CHANNELS").and_then(|v| v.parse::<u16>().ok()) {
            config.encode.channels = channels;
        }

        if let Some(level) = lookup("DCA_LOG_LEVEL") {
            config.logging.level = level;
        }
    }
}
