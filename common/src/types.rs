use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 元数据中工具信息分区的键
pub const DCA_SECTION: &str = "dca";
/// Opus编码参数分区的键
pub const OPUS_SECTION: &str = "opus";
/// 曲目信息分区的键
pub const INFO_SECTION: &str = "info";
/// 源文件信息分区的键
pub const ORIGIN_SECTION: &str = "origin";
/// 附加数据分区的键
pub const EXTRA_SECTION: &str = "extra";

/// 容器元数据
///
/// 原始JSON对象是唯一的数据来源，任意对象都能无损往返。
/// 已知分区通过访问器按需解析，形状不符时返回 `None`，不影响整个容器的解码。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: Map<String, Value>,
}

impl Metadata {
    /// 顶层字段
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按类型解析某个分区，缺失或形状不符时返回 `None`
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    /// 以类型化的值写入某个分区
    pub fn set_section<T: Serialize>(&mut self, key: &str, section: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(section)?;
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    pub fn dca(&self) -> Option<DcaInfo> {
        self.section(DCA_SECTION)
    }

    pub fn opus(&self) -> Option<OpusInfo> {
        self.section(OPUS_SECTION)
    }

    pub fn song_info(&self) -> Option<SongInfo> {
        self.section(INFO_SECTION)
    }

    pub fn origin(&self) -> Option<OriginInfo> {
        self.section(ORIGIN_SECTION)
    }

    /// 附加数据，原样返回
    pub fn extra(&self) -> Option<&Value> {
        self.fields.get(EXTRA_SECTION)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Metadata> for Map<String, Value> {
    fn from(metadata: Metadata) -> Self {
        metadata.fields
    }
}

/// 生成工具信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DcaInfo {
    #[serde(default)]
    pub version: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub author: String,
}

/// Opus编码参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpusInfo {
    /// 码率（bps）
    #[serde(default, rename = "abr")]
    pub bitrate: u32,
    #[serde(default)]
    pub sample_rate: u32,
    /// 应用模式（voip / audio / lowdelay）
    #[serde(default, rename = "mode")]
    pub application: String,
    /// 每帧采样数
    #[serde(default)]
    pub frame_size: u32,
    #[serde(default)]
    pub channels: u16,
}

/// 曲目信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

/// 源文件信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginInfo {
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "abr")]
    pub bitrate: u32,
    #[serde(default)]
    pub channels: u16,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub url: String,
}
