// DCA 容器线格式
//
// ```text
// [3 bytes]  "DCA"                   -- 缺省时为裸帧流
// [1 byte]   格式版本，ASCII数字 '0'-'9'
// [4 bytes]  int32 元数据长度 N（小端）
// [N bytes]  UTF-8 JSON 元数据对象
// ---- 重复 ----
// [2 bytes]  int16 帧长度 L（小端）
// [L bytes]  opus 帧数据
// ```

use crate::error::{DcaError, Result};
use crate::types::Metadata;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// 容器魔数
pub const DCA_MAGIC: &[u8; 3] = b"DCA";

/// 当前写出的格式版本
pub const FORMAT_VERSION: u8 = 1;

/// 帧长度前缀字节数
pub const FRAME_LEN_PREFIX: usize = 2;

/// 单帧最大字节数
pub const MAX_FRAME_LEN: usize = i16::MAX as usize;

/// 编码单个帧（长度前缀 + 数据）
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(DcaError::FrameTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(FRAME_LEN_PREFIX + payload.len());
    buf.put_i16_le(payload.len() as i16);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// 编码容器头（魔数 + 版本 + 元数据块）
pub fn encode_header(version: u8, metadata: &Metadata) -> Result<Bytes> {
    if version > 9 {
        return Err(DcaError::InvalidVersion(version));
    }

    let json = serde_json::to_vec(metadata)?;
    let json_len =
        i32::try_from(json.len()).map_err(|_| DcaError::InvalidMetadataLength(i32::MAX))?;

    let mut buf = BytesMut::with_capacity(DCA_MAGIC.len() + 1 + 4 + json.len());
    buf.put_slice(DCA_MAGIC);
    buf.put_u8(b'0' + version);
    buf.put_i32_le(json_len);
    buf.put_slice(&json);
    Ok(buf.freeze())
}

/// 容器写入器
///
/// 可选地先写出一次容器头，随后逐帧写出。
pub struct FrameWriter<W> {
    writer: W,
    frames_written: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// 创建写入器，并立即写出容器头
    pub async fn with_header(mut writer: W, metadata: &Metadata) -> Result<Self> {
        let header = encode_header(FORMAT_VERSION, metadata)?;
        writer.write_all(&header).await.map_err(DcaError::Io)?;
        Ok(Self {
            writer,
            frames_written: 0,
        })
    }

    /// 创建不带容器头的裸帧写入器
    pub fn raw(writer: W) -> Self {
        Self {
            writer,
            frames_written: 0,
        }
    }

    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(payload)?;
        self.writer.write_all(&frame).await.map_err(DcaError::Io)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// 刷新并取回底层写入器
    pub async fn finish(mut self) -> Result<W> {
        self.writer.flush().await.map_err(DcaError::Io)?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(&[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(&frame[..], &[0x03, 0x00, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_encode_frame_too_large() {
        let payload = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(DcaError::FrameTooLarge(len)) if len == MAX_FRAME_LEN + 1
        ));
        assert!(encode_frame(&vec![0u8; MAX_FRAME_LEN]).is_ok());
    }

    #[test]
    fn test_encode_header_layout() {
        let header = encode_header(1, &Metadata::default()).unwrap();
        assert_eq!(&header[..4], b"DCA1");
        assert_eq!(&header[4..8], &2i32.to_le_bytes());
        assert_eq!(&header[8..], b"{}");
    }

    #[test]
    fn test_encode_header_rejects_multi_digit_version() {
        assert!(matches!(
            encode_header(10, &Metadata::default()),
            Err(DcaError::InvalidVersion(10))
        ));
    }

    #[tokio::test]
    async fn test_frame_writer() {
        let mut writer = FrameWriter::with_header(Vec::new(), &Metadata::default())
            .await
            .unwrap();
        writer.write_frame(&[0xAA]).await.unwrap();
        writer.write_frame(&[]).await.unwrap();
        assert_eq!(writer.frames_written(), 2);

        let bytes = writer.finish().await.unwrap();
        let mut expected = b"DCA1".to_vec();
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(b"{}");
        expected.extend_from_slice(&[0x01, 0x00, 0xAA, 0x00, 0x00]);
        assert_eq!(bytes, expected);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_encode_frame_prefix_matches_payload(
            payload in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let frame = encode_frame(&payload).unwrap();
            prop_assert_eq!(frame.len(), FRAME_LEN_PREFIX + payload.len());
            let len = i16::from_le_bytes([frame[0], frame[1]]);
            prop_assert_eq!(len as usize, payload.len());
            prop_assert_eq!(&frame[FRAME_LEN_PREFIX..], &payload[..]);
        }

        #[test]
        fn test_encode_header_carries_metadata(
            version in 0u8..10,
            entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..6),
        ) {
            let mut metadata = Metadata::default();
            for (key, value) in &entries {
                metadata.insert(key.clone(), Value::from(*value));
            }

            let header = encode_header(version, &metadata).unwrap();
            prop_assert_eq!(&header[..3], &DCA_MAGIC[..]);
            prop_assert_eq!(header[3], b'0' + version);

            let declared = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            prop_assert_eq!(declared as usize, header.len() - 8);

            let parsed: Metadata = serde_json::from_slice(&header[8..]).unwrap();
            prop_assert_eq!(parsed, metadata);
        }
    }
}
