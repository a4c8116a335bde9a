// 帧编解码
//
// 单帧格式：2字节小端 int16 长度前缀 + 对应长度的 opus 数据。
// 容器解码器和流会话共用此实现。

use common::{DcaError, FRAME_LEN_PREFIX};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 尽量读满 `buf`，返回实际读取的字节数
///
/// 只有在流结束时返回值才会小于 `buf.len()`。
pub(crate) async fn read_up_to<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 从字节流中解码一个帧
///
/// # 返回
///
/// - `Ok(frame)`: 完整的帧数据
/// - `Err(DcaError::EndOfStream)`: 流在帧边界处正常结束
/// - `Err(DcaError::TruncatedFrame)`: 数据不足，不返回部分帧
/// - `Err(DcaError::InvalidFrameLength)`: 长度前缀为负数
pub async fn decode_frame<R>(reader: &mut R) -> Result<Vec<u8>, DcaError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; FRAME_LEN_PREFIX];
    let read = read_up_to(reader, &mut prefix).await.map_err(DcaError::Io)?;
    if read == 0 {
        return Err(DcaError::EndOfStream);
    }
    if read < FRAME_LEN_PREFIX {
        return Err(DcaError::TruncatedFrame {
            expected: FRAME_LEN_PREFIX,
            actual: read,
        });
    }

    let len = i16::from_le_bytes(prefix);
    if len < 0 {
        return Err(DcaError::InvalidFrameLength(len));
    }

    let expected = len as usize;
    let mut frame = vec![0u8; expected];
    let actual = read_up_to(reader, &mut frame).await.map_err(DcaError::Io)?;
    if actual < expected {
        return Err(DcaError::TruncatedFrame { expected, actual });
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::encode_frame;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_decode_single_frame() {
        let data = vec![0x03, 0x00, 0x01, 0x02, 0x03];
        let mut reader = &data[..];

        let frame = decode_frame(&mut reader).await.unwrap();
        assert_eq!(frame, vec![0x01, 0x02, 0x03]);
        assert!(decode_frame(&mut reader).await.unwrap_err().is_end_of_stream());
    }

    #[tokio::test]
    async fn test_decode_empty_frame() {
        let data = vec![0x00, 0x00];
        let mut reader = &data[..];
        assert!(decode_frame(&mut reader).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        // 声明5字节，只有2字节
        let data = vec![0x05, 0x00, 0xAA, 0xBB];
        let mut reader = &data[..];

        match decode_frame(&mut reader).await {
            Err(DcaError::TruncatedFrame { expected, actual }) => {
                assert_eq!(expected, 5);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected TruncatedFrame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_prefix() {
        let data = vec![0x05];
        let mut reader = &data[..];
        assert!(matches!(
            decode_frame(&mut reader).await,
            Err(DcaError::TruncatedFrame { expected: 2, actual: 1 })
        ));
    }

    #[tokio::test]
    async fn test_negative_length() {
        let data = (-1i16).to_le_bytes().to_vec();
        let mut reader = &data[..];
        assert!(matches!(
            decode_frame(&mut reader).await,
            Err(DcaError::InvalidFrameLength(-1))
        ));
    }

    #[tokio::test]
    async fn test_split_reads() {
        // 数据分多次到达时仍能完整读出
        let (mut tx, mut rx) = tokio::io::duplex(4);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let frame = encode_frame(&[7u8; 32]).unwrap();
            for chunk in frame.chunks(3) {
                tx.write_all(chunk).await.unwrap();
            }
        });

        let frame = decode_frame(&mut rx).await.unwrap();
        assert_eq!(frame, vec![7u8; 32]);
        writer.await.unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_frame_sequence_round_trip(
            frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 0..16)
        ) {
            let mut wire = Vec::new();
            for frame in &frames {
                wire.extend_from_slice(&encode_frame(frame).unwrap());
            }

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let decoded = runtime.block_on(async {
                let mut reader = &wire[..];
                let mut decoded = Vec::new();
                loop {
                    match decode_frame(&mut reader).await {
                        Ok(frame) => decoded.push(frame),
                        Err(e) => {
                            assert!(e.is_end_of_stream());
                            break;
                        }
                    }
                }
                decoded
            });

            prop_assert_eq!(decoded, frames);
        }

        #[test]
        fn test_cut_stream_never_yields_partial_frame(
            payload in prop::collection::vec(any::<u8>(), 1..256),
            cut in 1usize..256,
        ) {
            let wire = encode_frame(&payload).unwrap();
            let cut = cut.min(wire.len() - 1);

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(async {
                let mut reader = &wire[..cut];
                decode_frame(&mut reader).await
            });

            let is_truncated = matches!(result, Err(DcaError::TruncatedFrame { .. }));
            prop_assert!(is_truncated);
        }
    }
}
