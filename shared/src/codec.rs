//! JSON framing for [`Message`]
//!
//! One message per line on the stream. Decoding looks at the `type` field
//! before deserializing so an unknown kind is told apart from a broken frame.
//! [`read_frame`] splits a byte stream into lines with a length cap, so a peer
//! that never sends a newline cannot grow the buffer without bound.

use crate::error::CodecError;
use crate::protocol::Message;
use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Longest frame either side accepts, newline excluded
///
/// A full four-player snapshot is a few kilobytes; this leaves ample room.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub fn encode(message: &Message) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode(frame: &str) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_str(frame.trim())?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingType)?;
    if !Message::is_known_type(kind) {
        return Err(CodecError::UnknownType(kind.to_string()));
    }

    Ok(serde_json::from_value(value)?)
}

/// Reads the next newline-terminated frame from `reader`
///
/// Returns `Ok(None)` at a clean end of stream. A trailing `\r` is dropped and
/// a last frame without a newline is still returned. A frame longer than
/// `max_len` bytes, or one that is not UTF-8, fails with
/// [`io::ErrorKind::InvalidData`]; the stream should be dropped after that.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if frame.is_empty() {
                return Ok(None);
            }
            break;
        }

        let newline = available.iter().position(|byte| *byte == b'\n');
        let chunk = match newline {
            Some(end) => &available[..end],
            None => available,
        };
        if frame.len() + chunk.len() > max_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame longer than {} bytes", max_len),
            ));
        }
        frame.extend_from_slice(chunk);

        let used = chunk.len() + usize::from(newline.is_some());
        reader.consume(used);
        if newline.is_some() {
            break;
        }
    }

    if frame.last() == Some(&b'\r') {
        frame.pop();
    }
    String::from_utf8(frame)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Color;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_is_single_line() {
        let frame = encode(&Message::TurnChanged { turn: Color::Yellow }).unwrap();
        assert!(!frame.contains('\n'));
        assert_eq!(frame, r#"{"type":"turnChanged","turn":"yellow"}"#);
    }

    #[test]
    fn test_decode_accepts_trailing_newline() {
        let message = decode("{\"type\":\"requestNextTurn\"}\n").unwrap();
        assert_eq!(message, Message::RequestNextTurn);
    }

    #[test]
    fn test_decode_unknown_type() {
        match decode(r#"{"type":"chat","text":"hi"}"#) {
            Err(CodecError::UnknownType(kind)) => assert_eq!(kind, "chat"),
            other => panic!("expected unknown type, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_type() {
        assert!(matches!(
            decode(r#"{"roll":3}"#),
            Err(CodecError::MissingType)
        ));
        assert!(matches!(decode(r#"{"type":7}"#), Err(CodecError::MissingType)));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode("{not json"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"type":"turnChanged","turn":"purple"}"#),
            Err(CodecError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_across_partial_reads() {
        let stream = Builder::new()
            .read(b"{\"type\":\"reque")
            .read(b"stNextTurn\"}\n{\"type\":")
            .read(b"\"turnChanged\",\"turn\":\"red\"}\r\n")
            .build();
        let mut reader = BufReader::new(stream);

        let first = read_frame(&mut reader, MAX_FRAME_LEN).await.unwrap().unwrap();
        assert_eq!(decode(&first).unwrap(), Message::RequestNextTurn);

        let second = read_frame(&mut reader, MAX_FRAME_LEN).await.unwrap().unwrap();
        assert_eq!(
            decode(&second).unwrap(),
            Message::TurnChanged { turn: Color::Red }
        );

        assert_eq!(read_frame(&mut reader, MAX_FRAME_LEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_frame_without_final_newline() {
        let stream = Builder::new().read(b"first\nlast").build();
        let mut reader = BufReader::new(stream);

        assert_eq!(
            read_frame(&mut reader, 16).await.unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            read_frame(&mut reader, 16).await.unwrap().as_deref(),
            Some("last")
        );
        assert_eq!(read_frame(&mut reader, 16).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_overlong_line() {
        let stream = Builder::new().read(b"0123456789").read(b"abcdef").build();
        let mut reader = BufReader::new(stream);

        let err = read_frame(&mut reader, 12).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_invalid_utf8() {
        let stream = Builder::new().read(&[0xff, 0xfe, b'\n']).build();
        let mut reader = BufReader::new(stream);

        let err = read_frame(&mut reader, MAX_FRAME_LEN).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
