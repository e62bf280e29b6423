//! Multipart (MJPEG) part codec
//!
//! A `multipart/x-mixed-replace` stream is a sequence of parts:
//!
//! ```text
//! \r\n
//! --myboundary\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 34567\r\n
//! X-Timestamp: 1445331200.250000\r\n
//! \r\n
//! <34567 bytes of JPEG>
//! ```
//!
//! Reading fills a [`StreamSlot`] in place. The slot length stays zero until
//! the whole body has arrived. A closing delimiter (`--myboundary--`) or EOF
//! between parts ends the stream cleanly.

use std::borrow::Cow;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{MultipartError, Result};
use crate::ring::slot::{parse_timestamp, timestamp_now};
use crate::ring::{RingError, StreamSlot};

use super::frame::Frame;

/// `Content-Type` header name
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
/// `Content-Length` header name
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
/// Capture timestamp header name (decimal seconds since the Unix epoch)
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
/// Longest accepted header line, excluding the line terminator
pub const MAX_HEADER_LINE: usize = 1024;
/// Media type of the whole stream
pub const MULTIPART_MIXED_REPLACE: &str = "multipart/x-mixed-replace";

/// Parsed per-part headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    /// MIME type of the part body
    pub content_type: String,
    /// Body length in bytes
    pub content_length: usize,
    /// Capture time, if the producer sent one
    pub timestamp: Option<Duration>,
}

/// Build the stream-level `Content-Type` value for a boundary
pub fn multipart_content_type(boundary: &str) -> String {
    format!("{}; boundary={}", MULTIPART_MIXED_REPLACE, boundary)
}

/// Extract the boundary from a multipart `Content-Type` value
///
/// A leading `--` on the parameter is stripped, since some producers include
/// the delimiter dashes in the header.
pub fn boundary_from_content_type(value: &str) -> Option<String> {
    let mut params = value.split(';');
    let media_type = params.next()?.trim();
    if !media_type.to_ascii_lowercase().starts_with("multipart/") {
        return None;
    }

    params.find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let val = val.trim().trim_matches('"');
        let val = val.strip_prefix("--").unwrap_or(val);
        (!val.is_empty()).then(|| val.to_string())
    })
}

/// Read one line, bounded by `MAX_HEADER_LINE`
///
/// Returns `None` at EOF.
async fn read_line<'a, R>(reader: &mut R, buf: &'a mut Vec<u8>) -> Result<Option<Cow<'a, str>>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = (MAX_HEADER_LINE + 2) as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if n as u64 == limit && buf.last() != Some(&b'\n') {
        return Err(MultipartError::HeaderTooLong(n).into());
    }

    let text = String::from_utf8_lossy(buf);
    let trimmed = match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_end_matches(['\r', '\n'])),
        Cow::Owned(s) => Cow::Owned(s.trim_end_matches(['\r', '\n']).to_string()),
    };
    if trimmed.len() > MAX_HEADER_LINE {
        return Err(MultipartError::HeaderTooLong(trimmed.len()).into());
    }
    Ok(Some(trimmed))
}

/// Read the delimiter and headers of the next part
///
/// Returns `None` when the stream ends between parts.
pub async fn read_part_header<R>(reader: &mut R, boundary: &str) -> Result<Option<PartHeader>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(128);

    // Delimiter line, skipping the blank lines that separate parts
    loop {
        let Some(line) = read_line(reader, &mut buf).await? else {
            return Ok(None);
        };
        if line.is_empty() {
            continue;
        }

        let rest = line.strip_prefix("--").unwrap_or_default();
        if rest == boundary {
            break;
        }
        if rest.strip_suffix("--") == Some(boundary) {
            return Ok(None);
        }
        return Err(MultipartError::BoundaryMismatch {
            expected: boundary.to_string(),
            found: line.into_owned(),
        }
        .into());
    }

    let mut content_type = None;
    let mut content_length = None;
    let mut timestamp = None;

    loop {
        let Some(line) = read_line(reader, &mut buf).await? else {
            return Err(MultipartError::UnexpectedEof.into());
        };
        if line.is_empty() {
            break;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| MultipartError::InvalidHeader(line.to_string()))?;
        let (key, value) = (key.trim(), value.trim());

        if key.eq_ignore_ascii_case(HEADER_CONTENT_TYPE) {
            content_type = Some(value.to_string());
        } else if key.eq_ignore_ascii_case(HEADER_CONTENT_LENGTH) {
            let length = value
                .parse::<usize>()
                .map_err(|_| MultipartError::InvalidContentLength(value.to_string()))?;
            content_length = Some(length);
        } else if key.eq_ignore_ascii_case(HEADER_TIMESTAMP) {
            timestamp = parse_timestamp(value);
        }
    }

    let content_length =
        content_length.ok_or(MultipartError::MissingHeader(HEADER_CONTENT_LENGTH))?;

    Ok(Some(PartHeader {
        content_type: content_type.unwrap_or_default(),
        content_length,
        timestamp,
    }))
}

/// Read the next part into `slot`
///
/// Returns `false` when the stream ended cleanly between parts. On any error
/// the slot length is left at zero.
pub async fn read_part_into_slot<R>(
    reader: &mut R,
    slot: &mut StreamSlot,
    boundary: &str,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let Some(header) = read_part_header(reader, boundary).await? else {
        return Ok(false);
    };

    slot.clear_length();

    let length = header.content_length;
    if length > slot.capacity() {
        return Err(RingError::Truncated {
            length,
            capacity: slot.capacity(),
        }
        .into());
    }

    let body = &mut slot.buffer_mut()[..length];
    let mut filled = 0;
    while filled < length {
        let n = reader.read(&mut body[filled..]).await?;
        if n == 0 {
            return Err(RingError::ShortRead {
                expected: length,
                actual: filled,
            }
            .into());
        }
        filled += n;
    }

    slot.set_content_type(header.content_type);
    slot.set_timestamp(header.timestamp.unwrap_or_else(timestamp_now));
    slot.set_length(length)?;
    Ok(true)
}

async fn write_part<W>(
    writer: &mut W,
    content_type: &str,
    timestamp: Duration,
    data: &[u8],
    boundary: &str,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = format!(
        "\r\n--{}\r\n{}: {}\r\n{}: {}\r\n{}: {:.6}\r\n\r\n",
        boundary,
        HEADER_CONTENT_TYPE,
        content_type,
        HEADER_CONTENT_LENGTH,
        data.len(),
        HEADER_TIMESTAMP,
        timestamp.as_secs_f64()
    );

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize a slot's frame as one part
pub async fn write_slot_part<W>(writer: &mut W, slot: &StreamSlot, boundary: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_part(writer, slot.content_type(), slot.timestamp(), slot.content(), boundary).await
}

/// Serialize a frame snapshot as one part
pub async fn write_frame_part<W>(writer: &mut W, frame: &Frame, boundary: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_part(writer, &frame.content_type, frame.timestamp, &frame.data, boundary).await
}

/// Write the closing delimiter
pub async fn write_closing<W>(writer: &mut W, boundary: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("\r\n--{}--\r\n", boundary).as_bytes())
        .await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::Error;

    const PART: &[u8] = b"\r\n--myboundary\r\n\
        Content-Type: image/jpeg\r\n\
        Content-Length: 4\r\n\
        X-Timestamp: 12.500000\r\n\
        \r\n\
        \xff\xd8\xff\xd9";

    #[tokio::test]
    async fn test_read_part_into_slot() {
        let mut reader = PART;
        let mut slot = StreamSlot::new(64);

        assert!(read_part_into_slot(&mut reader, &mut slot, "myboundary").await.unwrap());
        assert_eq!(slot.content(), &[0xff, 0xd8, 0xff, 0xd9]);
        assert!(slot.is_type("image/jpeg"));
        assert_eq!(slot.timestamp(), Duration::from_millis(12_500));

        // Nothing left: clean end of stream
        assert!(!read_part_into_slot(&mut reader, &mut slot, "myboundary").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_part_split_across_reads() {
        let mock = Builder::new()
            .read(b"--myboundary\r\nContent-Ty")
            .read(b"pe: text/plain\r\ncontent-length: 11\r\n\r\nhello")
            .read(b" world")
            .build();
        let mut reader = BufReader::new(mock);
        let mut slot = StreamSlot::new(64);

        assert!(read_part_into_slot(&mut reader, &mut slot, "myboundary").await.unwrap());
        assert_eq!(slot.content(), b"hello world");
        assert!(slot.is_major_type("text"));
        // No timestamp header: assigned at receipt
        assert!(slot.timestamp() > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_falls_back_to_receipt_time() {
        let mut reader: &[u8] = b"--myboundary\r\nContent-Length: 1\r\nX-Timestamp: 1e30\r\n\r\nx";
        let mut slot = StreamSlot::new(8);

        assert!(read_part_into_slot(&mut reader, &mut slot, "myboundary").await.unwrap());
        assert_eq!(slot.content(), b"x");
        let age = timestamp_now().saturating_sub(slot.timestamp());
        assert!(age < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_closing_delimiter_ends_stream() {
        let mut reader: &[u8] = b"\r\n--myboundary--\r\n";
        let mut slot = StreamSlot::new(8);

        assert!(!read_part_into_slot(&mut reader, &mut slot, "myboundary").await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_part_is_truncated_error() {
        let mut reader = PART;
        let mut slot = StreamSlot::new(2);

        let err = read_part_into_slot(&mut reader, &mut slot, "myboundary")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Ring(RingError::Truncated { length: 4, capacity: 2 })
        ));
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn test_short_body_is_short_read() {
        let mut reader: &[u8] = b"--myboundary\r\nContent-Length: 10\r\n\r\nabc";
        let mut slot = StreamSlot::new(64);

        let err = read_part_into_slot(&mut reader, &mut slot, "myboundary")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Ring(RingError::ShortRead { expected: 10, actual: 3 })
        ));
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let mut reader: &[u8] = b"--myboundary\r\nContent-Type: image/jpeg\r\n\r\n";

        let err = read_part_header(&mut reader, "myboundary").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Multipart(MultipartError::MissingHeader("Content-Length"))
        ));
    }

    #[tokio::test]
    async fn test_bad_content_length() {
        let mut reader: &[u8] = b"--myboundary\r\nContent-Length: lots\r\n\r\n";

        let err = read_part_header(&mut reader, "myboundary").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Multipart(MultipartError::InvalidContentLength(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_boundary() {
        let mut reader: &[u8] = b"--other\r\nContent-Length: 1\r\n\r\nx";

        let err = read_part_header(&mut reader, "myboundary").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Multipart(MultipartError::BoundaryMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_header_line_too_long() {
        let mut data = b"--myboundary\r\nX-Junk: ".to_vec();
        data.extend(std::iter::repeat(b'a').take(2 * MAX_HEADER_LINE));
        data.extend_from_slice(b"\r\n\r\n");
        let mut reader = &data[..];

        let err = read_part_header(&mut reader, "myboundary").await.unwrap_err();
        assert!(matches!(err, Error::Multipart(MultipartError::HeaderTooLong(_))));
    }

    #[tokio::test]
    async fn test_eof_inside_header() {
        let mut reader: &[u8] = b"--myboundary\r\nContent-Length: 1\r\n";

        let err = read_part_header(&mut reader, "myboundary").await.unwrap_err();
        assert!(matches!(err, Error::Multipart(MultipartError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_write_slot_part() {
        let slot = StreamSlot::with_data(16, "text/plain", 5, b"hello").unwrap();
        let header = format!(
            "\r\n--frame\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n{}\r\n\r\n",
            format_args!("X-Timestamp: {:.6}", slot.timestamp().as_secs_f64())
        );
        let mut writer = Builder::new()
            .write(header.as_bytes())
            .write(b"hello")
            .build();

        write_slot_part(&mut writer, &slot, "frame").await.unwrap();
    }

    #[tokio::test]
    async fn test_written_frames_parse_back() {
        let frames = [
            Frame::new(0, "image/jpeg", Duration::from_secs(1), Bytes::from_static(b"\xff\xd8")),
            Frame::new(1, "text/plain", Duration::from_secs(2), Bytes::from_static(b"tick")),
        ];

        let mut out = Vec::new();
        for frame in &frames {
            write_frame_part(&mut out, frame, "b").await.unwrap();
        }
        write_closing(&mut out, "b").await.unwrap();

        let mut reader = &out[..];
        let mut slot = StreamSlot::new(16);
        for frame in &frames {
            assert!(read_part_into_slot(&mut reader, &mut slot, "b").await.unwrap());
            assert_eq!(slot.content(), &frame.data[..]);
            assert_eq!(slot.content_type(), frame.content_type);
            assert_eq!(slot.timestamp(), frame.timestamp);
        }
        assert!(!read_part_into_slot(&mut reader, &mut slot, "b").await.unwrap());
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace; boundary=--myboundary"),
            Some("myboundary".to_string())
        );
        assert_eq!(
            boundary_from_content_type("Multipart/X-Mixed-Replace;Boundary=\"frame\""),
            Some("frame".to_string())
        );
        assert_eq!(boundary_from_content_type("image/jpeg; boundary=x"), None);
        assert_eq!(boundary_from_content_type("multipart/x-mixed-replace"), None);
        assert_eq!(
            multipart_content_type("myboundary"),
            "multipart/x-mixed-replace; boundary=myboundary"
        );
    }
}
