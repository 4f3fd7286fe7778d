//! JSON-RPC framing codec for LSP communication.
//!
//! LSP uses `Content-Length: N\r\n\r\n{json}` framing over stdin/stdout.
//! This module provides [`FrameReader`] and [`FrameWriter`] for async
//! reading and writing of framed JSON-RPC messages.
//!
//! A body that fails to parse as JSON is a *recoverable* error: the bytes
//! have already been consumed, so the stream position is past the bad frame
//! and the next read starts at the following header. Header-level problems
//! and truncation are fatal.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("reading frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing Content-Length header")]
    MissingLength,

    #[error("invalid Content-Length value: {0}")]
    InvalidLength(String),

    #[error("Content-Length {got} exceeds maximum {MAX_FRAME_BYTES}")]
    Oversized { got: usize },

    #[error("unexpected EOF while reading frame {0}")]
    Truncated(&'static str),

    /// The frame body is not valid JSON. The stream position has advanced
    /// past the body; the caller may keep reading.
    #[error("malformed JSON body: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl FrameError {
    /// Whether the reader is still positioned at a frame boundary after
    /// this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Reads JSON-RPC frames from an async reader.
///
/// Parses `Content-Length` headers and reads exactly that many bytes,
/// then deserializes the body as JSON. Handles frames split across reads
/// and multiple frames per read (the underlying `BufReader` accumulates).
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next JSON-RPC frame.
    ///
    /// Returns `Ok(None)` on EOF at a frame boundary (clean shutdown).
    pub async fn read_frame(&mut self) -> Result<Option<Value>, FrameError> {
        let content_length = match self.read_headers().await? {
            Some(len) => len,
            None => return Ok(None), // EOF
        };

        if content_length > MAX_FRAME_BYTES {
            return Err(FrameError::Oversized {
                got: content_length,
            });
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(|_| FrameError::Truncated("body"))?;

        match serde_json::from_slice(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(FrameError::Malformed(e)),
        }
    }

    /// Parse headers until the empty line separator.
    ///
    /// Returns the `Content-Length` value, or `None` on EOF.
    async fn read_headers(&mut self) -> Result<Option<usize>, FrameError> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();
        let mut saw_any_header_bytes = false;

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                // EOF — only valid if we haven't started reading headers at all.
                //
                // Note: `content_length == None` doesn't imply "no headers read"
                // (e.g. EOF after reading only Content-Type should be an error).
                if !saw_any_header_bytes {
                    return Ok(None);
                }
                return Err(FrameError::Truncated("headers"));
            }
            saw_any_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                // Empty line = end of headers
                break;
            }

            // LSP spec uses "Content-Length" but parse case-insensitively for robustness.
            if let Some(colon_pos) = trimmed.find(':') {
                let key = &trimmed[..colon_pos];
                if key.eq_ignore_ascii_case("Content-Length") {
                    let raw = trimmed[colon_pos + 1..].trim();
                    let len: usize = raw
                        .parse()
                        .map_err(|_| FrameError::InvalidLength(raw.to_string()))?;
                    content_length = Some(len);
                }
            }
            // Ignore other headers (e.g. Content-Type)
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => Err(FrameError::MissingLength),
        }
    }
}

/// Writes JSON-RPC frames to an async writer.
///
/// Serializes JSON and prepends the `Content-Length` header.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a JSON-RPC frame with `Content-Length` header.
    pub async fn write_frame(&mut self, msg: &Value) -> Result<(), FrameError> {
        let body = serde_json::to_string(msg).map_err(FrameError::Malformed)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(body.as_bytes()).await?;
        self.writer.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_roundtrip() {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": { "uri": "file:///test.rs" }
        });

        // Write
        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_frame(&msg).await.unwrap();

        // Read back
        let mut reader = FrameReader::new(buf.as_slice());
        let result = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(result, msg);
    }

    #[tokio::test]
    async fn test_two_frames_in_one_read() {
        let msg1 = serde_json::json!({"jsonrpc": "2.0", "id": 1});
        let msg2 = serde_json::json!({"jsonrpc": "2.0", "id": 2});

        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_frame(&msg1).await.unwrap();
        writer.write_frame(&msg2).await.unwrap();

        // Both frames arrive in a single contiguous buffer; they must be
        // dispatched individually and in order.
        let mut reader = FrameReader::new(buf.as_slice());
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), msg1);
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), msg2);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_body_split_across_three_reads() {
        let msg = serde_json::json!({"jsonrpc": "2.0", "id": 7, "result": {"value": "split"}});
        let mut framed = Vec::new();
        FrameWriter::new(&mut framed)
            .write_frame(&msg)
            .await
            .unwrap();

        let (mut tx, rx) = tokio::io::duplex(16);
        let thirds = framed.len() / 3;
        let chunks = [
            framed[..thirds].to_vec(),
            framed[thirds..2 * thirds].to_vec(),
            framed[2 * thirds..].to_vec(),
        ];
        let feeder = tokio::spawn(async move {
            for chunk in chunks {
                tx.write_all(&chunk).await.unwrap();
                tx.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
            drop(tx);
        });

        let mut reader = FrameReader::new(rx);
        let result = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(result, msg);
        assert!(reader.read_frame().await.unwrap().is_none());
        feeder.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_returns_none() {
        let buf: &[u8] = b"";
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let buf: &[u8] = b"Content-Type: application/json\r\n\r\n{}";
        let mut reader = FrameReader::new(buf);
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::MissingLength)
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_headers_is_error() {
        // EOF after reading a header line must not be treated as a clean shutdown.
        let buf: &[u8] = b"Content-Type: application/json\r\n";
        let mut reader = FrameReader::new(buf);
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::Truncated("headers"))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let header = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_BYTES + 1);
        let buf = header.as_bytes();
        let mut reader = FrameReader::new(buf);
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::Oversized { .. })
        ));
    }

    #[tokio::test]
    async fn test_case_insensitive_content_length() {
        let body = r#"{"jsonrpc":"2.0","id":1}"#;
        let frame = format!("content-length: {}\r\n\r\n{body}", body.len());

        let mut reader = FrameReader::new(frame.as_bytes());
        let result = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(result["id"], 1);
    }

    #[tokio::test]
    async fn test_ignores_extra_headers() {
        let body = r#"{"jsonrpc":"2.0","id":1}"#;
        let frame = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
            body.len(),
        );

        let mut reader = FrameReader::new(frame.as_bytes());
        let result = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(result["id"], 1);
    }

    #[tokio::test]
    async fn test_eof_mid_body() {
        // Content-Length says 100, but only 5 bytes follow
        let buf: &[u8] = b"Content-Length: 100\r\n\r\nhello";
        let mut reader = FrameReader::new(buf);
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::Truncated("body"))
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_recoverable() {
        let body = b"not valid json!!!";
        let frame = format!("Content-Length: {}\r\n\r\n", body.len());
        let mut buf = frame.into_bytes();
        buf.extend_from_slice(body);

        // A valid frame follows the malformed one.
        let good = serde_json::json!({"jsonrpc": "2.0", "id": 3});
        FrameWriter::new(&mut buf).write_frame(&good).await.unwrap();

        let mut reader = FrameReader::new(buf.as_slice());
        let err = reader.read_frame().await.unwrap_err();
        assert!(err.is_recoverable());

        // The stream resynchronizes at the next header.
        let result = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(result, good);
    }

    #[tokio::test]
    async fn test_header_errors_are_not_recoverable() {
        let buf: &[u8] = b"Content-Length: not_a_number\r\n\r\n";
        let mut reader = FrameReader::new(buf);
        let err = reader.read_frame().await.unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_multibyte_utf8_content_length_counts_bytes() {
        // Content-Length counts bytes, not characters.
        // "é" is 2 bytes in UTF-8, so {"k":"é"} is 10 bytes.
        let body = r#"{"k":"é"}"#;
        assert_eq!(body.len(), 10); // 2-byte char
        let frame = format!("Content-Length: {}\r\n\r\n{body}", body.len());

        let mut reader = FrameReader::new(frame.as_bytes());
        let result = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(result["k"], "é");
    }

    #[tokio::test]
    async fn test_write_content_length_is_byte_count() {
        let msg = serde_json::json!({"k": "é"});
        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_frame(&msg).await.unwrap();

        let output = String::from_utf8(buf).unwrap();
        // The serialized JSON body
        let body = serde_json::to_string(&msg).unwrap();
        // Header should contain the byte length
        assert!(output.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));
    }
}
