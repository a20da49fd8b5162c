// Wire codec: raw bytes in both directions, no framing, no length prefix
use crate::error::DecodeError;
use std::borrow::Cow;

/// Bytes put on the wire for one input line. The line is sent as typed,
/// without a trailing newline.
pub fn encode_line(line: &str) -> &[u8] {
    line.as_bytes()
}

/// Decode one received chunk. Chunks are not aligned to characters, so a
/// multi-byte character split across two receives fails here.
pub fn decode_chunk(chunk: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(chunk).map_err(|e| DecodeError::from_utf8(e, chunk.len()))
}

/// Replacement-character rendering used after a decode warning.
pub fn decode_chunk_lossy(chunk: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(chunk)
}

/// Strip the line terminator an input source leaves behind (`\n` or `\r\n`).
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

pub fn is_sentinel(line: &str, sentinel: &str) -> bool {
    line == sentinel
}

/// Console rendering of a received unit: `label: text`.
pub fn format_received(label: &str, text: &str) -> String {
    format!("{}: {}", label, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_keeps_line_as_is() {
        assert_eq!(encode_line("hi"), b"hi");
        assert_eq!(encode_line(""), b"");
        assert_eq!(encode_line("héllo"), "héllo".as_bytes());
    }

    #[test]
    fn decode_valid_and_invalid_chunks() {
        assert_eq!(decode_chunk(b"hello").unwrap(), "hello");

        let err = decode_chunk(&[0x68, 0x69, 0xFF]).unwrap_err();
        assert_eq!(err.valid_up_to, 2);
        assert_eq!(err.len, 3);
        assert_eq!(decode_chunk_lossy(&[0x68, 0x69, 0xFF]), "hi\u{FFFD}");
    }

    #[test]
    fn split_character_fails_per_chunk() {
        let text = "€";
        let bytes = text.as_bytes();
        assert!(decode_chunk(&bytes[..1]).unwrap_err().truncated);
        assert!(decode_chunk(&bytes[1..]).is_err());
    }

    #[test]
    fn trims_unix_and_windows_endings() {
        assert_eq!(trim_line_ending("hi\n"), "hi");
        assert_eq!(trim_line_ending("hi\r\n"), "hi");
        assert_eq!(trim_line_ending("hi"), "hi");
        assert_eq!(trim_line_ending("hi\n\n"), "hi\n");
    }

    #[test]
    fn sentinel_must_match_exactly() {
        assert!(is_sentinel("break", "break"));
        assert!(!is_sentinel("break ", "break"));
        assert!(!is_sentinel("Break", "break"));
        assert!(!is_sentinel("breakfast", "break"));
    }

    #[test]
    fn received_format() {
        assert_eq!(format_received("client", "hello"), "client: hello");
    }
}
