//! Per-connection frame splitter.
//!
//! Separates a TCP byte stream into text sentences and binary data. Text
//! sentences are `\r\n` terminated and start with `!` or `$`; everything else
//! is binary and goes to the MAVLink parser.
//!
//! If the buffered bytes are not valid UTF-8 the whole buffer is handed over
//! as one binary unit. An incomplete multi-byte sequence at the very end of
//! the buffer does not count as invalid: the rest of it may arrive with the
//! next read.
//!
//! Only a remainder that can still become a sentence waits for a delimiter.
//! Anything else (printable frame bytes, whitespace, control bytes) is
//! forwarded as binary straight away. Binary units carry their bytes
//! untouched, delimiter included, so the frame decoder sees every byte once
//! and in order.

use bytes::{Bytes, BytesMut};

/// Sentence terminator.
pub const SENTENCE_DELIMITER: &[u8] = b"\r\n";

/// Leading characters that mark a text sentence.
pub const SENTENCE_SENTINELS: [u8; 2] = [b'!', b'$'];

/// Default bound on bytes buffered without a delimiter (64 KiB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024;

/// One unit of work extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameUnit {
    /// A text sentence, whitespace-trimmed, sentinel included.
    Sentence(String),
    /// Bytes for the binary frame decoder.
    Binary(Bytes),
}

/// Error raised by the splitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Undelimited data grew past the configured bound.
    #[error("Frame buffer overflow: {len} bytes buffered without a delimiter (max {max})")]
    BufferOverflow { len: usize, max: usize },
}

/// Accumulates bytes and splits them into [`FrameUnit`]s.
pub struct FrameSplitter {
    buffer: BytesMut,
    max_buffer_size: usize,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSplitter {
    /// Create a splitter with the default buffer bound.
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_BUFFER_SIZE)
    }

    /// Create a splitter with a custom buffer bound.
    pub fn with_max_buffer_size(max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096.min(max_buffer_size)),
            max_buffer_size,
        }
    }

    /// Number of bytes waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append `data` and extract every complete unit.
    ///
    /// Partial sentences stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BufferOverflow`] when the undelimited remainder
    /// exceeds the bound. The buffer is cleared and any units completed by
    /// the same call are discarded; the caller is expected to drop the
    /// connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<FrameUnit>, FrameError> {
        self.buffer.extend_from_slice(data);

        if !is_text(&self.buffer) {
            let whole = self.buffer.split().freeze();
            return Ok(vec![FrameUnit::Binary(whole)]);
        }

        let mut units = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer) {
            let line = self.buffer.split_to(pos + SENTENCE_DELIMITER.len()).freeze();
            let trimmed = line[..pos].trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            match as_sentence(trimmed).map(str::to_owned) {
                Some(text) => units.push(FrameUnit::Sentence(text)),
                None => units.push(FrameUnit::Binary(line)),
            }
        }

        if !self.buffer.is_empty() && !could_be_sentence(&self.buffer) {
            units.push(FrameUnit::Binary(self.buffer.split().freeze()));
        }

        if self.buffer.len() > self.max_buffer_size {
            let len = self.buffer.len();
            self.buffer.clear();
            return Err(FrameError::BufferOverflow {
                len,
                max: self.max_buffer_size,
            });
        }

        Ok(units)
    }

    /// Drop any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Classify one delimited line. Returns `None` for blank lines.
///
/// Sentences are trimmed; binary units keep the line's bytes as given.
pub fn classify(line: &[u8]) -> Option<FrameUnit> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }

    Some(match as_sentence(trimmed) {
        Some(text) => FrameUnit::Sentence(text.to_owned()),
        None => FrameUnit::Binary(Bytes::copy_from_slice(line)),
    })
}

/// `trimmed` as a sentence, if it starts with a sentinel and is UTF-8.
fn as_sentence(trimmed: &[u8]) -> Option<&str> {
    if !SENTENCE_SENTINELS.contains(trimmed.first()?) {
        return None;
    }
    std::str::from_utf8(trimmed).ok()
}

/// Whether an undelimited remainder may still turn into a sentence.
fn could_be_sentence(bytes: &[u8]) -> bool {
    let Some(first) = bytes.iter().find(|b| !b.is_ascii_whitespace()) else {
        return false;
    };
    SENTENCE_SENTINELS.contains(first)
        && !bytes
            .iter()
            .any(|&b| b.is_ascii_control() && !matches!(b, b'\t' | b'\r' | b'\n'))
}

/// Whether `bytes` is UTF-8, allowing a truncated sequence at the end.
pub fn is_text(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(SENTENCE_DELIMITER.len())
        .position(|window| window == SENTENCE_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTENCE: &str = "!AIVDM,1,1,,A,13u?et@01G?Q@<L1R0<:wvP00000,0*0D";

    fn sentence(s: &str) -> FrameUnit {
        FrameUnit::Sentence(s.to_string())
    }

    #[test]
    fn test_complete_sentence() {
        let mut splitter = FrameSplitter::new();
        let units = splitter.push(format!("{}\r\n", SENTENCE).as_bytes()).unwrap();
        assert_eq!(units, vec![sentence(SENTENCE)]);
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_partial_sentence_is_buffered() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(&SENTENCE.as_bytes()[..10]).unwrap().is_empty());
        assert_eq!(splitter.buffered(), 10);

        let mut rest = SENTENCE.as_bytes()[10..].to_vec();
        rest.extend_from_slice(b"\r\n");
        assert_eq!(splitter.push(&rest).unwrap(), vec![sentence(SENTENCE)]);
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        let mut splitter = FrameSplitter::new();
        let mut first = SENTENCE.as_bytes().to_vec();
        first.push(b'\r');
        assert!(splitter.push(&first).unwrap().is_empty());
        assert_eq!(splitter.push(b"\n").unwrap(), vec![sentence(SENTENCE)]);
    }

    #[test]
    fn test_arbitrary_chunking_yields_same_units() {
        let stream = format!("{s}\r\n  \r\n$GPGGA,1\r\n{s}\r\n", s = SENTENCE);
        let bytes = stream.as_bytes();

        let mut whole = FrameSplitter::new();
        let expected = whole.push(bytes).unwrap();
        assert_eq!(expected.len(), 3);

        // A chunk ending inside the blank line forwards its whitespace as
        // binary; the sentences are unaffected.
        for chunk_size in 1..=bytes.len() {
            let mut splitter = FrameSplitter::new();
            let mut sentences = Vec::new();
            for chunk in bytes.chunks(chunk_size) {
                sentences.extend(
                    splitter
                        .push(chunk)
                        .unwrap()
                        .into_iter()
                        .filter(|unit| matches!(unit, FrameUnit::Sentence(_))),
                );
            }
            assert_eq!(sentences, expected, "chunk size {}", chunk_size);
            assert_eq!(splitter.buffered(), 0);
        }
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(b"\r\n   \r\n\t\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_text_without_sentinel_is_binary() {
        let mut splitter = FrameSplitter::new();
        let units = splitter.push(b" hello \r\n").unwrap();
        assert_eq!(
            units,
            vec![FrameUnit::Binary(Bytes::from_static(b" hello \r\n"))]
        );
    }

    #[test]
    fn test_binary_line_keeps_edge_whitespace() {
        // 0x09 and 0x20 are ordinary payload bytes inside a frame.
        let mut splitter = FrameSplitter::new();
        let units = splitter.push(b"\tWDC 1234 \r\n$GPGGA,1\r\n").unwrap();
        assert_eq!(
            units,
            vec![
                FrameUnit::Binary(Bytes::from_static(b"\tWDC 1234 \r\n")),
                sentence("$GPGGA,1"),
            ]
        );
    }

    #[test]
    fn test_classify_trims_sentences_only() {
        assert_eq!(classify(b"  !AIVDM,x \r"), Some(sentence("!AIVDM,x")));
        assert_eq!(
            classify(b" \x01\x02 \r"),
            Some(FrameUnit::Binary(Bytes::from_static(b" \x01\x02 \r")))
        );
        assert_eq!(classify(b" \t\r"), None);
    }

    #[test]
    fn test_invalid_utf8_sends_whole_buffer_to_binary() {
        let mut splitter = FrameSplitter::new();
        // A partial sentence sits in the buffer when binary data arrives.
        splitter.push(b"!AIVDM,1,1").unwrap();

        let mut bytes: Vec<u8> = (0x80..=0xBF).collect();
        bytes.extend(0xF8..=0xFF);
        let units = splitter.push(&bytes).unwrap();

        let mut expected = b"!AIVDM,1,1".to_vec();
        expected.extend_from_slice(&bytes);
        assert_eq!(units, vec![FrameUnit::Binary(Bytes::from(expected))]);
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_binary_fallback_conserves_bytes() {
        // Every byte pushed comes back out exactly once.
        let mut bytes: Vec<u8> = b"$partial\r\n".to_vec();
        bytes.extend(0x80..=0xBF);
        bytes.extend(0xF8..=0xFF);

        let mut splitter = FrameSplitter::new();
        let units = splitter.push(&bytes).unwrap();
        let total: usize = units
            .iter()
            .map(|u| match u {
                FrameUnit::Binary(b) => b.len(),
                FrameUnit::Sentence(s) => s.len(),
            })
            .sum();
        assert_eq!(total, bytes.len());
    }

    #[test]
    fn test_incomplete_multibyte_tail_waits() {
        let mut splitter = FrameSplitter::new();
        // "é" is C3 A9; deliver the first byte only.
        let units = splitter.push(b"$name caf\xC3").unwrap();
        assert!(units.is_empty());

        let units = splitter.push(b"\xA9\r\n").unwrap();
        assert_eq!(units, vec![sentence("$name café")]);
    }

    #[test]
    fn test_mavlink_v2_marker_is_never_text() {
        assert!(!is_text(&[0xFD, 0x09, 0x00]));
        assert!(is_text(b"!AIVDM"));
    }

    #[test]
    fn test_ascii_frame_tail_is_forwarded_immediately() {
        // A read carrying only the printable tail of a binary frame must
        // reach the frame decoder without waiting for more data.
        let mut splitter = FrameSplitter::new();
        let units = splitter.push(b"WDC1234").unwrap();
        assert_eq!(units, vec![FrameUnit::Binary(Bytes::from_static(b"WDC1234"))]);
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_whitespace_remainder_is_forwarded() {
        let mut splitter = FrameSplitter::new();
        let units = splitter.push(b"$ok\r\n \t").unwrap();
        assert_eq!(
            units,
            vec![sentence("$ok"), FrameUnit::Binary(Bytes::from_static(b" \t"))]
        );
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_sentinel_with_control_bytes_is_binary() {
        let mut splitter = FrameSplitter::new();
        let units = splitter.push(b"$\x00\x1c\x02").unwrap();
        assert_eq!(
            units,
            vec![FrameUnit::Binary(Bytes::from_static(b"$\x00\x1c\x02"))]
        );
    }

    #[test]
    fn test_buffer_overflow() {
        let mut splitter = FrameSplitter::with_max_buffer_size(16);
        assert!(splitter.push(b"!AIVDM,1,1").unwrap().is_empty());

        let err = splitter.push(b",,A,13u?et@01G").unwrap_err();
        assert_eq!(err, FrameError::BufferOverflow { len: 24, max: 16 });
        assert_eq!(splitter.buffered(), 0);

        // Usable again after the overflow.
        assert_eq!(splitter.push(b"$ok\r\n").unwrap(), vec![sentence("$ok")]);
    }

    #[test]
    fn test_long_delimited_input_does_not_overflow() {
        let mut splitter = FrameSplitter::with_max_buffer_size(64);
        let stream = format!("{s}\r\n{s}\r\n{s}\r\n", s = SENTENCE);
        assert_eq!(splitter.push(stream.as_bytes()).unwrap().len(), 3);
    }
}
