//! Incremental decoding of the text-event-stream body
//!
//! [`FrameDecoder`] owns the accumulation buffer of one stream. Bytes are fed
//! in whatever pieces the transport delivers; complete frames come out in
//! delimiter order. A frame is complete only once its terminating blank line
//! has arrived, so nothing is ever emitted from a half-received frame.

use tracing::{debug, trace};

/// Separates frames on the wire
pub const FRAME_DELIMITER: &str = "\n\n";

/// Prefix of the lines that carry a frame's payload
pub const DATA_MARKER: &str = "data:";

/// Payload of one complete `data:` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: String,
}

impl Frame {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// Reassembles frames from arbitrarily split chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    partial_utf8: Vec<u8>,
    /// Offset in `buffer` before which no delimiter can start
    scan_from: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.decode_into_buffer(chunk);
        self.drain_frames()
    }

    /// End of input: return any frame still completable and drop the rest
    pub fn finish(&mut self) -> Vec<Frame> {
        if !self.partial_utf8.is_empty() {
            let bytes = std::mem::take(&mut self.partial_utf8);
            self.buffer.push_str(&String::from_utf8_lossy(&bytes));
        }
        let frames = self.drain_frames();
        if !self.buffer.trim().is_empty() {
            debug!(
                "Discarding {} bytes of incomplete trailing frame",
                self.buffer.len()
            );
        }
        self.buffer.clear();
        self.scan_from = 0;
        frames
    }

    /// Bytes received but not yet part of an emitted frame
    #[cfg(test)]
    fn buffered_len(&self) -> usize {
        self.buffer.len() + self.partial_utf8.len()
    }

    fn decode_into_buffer(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        // Sequence cut by the chunk boundary; wait for the rest
                        None => {
                            self.partial_utf8 = tail.to_vec();
                            break;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                    }
                }
            }
        }
    }

    fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer[self.scan_from..].find(FRAME_DELIMITER) {
            let end = self.scan_from + pos;
            let raw: String = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            self.scan_from = 0;
            match parse_frame(&raw[..end]) {
                Some(frame) => frames.push(frame),
                None => trace!("Skipping frame without data marker: {:?}", &raw[..end]),
            }
        }
        // A delimiter may still start at a trailing newline
        self.scan_from = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        frames
    }
}

/// Extract the payload of a raw frame; `None` when it has no data lines
pub fn parse_frame(raw: &str) -> Option<Frame> {
    let mut data_lines = Vec::new();
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = line.strip_prefix(DATA_MARKER) {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(Frame::new(data_lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        "data: {\"type\":\"metadata\",\"session_id\":\"s-42\"}\n\n",
        ": keep-alive\n\n",
        "data: {\"type\":\"thinking\",\"content\":\"检索政策…\"}\n\n",
        "data: {\"type\":\"chunk\",\"content\":\"第一条 😀\"}\n\n",
        "data: {\"type\":\"done\",\"session_id\":\"s-42\"}\n\n",
    );

    fn decode_in_pieces(input: &[u8], cuts: &[usize]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            frames.extend(decoder.feed(&input[start..cut]));
            start = cut;
        }
        frames.extend(decoder.feed(&input[start..]));
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn test_whole_stream() {
        let frames = decode_in_pieces(STREAM.as_bytes(), &[]);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].data, "{\"type\":\"metadata\",\"session_id\":\"s-42\"}");
        assert_eq!(frames[2].data, "{\"type\":\"chunk\",\"content\":\"第一条 😀\"}");
    }

    #[test]
    fn test_single_split_at_every_offset() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_pieces(bytes, &[]);
        for cut in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(bytes, &[cut]), expected, "split at {}", cut);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let bytes = STREAM.as_bytes();
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(decode_in_pieces(bytes, &cuts), decode_in_pieces(bytes, &[]));
    }

    #[test]
    fn test_multibyte_character_split_at_boundary() {
        let frame = "data: {\"content\":\"😀\"}\n\n";
        let bytes = frame.as_bytes();
        let emoji_start = frame.find('😀').unwrap();

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&bytes[..emoji_start + 2]).is_empty());
        let frames = decoder.feed(&bytes[emoji_start + 2..]);

        assert_eq!(frames, vec![Frame::new("{\"content\":\"😀\"}")]);
    }

    #[test]
    fn test_chunks_from_scenario() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"typ").is_empty());
        assert!(decoder.feed(b"e\":\"chunk\",\"content\":\"hi\"}\n").is_empty());
        let frames = decoder.feed(b"\n");
        assert_eq!(frames, vec![Frame::new("{\"type\":\"chunk\",\"content\":\"hi\"}")]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_frames_without_marker_are_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b": ping\n\nevent: noop\n\ndata: {}\n\n");
        assert_eq!(frames, vec![Frame::new("{}")]);
    }

    #[test]
    fn test_finish_discards_partial_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"chunk\"}\n").is_empty());
        assert!(decoder.finish().is_empty());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_finish_discards_dangling_utf8() {
        let mut decoder = FrameDecoder::new();
        let emoji = "😀".as_bytes();
        assert!(decoder.feed(&emoji[..2]).is_empty());
        assert_eq!(decoder.buffered_len(), 2);
        assert!(decoder.finish().is_empty());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: a\xffb\n\n");
        assert_eq!(frames, vec![Frame::new("a\u{FFFD}b")]);
    }

    #[test]
    fn test_crlf_lines_and_multiline_data() {
        let frame = parse_frame("data: first\r\ndata:second").unwrap();
        assert_eq!(frame.data, "first\nsecond");
    }

    #[test]
    fn test_several_frames_in_one_chunk_keep_order() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: 1\n\ndata: 2\n\ndata: 3\n\ndata: 4");
        let data: Vec<_> = frames.iter().map(|f| f.data.as_str()).collect();
        assert_eq!(data, vec!["1", "2", "3"]);
        assert_eq!(decoder.feed(b"\n\n"), vec![Frame::new("4")]);
    }
}
