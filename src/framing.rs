use crate::constants::MAX_FRAME_BUFFER_BYTES;
use crate::types::{FrameEvent, RaglineError, StreamFrame};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decoder for the backend's SSE-formatted answer stream.
///
/// Frames are blank-line delimited; bytes after the last delimiter stay in
/// the buffer until the next read completes them. A frame is converted to
/// text only once whole, so a multi-byte character split across reads
/// decodes intact regardless of how the transport chunked the bytes.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = StreamFrame;
    type Error = RaglineError;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<StreamFrame>, RaglineError> {
        loop {
            let Some(pos) = src.windows(2).position(|w| w == b"\n\n") else {
                if src.len() > MAX_FRAME_BUFFER_BYTES {
                    return Err(RaglineError::Internal(
                        format!("stream frame exceeded {} bytes", MAX_FRAME_BUFFER_BYTES),
                        tracing_error::SpanTrace::capture(),
                    ));
                }
                return Ok(None);
            };

            let block = src.split_to(pos + 2);
            let text = String::from_utf8_lossy(&block[..pos]);
            match parse_block(&text) {
                Some(frame) => return Ok(Some(frame)),
                // A frame with no data content is dropped silently.
                None => continue,
            }
        }
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<StreamFrame>, RaglineError> {
        let frame = self.decode(src)?;
        if frame.is_none() && !src.is_empty() {
            // The backend always closes a frame before ending the stream;
            // an unterminated trailing block is discarded.
            tracing::debug!("discarding {} unterminated stream bytes", src.len());
            src.clear();
        }
        Ok(frame)
    }
}

/// Parses one delimiter-free block into a frame.
///
/// `event:` lines set the event name (default `message`); `data:` lines are
/// concatenated with surrounding whitespace trimmed. Returns None when the
/// block carries no data.
fn parse_block(block: &str) -> Option<StreamFrame> {
    let mut event = FrameEvent::Message;
    let mut data = String::new();

    for line in block.split('\n') {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("event:") {
            event = FrameEvent::from_name(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push_str(rest.trim());
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(StreamFrame { event, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut FrameCodec, buf: &mut BytesMut) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = codec.decode(buf) {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_single_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("event: token\ndata: {\"t\":\"Hel\"}\n\n");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, FrameEvent::Token);
        assert_eq!(frames[0].data, r#"{"t":"Hel"}"#);
    }

    #[test]
    fn test_default_event_is_message() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("data: ping\n\n");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames[0].event, FrameEvent::Message);
        assert_eq!(frames[0].data, "ping");
    }

    #[test]
    fn test_empty_data_frame_dropped() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("event: done\ndata:\n\nevent: token\ndata: x\n\n");
        let frames = drain(&mut codec, &mut buf);
        // The dataless `done` never surfaces; only the token frame does.
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, FrameEvent::Token);
    }

    #[test]
    fn test_partial_frame_stays_buffered() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("event: token\ndata: {\"t\":\"He");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"llo\"}\n\nevent: done\ndata: {}\n\n");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, r#"{"t":"Hello"}"#);
        assert_eq!(frames[1].event, FrameEvent::Done);
    }

    #[test]
    fn test_chunking_invariance_byte_by_byte() {
        let wire = "event: token\ndata: {\"t\":\"Hel\"}\n\nevent: token\ndata: {\"t\":\"lo\"}\n\nevent: done\ndata: {}\n\n";
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();
        for byte in wire.as_bytes() {
            buf.extend_from_slice(&[*byte]);
            frames.extend(drain(&mut codec, &mut buf));
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(crate::types::parse_token_delta(&frames[0].data), "Hel");
        assert_eq!(crate::types::parse_token_delta(&frames[1].data), "lo");
        assert!(frames[2].event.is_terminal());
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        // "né" encodes é as two bytes; cut between them.
        let wire = "data: {\"t\":\"n\u{e9}\"}\n\n".as_bytes();
        let cut = wire.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&wire[..cut]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&wire[cut..]);
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(crate::types::parse_token_delta(&frames[0].data), "n\u{e9}");
    }

    #[test]
    fn test_multiple_data_lines_concatenated() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("event: token\ndata: abc\ndata: def\n\n");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames[0].data, "abcdef");
    }

    #[test]
    fn test_crlf_line_endings_tolerated() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("event: token\r\ndata: xyz\r\n\n");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames[0].event, FrameEvent::Token);
        assert_eq!(frames[0].data, "xyz");
    }

    #[test]
    fn test_unterminated_tail_discarded_at_eof() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("event: token\ndata: full\n\ndata: partial");
        assert!(codec.decode_eof(&mut buf).unwrap().is_some());
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.resize(MAX_FRAME_BUFFER_BYTES + 1, b'a');
        assert!(codec.decode(&mut buf).is_err());
    }
}
