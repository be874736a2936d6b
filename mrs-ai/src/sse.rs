//! Server-sent event framing for provider streams
//!
//! Bytes are buffered until a blank line closes an event, so events and
//! multi-byte characters split across network chunks come out whole.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// Feed raw bytes and return every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::default();
        let events = parser.push(b"event: delta\ndata: {\"a\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("delta"));
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"data: hel").is_empty());
        let events = parser.push(b"lo\r\n\r\ndata: next\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[1].data, "next");
    }

    #[test]
    fn test_split_multibyte_char() {
        let mut parser = SseParser::default();
        let bytes = "data: café\n\n".as_bytes();
        let cut = bytes.len() - 3;
        assert!(parser.push(&bytes[..cut]).is_empty());
        let events = parser.push(&bytes[cut..]);
        assert_eq!(events[0].data, "café");
    }

    #[test]
    fn test_comments_and_empty_frames_skipped() {
        let mut parser = SseParser::default();
        let events = parser.push(b": ping\n\nevent: x\n\ndata: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }
}
