//! Minimal server-sent-event line parser for the control-plane event
//! stream. SSE frames are `field: value` lines separated by blank lines;
//! we only care about `event:` and `data:`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incrementally feeds raw bytes (as they arrive from a streaming HTTP
/// body) and yields complete events as they're delimited by a blank line.
#[derive(Default)]
pub struct SseDecoder {
    buffer: String,
    pending_event: Option<String>,
    pending_data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes and drain any events it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=pos);

            if line.is_empty() {
                if !self.pending_data.is_empty() || self.pending_event.is_some() {
                    events.push(SseEvent { event: self.pending_event.take(), data: self.pending_data.join("\n") });
                    self.pending_data.clear();
                }
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                self.pending_event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.pending_data.push(value.trim().to_string());
            }
            // Comment lines (":") and unknown fields are ignored.
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: contract_updated\ndata: {\"tenant_id\":\"acme\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("contract_updated"));
        assert_eq!(events[0].data, "{\"tenant_id\":\"acme\"}");
    }

    #[test]
    fn handles_partial_chunks_split_mid_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: pi").is_empty());
        let events = decoder.push(b"ng\ndata: {}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("ping"));
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: contract_updated\ndata: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn data_only_event_has_no_event_name() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: hello\n\n");
        assert_eq!(events[0].event, None);
        assert_eq!(events[0].data, "hello");
    }
}
