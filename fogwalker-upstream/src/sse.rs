//! Server-sent-event parsing for streamed chat completions.
//!
//! Each event line looks like `data: {json}`; `data: [DONE]` ends the stream.
//! Bytes are buffered until a full line is available so multi-byte characters
//! split across network reads survive intact.

use serde_json::Value;

#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    /// A content delta.
    Delta(String),
    /// Upstream reported an error inside the stream.
    Error(String),
    /// `[DONE]` sentinel.
    Done,
}

#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feeds bytes, returning every event completed by them.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }

    /// Parses a trailing line left without its newline when the body ended.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_line(String::from_utf8_lossy(&rest).trim())
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable SSE data line");
            return None;
        }
    };

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Some(SseEvent::Error(message));
    }

    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| SseEvent::Delta(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_parses_deltas_and_done() {
        let mut sse = SseDecoder::default();
        let body = format!("{}{}data: [DONE]\n\n", delta("Hel"), delta("lo"));
        let events = sse.push(body.as_bytes());
        assert_eq!(
            events,
            vec![
                SseEvent::Delta("Hel".into()),
                SseEvent::Delta("lo".into()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut sse = SseDecoder::default();
        let body = delta("雾");
        let bytes = body.as_bytes();
        let mid = body.find('雾').unwrap() + 1;
        assert!(sse.push(&bytes[..mid]).is_empty());
        assert_eq!(sse.push(&bytes[mid..]), vec![SseEvent::Delta("雾".into())]);
    }

    #[test]
    fn test_ignores_role_only_and_comment_lines() {
        let mut sse = SseDecoder::default();
        let body = ": keep-alive\n\ndata: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n";
        assert!(sse.push(body.as_bytes()).is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut sse = SseDecoder::default();
        let body = delta("tail");
        let unterminated = body.trim_end();
        assert!(sse.push(unterminated.as_bytes()).is_empty());
        assert_eq!(sse.finish(), Some(SseEvent::Delta("tail".into())));
        assert_eq!(sse.finish(), None);
    }

    #[test]
    fn test_error_payload() {
        let mut sse = SseDecoder::default();
        let events = sse.push(b"data: {\"error\":{\"message\":\"overloaded\"}}\n");
        assert_eq!(events, vec![SseEvent::Error("overloaded".into())]);
    }
}
