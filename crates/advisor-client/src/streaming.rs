use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;

use advisor_core::error::AdvisorError;

/// Parse a raw SSE byte stream into individual events.
/// SSE format: `event: <type>\ndata: <json>\n\n`
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    partial: Vec<u8>,
}

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes. A multi-byte character split across chunks is held
    /// back until the rest arrives.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, AdvisorError> {
        self.partial.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(AdvisorError::Stream(format!("invalid UTF-8 in event stream: {}", e))),
        };
        let rest = self.partial.split_off(valid);
        let text = String::from_utf8(std::mem::replace(&mut self.partial, rest))
            .map_err(|e| AdvisorError::Stream(e.to_string()))?;
        Ok(self.feed(&text))
    }

    /// Feed text into the parser and extract complete events.
    ///
    /// CRLF is normalized on the buffered text, so a `\r\n` split across
    /// chunks still counts as one line break.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        let mut events = Vec::new();

        // Split on double newlines (event boundaries)
        while let Some(pos) = self.buffer.find("\n\n") {
            let block = self.buffer[..pos].to_string();
            self.buffer = self.buffer[pos + 2..].to_string();

            let mut event_type = None;
            let mut data_lines = Vec::new();

            for line in block.lines() {
                if let Some(val) = line.strip_prefix("event: ") {
                    event_type = Some(val.to_string());
                } else if let Some(val) = line.strip_prefix("data: ") {
                    data_lines.push(val.to_string());
                } else if let Some(val) = line.strip_prefix("data:") {
                    // data with no space after colon
                    data_lines.push(val.to_string());
                }
            }

            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event_type,
                    data: data_lines.join("\n"),
                });
            }
        }

        events
    }
}

/// A stream of SSE events from raw bytes.
///
/// A transport error or undecodable bytes yield one `Err` item, after which
/// the stream ends.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    done: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, B, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, AdvisorError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Return pending events first
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            // Poll inner stream for more bytes
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.parser.feed_bytes(bytes.as_ref()) {
                    Ok(events) => this.pending.extend(events),
                    Err(e) => {
                        this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(AdvisorError::Transport(e.to_string()))));
                }
                Poll::Ready(None) => this.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};

    #[test]
    fn test_sse_parser_basic() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: flowTraceEvent\ndata: {\"trace\":{}}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("flowTraceEvent"));
        assert_eq!(events[0].data, "{\"trace\":{}}");
    }

    #[test]
    fn test_sse_parser_multiple_events() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: a\ndata: {\"x\":1}\n\nevent: b\ndata: {\"x\":2}\n\n");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_sse_parser_chunked() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: a\ndata: {\"x\":");
        assert_eq!(events.len(), 0);
        let events = parser.feed("1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn test_sse_parser_crlf() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: {\"x\":1}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, None);
    }

    #[test]
    fn test_sse_parser_crlf_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: {\"x\":1}\r\n\r").is_empty());
        let events = parser.feed("\ndata: {\"x\":2}\r\n\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"x\":1}");
        assert_eq!(events[1].data, "{\"x\":2}");
    }

    #[test]
    fn test_sse_parser_crlf_split_inside_line_break() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: a\r").is_empty());
        let events = parser.feed("\ndata: 1\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("a"));
        assert_eq!(events[0].data, "1");
    }

    fn chunks(
        parts: Vec<Result<&'static str, &'static str>>,
    ) -> impl Stream<Item = Result<Bytes, String>> + Unpin {
        stream::iter(
            parts
                .into_iter()
                .map(|p| p.map(|s| Bytes::from_static(s.as_bytes())).map_err(String::from))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_sse_stream_multiple_events_in_one_chunk() {
        let events: Vec<_> = SseStream::new(chunks(vec![Ok(
            "event: a\ndata: 1\n\nevent: b\ndata: 2\n\n",
        )]))
        .collect()
        .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().event_type.as_deref(), Some("a"));
        assert_eq!(events[1].as_ref().unwrap().data, "2");
    }

    #[tokio::test]
    async fn test_sse_stream_events_across_chunks() {
        let events: Vec<_> = SseStream::new(chunks(vec![
            Ok("data: {\"x\":"),
            Ok("1}\r\n\r"),
            Ok("\ndata: 2\r\n\r\n"),
        ]))
        .collect()
        .await;
        let data: Vec<String> = events.into_iter().map(|e| e.unwrap().data).collect();
        assert_eq!(data, vec!["{\"x\":1}", "2"]);
    }

    #[tokio::test]
    async fn test_sse_stream_inner_error_is_terminal_transport_error() {
        let events: Vec<_> = SseStream::new(chunks(vec![
            Ok("data: 1\n\n"),
            Err("connection reset"),
            Ok("data: 2\n\n"),
        ]))
        .collect()
        .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().data, "1");
        match &events[1] {
            Err(e) => {
                assert!(e.is_transport());
                assert!(e.to_string().contains("connection reset"));
            }
            Ok(ev) => panic!("unexpected event {:?}", ev),
        }
    }

    #[tokio::test]
    async fn test_sse_stream_invalid_utf8_ends_stream() {
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(vec![b'd', 0xFF, b'\n', b'\n']),
            Ok(b"data: 2\n\n".to_vec()),
        ];
        let events: Vec<_> = SseStream::new(stream::iter(parts)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(AdvisorError::Stream(_))));
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut parser = SseParser::new();
        let bytes = "data: {\"n\":\"€\"}\n\n".as_bytes();
        // Split inside the three-byte euro sign
        let cut = bytes.iter().position(|&b| b == 0xE2).unwrap() + 1;
        assert!(parser.feed_bytes(&bytes[..cut]).unwrap().is_empty());
        let events = parser.feed_bytes(&bytes[cut..]).unwrap();
        assert_eq!(events[0].data, "{\"n\":\"€\"}");
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let mut parser = SseParser::new();
        assert!(parser.feed_bytes(&[b'd', 0xFF, b'\n']).is_err());
    }
}
