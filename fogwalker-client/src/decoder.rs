//! Streaming delivery decoder.
//!
//! Reassembles newline-delimited [`DeliveryFrame`]s from arbitrary byte
//! ranges, accumulates chunk text, and opportunistically parses the
//! accumulator into a streaming preview for shapes that allow it. The first
//! terminal frame ends the delivery; anything after it is ignored.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fogwalker_core::{
    ContentVariant, DeliveryFrame, ErrorKind, FogwalkerError, PayloadShape, Result,
};

use crate::persisted::PersistedCache;

/// Splits a byte stream into complete lines.
///
/// Bytes are held until a newline arrives, so UTF-8 sequences split across
/// reads decode intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends bytes and returns every line they complete, without newlines.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// What a decoded frame means for the UI.
#[derive(Clone, Debug, PartialEq)]
pub enum DecoderEvent {
    /// A chunk arrived but the accumulator is not a valid payload yet.
    Progress {
        /// Characters accumulated so far
        received: usize,
    },
    /// The accumulator parsed as a valid payload.
    Preview {
        /// Partial payload
        value: Value,
        /// Characters accumulated so far
        received: usize,
    },
    /// Terminal success.
    Done {
        /// Authoritative payload
        data: Value,
        /// Collider topic
        topic: Option<String>,
    },
    /// Terminal failure, as classified by the server.
    Failed {
        /// Classification
        kind: ErrorKind,
        /// Fixed user-facing message
        message: String,
        /// Raw detail
        detail: String,
    },
}

impl DecoderEvent {
    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecoderEvent::Done { .. } | DecoderEvent::Failed { .. })
    }

    fn from_error(err: &FogwalkerError) -> Self {
        let kind = err.kind();
        DecoderEvent::Failed {
            kind,
            message: kind.user_message().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Frame-level decoder state for one delivery.
#[derive(Debug)]
pub struct DeliveryDecoder {
    shape: PayloadShape,
    lines: LineBuffer,
    accumulated: String,
    preview: Option<Value>,
    finished: bool,
}

impl DeliveryDecoder {
    /// Creates a decoder expecting `shape`.
    pub fn new(shape: PayloadShape) -> Self {
        Self {
            shape,
            lines: LineBuffer::default(),
            accumulated: String::new(),
            preview: None,
            finished: false,
        }
    }

    /// Current streaming preview. Always `None` once the delivery finished.
    pub fn preview(&self) -> Option<&Value> {
        self.preview.as_ref()
    }

    /// Raw text received so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Whether a terminal frame has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds raw bytes, returning events for every complete frame.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DecoderEvent> {
        let lines = self.lines.push(bytes);
        lines
            .iter()
            .filter_map(|line| self.apply_line(line))
            .collect()
    }

    /// Flushes a trailing unterminated line and closes the delivery.
    ///
    /// A stream that ends without a terminal frame yields a network failure.
    pub fn finish(&mut self) -> Vec<DecoderEvent> {
        let mut events: Vec<DecoderEvent> = self
            .lines
            .finish()
            .and_then(|line| self.apply_line(&line))
            .into_iter()
            .collect();

        if !self.finished {
            self.finished = true;
            self.preview = None;
            events.push(DecoderEvent::from_error(&FogwalkerError::Network(
                "connection closed before the delivery completed".into(),
            )));
        }
        events
    }

    fn apply_line(&mut self, line: &str) -> Option<DecoderEvent> {
        if line.trim().is_empty() || self.finished {
            return None;
        }
        match DeliveryFrame::from_line(line) {
            Ok(frame) => self.apply(frame),
            Err(e) => {
                debug!(error = %e, "Skipping malformed delivery line");
                None
            }
        }
    }

    /// Applies one frame. Frames after the terminal frame yield nothing.
    pub fn apply(&mut self, frame: DeliveryFrame) -> Option<DecoderEvent> {
        if self.finished {
            return None;
        }

        match frame {
            DeliveryFrame::Chunk { text } => {
                self.accumulated.push_str(&text);
                let received = self.accumulated.chars().count();
                match self.shape.preview(&self.accumulated) {
                    Some(value) => {
                        self.preview = Some(value.clone());
                        Some(DecoderEvent::Preview { value, received })
                    }
                    None => Some(DecoderEvent::Progress { received }),
                }
            }
            DeliveryFrame::Error {
                kind,
                message,
                detail,
            } => {
                self.finished = true;
                self.preview = None;
                Some(DecoderEvent::Failed {
                    kind,
                    message,
                    detail,
                })
            }
            DeliveryFrame::Done { data, topic } => {
                self.finished = true;
                self.preview = None;
                Some(DecoderEvent::Done { data, topic })
            }
        }
    }
}

/// How a consumed delivery ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryOutcome {
    /// Terminal `Done`; the value was written to the persisted cache.
    Done {
        /// Authoritative payload
        data: Value,
        /// Collider topic
        topic: Option<String>,
    },
    /// Terminal failure.
    Failed {
        /// Classification
        kind: ErrorKind,
        /// Fixed user-facing message
        message: String,
        /// Raw detail
        detail: String,
    },
    /// Cancelled before a terminal frame; the byte stream was dropped.
    Cancelled,
}

/// Consumes one delivery for a variant, writing the result through to the
/// persisted cache.
pub struct DeliveryReader {
    variant: ContentVariant,
    cache: PersistedCache,
    cancel: CancellationToken,
}

impl DeliveryReader {
    /// Creates a reader. Cancelling `cancel` aborts the delivery.
    pub fn new(variant: ContentVariant, cache: PersistedCache, cancel: CancellationToken) -> Self {
        Self {
            variant,
            cache,
            cancel,
        }
    }

    /// Drives `stream` to its terminal frame, reporting non-terminal events
    /// to `on_event`.
    ///
    /// Returns as soon as a terminal frame is decoded or the token is
    /// cancelled; either way the stream is dropped, which closes the
    /// underlying connection.
    pub async fn run<S, F>(self, stream: S, mut on_event: F) -> DeliveryOutcome
    where
        S: Stream<Item = Result<Bytes>>,
        F: FnMut(&DecoderEvent),
    {
        futures::pin_mut!(stream);
        let mut decoder = DeliveryDecoder::new(self.variant.shape());

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(&decoder),
                next = stream.next() => next,
            };

            let events = match next {
                Some(Ok(bytes)) => decoder.feed(&bytes),
                Some(Err(err)) => {
                    warn!(variant = %self.variant, error = %err, "Delivery transport failed");
                    vec![DecoderEvent::from_error(&err)]
                }
                None => decoder.finish(),
            };

            for event in events {
                if self.cancel.is_cancelled() {
                    return self.cancelled(&decoder);
                }
                if let Some(outcome) = self.settle(event, &mut on_event) {
                    return outcome;
                }
            }
        }
    }

    fn settle<F: FnMut(&DecoderEvent)>(
        &self,
        event: DecoderEvent,
        on_event: &mut F,
    ) -> Option<DeliveryOutcome> {
        match event {
            DecoderEvent::Done { data, topic } => {
                self.cache.set(self.variant.as_str(), &data, self.variant.ttl());
                info!(variant = %self.variant, "Delivery complete");
                Some(DeliveryOutcome::Done { data, topic })
            }
            DecoderEvent::Failed {
                kind,
                message,
                detail,
            } => {
                warn!(variant = %self.variant, error_type = %kind, %detail, "Delivery failed");
                Some(DeliveryOutcome::Failed {
                    kind,
                    message,
                    detail,
                })
            }
            progress => {
                on_event(&progress);
                None
            }
        }
    }

    fn cancelled(&self, decoder: &DeliveryDecoder) -> DeliveryOutcome {
        debug!(
            variant = %self.variant,
            received = decoder.accumulated().len(),
            "Delivery cancelled"
        );
        DeliveryOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::channel::mpsc;
    use proptest::prelude::*;
    use serde_json::json;

    use crate::storage::MemoryStorage;

    const COLLIDER_CHUNKS: [&str; 3] = [
        r#"{"left":{"titl"#,
        r#"e":"A","content":"x"},"righ"#,
        r#"t":{"title":"B","content":"y"}}"#,
    ];

    fn collider_delivery() -> String {
        let mut body = String::new();
        for chunk in COLLIDER_CHUNKS {
            body.push_str(&DeliveryFrame::chunk(chunk).to_line().unwrap());
        }
        let data = json!({"left": {"title": "A", "content": "x"}, "right": {"title": "B", "content": "y"}});
        body.push_str(&DeliveryFrame::done(data, Some("Globalization vs. localization".into())).to_line().unwrap());
        body
    }

    #[test]
    fn test_line_buffer_keeps_partial_line() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"{\"chunk\":").is_empty());
        assert_eq!(lines.push(b"\"a\"}\n{\"ch"), vec!["{\"chunk\":\"a\"}".to_string()]);
        assert_eq!(lines.finish(), Some("{\"ch".to_string()));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_collider_preview_only_after_final_chunk() {
        let mut decoder = DeliveryDecoder::new(PayloadShape::Opposition);
        let events = decoder.feed(collider_delivery().as_bytes());

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], DecoderEvent::Progress { .. }));
        assert!(matches!(events[1], DecoderEvent::Progress { .. }));
        match &events[2] {
            DecoderEvent::Preview { value, .. } => assert_eq!(value["right"]["title"], "B"),
            other => panic!("expected preview, got {other:?}"),
        }
        match &events[3] {
            DecoderEvent::Done { data, topic } => {
                assert_eq!(data["left"], json!({"title": "A", "content": "x"}));
                assert_eq!(topic.as_deref(), Some("Globalization vs. localization"));
            }
            other => panic!("expected done, got {other:?}"),
        }
        assert!(decoder.preview().is_none());
    }

    #[test]
    fn test_item_list_never_previews() {
        let mut decoder = DeliveryDecoder::new(PayloadShape::ItemList);
        let body = format!(
            "{}{}",
            DeliveryFrame::chunk("[1,").to_line().unwrap(),
            DeliveryFrame::chunk("2]").to_line().unwrap()
        );
        let events = decoder.feed(body.as_bytes());
        assert_eq!(
            events,
            vec![
                DecoderEvent::Progress { received: 3 },
                DecoderEvent::Progress { received: 5 }
            ]
        );
        assert!(decoder.preview().is_none());
    }

    #[test]
    fn test_frames_after_terminal_are_ignored() {
        let mut decoder = DeliveryDecoder::new(PayloadShape::Prose);
        let body = concat!(
            "{\"chunk\":\"hello\"}\n",
            "{\"error\":\"timeout\",\"message\":\"m\",\"errorMessage\":\"d\"}\n",
            "{\"chunk\":\"late\"}\n",
            "{\"done\":true,\"data\":{\"content\":\"late\"}}\n"
        );
        let events = decoder.feed(body.as_bytes());

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DecoderEvent::Preview { .. }));
        assert!(matches!(
            events[1],
            DecoderEvent::Failed { kind: ErrorKind::Timeout, .. }
        ));
        assert_eq!(decoder.accumulated(), "hello");
        assert!(decoder.preview().is_none());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_stream_without_terminal_frame_fails() {
        let mut decoder = DeliveryDecoder::new(PayloadShape::Article);
        decoder.feed(b"{\"chunk\":\"{\"}\n");
        let events = decoder.finish();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            DecoderEvent::Failed { kind: ErrorKind::Network, .. }
        ));
    }

    #[test]
    fn test_unterminated_final_line_is_decoded() {
        let mut decoder = DeliveryDecoder::new(PayloadShape::ItemList);
        decoder.feed(b"{\"done\":true,\"data\":[]}");
        let events = decoder.finish();
        assert_eq!(events, vec![DecoderEvent::Done { data: json!([]), topic: None }]);
    }

    #[tokio::test]
    async fn test_reader_writes_through_on_done() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = PersistedCache::new(storage);
        let reader = DeliveryReader::new(ContentVariant::Collider, cache.clone(), CancellationToken::new());

        let body = collider_delivery();
        let parts: Vec<Result<Bytes>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let mut previews = 0;
        let outcome = reader
            .run(futures::stream::iter(parts), |event| {
                if matches!(event, DecoderEvent::Preview { .. }) {
                    previews += 1;
                }
            })
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Done { .. }));
        assert_eq!(previews, 1);
        assert_eq!(
            cache.get::<Value>("collider").unwrap()["right"]["content"],
            "y"
        );
    }

    #[tokio::test]
    async fn test_reader_failure_does_not_write_cache() {
        let cache = PersistedCache::new(Arc::new(MemoryStorage::new()));
        let reader = DeliveryReader::new(ContentVariant::Wormhole, cache.clone(), CancellationToken::new());
        let line = DeliveryFrame::failure(&FogwalkerError::Unauthorized("bad key".into()))
            .to_line()
            .unwrap();

        let outcome = reader
            .run(futures::stream::iter(vec![Ok(Bytes::from(line))]), |_| {})
            .await;

        match outcome {
            DeliveryOutcome::Failed { kind, message, .. } => {
                assert_eq!(kind, ErrorKind::Auth);
                assert_eq!(message, ErrorKind::Auth.user_message());
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(cache.get::<Value>("wormhole"), None);
    }

    #[tokio::test]
    async fn test_cancellation_drops_stream() {
        let (tx, rx) = mpsc::unbounded::<Result<Bytes>>();
        let cancel = CancellationToken::new();
        let cache = PersistedCache::new(Arc::new(MemoryStorage::new()));
        let reader = DeliveryReader::new(ContentVariant::Labelless, cache.clone(), cancel.clone());

        tx.unbounded_send(Ok(Bytes::from_static(b"{\"chunk\":\"partial\"}\n")))
            .unwrap();

        let (seen_tx, mut seen_rx) = mpsc::unbounded::<DecoderEvent>();
        let task = tokio::spawn(reader.run(rx, move |event| {
            let _ = seen_tx.unbounded_send(event.clone());
        }));

        let first = seen_rx.next().await.unwrap();
        assert!(matches!(first, DecoderEvent::Preview { .. }));

        cancel.cancel();
        let outcome = task.await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Cancelled);
        assert!(tx.is_closed());
        assert!(tx
            .unbounded_send(Ok(Bytes::from_static(b"{\"done\":true,\"data\":{}}\n")))
            .is_err());
        assert_eq!(cache.get::<Value>("labelless"), None);
    }

    proptest! {
        #[test]
        fn prop_chunk_boundaries_do_not_matter(cuts in proptest::collection::vec(0usize..400, 0..12)) {
            let body = collider_delivery();
            let bytes = body.as_bytes();

            let mut whole = DeliveryDecoder::new(PayloadShape::Opposition);
            let expected = whole.feed(bytes);

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            cuts.sort_unstable();
            cuts.dedup();

            let mut split = DeliveryDecoder::new(PayloadShape::Opposition);
            let mut events = Vec::new();
            let mut start = 0;
            for cut in cuts.into_iter().chain(std::iter::once(bytes.len())) {
                events.extend(split.feed(&bytes[start..cut]));
                start = cut;
            }

            prop_assert_eq!(events, expected);
        }
    }
}
