//! Streaming delivery encoder.
//!
//! Turns an upstream text stream into delivery frames: one `Chunk` per
//! upstream fragment, forwarded as soon as it arrives, then exactly one
//! terminal frame. The accumulated text is parsed only once the upstream
//! completes; a valid payload is written to the shared cache before `Done`
//! is emitted.
//!
//! The returned stream owns the upstream stream. When the HTTP client goes
//! away, axum drops the response body, which drops both, which closes the
//! upstream connection. Nothing keeps running in the background.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use fogwalker_cache::TtlCache;
use fogwalker_core::{ContentVariant, DeliveryFrame, TextGenerator};

use crate::prompts::PreparedRequest;

/// Encodes one upstream generation as a delivery frame stream.
#[derive(Clone)]
pub struct DeliveryEncoder {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<TtlCache<Value>>,
}

impl DeliveryEncoder {
    /// Creates an encoder writing successful payloads into `cache`.
    pub fn new(generator: Arc<dyn TextGenerator>, cache: Arc<TtlCache<Value>>) -> Self {
        Self { generator, cache }
    }

    /// Runs one delivery. The stream ends right after its terminal frame.
    pub fn encode(self, request: PreparedRequest) -> impl Stream<Item = DeliveryFrame> + Send + 'static {
        let Self { generator, cache } = self;

        async_stream::stream! {
            let mut guard = DeliveryGuard::new(request.variant);
            let params = request.variant.generation_params();

            let mut upstream = match generator.generate_stream(&request.prompt, &params).await {
                Ok(upstream) => upstream,
                Err(err) => {
                    warn!(variant = %request.variant, error = %err, "Upstream stream failed to open");
                    guard.finish();
                    yield DeliveryFrame::failure(&err);
                    return;
                }
            };

            let mut accumulated = String::new();
            while let Some(next) = upstream.next().await {
                match next {
                    Ok(text) => {
                        accumulated.push_str(&text);
                        guard.chunks += 1;
                        yield DeliveryFrame::chunk(text);
                    }
                    Err(err) => {
                        warn!(
                            variant = %request.variant,
                            chunks = guard.chunks,
                            error = %err,
                            "Upstream stream failed mid-delivery"
                        );
                        guard.finish();
                        yield DeliveryFrame::failure(&err);
                        return;
                    }
                }
            }
            drop(upstream);

            let terminal = match request.finalize(&accumulated) {
                Ok(payload) => {
                    cache.set(&request.cache_key, payload.clone(), request.variant.ttl());
                    info!(
                        variant = %request.variant,
                        cache_key = %request.cache_key,
                        chunks = guard.chunks,
                        "Streamed delivery complete"
                    );
                    DeliveryFrame::done(payload, request.topic.clone())
                }
                Err(err) => {
                    warn!(
                        variant = %request.variant,
                        chunks = guard.chunks,
                        error = %err,
                        "Streamed payload failed validation"
                    );
                    DeliveryFrame::failure(&err)
                }
            };
            guard.finish();
            yield terminal;
        }
    }
}

/// Logs deliveries dropped before their terminal frame.
struct DeliveryGuard {
    variant: ContentVariant,
    chunks: usize,
    finished: bool,
}

impl DeliveryGuard {
    fn new(variant: ContentVariant) -> Self {
        Self {
            variant,
            chunks: 0,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                variant = %self.variant,
                chunks = self.chunks,
                "Client abandoned delivery; upstream stream dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use fogwalker_core::{ErrorKind, FogwalkerError};
    use serde_json::json;

    const COLLIDER_CHUNKS: [&str; 3] = [
        r#"{"left":{"titl"#,
        r#"e":"A","content":"x"},"righ"#,
        r#"t":{"title":"B","content":"y"}}"#,
    ];

    fn encoder(generator: ScriptedGenerator) -> (DeliveryEncoder, Arc<TtlCache<Value>>) {
        let cache = Arc::new(TtlCache::new());
        (DeliveryEncoder::new(Arc::new(generator), cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_collider_stream_success() {
        let (encoder, cache) = encoder(ScriptedGenerator::chunks(&COLLIDER_CHUNKS));
        let request = PreparedRequest::new(ContentVariant::Collider);
        let key = request.cache_key.clone();
        let topic = request.topic.clone();

        let frames: Vec<DeliveryFrame> = encoder.encode(request).collect().await;

        assert_eq!(frames.len(), 4);
        for (frame, expected) in frames.iter().zip(COLLIDER_CHUNKS) {
            assert_eq!(frame, &DeliveryFrame::chunk(expected));
        }
        let expected = json!({"left": {"title": "A", "content": "x"}, "right": {"title": "B", "content": "y"}});
        assert_eq!(frames[3], DeliveryFrame::done(expected.clone(), topic));
        assert_eq!(cache.get(&key), Some(expected));
    }

    #[tokio::test]
    async fn test_open_failure_emits_single_error() {
        let (encoder, cache) = encoder(ScriptedGenerator::failing(FogwalkerError::Unauthorized(
            "invalid key".into(),
        )));

        let frames: Vec<DeliveryFrame> = encoder
            .encode(PreparedRequest::new(ContentVariant::Wormhole))
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        match &frames[0] {
            DeliveryFrame::Error { kind, message, .. } => {
                assert_eq!(*kind, ErrorKind::Auth);
                assert_eq!(message, ErrorKind::Auth.user_message());
            }
            other => panic!("expected error frame, got {other:?}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_payload_is_parse_error_without_cache_write() {
        let (encoder, cache) = encoder(ScriptedGenerator::chunks(&["[1,", "2]"]));

        let frames: Vec<DeliveryFrame> = encoder
            .encode(PreparedRequest::new(ContentVariant::Collider))
            .collect()
            .await;

        assert_eq!(frames.len(), 3);
        assert!(matches!(
            frames[2],
            DeliveryFrame::Error { kind: ErrorKind::Parse, .. }
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_terminal() {
        let generator = ScriptedGenerator::chunks(&["{\"title\":"])
            .then_fail(FogwalkerError::Network("connection reset".into()));
        let (encoder, cache) = encoder(generator);

        let frames: Vec<DeliveryFrame> = encoder
            .encode(PreparedRequest::new(ContentVariant::Wormhole))
            .collect()
            .await;

        assert_eq!(frames.len(), 2);
        assert!(!frames[0].is_terminal());
        assert!(matches!(
            frames[1],
            DeliveryFrame::Error { kind: ErrorKind::Network, .. }
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_fenced_output_is_stripped() {
        let (encoder, cache) = encoder(ScriptedGenerator::chunks(&["```json\n", "[{\"id\":1}]", "\n```"]));

        let frames: Vec<DeliveryFrame> = encoder
            .encode(PreparedRequest::new(ContentVariant::Sediment))
            .collect()
            .await;

        assert_eq!(frames.last(), Some(&DeliveryFrame::done(json!([{"id": 1}]), None)));
        assert_eq!(cache.get("sediment_content"), Some(json!([{"id": 1}])));
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_consuming_upstream() {
        let generator = ScriptedGenerator::chunks(&["a", "b", "c", "d"]);
        let pulled = generator.pulled();
        let (encoder, cache) = encoder(generator);

        let mut frames = Box::pin(encoder.encode(PreparedRequest::new(ContentVariant::Labelless)));
        assert_eq!(frames.next().await, Some(DeliveryFrame::chunk("a")));
        drop(frames);

        assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }
}
