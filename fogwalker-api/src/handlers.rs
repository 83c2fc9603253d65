//! API route handlers.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use tracing::{debug, info, instrument};

use fogwalker_core::{ContentEnvelope, ContentVariant, Source};

use crate::dto::*;
use crate::encoder::DeliveryEncoder;
use crate::error::ApiError;
use crate::prompts::PreparedRequest;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

static START_TIME: OnceLock<Instant> = OnceLock::new();

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// GET /content/:variant?stream=<bool>
#[instrument(skip(state, query))]
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(variant): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Response> {
    let variant: ContentVariant = variant.parse()?;
    let request = PreparedRequest::new(variant);

    if query.stream {
        debug!(cache_key = %request.cache_key, "Streaming content, cache bypassed");
        return Ok(stream_response(&state, request));
    }

    let envelope = fetch_buffered(&state, request).await?;
    Ok(Json(envelope).into_response())
}

/// Cache lookup, then a buffered upstream call on miss.
async fn fetch_buffered(state: &AppState, request: PreparedRequest) -> Result<ContentEnvelope> {
    let variant = request.variant;

    if let Some(data) = state.cache.get(&request.cache_key) {
        debug!(%variant, cache_key = %request.cache_key, source = "cache", "Serving cached content");
        return Ok(ContentEnvelope::ok(data, Source::Cache, request.topic));
    }

    let params = variant.generation_params();
    let raw = state.generator.generate(&request.prompt, &params).await?;
    let payload = request.finalize(&raw)?;

    state
        .cache
        .set(&request.cache_key, payload.clone(), variant.ttl());
    info!(%variant, cache_key = %request.cache_key, source = "api", "Generated fresh content");

    Ok(ContentEnvelope::ok(payload, Source::Api, request.topic))
}

fn stream_response(state: &AppState, request: PreparedRequest) -> Response {
    let encoder = DeliveryEncoder::new(state.generator.clone(), state.cache.clone());
    let lines = encoder
        .encode(request)
        .map(|frame| frame.to_line().map(Bytes::from));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

/// GET /content/cache
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(state.cache.stats().into())
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(Instant::now);

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: start.elapsed().as_secs(),
        upstream_configured: state.config.upstream.api_key.is_some()
            && state.config.upstream.base_url.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use fogwalker_core::{ErrorKind, FogwalkerError};
    use serde_json::json;

    use crate::state::ServerConfig;
    use crate::testing::ScriptedGenerator;

    fn state_with(generator: ScriptedGenerator) -> AppState {
        AppState::with_generator(ServerConfig::default(), Arc::new(generator))
    }

    #[tokio::test]
    async fn test_sediment_cache_hit_skips_upstream() {
        let generator = ScriptedGenerator::text("[]");
        let calls = generator.calls();
        let state = state_with(generator);

        let items = json!([{"id": 1, "title": "T", "date": "2024-01-01", "summary": "S", "category": "C"}]);
        let minute_ago = Instant::now()
            .checked_sub(Duration::from_secs(60))
            .unwrap();
        state.cache.set_at(
            "sediment_content",
            items.clone(),
            Duration::from_secs(24 * 60 * 60),
            minute_ago,
        );

        let envelope = fetch_buffered(&state, PreparedRequest::new(ContentVariant::Sediment))
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data, Some(items));
        assert_eq!(envelope.source, Some(Source::Cache));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let generator = ScriptedGenerator::text(r#"{"title":"T","author":"A","content":"C","tag":"t"}"#);
        let calls = generator.calls();
        let state = state_with(generator);

        let first = fetch_buffered(&state, PreparedRequest::new(ContentVariant::Wormhole))
            .await
            .unwrap();
        let second = fetch_buffered(&state, PreparedRequest::new(ContentVariant::Wormhole))
            .await
            .unwrap();

        assert_eq!(first.source, Some(Source::Api));
        assert_eq!(second.source, Some(Source::Cache));
        assert_eq!(first.data, second.data);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_auth_failure_is_classified_and_not_cached() {
        let state = state_with(ScriptedGenerator::failing(FogwalkerError::Unauthorized(
            "invalid key".into(),
        )));

        let err = fetch_buffered(&state, PreparedRequest::new(ContentVariant::Wormhole))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Auth));
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_cached() {
        let state = state_with(ScriptedGenerator::text("{\"not\": \"a list\"}"));

        let err = fetch_buffered(&state, PreparedRequest::new(ContentVariant::Sediment))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Parse));
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_collider_reports_topic() {
        let state = state_with(ScriptedGenerator::text(
            r#"{"left":{"title":"A","content":"x"},"right":{"title":"B","content":"y"}}"#,
        ));

        let envelope = fetch_buffered(&state, PreparedRequest::new(ContentVariant::Collider))
            .await
            .unwrap();

        let topic = envelope.topic.unwrap();
        assert!(crate::COLLIDER_TOPICS.contains(&topic.as_str()));
        assert!(state.cache.get(&format!("collider_content_{topic}")).is_some());
    }
}
