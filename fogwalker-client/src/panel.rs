//! Per-variant content panel.
//!
//! A panel decides between the persisted value and a live delivery, and
//! publishes what should be on screen through a [`watch`] channel:
//!
//! ```text
//! Idle ─mount─┬─ hit ──> Done(from_cache) ─revalidate─> Done
//!             └─ miss ─> Loading ─> Streaming ─┬─> Done
//!                                              └─> Error
//! ```
//!
//! A refresh with a value on screen keeps it visible, flagged `updating`,
//! until the new delivery supersedes it.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fogwalker_core::{ContentVariant, ErrorKind};

use crate::decoder::{DecoderEvent, DeliveryOutcome, DeliveryReader};
use crate::persisted::PersistedCache;
use crate::source::ContentSource;

/// What a panel shows.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelState {
    /// Not mounted yet.
    Idle,
    /// Delivery opened, nothing received.
    Loading,
    /// Delivery in progress.
    Streaming {
        /// Latest valid partial payload, if any
        preview: Option<Value>,
        /// Characters received so far
        received: usize,
    },
    /// A complete value.
    Done {
        value: Value,
        /// Served from the persisted cache without a fresh delivery
        from_cache: bool,
        /// A refresh is in flight behind this value
        updating: bool,
        /// Collider topic, when known
        topic: Option<String>,
    },
    /// The last delivery failed.
    Error {
        kind: ErrorKind,
        /// Fixed user-facing message
        message: String,
        /// Value that was on screen when a refresh failed
        stale: Option<Value>,
    },
}

impl PanelState {
    /// The complete value on screen, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            PanelState::Done { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The value the user is looking at: a complete value, or the stale one
    /// kept beside a failed refresh.
    pub fn shown(&self) -> Option<&Value> {
        match self {
            PanelState::Done { value, .. } => Some(value),
            PanelState::Error { stale, .. } => stale.as_ref(),
            _ => None,
        }
    }

    /// Whether a delivery or refresh is running.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PanelState::Loading
                | PanelState::Streaming { .. }
                | PanelState::Done { updating: true, .. }
        )
    }
}

/// Content panel for one variant.
pub struct ContentPanel {
    variant: ContentVariant,
    source: Arc<dyn ContentSource>,
    cache: PersistedCache,
    state: watch::Sender<PanelState>,
    inflight: Mutex<Option<CancellationToken>>,
}

impl ContentPanel {
    pub fn new(variant: ContentVariant, source: Arc<dyn ContentSource>, cache: PersistedCache) -> Self {
        let (state, _) = watch::channel(PanelState::Idle);
        Self {
            variant,
            source,
            cache,
            state,
            inflight: Mutex::new(None),
        }
    }

    pub fn variant(&self) -> ContentVariant {
        self.variant
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PanelState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PanelState {
        self.state.borrow().clone()
    }

    /// Shows persisted content and revalidates it, or streams a fresh value.
    ///
    /// Resolves once the revalidation or delivery has settled.
    pub async fn mount(&self) {
        let token = self.begin();

        match self.cache.get::<Value>(self.variant.as_str()) {
            Some(value) => {
                debug!(variant = %self.variant, source = "cache", "Rendering persisted content");
                self.state.send_replace(PanelState::Done {
                    value,
                    from_cache: true,
                    updating: false,
                    topic: None,
                });
                self.revalidate(&token).await;
            }
            None => {
                self.state.send_replace(PanelState::Loading);
                self.deliver(&token, None).await;
            }
        }
    }

    /// Streams a fresh value, superseding any delivery in flight.
    pub async fn refresh(&self) {
        let token = self.begin();
        let current = self.state.borrow().shown().cloned();

        match &current {
            Some(value) => self.state.send_modify(|state| match state {
                PanelState::Done { updating, .. } => *updating = true,
                other => {
                    *other = PanelState::Done {
                        value: value.clone(),
                        from_cache: false,
                        updating: true,
                        topic: None,
                    }
                }
            }),
            None => {
                self.state.send_replace(PanelState::Loading);
            }
        }

        self.deliver(&token, current).await;
    }

    /// Aborts whatever is in flight.
    pub fn unmount(&self) {
        if let Some(token) = self.inflight.lock().take() {
            debug!(variant = %self.variant, "Panel unmounted");
            token.cancel();
        }
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.inflight.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    async fn revalidate(&self, token: &CancellationToken) {
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            fetched = self.source.fetch(self.variant) => fetched,
        };

        match fetched {
            Ok(envelope) if envelope.success => {
                let Some(value) = envelope.data else {
                    debug!(variant = %self.variant, "Revalidation returned no data");
                    return;
                };
                self.cache.set(self.variant.as_str(), &value, self.variant.ttl());
                if token.is_cancelled() {
                    return;
                }
                self.state.send_replace(PanelState::Done {
                    value,
                    from_cache: false,
                    updating: false,
                    topic: envelope.topic,
                });
                debug!(variant = %self.variant, "Revalidated persisted content");
            }
            Ok(envelope) => {
                debug!(
                    variant = %self.variant,
                    error_type = ?envelope.error_type,
                    "Background revalidation failed"
                );
            }
            Err(e) => {
                debug!(variant = %self.variant, error = %e, "Background revalidation failed");
            }
        }
    }

    /// Runs one streaming delivery. With `stale` set, progress is not shown
    /// and the stale value stays on screen until the outcome.
    async fn deliver(&self, token: &CancellationToken, stale: Option<Value>) {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            opened = self.source.open_stream(self.variant) => opened,
        };

        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                let kind = e.kind();
                info!(variant = %self.variant, error_type = %kind, error = %e, "Could not open delivery");
                self.state.send_replace(PanelState::Error {
                    kind,
                    message: kind.user_message().to_string(),
                    stale,
                });
                return;
            }
        };

        let quiet = stale.is_some();
        let reader = DeliveryReader::new(self.variant, self.cache.clone(), token.clone());
        let outcome = reader
            .run(stream, |event| {
                if quiet || token.is_cancelled() {
                    return;
                }
                self.show_progress(event);
            })
            .await;

        if token.is_cancelled() {
            return;
        }
        match outcome {
            DeliveryOutcome::Done { data, topic } => {
                self.state.send_replace(PanelState::Done {
                    value: data,
                    from_cache: false,
                    updating: false,
                    topic,
                });
            }
            DeliveryOutcome::Failed { kind, message, .. } => {
                self.state.send_replace(PanelState::Error {
                    kind,
                    message,
                    stale,
                });
            }
            DeliveryOutcome::Cancelled => {}
        }
    }

    fn show_progress(&self, event: &DecoderEvent) {
        match event {
            DecoderEvent::Preview { value, received } => {
                self.state.send_replace(PanelState::Streaming {
                    preview: Some(value.clone()),
                    received: *received,
                });
            }
            DecoderEvent::Progress { received } => {
                self.state.send_modify(|state| match state {
                    PanelState::Streaming { received: seen, .. } => *seen = *received,
                    other => {
                        *other = PanelState::Streaming {
                            preview: None,
                            received: *received,
                        }
                    }
                });
            }
            DecoderEvent::Done { .. } | DecoderEvent::Failed { .. } => {}
        }
    }
}

impl Drop for ContentPanel {
    fn drop(&mut self) {
        if let Some(token) = self.inflight.get_mut().take() {
            token.cancel();
        }
    }
}
