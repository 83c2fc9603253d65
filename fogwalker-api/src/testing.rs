//! Scripted upstream for handler and encoder tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use fogwalker_core::{FogwalkerError, GenerationParams, Result, TextGenerator, TextStream};

/// Replays fixed chunks; counts calls and pulled chunks.
pub(crate) struct ScriptedGenerator {
    chunks: Vec<String>,
    open_error: Mutex<Option<FogwalkerError>>,
    tail_error: Mutex<Option<FogwalkerError>>,
    calls: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub(crate) fn chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            open_error: Mutex::new(None),
            tail_error: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn text(text: &str) -> Self {
        Self::chunks(&[text])
    }

    /// Fails the next call before any output.
    pub(crate) fn failing(err: FogwalkerError) -> Self {
        let generator = Self::chunks(&[]);
        *generator.open_error.lock() = Some(err);
        generator
    }

    /// Fails the next stream after its chunks.
    pub(crate) fn then_fail(self, err: FogwalkerError) -> Self {
        *self.tail_error.lock() = Some(err);
        self
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub(crate) fn pulled(&self) -> Arc<AtomicUsize> {
        self.pulled.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.open_error.lock().take() {
            return Err(err);
        }
        Ok(self.chunks.concat())
    }

    async fn generate_stream(&self, _prompt: &str, _params: &GenerationParams) -> Result<TextStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.open_error.lock().take() {
            return Err(err);
        }

        let pulled = self.pulled.clone();
        let chunks = futures::stream::iter(self.chunks.clone()).map(move |chunk| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(chunk)
        });
        let tail = futures::stream::iter(self.tail_error.lock().take().map(Err));
        Ok(chunks.chain(tail).boxed())
    }
}
