//! Capability registry
//!
//! Starts the media engine's worker and router once per process and keeps the
//! router's RTP capabilities for every connection to read. After the worker
//! dies the registry is poisoned and hands out nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::engine::{MediaEngine, MediaEngineConfig, RouterId, RtpCapabilities, WorkerId};
use crate::error::SignalError;

/// Engine objects created at startup
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub worker_id: WorkerId,
    pub router_id: RouterId,
    pub capabilities: Arc<RtpCapabilities>,
}

/// Process-wide, read-only router capabilities
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    context: OnceCell<EngineContext>,
    poisoned: AtomicBool,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the worker and router
    ///
    /// Runs the engine calls at most once; later calls return the cached
    /// context. A failure leaves the registry uninitialized.
    pub async fn initialize<E: MediaEngine>(
        &self,
        engine: &E,
        config: &MediaEngineConfig,
    ) -> Result<Arc<RtpCapabilities>, SignalError> {
        let context = self
            .context
            .get_or_try_init(|| async {
                let worker_id = engine
                    .create_worker(&config.worker)
                    .await
                    .map_err(|e| SignalError::EngineInit(e.to_string()))?;
                let router = engine
                    .create_router(&worker_id, &config.router.media_codecs)
                    .await
                    .map_err(|e| SignalError::EngineInit(e.to_string()))?;

                tracing::info!(
                    worker = %worker_id,
                    router = %router.id,
                    codecs = router.rtp_capabilities.codecs.len(),
                    min_port = config.worker.rtc_min_port,
                    max_port = config.worker.rtc_max_port,
                    "Media engine started"
                );

                Ok::<_, SignalError>(EngineContext {
                    worker_id,
                    router_id: router.id,
                    capabilities: Arc::new(router.rtp_capabilities),
                })
            })
            .await?;

        Ok(Arc::clone(&context.capabilities))
    }

    /// Router capabilities
    pub fn get(&self) -> Result<Arc<RtpCapabilities>, SignalError> {
        self.context().map(|c| Arc::clone(&c.capabilities))
    }

    /// Worker and router created at startup
    pub fn context(&self) -> Result<&EngineContext, SignalError> {
        if self.is_poisoned() {
            return Err(SignalError::EngineUnavailable);
        }
        self.context
            .get()
            .ok_or_else(|| SignalError::EngineInit("media engine not initialized".into()))
    }

    /// Mark the engine dead
    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }
}
