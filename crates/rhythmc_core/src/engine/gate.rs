//! One-time engine initialisation shared across jobs.

use tokio::sync::watch;

use super::types::{EngineError, EngineResult};
use super::AudioEngine;

/// Engine readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    Initializing,
    Ready,
    /// The last load failed; the next caller retries.
    Failed(String),
}

/// Ensures [`AudioEngine::load`] runs at most once at a time.
///
/// The first caller performs the load. Callers arriving while it is in
/// flight wait for its outcome instead of starting their own.
#[derive(Debug)]
pub struct EngineGate {
    state: watch::Sender<GateState>,
}

impl EngineGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Uninitialized);
        Self { state }
    }

    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == GateState::Ready
    }

    /// Load the engine unless it is already loaded or loading.
    pub async fn ensure_ready(&self, engine: &dyn AudioEngine) -> EngineResult<()> {
        loop {
            if self.try_claim() {
                let mut guard = ClaimGuard {
                    state: &self.state,
                    settled: false,
                };
                let result = engine.load().await;
                let next = match &result {
                    Ok(()) => GateState::Ready,
                    Err(e) => GateState::Failed(e.to_string()),
                };
                guard.settle(next);
                return result;
            }

            let mut rx = self.state.subscribe();
            let outcome = rx
                .wait_for(|s| *s != GateState::Initializing)
                .await
                .map(|s| (*s).clone())
                .map_err(|_| EngineError::LoadFailed("engine gate closed".to_string()))?;

            match outcome {
                GateState::Ready => return Ok(()),
                GateState::Failed(message) => return Err(EngineError::LoadFailed(message)),
                // The loader was cancelled; try to claim it ourselves.
                GateState::Uninitialized | GateState::Initializing => continue,
            }
        }
    }

    /// Move to `Initializing` if nobody holds the load.
    fn try_claim(&self) -> bool {
        let mut claimed = false;
        self.state.send_if_modified(|state| match state {
            GateState::Uninitialized | GateState::Failed(_) => {
                *state = GateState::Initializing;
                claimed = true;
                true
            }
            GateState::Initializing | GateState::Ready => false,
        });
        claimed
    }
}

impl Default for EngineGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets the gate if the loading future is dropped before it settles.
struct ClaimGuard<'a> {
    state: &'a watch::Sender<GateState>,
    settled: bool,
}

impl ClaimGuard<'_> {
    fn settle(&mut self, next: GateState) {
        self.settled = true;
        self.state.send_replace(next);
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.send_replace(GateState::Uninitialized);
        }
    }
}
