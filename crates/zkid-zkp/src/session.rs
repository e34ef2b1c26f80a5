//! Scoped ownership of decoded curve material.
//!
//! A [`CurveSession`] holds the decoded proving or verifying key for one
//! `generate`/`verify` call. Dropping it releases the material and
//! decrements the owning [`SessionTracker`], on every exit path.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::circuits::CircuitId;

/// Counts live sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    live: Arc<AtomicUsize>,
}

impl SessionTracker {
    /// New tracker with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions acquired and not yet dropped.
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Take ownership of `material` for the duration of one call.
    pub fn acquire<T>(&self, circuit: CircuitId, material: T) -> CurveSession<T> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(circuit = %circuit, live, "curve session acquired");
        CurveSession {
            material,
            circuit,
            live: Arc::clone(&self.live),
        }
    }
}

/// Curve material scoped to one prover call.
pub struct CurveSession<T> {
    material: T,
    circuit: CircuitId,
    live: Arc<AtomicUsize>,
}

impl<T> CurveSession<T> {
    /// Circuit the material belongs to.
    pub fn circuit(&self) -> CircuitId {
        self.circuit
    }
}

impl<T> Deref for CurveSession<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.material
    }
}

impl<T> Drop for CurveSession<T> {
    fn drop(&mut self) {
        let live = self.live.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        debug!(circuit = %self.circuit, live, "curve session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(tracker: &SessionTracker) -> Result<(), String> {
        let session = tracker.acquire(CircuitId::AuthV2, vec![1u8, 2, 3]);
        if session.len() == 3 {
            return Err("early exit".into());
        }
        Ok(())
    }

    #[test]
    fn released_on_error_path() {
        let tracker = SessionTracker::new();
        assert!(failing(&tracker).is_err());
        assert_eq!(tracker.live_sessions(), 0);
    }

    #[test]
    fn counts_nested_sessions() {
        let tracker = SessionTracker::new();
        let a = tracker.acquire(CircuitId::AuthV2, ());
        let b = tracker.clone().acquire(CircuitId::LinkedNullifier, ());
        assert_eq!(tracker.live_sessions(), 2);
        assert_eq!(b.circuit(), CircuitId::LinkedNullifier);
        drop(a);
        assert_eq!(tracker.live_sessions(), 1);
        drop(b);
        assert_eq!(tracker.live_sessions(), 0);
    }
}
