//! Exclusive, readiness-aware access to the vision backend.

use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::VisionBackend;
use falldetect_core::{Error, Result};

/// Guards the single backend instance.
///
/// The gate starts empty (not ready) and becomes ready exactly once, when a
/// warmed-up backend is installed. From then on `with_resource` hands out
/// `&mut` access to one caller at a time. Waiters are not served in any
/// particular order.
pub struct ResourceGate {
    slot: OnceLock<Mutex<Box<dyn VisionBackend>>>,
}

impl ResourceGate {
    /// Create an empty gate; `is_ready` stays false until `install`.
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Create a gate that is ready immediately.
    pub fn with_backend(backend: Box<dyn VisionBackend>) -> Self {
        let gate = Self::new();
        // A fresh OnceLock cannot already be set.
        let _ = gate.slot.set(Mutex::new(backend));
        gate
    }

    /// Install the backend once it has finished initializing.
    pub fn install(&self, backend: Box<dyn VisionBackend>) -> Result<()> {
        let name = backend.name().to_string();
        self.slot
            .set(Mutex::new(backend))
            .map_err(|_| Error::Internal("vision backend already installed".to_string()))?;
        info!("Vision backend '{}' ready", name);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Run `f` with exclusive access to the backend.
    ///
    /// Fails immediately with `ResourceNotReady` if no backend is installed;
    /// otherwise blocks until the backend is free. The lock is released when
    /// `f` returns, errors, or unwinds.
    pub fn with_resource<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn VisionBackend) -> Result<T>,
    {
        let slot = self
            .slot
            .get()
            .ok_or_else(|| Error::ResourceNotReady("service warming up".to_string()))?;

        let wait_start = Instant::now();
        let mut backend = slot.lock();
        debug!("Gate acquired after {}ms", wait_start.elapsed().as_millis());

        f(&mut **backend)
    }
}

impl Default for ResourceGate {
    fn default() -> Self {
        Self::new()
    }
}
