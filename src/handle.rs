//! Route handles: stored weights plus the structure they were built for.
//!
//! A handle moves through `Building → Ready → Released`. Applying weights
//! takes a shared lock, so any number of threads may apply the same handle
//! at once; releasing takes the exclusive lock and waits for them.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

use crate::discretization::Signature;
use crate::error::{RegridError, Result};
use crate::field::Field;
use crate::options::{RegridOptions, ZeroRegion};
use crate::weights::SparseWeightMatrix;

/// Handles known to a manager, by id
pub(crate) type Registry = Mutex<HashMap<Uuid, Weak<HandleInner>>>;

/// Lifecycle state of a route handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Weights are being computed
    Building,
    /// Weights are available for apply
    Ready,
    /// Weights have been freed
    Released,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleState::Building => write!(f, "building"),
            HandleState::Ready => write!(f, "ready"),
            HandleState::Released => write!(f, "released"),
        }
    }
}

enum Slot {
    Building,
    Ready(Arc<SparseWeightMatrix>),
    Released,
}

impl Slot {
    fn state(&self) -> HandleState {
        match self {
            Slot::Building => HandleState::Building,
            Slot::Ready(_) => HandleState::Ready,
            Slot::Released => HandleState::Released,
        }
    }
}

pub(crate) struct HandleInner {
    id: Uuid,
    created_at: DateTime<Utc>,
    options: RegridOptions,
    src_signature: Signature,
    dst_signature: Signature,
    slot: RwLock<Slot>,
    registry: Weak<Registry>,
}

impl HandleInner {
    fn release(&self) -> bool {
        let mut slot = self.slot.write();
        if matches!(*slot, Slot::Released) {
            return false;
        }
        *slot = Slot::Released;
        drop(slot);

        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.id);
        }
        debug!(handle = %self.id, "Route handle released");
        true
    }
}

/// Opaque reference to stored regrid weights.
///
/// Dropping a handle releases its weights.
pub struct RouteHandle {
    inner: Arc<HandleInner>,
}

impl RouteHandle {
    /// Create a handle in the `Building` state and register it
    pub(crate) fn building(
        options: RegridOptions,
        src_signature: Signature,
        dst_signature: Signature,
        registry: &Arc<Registry>,
    ) -> Self {
        let inner = Arc::new(HandleInner {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            options,
            src_signature,
            dst_signature,
            slot: RwLock::new(Slot::Building),
            registry: Arc::downgrade(registry),
        });
        registry.lock().insert(inner.id, Arc::downgrade(&inner));
        Self { inner }
    }

    /// Move from `Building` to `Ready`
    pub(crate) fn finish(&self, matrix: SparseWeightMatrix) -> Result<()> {
        let mut slot = self.inner.slot.write();
        if !matches!(*slot, Slot::Building) {
            return Err(self.state_error(slot.state(), "weights can only be stored once"));
        }
        *slot = Slot::Ready(Arc::new(matrix));
        Ok(())
    }

    fn state_error(&self, state: HandleState, message: &str) -> RegridError {
        RegridError::HandleState {
            handle: self.inner.id.to_string(),
            state: state.to_string(),
            message: message.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Options the weights were generated with
    pub fn options(&self) -> &RegridOptions {
        &self.inner.options
    }

    pub fn src_signature(&self) -> &Signature {
        &self.inner.src_signature
    }

    pub fn dst_signature(&self) -> &Signature {
        &self.inner.dst_signature
    }

    pub fn state(&self) -> HandleState {
        self.inner.slot.read().state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HandleState::Ready
    }

    /// Shared reference to the stored weights, while ready
    pub fn matrix(&self) -> Option<Arc<SparseWeightMatrix>> {
        match &*self.inner.slot.read() {
            Slot::Ready(matrix) => Some(Arc::clone(matrix)),
            _ => None,
        }
    }

    /// Apply the stored weights: `dst = Σ w · src` over the weight support,
    /// after zeroing `zero_region` of `dst`.
    ///
    /// Both fields must match the structure the weights were stored for;
    /// mismatches are reported before `dst` is touched.
    pub fn apply(&self, src: &Field, dst: &mut Field, zero_region: ZeroRegion) -> Result<()> {
        let slot = self.inner.slot.read();
        let matrix = match &*slot {
            Slot::Ready(matrix) => matrix,
            other => return Err(self.state_error(other.state(), "cannot apply weights")),
        };

        let src_signature = src.signature();
        if src_signature != self.inner.src_signature {
            return Err(RegridError::incompatible(format!(
                "Source field {} is {} but the weights were stored for {}",
                src.name(),
                src_signature,
                self.inner.src_signature
            )));
        }
        let dst_signature = dst.signature();
        if dst_signature != self.inner.dst_signature {
            return Err(RegridError::incompatible(format!(
                "Destination field {} is {} but the weights were stored for {}",
                dst.name(),
                dst_signature,
                self.inner.dst_signature
            )));
        }
        src.validate()?;
        dst.validate()?;

        matrix.apply(src.as_slice(), dst.as_slice_mut(), zero_region)
    }

    /// Free the stored weights. Calling it again does nothing.
    pub fn release(&self) {
        self.inner.release();
    }
}

/// Release a registered handle through its weak reference
pub(crate) fn release_weak(handle: &Weak<HandleInner>) -> bool {
    handle.upgrade().is_some_and(|inner| inner.release())
}

impl Drop for RouteHandle {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandle")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("method", &self.inner.options.regrid_method)
            .field("src", &self.inner.src_signature.to_string())
            .field("dst", &self.inner.dst_signature.to_string())
            .finish()
    }
}
