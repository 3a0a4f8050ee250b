//! Per-request context carrying the viewer binding.
//!
//! A [`RequestContext`] is an immutable snapshot: deriving a context with a viewer, a
//! deadline, or a fresh cancellation handle returns a new value and leaves the parent
//! untouched. The viewer lives in a single typed slot, so absence ("anonymous") is
//! `None` and never a zero-valued viewer.
//!
//! Cancellation is shared between a context and everything derived from it; cancelling
//! the parent aborts any policy evaluation running under a child.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::{Result, RowguardError};
use crate::types::Viewer;

#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    viewer: Option<Viewer>,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

/// Handle used to cancel a context (and all contexts derived from it) from elsewhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// Root context for a new inbound request: anonymous, no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            viewer: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Derived context with `viewer` bound, replacing any earlier binding.
    #[must_use]
    pub fn with_viewer(&self, viewer: Viewer) -> Self {
        Self {
            viewer: Some(viewer),
            ..self.clone()
        }
    }

    /// Derived context without a viewer.
    #[must_use]
    pub fn anonymous(&self) -> Self {
        Self {
            viewer: None,
            ..self.clone()
        }
    }

    /// Derived context that expires at `deadline`. An earlier parent deadline wins.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The bound viewer, if any.
    #[must_use]
    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    /// The bound viewer, or `Unauthenticated` when the context is anonymous.
    pub fn viewer_required(&self) -> Result<&Viewer> {
        self.viewer.as_ref().ok_or(RowguardError::Unauthenticated)
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Ok` while the request is still live.
    pub fn check_live(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(RowguardError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RowguardError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Returns a copy of `parent` with `viewer` attached.
#[must_use]
pub fn new_context(parent: &RequestContext, viewer: Viewer) -> RequestContext {
    parent.with_viewer(viewer)
}

/// Returns the viewer stored in `ctx`, if one was bound.
#[must_use]
pub fn from_context(ctx: &RequestContext) -> Option<Viewer> {
    ctx.viewer().copied()
}
