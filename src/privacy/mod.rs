//! Row-level privacy policies.
//!
//! Every query and mutation issued through the [`crate::store`] client is checked here
//! before storage is touched:
//!
//! 1. The store builds a [`FilterHandle`] describing the rows the operation will touch.
//! 2. The [`Policy`] looks up the [`Chain`] registered for the (entity, operation) pair.
//! 3. The chain runs its [`Rule`]s in order. The first `Allow` or `Deny` ends evaluation;
//!    `Skip` defers to the next rule; a chain where every rule skipped resolves to its
//!    configured fallback.
//! 4. On `Allow` the store executes with whatever predicates rules attached to the handle.
//!    On `Deny` the caller receives [`crate::RowguardError::PolicyDenied`].
//!
//! Rules are shared read-only across concurrent requests, hence the `Send + Sync` bound.

mod chain;
pub mod filter;
mod policy;
pub mod rules;

pub use chain::Chain;
pub use filter::{
    Filter, FilterHandle, OwnershipFilter, Predicate, Record, TodoFilter, UserFilter,
};
pub use policy::{Policy, PolicyBuilder, standard_policy};
pub use rules::{
    AllowIfAdmin, AllowIfViewer, AlwaysAllow, AlwaysDeny, DenyIfAnonymous, OnlyOwnRows,
};

use crate::context::RequestContext;
use crate::error::Result;
use crate::types::Decision;

/// A single authorization check.
///
/// Implementations must be deterministic for a given context and filter handle, and may
/// only mutate the handle they are given. Returning an error is equivalent to denying:
/// the chain converts it into `Decision::Deny`, except for cancellation, which aborts.
pub trait Rule: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn evaluate(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<Decision>;

    /// True if this rule never returns `Skip`.
    fn is_terminal(&self) -> bool {
        false
    }
}

type RuleCallback = dyn Fn(&RequestContext, &mut FilterHandle) -> Result<Decision> + Send + Sync;

/// Adapter turning a closure into a [`Rule`].
pub struct RuleFn {
    name: String,
    terminal: bool,
    callback: Box<RuleCallback>,
}

impl RuleFn {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&RequestContext, &mut FilterHandle) -> Result<Decision> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            terminal: false,
            callback: Box::new(callback),
        }
    }

    /// Declare that the closure always returns `Allow` or `Deny`.
    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

impl std::fmt::Debug for RuleFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleFn")
            .field("name", &self.name)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

impl Rule for RuleFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<Decision> {
        (self.callback)(ctx, filter)
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}
