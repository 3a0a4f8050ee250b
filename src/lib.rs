#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Ids are i64 end to end; token timestamps are bounded seconds since the epoch.
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
//
// Style:
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
// e.g., owner_id, subject_id, user_id
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::if_same_then_else)]
#![allow(clippy::collapsible_match)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)] // Many builders take owned values intentionally
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use on every method
#![allow(clippy::format_push_string)] // Readability over minor perf difference
#![allow(clippy::assigning_clones)] // clone_from() often less readable
//
// Low-value pedantic lints that add noise:
#![allow(clippy::must_use_candidate)] // Accessors on Copy types are self-evident
#![allow(clippy::default_trait_access)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::should_implement_trait)] // Some method names are clearer than trait names
//
// Return value wrapping: Many functions use Result for consistency even when they
// currently can't fail, allowing future error conditions to be added without breaking API.
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unused_self)] // Some trait impls or future extensibility

/// The rowguard crate version (matches `Cargo.toml`).
pub const ROWGUARD_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod auth;
pub mod constants;
pub mod context;
pub mod error;
pub mod privacy;
pub mod service;
pub mod store;
pub mod types;

pub use auth::{Authenticator, Claims, Credentials, IssuedToken, TokenLookup};
pub use context::{CancelHandle, RequestContext, from_context, new_context};
pub use error::{Result, RowguardError};
pub use privacy::{
    Chain, FilterHandle, OwnershipFilter, Policy, PolicyBuilder, Predicate, Rule, RuleFn,
    TodoFilter, UserFilter, standard_policy,
};
pub use service::{ApiError, MessageResponse, TodoInput, TodoService, TokenResponse};
pub use store::{Client, StoreStats};
pub use types::{
    AuthConfig, AuthConfigBuilder, Decision, DenyReason, EntityKind, MutationOp, Operation,
    OperationKind, PolicyOptions, Role, ServiceConfig, Todo, User, Verdict, Viewer,
};
