//! Public types exposed by the `rowguard` crate.

pub mod decision;
pub mod options;
pub mod records;
pub mod viewer;

pub use decision::{
    Decision, DenyReason, EntityKind, MutationOp, Operation, OperationKind, Verdict,
};
pub use options::{AuthConfig, AuthConfigBuilder, PolicyOptions, ServiceConfig};
pub use records::{Todo, User};
pub use viewer::{Role, Viewer};
