//! Decision values produced by privacy rules, and the operation taxonomy they key on.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RowguardError;

/// Entity kinds that carry a privacy policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Todo,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::User, EntityKind::Todo];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Todo => "todo",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operation category a chain is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub const ALL: [OperationKind; 2] = [OperationKind::Query, OperationKind::Mutation];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Create,
    UpdateOne,
    DeleteOne,
}

/// Concrete operation carried by a filter handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Query,
    Mutation(MutationOp),
}

impl Operation {
    #[must_use]
    pub const fn kind(self) -> OperationKind {
        match self {
            Self::Query => OperationKind::Query,
            Self::Mutation(_) => OperationKind::Mutation,
        }
    }
}

/// Why a request was denied. For logs only; callers branch on "denied" alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// No viewer bound to the context.
    MissingViewer,
    FilterTypeMismatch {
        expected: EntityKind,
        found: EntityKind,
    },
    /// Every rule skipped and the chain falls back to deny.
    NoMatchingRule,
    /// No chain registered for the entity/operation pair.
    NoPolicy {
        entity: EntityKind,
        operation: OperationKind,
    },
    /// The row being created lies outside the narrowed scope.
    OutsideScope,
    /// A rule removed predicates or swapped the filter instead of narrowing it.
    FilterWidened,
    Rule {
        message: Cow<'static, str>,
    },
}

impl DenyReason {
    pub fn rule(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Rule {
            message: message.into(),
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingViewer => f.write_str("missing viewer"),
            Self::FilterTypeMismatch { expected, found } => {
                write!(f, "unexpected filter type: expected {expected}, found {found}")
            }
            Self::NoMatchingRule => f.write_str("no rule allowed the operation"),
            Self::NoPolicy { entity, operation } => {
                write!(f, "no policy configured for {entity} {operation}")
            }
            Self::OutsideScope => f.write_str("row lies outside the viewer's scope"),
            Self::FilterWidened => f.write_str("rule widened the filter"),
            Self::Rule { message } => f.write_str(message),
        }
    }
}

impl From<&RowguardError> for DenyReason {
    fn from(err: &RowguardError) -> Self {
        match err {
            RowguardError::Unauthenticated => Self::MissingViewer,
            RowguardError::FilterTypeMismatch { expected, found } => Self::FilterTypeMismatch {
                expected: *expected,
                found: *found,
            },
            RowguardError::PolicyDenied { reason } => reason.clone(),
            other => Self::rule(other.to_string()),
        }
    }
}

/// Tri-state outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Stop evaluating and permit.
    Allow,
    /// Stop evaluating and reject.
    Deny(DenyReason),
    /// Defer to the next rule.
    Skip,
}

impl Decision {
    pub fn deny(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Deny(DenyReason::rule(message))
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Terminal outcome a chain falls back to once every rule skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    #[default]
    Deny,
}

impl From<Verdict> for Decision {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allow => Decision::Allow,
            Verdict::Deny => Decision::Deny(DenyReason::NoMatchingRule),
        }
    }
}
