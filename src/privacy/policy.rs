use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{AllowIfAdmin, AllowIfViewer, Chain, FilterHandle, OnlyOwnRows};
use crate::context::RequestContext;
use crate::error::{Result, RowguardError};
use crate::types::{Decision, DenyReason, EntityKind, OperationKind, PolicyOptions};

static STANDARD_POLICY: OnceCell<Arc<Policy>> = OnceCell::new();

/// Process-wide policy for the todo service, built on first use and read-only afterwards.
pub fn standard_policy() -> Result<Arc<Policy>> {
    STANDARD_POLICY
        .get_or_try_init(|| Policy::standard(&PolicyOptions::default()).map(Arc::new))
        .map(Arc::clone)
}

/// Chains keyed by (entity, operation), fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    chains: BTreeMap<(EntityKind, OperationKind), Chain>,
}

impl Policy {
    #[must_use]
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// Policy used by the todo service:
    ///
    /// - todos: narrow to the viewer's own rows, then allow any viewer.
    /// - users: allow admins (the internal authentication viewer), otherwise narrow to
    ///   the viewer's own row and allow.
    ///
    /// Every chain falls back to deny.
    pub fn standard(options: &PolicyOptions) -> Result<Self> {
        let todo_chain = || {
            Chain::deny_by_default()
                .rule(OnlyOwnRows::todos())
                .rule(AllowIfViewer)
        };
        let user_chain = || {
            Chain::deny_by_default()
                .rule(AllowIfAdmin)
                .rule(OnlyOwnRows::users())
                .rule(AllowIfViewer)
        };
        Self::builder()
            .options(options.clone())
            .query(EntityKind::Todo, todo_chain())
            .mutation(EntityKind::Todo, todo_chain())
            .query(EntityKind::User, user_chain())
            .mutation(EntityKind::User, user_chain())
            .build()
    }

    #[must_use]
    pub fn chain(&self, entity: EntityKind, operation: OperationKind) -> Option<&Chain> {
        self.chains.get(&(entity, operation))
    }

    /// Evaluate the chain registered for the handle's entity and operation.
    ///
    /// A pair with no registered chain is denied.
    pub fn evaluate(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<Decision> {
        let entity = filter.entity();
        let operation = filter.operation().kind();
        let decision = match self.chain(entity, operation) {
            Some(chain) => chain.evaluate(ctx, filter)?,
            None => Decision::Deny(DenyReason::NoPolicy { entity, operation }),
        };
        let viewer = ctx.viewer().map(|viewer| viewer.subject_id());
        match &decision {
            Decision::Allow => tracing::debug!(
                target: "rowguard::privacy",
                request_id = %ctx.request_id(),
                ?viewer,
                %entity,
                %operation,
                filter = %filter,
                "allowed"
            ),
            Decision::Deny(reason) => tracing::warn!(
                target: "rowguard::privacy",
                request_id = %ctx.request_id(),
                ?viewer,
                %entity,
                %operation,
                %reason,
                "denied"
            ),
            Decision::Skip => {}
        }
        Ok(decision)
    }

    /// Like [`Policy::evaluate`], but turns a deny into `PolicyDenied`.
    pub fn enforce(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<()> {
        match self.evaluate(ctx, filter)? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(RowguardError::denied(reason)),
            // Chains never return Skip; treat it as the fail-closed default.
            Decision::Skip => Err(RowguardError::denied(DenyReason::NoMatchingRule)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    options: PolicyOptions,
    chains: BTreeMap<(EntityKind, OperationKind), Chain>,
}

impl PolicyBuilder {
    #[must_use]
    pub fn options(mut self, options: PolicyOptions) -> Self {
        self.options = options;
        self
    }

    /// Register `chain` for the pair, replacing any earlier registration.
    #[must_use]
    pub fn chain(mut self, entity: EntityKind, operation: OperationKind, chain: Chain) -> Self {
        self.chains.insert((entity, operation), chain);
        self
    }

    #[must_use]
    pub fn query(self, entity: EntityKind, chain: Chain) -> Self {
        self.chain(entity, OperationKind::Query, chain)
    }

    #[must_use]
    pub fn mutation(self, entity: EntityKind, chain: Chain) -> Self {
        self.chain(entity, OperationKind::Mutation, chain)
    }

    pub fn build(self) -> Result<Policy> {
        if self.options.require_terminal_rule {
            for ((entity, operation), chain) in &self.chains {
                if !chain.is_empty() && !chain.ends_in_terminal_rule() {
                    return Err(RowguardError::InvalidPolicy {
                        reason: format!(
                            "{entity} {operation} chain must end in an always-deciding rule"
                        ),
                    });
                }
            }
        }
        Ok(Policy {
            chains: self.chains,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privacy::{DenyIfAnonymous, TodoFilter, UserFilter};
    use crate::types::{Operation, Verdict, Viewer};

    #[test]
    fn standard_policy_fails_closed_everywhere() {
        let policy = Policy::standard(&PolicyOptions::default()).unwrap();
        for entity in EntityKind::ALL {
            for operation in OperationKind::ALL {
                let chain = policy.chain(entity, operation).expect("chain registered");
                assert_eq!(chain.fallback(), Verdict::Deny);
                assert!(chain.ends_in_terminal_rule());
            }
        }
    }

    #[test]
    fn missing_chain_denies() {
        let policy = Policy::builder().build().unwrap();
        let ctx = RequestContext::background().with_viewer(Viewer::user(1));
        let mut filter = FilterHandle::from(TodoFilter::new(Operation::Query));
        let decision = policy.evaluate(&ctx, &mut filter).unwrap();
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::NoPolicy {
                entity: EntityKind::Todo,
                operation: OperationKind::Query,
            })
        );
    }

    #[test]
    fn non_terminal_tail_is_rejected_when_required() {
        let chain = Chain::deny_by_default().rule(DenyIfAnonymous);
        let err = Policy::builder()
            .query(EntityKind::Todo, chain.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, RowguardError::InvalidPolicy { .. }));

        let relaxed = Policy::builder()
            .options(PolicyOptions {
                require_terminal_rule: false,
            })
            .query(EntityKind::Todo, chain)
            .build();
        assert!(relaxed.is_ok());
    }

    #[test]
    fn internal_viewer_reads_all_users() {
        let policy = Policy::standard(&PolicyOptions::default()).unwrap();
        let ctx = RequestContext::background().with_viewer(Viewer::internal_authn());
        let mut filter = FilterHandle::from(UserFilter::new(Operation::Query));
        policy.enforce(&ctx, &mut filter).unwrap();
        assert!(filter.predicates().is_empty());
    }

    #[test]
    fn standard_policy_is_shared() {
        let first = standard_policy().unwrap();
        let second = standard_policy().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
