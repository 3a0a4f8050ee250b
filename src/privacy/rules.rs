//! Concrete rules.

use super::{FilterHandle, Rule};
use crate::context::RequestContext;
use crate::error::Result;
use crate::types::{Decision, DenyReason, EntityKind};

/// Narrows any query or mutation on `entity` to rows owned by the current viewer, then
/// skips. It never grants access by itself; a later rule or the chain fallback decides.
///
/// Denies when no viewer is bound (instead of narrowing to an impossible predicate) and
/// when handed a filter for a different entity.
#[derive(Debug, Clone, Copy)]
pub struct OnlyOwnRows {
    entity: EntityKind,
}

impl OnlyOwnRows {
    #[must_use]
    pub const fn new(entity: EntityKind) -> Self {
        Self { entity }
    }

    #[must_use]
    pub const fn todos() -> Self {
        Self::new(EntityKind::Todo)
    }

    #[must_use]
    pub const fn users() -> Self {
        Self::new(EntityKind::User)
    }
}

impl Rule for OnlyOwnRows {
    fn name(&self) -> &str {
        match self.entity {
            EntityKind::User => "only_own_users",
            EntityKind::Todo => "only_own_todos",
        }
    }

    fn evaluate(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<Decision> {
        let subject_id = ctx.viewer_required()?.subject_id();
        filter.ownership_mut(self.entity)?.where_owned_by(subject_id);
        Ok(Decision::Skip)
    }
}

/// Allows any request with a bound viewer; denies anonymous ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowIfViewer;

impl Rule for AllowIfViewer {
    fn name(&self) -> &str {
        "allow_if_viewer"
    }

    fn evaluate(&self, ctx: &RequestContext, _filter: &mut FilterHandle) -> Result<Decision> {
        Ok(match ctx.viewer() {
            Some(_) => Decision::Allow,
            None => Decision::Deny(DenyReason::MissingViewer),
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

/// Allows admins, skips for everyone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowIfAdmin;

impl Rule for AllowIfAdmin {
    fn name(&self) -> &str {
        "allow_if_admin"
    }

    fn evaluate(&self, ctx: &RequestContext, _filter: &mut FilterHandle) -> Result<Decision> {
        Ok(if ctx.viewer().is_some_and(|viewer| viewer.admin()) {
            Decision::Allow
        } else {
            Decision::Skip
        })
    }
}

/// Denies anonymous requests, skips otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyIfAnonymous;

impl Rule for DenyIfAnonymous {
    fn name(&self) -> &str {
        "deny_if_anonymous"
    }

    fn evaluate(&self, ctx: &RequestContext, _filter: &mut FilterHandle) -> Result<Decision> {
        Ok(match ctx.viewer() {
            Some(_) => Decision::Skip,
            None => Decision::Deny(DenyReason::MissingViewer),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl Rule for AlwaysAllow {
    fn name(&self) -> &str {
        "always_allow"
    }

    fn evaluate(&self, _ctx: &RequestContext, _filter: &mut FilterHandle) -> Result<Decision> {
        Ok(Decision::Allow)
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct AlwaysDeny {
    reason: String,
}

impl AlwaysDeny {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Rule for AlwaysDeny {
    fn name(&self) -> &str {
        "always_deny"
    }

    fn evaluate(&self, _ctx: &RequestContext, _filter: &mut FilterHandle) -> Result<Decision> {
        Ok(Decision::deny(self.reason.clone()))
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RowguardError;
    use crate::privacy::{Predicate, TodoFilter, UserFilter};
    use crate::types::{Operation, Role, Viewer};

    #[test]
    fn own_rows_narrows_and_skips() {
        let ctx = RequestContext::background().with_viewer(Viewer::user(1));
        let mut filter = FilterHandle::from(TodoFilter::new(Operation::Query));
        let decision = OnlyOwnRows::todos().evaluate(&ctx, &mut filter).unwrap();
        assert_eq!(decision, Decision::Skip);
        assert_eq!(filter.predicates(), &[Predicate::OwnerIdEq(1)]);
    }

    #[test]
    fn own_rows_without_viewer_fails_before_narrowing() {
        let ctx = RequestContext::background();
        let mut filter = FilterHandle::from(TodoFilter::new(Operation::Query));
        let err = OnlyOwnRows::todos().evaluate(&ctx, &mut filter).unwrap_err();
        assert!(matches!(err, RowguardError::Unauthenticated));
        assert!(filter.predicates().is_empty());
    }

    #[test]
    fn own_rows_rejects_foreign_filter() {
        let ctx = RequestContext::background().with_viewer(Viewer::user(1));
        let mut filter = FilterHandle::from(UserFilter::new(Operation::Query));
        let err = OnlyOwnRows::todos().evaluate(&ctx, &mut filter).unwrap_err();
        assert!(matches!(err, RowguardError::FilterTypeMismatch { .. }));
    }

    #[test]
    fn admin_rule_ignores_empty_roles() {
        let mut filter = FilterHandle::from(UserFilter::new(Operation::Query));
        let plain = RequestContext::background().with_viewer(Viewer::new(Role::NONE, 3));
        assert!(AllowIfAdmin.evaluate(&plain, &mut filter).unwrap().is_skip());
        let admin = plain.with_viewer(Viewer::new(Role::ADMIN, 3));
        assert!(AllowIfAdmin.evaluate(&admin, &mut filter).unwrap().is_allow());
    }

    #[test]
    fn terminal_flags() {
        assert!(AllowIfViewer.is_terminal());
        assert!(AlwaysDeny::new("x").is_terminal());
        assert!(!OnlyOwnRows::todos().is_terminal());
        assert!(!DenyIfAnonymous.is_terminal());
    }
}
