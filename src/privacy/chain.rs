use std::fmt;
use std::sync::Arc;

use super::{FilterHandle, Rule};
use crate::context::RequestContext;
use crate::error::Result;
use crate::types::{Decision, DenyReason, Verdict};

/// Ordered rules for one (entity, operation) pair, plus the verdict used when all skip.
#[derive(Clone)]
pub struct Chain {
    rules: Vec<Arc<dyn Rule>>,
    fallback: Verdict,
}

impl Chain {
    #[must_use]
    pub fn new(fallback: Verdict) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Chain that fails closed.
    #[must_use]
    pub fn deny_by_default() -> Self {
        Self::new(Verdict::Deny)
    }

    #[must_use]
    pub fn allow_by_default() -> Self {
        Self::new(Verdict::Allow)
    }

    #[must_use]
    pub fn rule<R: Rule + 'static>(self, rule: R) -> Self {
        self.shared_rule(Arc::new(rule))
    }

    #[must_use]
    pub fn shared_rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Verdict) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn fallback(&self) -> Verdict {
        self.fallback
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name())
    }

    /// True when the last rule always produces a verdict.
    #[must_use]
    pub fn ends_in_terminal_rule(&self) -> bool {
        self.rules.last().is_some_and(|rule| rule.is_terminal())
    }

    /// Run the rules in order, first `Allow`/`Deny` wins.
    ///
    /// Liveness of `ctx` is checked before each rule; a cancelled or expired context
    /// aborts with an error rather than producing a decision. Narrowing added by a rule
    /// that denies is undone before returning. A rule that leaves the filter wider than
    /// it found it is treated as a deny and the filter is restored.
    pub fn evaluate(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<Decision> {
        for rule in &self.rules {
            ctx.check_live()?;
            let before = filter.clone();
            let decision = match rule.evaluate(ctx, filter) {
                Ok(decision) => decision,
                Err(err) if err.is_cancellation() => {
                    *filter = before;
                    return Err(err);
                }
                Err(err) => Decision::Deny(DenyReason::from(&err)),
            };
            let decision = if filter.extends(&before) {
                decision
            } else {
                tracing::warn!(
                    target: "rowguard::privacy",
                    request_id = %ctx.request_id(),
                    rule = rule.name(),
                    "rule widened the filter"
                );
                Decision::Deny(DenyReason::FilterWidened)
            };
            match decision {
                Decision::Skip => {
                    tracing::trace!(
                        target: "rowguard::privacy",
                        request_id = %ctx.request_id(),
                        rule = rule.name(),
                        "rule skipped"
                    );
                }
                Decision::Allow => return Ok(Decision::Allow),
                Decision::Deny(reason) => {
                    *filter = before;
                    tracing::debug!(
                        target: "rowguard::privacy",
                        request_id = %ctx.request_id(),
                        rule = rule.name(),
                        %reason,
                        "rule denied"
                    );
                    return Ok(Decision::Deny(reason));
                }
            }
        }
        ctx.check_live()?;
        Ok(self.fallback.into())
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .field("fallback", &self.fallback)
            .finish()
    }
}
