//! In-memory entity store with privacy enforcement at the data-access boundary.
//!
//! Handlers never see the policy: every builder here wraps its pending operation in a
//! [`FilterHandle`], runs it through the configured [`Policy`], and only then takes the
//! table lock. Predicates attached by rules are applied when rows are matched, so a row
//! excluded by narrowing behaves exactly like a row that does not exist.

mod todo;
mod user;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::context::RequestContext;
use crate::error::Result;
use crate::privacy::{FilterHandle, Policy, standard_policy};
use crate::types::{Todo, User};

pub use todo::{TodoClient, TodoCreate, TodoDeleteOne, TodoQuery, TodoUpdateOne};
pub use user::{UserClient, UserCreate, UserQuery};

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) users: BTreeMap<i64, User>,
    pub(crate) todos: BTreeMap<i64, Todo>,
    last_user_id: i64,
    last_todo_id: i64,
}

impl Tables {
    pub(crate) fn peek_user_id(&self) -> i64 {
        self.last_user_id + 1
    }

    pub(crate) fn peek_todo_id(&self) -> i64 {
        self.last_todo_id + 1
    }

    pub(crate) fn insert_user(&mut self, user: User) {
        self.last_user_id = self.last_user_id.max(user.id);
        self.users.insert(user.id, user);
    }

    pub(crate) fn insert_todo(&mut self, todo: Todo) {
        self.last_todo_id = self.last_todo_id.max(todo.id);
        self.todos.insert(todo.id, todo);
    }
}

/// Storage access counters. Policy evaluation never touches storage, so a denied
/// operation leaves both at their previous values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
}

impl StoreStats {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.reads + self.writes
    }
}

#[derive(Debug)]
struct Inner {
    tables: RwLock<Tables>,
    policy: Arc<Policy>,
    reads: AtomicU64,
    writes: AtomicU64,
}

/// Handle to the store. Cheap to clone; clones share tables, policy and counters.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    #[must_use]
    pub fn new(policy: Arc<Policy>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(Tables::default()),
                policy,
                reads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Empty store guarded by the process-wide standard policy.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(standard_policy()?))
    }

    #[must_use]
    pub fn users(&self) -> UserClient<'_> {
        UserClient::new(self)
    }

    #[must_use]
    pub fn todos(&self) -> TodoClient<'_> {
        TodoClient::new(self)
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.inner.policy
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.inner.reads.load(Ordering::Relaxed),
            writes: self.inner.writes.load(Ordering::Relaxed),
        }
    }

    /// Run the policy for `filter`. Must succeed before any table lock is taken.
    pub(crate) fn authorize(&self, ctx: &RequestContext, filter: &mut FilterHandle) -> Result<()> {
        ctx.check_live()?;
        self.inner.policy.enforce(ctx, filter)?;
        ctx.check_live()
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.tables.read()?)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.tables.write()?)
    }
}
