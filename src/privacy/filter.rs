//! Filter handles: the narrowing capability rules get over a pending query or mutation.
//!
//! A handle only ever accumulates predicates (rows must satisfy all of them), so a rule
//! can narrow the row set but never widen it. [`FilterHandle`] is a closed set of
//! variants tagged by entity kind; a rule asks for the variant it expects and receives a
//! `FilterTypeMismatch` error otherwise.

use std::fmt;
use std::marker::PhantomData;

use crate::constants::{ID_COLUMN, TODO_OWNER_COLUMN};
use crate::error::{Result, RowguardError};
use crate::types::{EntityKind, Operation, Todo, User};

/// A single equality predicate on an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    IdEq(i64),
    OwnerIdEq(i64),
}

impl Predicate {
    pub fn matches<R: Record>(&self, row: &R) -> bool {
        match *self {
            Self::IdEq(id) => row.record_id() == id,
            Self::OwnerIdEq(owner) => row.owner_id() == owner,
        }
    }

    fn column<R: Record>(&self) -> &'static str {
        match self {
            Self::IdEq(_) => ID_COLUMN,
            Self::OwnerIdEq(_) => R::OWNER_COLUMN,
        }
    }

    fn value(&self) -> i64 {
        match *self {
            Self::IdEq(value) | Self::OwnerIdEq(value) => value,
        }
    }
}

/// Row types that can be narrowed by ownership.
pub trait Record {
    const ENTITY: EntityKind;
    const OWNER_COLUMN: &'static str;

    fn record_id(&self) -> i64;

    /// Id of the user owning this row.
    fn owner_id(&self) -> i64;

    /// Predicate restricting rows of this kind to those owned by `subject_id`.
    fn ownership_predicate(subject_id: i64) -> Predicate;
}

impl Record for Todo {
    const ENTITY: EntityKind = EntityKind::Todo;
    const OWNER_COLUMN: &'static str = TODO_OWNER_COLUMN;

    fn record_id(&self) -> i64 {
        self.id
    }

    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn ownership_predicate(subject_id: i64) -> Predicate {
        Predicate::OwnerIdEq(subject_id)
    }
}

impl Record for User {
    const ENTITY: EntityKind = EntityKind::User;
    const OWNER_COLUMN: &'static str = ID_COLUMN;

    fn record_id(&self) -> i64 {
        self.id
    }

    // A user owns exactly its own row.
    fn owner_id(&self) -> i64 {
        self.id
    }

    fn ownership_predicate(subject_id: i64) -> Predicate {
        Predicate::IdEq(subject_id)
    }
}

/// The one narrowing operation exposed to ownership rules.
pub trait OwnershipFilter {
    /// Restrict the row set to rows owned by `subject_id`. Idempotent.
    fn where_owned_by(&mut self, subject_id: i64);
}

/// Accumulated predicates for one pending operation on rows of type `R`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter<R> {
    operation: Operation,
    predicates: Vec<Predicate>,
    _row: PhantomData<fn() -> R>,
}

pub type TodoFilter = Filter<Todo>;
pub type UserFilter = Filter<User>;

impl<R: Record> Filter<R> {
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            predicates: Vec::new(),
            _row: PhantomData,
        }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Add a predicate. Adding one that is already present is a no-op.
    pub fn push(&mut self, predicate: Predicate) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }

    /// True when `row` satisfies every predicate.
    pub fn matches(&self, row: &R) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(row))
    }

    /// True when `self` keeps every predicate of `earlier`, in order, for the same operation.
    fn extends(&self, earlier: &Self) -> bool {
        self.operation == earlier.operation && self.predicates.starts_with(&earlier.predicates)
    }
}

impl<R: Record> OwnershipFilter for Filter<R> {
    fn where_owned_by(&mut self, subject_id: i64) {
        self.push(R::ownership_predicate(subject_id));
    }
}

impl<R: Record> fmt::Display for Filter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return f.write_str("true");
        }
        let rendered: Vec<String> = self
            .predicates
            .iter()
            .map(|p| format!("{} = {}", p.column::<R>(), p.value()))
            .collect();
        f.write_str(&rendered.join(" AND "))
    }
}

/// Filter for whichever entity the pending operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterHandle {
    User(UserFilter),
    Todo(TodoFilter),
}

impl FilterHandle {
    #[must_use]
    pub fn entity(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Todo(_) => EntityKind::Todo,
        }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::User(filter) => filter.operation(),
            Self::Todo(filter) => filter.operation(),
        }
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        match self {
            Self::User(filter) => filter.predicates(),
            Self::Todo(filter) => filter.predicates(),
        }
    }

    /// Ownership narrowing for `expected`, or `FilterTypeMismatch` if this handle targets
    /// another entity.
    pub fn ownership_mut(&mut self, expected: EntityKind) -> Result<&mut dyn OwnershipFilter> {
        let found = self.entity();
        match self {
            Self::User(filter) if expected == EntityKind::User => {
                Ok(filter as &mut dyn OwnershipFilter)
            }
            Self::Todo(filter) if expected == EntityKind::Todo => {
                Ok(filter as &mut dyn OwnershipFilter)
            }
            _ => Err(RowguardError::FilterTypeMismatch { expected, found }),
        }
    }

    pub fn as_todo_mut(&mut self) -> Result<&mut TodoFilter> {
        match self {
            Self::Todo(filter) => Ok(filter),
            Self::User(_) => Err(RowguardError::FilterTypeMismatch {
                expected: EntityKind::Todo,
                found: EntityKind::User,
            }),
        }
    }

    pub fn as_user_mut(&mut self) -> Result<&mut UserFilter> {
        match self {
            Self::User(filter) => Ok(filter),
            Self::Todo(_) => Err(RowguardError::FilterTypeMismatch {
                expected: EntityKind::User,
                found: EntityKind::Todo,
            }),
        }
    }

    /// Take back the todo filter after evaluation.
    pub fn into_todo(self) -> Result<TodoFilter> {
        match self {
            Self::Todo(filter) => Ok(filter),
            Self::User(_) => Err(RowguardError::FilterTypeMismatch {
                expected: EntityKind::Todo,
                found: EntityKind::User,
            }),
        }
    }

    pub fn into_user(self) -> Result<UserFilter> {
        match self {
            Self::User(filter) => Ok(filter),
            Self::Todo(_) => Err(RowguardError::FilterTypeMismatch {
                expected: EntityKind::User,
                found: EntityKind::Todo,
            }),
        }
    }

    /// True when `self` is `earlier` plus zero or more added predicates. Anything else
    /// (a removed predicate, another entity or operation) means the rows were widened.
    pub(crate) fn extends(&self, earlier: &FilterHandle) -> bool {
        match (self, earlier) {
            (Self::User(now), Self::User(before)) => now.extends(before),
            (Self::Todo(now), Self::Todo(before)) => now.extends(before),
            _ => false,
        }
    }
}

impl From<TodoFilter> for FilterHandle {
    fn from(filter: TodoFilter) -> Self {
        Self::Todo(filter)
    }
}

impl From<UserFilter> for FilterHandle {
    fn from(filter: UserFilter) -> Self {
        Self::User(filter)
    }
}

impl fmt::Display for FilterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(filter) => write!(f, "users WHERE {filter}"),
            Self::Todo(filter) => write!(f, "todos WHERE {filter}"),
        }
    }
}
