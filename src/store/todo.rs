use chrono::Utc;

use super::Client;
use crate::context::RequestContext;
use crate::error::{Result, RowguardError};
use crate::privacy::{FilterHandle, Predicate, TodoFilter};
use crate::types::{DenyReason, EntityKind, MutationOp, Operation, Todo};

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RowguardError::InvalidInput {
            reason: "todo text must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Entry point for todo operations.
#[derive(Debug, Clone, Copy)]
pub struct TodoClient<'a> {
    client: &'a Client,
}

impl<'a> TodoClient<'a> {
    pub(super) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn query(&self) -> TodoQuery<'a> {
        TodoQuery {
            client: self.client,
            filter: TodoFilter::new(Operation::Query),
            limit: None,
        }
    }

    #[must_use]
    pub fn create(&self) -> TodoCreate<'a> {
        TodoCreate {
            client: self.client,
            text: None,
            owner_id: None,
        }
    }

    #[must_use]
    pub fn update_one_id(&self, id: i64) -> TodoUpdateOne<'a> {
        TodoUpdateOne {
            client: self.client,
            id,
            text: None,
        }
    }

    #[must_use]
    pub fn delete_one_id(&self, id: i64) -> TodoDeleteOne<'a> {
        TodoDeleteOne {
            client: self.client,
            id,
        }
    }

    /// Fetch one todo by id; rows hidden by policy come back as not found.
    pub fn get(&self, ctx: &RequestContext, id: i64) -> Result<Todo> {
        self.query().where_id(id).only(ctx)
    }
}

#[derive(Debug, Clone)]
pub struct TodoQuery<'a> {
    client: &'a Client,
    filter: TodoFilter,
    limit: Option<usize>,
}

impl TodoQuery<'_> {
    #[must_use]
    pub fn where_id(mut self, id: i64) -> Self {
        self.filter.push(Predicate::IdEq(id));
        self
    }

    #[must_use]
    pub fn where_owner_id(mut self, owner_id: i64) -> Self {
        self.filter.push(Predicate::OwnerIdEq(owner_id));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// All matching todos ordered by id.
    pub fn all(self, ctx: &RequestContext) -> Result<Vec<Todo>> {
        let mut handle = FilterHandle::from(self.filter);
        self.client.authorize(ctx, &mut handle)?;
        let filter = handle.into_todo()?;

        let tables = self.client.read()?;
        let rows: Vec<Todo> = tables
            .todos
            .values()
            .filter(|todo| filter.matches(todo))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        tracing::debug!(
            target: "rowguard::store",
            request_id = %ctx.request_id(),
            rows = rows.len(),
            filter = %filter,
            "todo query"
        );
        Ok(rows)
    }

    /// First matching todo, or `None`.
    pub fn first(self, ctx: &RequestContext) -> Result<Option<Todo>> {
        Ok(self.limit(1).all(ctx)?.into_iter().next())
    }

    /// The single todo selected by `where_id`, or `NotFound`.
    pub fn only(self, ctx: &RequestContext) -> Result<Todo> {
        let id = self
            .filter
            .predicates()
            .iter()
            .find_map(|predicate| match predicate {
                Predicate::IdEq(id) => Some(*id),
                Predicate::OwnerIdEq(_) => None,
            })
            .unwrap_or_default();
        self.first(ctx)?.ok_or(RowguardError::NotFound {
            entity: EntityKind::Todo,
            id,
        })
    }

    pub fn count(self, ctx: &RequestContext) -> Result<usize> {
        Ok(self.all(ctx)?.len())
    }
}

#[derive(Debug, Clone)]
pub struct TodoCreate<'a> {
    client: &'a Client,
    text: Option<String>,
    owner_id: Option<i64>,
}

impl TodoCreate<'_> {
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn owner_id(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Insert the todo. The row must fall inside the scope the policy narrowed to.
    pub fn save(self, ctx: &RequestContext) -> Result<Todo> {
        let text = self.text.ok_or_else(|| RowguardError::InvalidInput {
            reason: "missing required field \"text\"".to_string(),
        })?;
        validate_text(&text)?;
        let owner_id = self.owner_id.ok_or_else(|| RowguardError::InvalidInput {
            reason: "missing required edge \"owner\"".to_string(),
        })?;

        let mut handle = FilterHandle::from(TodoFilter::new(Operation::Mutation(
            MutationOp::Create,
        )));
        self.client.authorize(ctx, &mut handle)?;
        let filter = handle.into_todo()?;

        let mut tables = self.client.write()?;
        let now = Utc::now();
        let todo = Todo {
            id: tables.peek_todo_id(),
            created_at: now,
            updated_at: now,
            text,
            owner_id,
        };
        if !filter.matches(&todo) {
            return Err(RowguardError::denied(DenyReason::OutsideScope));
        }
        if !tables.users.contains_key(&owner_id) {
            return Err(RowguardError::ConstraintViolation {
                reason: format!("owner {owner_id} does not exist"),
            });
        }
        tables.insert_todo(todo.clone());
        log::info!(target: "rowguard::store", "created todo {} for user {}", todo.id, owner_id);
        Ok(todo)
    }
}

#[derive(Debug, Clone)]
pub struct TodoUpdateOne<'a> {
    client: &'a Client,
    id: i64,
    text: Option<String>,
}

impl TodoUpdateOne<'_> {
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Apply the update. A todo outside the viewer's scope is reported as not found.
    pub fn save(self, ctx: &RequestContext) -> Result<Todo> {
        if let Some(text) = &self.text {
            validate_text(text)?;
        }
        let mut filter = TodoFilter::new(Operation::Mutation(MutationOp::UpdateOne));
        filter.push(Predicate::IdEq(self.id));
        let mut handle = FilterHandle::from(filter);
        self.client.authorize(ctx, &mut handle)?;
        let filter = handle.into_todo()?;

        let mut tables = self.client.write()?;
        let todo = tables
            .todos
            .get_mut(&self.id)
            .filter(|todo| filter.matches(todo))
            .ok_or(RowguardError::NotFound {
                entity: EntityKind::Todo,
                id: self.id,
            })?;
        if let Some(text) = self.text {
            todo.text = text;
        }
        todo.updated_at = Utc::now();
        Ok(todo.clone())
    }
}

#[derive(Debug, Clone)]
pub struct TodoDeleteOne<'a> {
    client: &'a Client,
    id: i64,
}

impl TodoDeleteOne<'_> {
    /// Delete the todo. A todo outside the viewer's scope is reported as not found and
    /// left untouched.
    pub fn exec(self, ctx: &RequestContext) -> Result<()> {
        let mut filter = TodoFilter::new(Operation::Mutation(MutationOp::DeleteOne));
        filter.push(Predicate::IdEq(self.id));
        let mut handle = FilterHandle::from(filter);
        self.client.authorize(ctx, &mut handle)?;
        let filter = handle.into_todo()?;

        let mut tables = self.client.write()?;
        let visible = tables
            .todos
            .get(&self.id)
            .is_some_and(|todo| filter.matches(todo));
        if !visible {
            return Err(RowguardError::NotFound {
                entity: EntityKind::Todo,
                id: self.id,
            });
        }
        tables.todos.remove(&self.id);
        log::info!(target: "rowguard::store", "deleted todo {}", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::privacy::{Chain, Policy, RuleFn};
    use crate::store::Tables;
    use crate::types::{Decision, PolicyOptions, User, Viewer};

    fn seed_users(tables: &mut Tables, ids: &[i64]) {
        for &id in ids {
            tables.insert_user(User {
                id,
                username: format!("user{id}"),
                password_hash: String::new(),
            });
        }
    }

    fn seeded(policy: Policy) -> (Client, RequestContext, RequestContext) {
        let client = Client::new(Arc::new(policy));
        seed_users(&mut client.write().unwrap(), &[1, 2]);
        let root = RequestContext::background();
        (
            client,
            root.with_viewer(Viewer::user(1)),
            root.with_viewer(Viewer::user(2)),
        )
    }

    fn standard() -> Policy {
        Policy::standard(&PolicyOptions::default()).unwrap()
    }

    #[test]
    fn create_for_someone_else_is_denied_before_insert() {
        let (client, alice, _) = seeded(standard());
        let err = client
            .todos()
            .create()
            .text("sneaky")
            .owner_id(2)
            .save(&alice)
            .unwrap_err();
        assert!(matches!(
            err,
            RowguardError::PolicyDenied {
                reason: DenyReason::OutsideScope
            }
        ));
        assert!(client.read().unwrap().todos.is_empty());
    }

    #[test]
    fn update_foreign_todo_is_not_found() {
        let (client, alice, bob) = seeded(standard());
        let todo = client
            .todos()
            .create()
            .text("bob's")
            .owner_id(2)
            .save(&bob)
            .unwrap();
        let err = client
            .todos()
            .update_one_id(todo.id)
            .text("hijacked")
            .save(&alice)
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.todos().get(&bob, todo.id).unwrap().text, "bob's");
    }

    #[test]
    fn update_own_todo_bumps_timestamp() {
        let (client, alice, _) = seeded(standard());
        let todo = client
            .todos()
            .create()
            .text("a")
            .owner_id(1)
            .save(&alice)
            .unwrap();
        let updated = client
            .todos()
            .update_one_id(todo.id)
            .text("b")
            .save(&alice)
            .unwrap();
        assert_eq!(updated.text, "b");
        assert_eq!(updated.created_at, todo.created_at);
        assert!(updated.updated_at >= todo.updated_at);
    }

    #[test]
    fn empty_text_is_rejected() {
        let (client, alice, _) = seeded(standard());
        let err = client
            .todos()
            .create()
            .text("  ")
            .owner_id(1)
            .save(&alice)
            .unwrap_err();
        assert!(matches!(err, RowguardError::InvalidInput { .. }));
    }

    #[test]
    fn unknown_owner_violates_constraint() {
        let (client, _, _) = seeded(standard());
        let ghost = RequestContext::background().with_viewer(Viewer::user(99));
        let err = client
            .todos()
            .create()
            .text("x")
            .owner_id(99)
            .save(&ghost)
            .unwrap_err();
        assert!(matches!(err, RowguardError::ConstraintViolation { .. }));
    }

    #[test]
    fn open_policy_sees_every_row() {
        let open = Policy::builder()
            .options(PolicyOptions {
                require_terminal_rule: false,
            })
            .query(
                EntityKind::Todo,
                Chain::allow_by_default().rule(RuleFn::new("noop", |_, _| Ok(Decision::Skip))),
            )
            .build()
            .unwrap();
        let (client, alice, _) = seeded(open);
        {
            let mut tables = client.write().unwrap();
            for (id, owner_id) in [(1, 1), (2, 2)] {
                let now = Utc::now();
                tables.insert_todo(Todo {
                    id,
                    created_at: now,
                    updated_at: now,
                    text: format!("todo {id}"),
                    owner_id,
                });
            }
        }
        assert_eq!(client.todos().query().count(&alice).unwrap(), 2);
        let foreign = client
            .todos()
            .query()
            .where_owner_id(2)
            .count(&alice)
            .unwrap();
        assert_eq!(foreign, 1);
    }
}
