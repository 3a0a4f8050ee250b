use super::Client;
use crate::context::RequestContext;
use crate::error::{Result, RowguardError};
use crate::privacy::{FilterHandle, Predicate, UserFilter};
use crate::types::{DenyReason, EntityKind, MutationOp, Operation, User};

#[derive(Debug, Clone, Copy)]
pub struct UserClient<'a> {
    client: &'a Client,
}

impl<'a> UserClient<'a> {
    pub(super) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn query(&self) -> UserQuery<'a> {
        UserQuery {
            client: self.client,
            filter: UserFilter::new(Operation::Query),
            username: None,
        }
    }

    #[must_use]
    pub fn create(&self) -> UserCreate<'a> {
        UserCreate {
            client: self.client,
            username: None,
            password_hash: None,
        }
    }

    pub fn get(&self, ctx: &RequestContext, id: i64) -> Result<User> {
        self.query().where_id(id).only(ctx)
    }
}

#[derive(Debug, Clone)]
pub struct UserQuery<'a> {
    client: &'a Client,
    filter: UserFilter,
    username: Option<String>,
}

impl UserQuery<'_> {
    #[must_use]
    pub fn where_id(mut self, id: i64) -> Self {
        self.filter.push(Predicate::IdEq(id));
        self
    }

    /// Case-insensitive username match.
    #[must_use]
    pub fn where_username_equal_fold(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn all(self, ctx: &RequestContext) -> Result<Vec<User>> {
        let mut handle = FilterHandle::from(self.filter);
        self.client.authorize(ctx, &mut handle)?;
        let filter = handle.into_user()?;

        let tables = self.client.read()?;
        Ok(tables
            .users
            .values()
            .filter(|user| filter.matches(user))
            .filter(|user| {
                self.username
                    .as_deref()
                    .is_none_or(|name| user.username.eq_ignore_ascii_case(name))
            })
            .cloned()
            .collect())
    }

    pub fn first(self, ctx: &RequestContext) -> Result<Option<User>> {
        Ok(self.all(ctx)?.into_iter().next())
    }

    /// Exactly one matching user, or `NotFound`.
    pub fn only(self, ctx: &RequestContext) -> Result<User> {
        let id = self
            .filter
            .predicates()
            .iter()
            .find_map(|predicate| match predicate {
                Predicate::IdEq(id) => Some(*id),
                Predicate::OwnerIdEq(_) => None,
            })
            .unwrap_or_default();
        let mut users = self.all(ctx)?;
        match users.len() {
            1 => Ok(users.remove(0)),
            0 => Err(RowguardError::NotFound {
                entity: EntityKind::User,
                id,
            }),
            n => Err(RowguardError::ConstraintViolation {
                reason: format!("expected one user, found {n}"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserCreate<'a> {
    client: &'a Client,
    username: Option<String>,
    password_hash: Option<String>,
}

impl UserCreate<'_> {
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Already-hashed password in PHC string form.
    #[must_use]
    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn save(self, ctx: &RequestContext) -> Result<User> {
        let username = self.username.ok_or_else(|| RowguardError::InvalidInput {
            reason: "missing required field \"username\"".to_string(),
        })?;
        let password_hash = self
            .password_hash
            .ok_or_else(|| RowguardError::InvalidInput {
                reason: "missing required field \"password_hash\"".to_string(),
            })?;

        let mut handle = FilterHandle::from(UserFilter::new(Operation::Mutation(
            MutationOp::Create,
        )));
        self.client.authorize(ctx, &mut handle)?;
        let filter = handle.into_user()?;

        let mut tables = self.client.write()?;
        let user = User {
            id: tables.peek_user_id(),
            username,
            password_hash,
        };
        if !filter.matches(&user) {
            return Err(RowguardError::denied(DenyReason::OutsideScope));
        }
        let taken = tables
            .users
            .values()
            .any(|existing| existing.username.eq_ignore_ascii_case(&user.username));
        if taken {
            return Err(RowguardError::ConstraintViolation {
                reason: "username already exists".to_string(),
            });
        }
        tables.insert_user(user.clone());
        log::info!(target: "rowguard::store", "created user {} ({})", user.id, user.username);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::privacy::Policy;
    use crate::types::{PolicyOptions, Viewer};

    fn client() -> Client {
        Client::new(Arc::new(Policy::standard(&PolicyOptions::default()).unwrap()))
    }

    fn internal() -> RequestContext {
        RequestContext::background().with_viewer(Viewer::internal_authn())
    }

    #[test]
    fn usernames_are_unique_ignoring_case() {
        let client = client();
        client
            .users()
            .create()
            .username("alice")
            .password_hash("h")
            .save(&internal())
            .unwrap();
        let err = client
            .users()
            .create()
            .username("ALICE")
            .password_hash("h")
            .save(&internal())
            .unwrap_err();
        assert!(matches!(err, RowguardError::ConstraintViolation { .. }));
    }

    #[test]
    fn plain_viewer_sees_only_itself() {
        let client = client();
        for name in ["alice", "bob"] {
            client
                .users()
                .create()
                .username(name)
                .password_hash("h")
                .save(&internal())
                .unwrap();
        }
        let alice = RequestContext::background().with_viewer(Viewer::user(1));
        let visible = client.users().query().all(&alice).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].username, "alice");
        assert!(client.users().get(&alice, 2).unwrap_err().is_not_found());
    }

    #[test]
    fn lookup_by_username_ignores_case() {
        let client = client();
        client
            .users()
            .create()
            .username("Carol")
            .password_hash("h")
            .save(&internal())
            .unwrap();
        let user = client
            .users()
            .query()
            .where_username_equal_fold("carol")
            .only(&internal())
            .unwrap();
        assert_eq!(user.username, "Carol");
        assert_eq!(user.password_hash(), "h");
    }

    #[test]
    fn anonymous_signup_is_denied() {
        let client = client();
        let err = client
            .users()
            .create()
            .username("mallory")
            .password_hash("h")
            .save(&RequestContext::background())
            .unwrap_err();
        assert!(err.is_denied());
        assert_eq!(client.stats().total(), 0);
    }
}
