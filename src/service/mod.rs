//! Handler layer of the todo service.
//!
//! Each method corresponds to one endpoint. Handlers trust whatever viewer the
//! authentication step bound to the context and leave all access decisions to the
//! privacy policies the store enforces.

mod response;

pub use response::{ApiError, MessageResponse, TokenResponse};

use serde::{Deserialize, Serialize};

use crate::auth::{Authenticator, Credentials, TokenLookup, hash_password, validate_password};
use crate::constants::USERNAME_MAX_CHARS;
use crate::context::RequestContext;
use crate::error::{Result, RowguardError};
use crate::store::Client;
use crate::types::{ServiceConfig, Todo, Viewer};

/// Body of `POST /todo` and `PATCH /todo/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoInput {
    pub text: String,
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_CHARS || !username.chars().all(char::is_alphanumeric) {
        return Err(RowguardError::InvalidInput {
            reason: "username must be non-empty and alphanumeric".to_string(),
        });
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| RowguardError::InvalidInput {
            reason: format!("invalid todo id {raw:?}"),
        })
}

#[derive(Debug, Clone)]
pub struct TodoService {
    client: Client,
    auth: Authenticator,
}

impl TodoService {
    pub fn new(client: Client, config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let auth = Authenticator::new(client.clone(), config.auth.clone())?;
        Ok(Self { client, auth })
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// `POST /register`
    pub fn register(&self, ctx: &RequestContext, creds: &Credentials) -> Result<MessageResponse> {
        validate_username(&creds.username)?;
        validate_password(&creds.password)?;
        let hash = hash_password(&creds.password)?;
        let internal = ctx.with_viewer(Viewer::internal_authn());
        let user = self
            .client
            .users()
            .create()
            .username(creds.username.as_str())
            .password_hash(hash)
            .save(&internal)?;
        Ok(MessageResponse::new(format!(
            "created user {:?} with id {}",
            user.username, user.id
        )))
    }

    /// `POST /login`
    pub fn login(&self, ctx: &RequestContext, creds: &Credentials) -> Result<TokenResponse> {
        let (viewer, username) = self.auth.authenticate(ctx, creds)?;
        let issued = self.auth.issue_token(&viewer, &username)?;
        tracing::info!(
            target: "rowguard::auth",
            request_id = %ctx.request_id(),
            user_id = viewer.subject_id(),
            "login succeeded"
        );
        Ok(TokenResponse {
            code: 200,
            token: issued.token,
            expire: issued.expire,
        })
    }

    /// `GET /refresh_token`
    pub fn refresh_token(&self, header: Option<&str>) -> Result<TokenResponse> {
        self.refresh_token_lookup(&TokenLookup::header(header))
    }

    /// `GET /refresh_token` with the token taken from header, query or cookie.
    pub fn refresh_token_lookup(&self, lookup: &TokenLookup<'_>) -> Result<TokenResponse> {
        let token = self
            .auth
            .find_token(lookup)
            .ok_or(RowguardError::Unauthenticated)?;
        let issued = self.auth.refresh(token)?;
        Ok(TokenResponse {
            code: 200,
            token: issued.token,
            expire: issued.expire,
        })
    }

    /// Middleware step: bind the viewer from the `Authorization` header.
    pub fn authenticate_request(
        &self,
        parent: &RequestContext,
        header: Option<&str>,
    ) -> Result<RequestContext> {
        self.auth.authorize(parent, header)
    }

    /// Middleware step for requests that may carry the token outside the header.
    pub fn authenticate_lookup(
        &self,
        parent: &RequestContext,
        lookup: &TokenLookup<'_>,
    ) -> Result<RequestContext> {
        self.auth.authorize_lookup(parent, lookup)
    }

    /// `POST /todo`
    pub fn create_todo(&self, ctx: &RequestContext, input: &TodoInput) -> Result<Todo> {
        let viewer = ctx.viewer_required()?;
        self.client
            .todos()
            .create()
            .owner_id(viewer.subject_id())
            .text(input.text.as_str())
            .save(ctx)
    }

    /// `GET /todos`
    pub fn list_todos(&self, ctx: &RequestContext) -> Result<Vec<Todo>> {
        self.client.todos().query().all(ctx)
    }

    /// `PATCH /todo/:id`
    pub fn update_todo(&self, ctx: &RequestContext, id: &str, input: &TodoInput) -> Result<Todo> {
        let id = parse_id(id)?;
        self.client
            .todos()
            .update_one_id(id)
            .text(input.text.as_str())
            .save(ctx)
    }

    /// `DELETE /todo/:id`
    pub fn delete_todo(&self, ctx: &RequestContext, id: &str) -> Result<MessageResponse> {
        let id = parse_id(id)?;
        self.client.todos().delete_one_id(id).exec(ctx)?;
        Ok(MessageResponse::new(format!("deleted todo {id}")))
    }
}
