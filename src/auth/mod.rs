//! Authentication: turns credentials or a bearer token into a [`Viewer`] and binds it to
//! a request context.
//!
//! Privacy rules never authenticate anyone. They only read the viewer bound here, so the
//! sole way to reach policy evaluation with a viewer is through [`Authenticator::authorize`]
//! (or an explicit [`RequestContext::with_viewer`] in trusted code).

mod password;
mod token;

pub use password::{hash_password, validate_password, verify_password};
pub use token::Claims;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use self::token::TokenKeys;
use crate::context::RequestContext;
use crate::error::{Result, RowguardError};
use crate::store::Client;
use crate::types::{AuthConfig, Role, Viewer};

/// Login payload.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Where a request may carry its token. Sources are tried in field order and the first
/// one that yields a token wins: the `Authorization` header value, then the raw `token`
/// query parameter, then the raw `jwt` cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenLookup<'a> {
    pub authorization: Option<&'a str>,
    pub query: Option<&'a str>,
    pub cookie: Option<&'a str>,
}

impl<'a> TokenLookup<'a> {
    /// Lookup that only consults the `Authorization` header.
    #[must_use]
    pub fn header(authorization: Option<&'a str>) -> Self {
        Self {
            authorization,
            ..Self::default()
        }
    }
}

/// A signed token and the moment it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expire: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    client: Client,
    config: AuthConfig,
    keys: TokenKeys,
}

impl Authenticator {
    pub fn new(client: Client, config: AuthConfig) -> Result<Self> {
        config.validate()?;
        let keys = TokenKeys::from_secret(config.signing_key.as_bytes());
        Ok(Self {
            client,
            config,
            keys,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Check credentials and return the viewer they identify.
    ///
    /// The user lookup runs under the internal authentication viewer on a context
    /// derived from `ctx`; the caller's own binding is left untouched. Unknown users and
    /// wrong passwords fail identically.
    pub fn authenticate(
        &self,
        ctx: &RequestContext,
        creds: &Credentials,
    ) -> Result<(Viewer, String)> {
        let internal = ctx.with_viewer(Viewer::internal_authn());
        let user = self
            .client
            .users()
            .query()
            .where_username_equal_fold(creds.username.as_str())
            .first(&internal)?;
        let Some(user) = user else {
            tracing::info!(
                target: "rowguard::auth",
                request_id = %ctx.request_id(),
                username = %creds.username,
                "login failed: unknown user"
            );
            return Err(RowguardError::AuthenticationFailed);
        };
        if !verify_password(&creds.password, user.password_hash())? {
            tracing::info!(
                target: "rowguard::auth",
                request_id = %ctx.request_id(),
                user_id = user.id,
                "login failed: wrong password"
            );
            return Err(RowguardError::AuthenticationFailed);
        }
        Ok((Viewer::new(Role::VIEW, user.id), user.username))
    }

    pub fn issue_token(&self, viewer: &Viewer, username: &str) -> Result<IssuedToken> {
        self.issue_token_at(viewer, username, Utc::now().timestamp())
    }

    pub(crate) fn issue_token_at(
        &self,
        viewer: &Viewer,
        username: &str,
        issued_at: i64,
    ) -> Result<IssuedToken> {
        let claims = Claims {
            id: viewer.subject_id(),
            username: username.to_string(),
            role: viewer.role().bits(),
            exp: issued_at.saturating_add(self.ttl_secs()),
            orig_iat: issued_at,
        };
        self.sign(&claims)
    }

    /// Rebuild the viewer from a token. Expired or tampered tokens are rejected.
    pub fn reconstruct(&self, token: &str) -> Result<Viewer> {
        Ok(self.keys.verify(token, true)?.viewer())
    }

    /// Issue a fresh token for a (possibly expired) one, as long as the original login
    /// is younger than `max_refresh_secs`.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken> {
        let mut claims = self.keys.verify(token, false)?;
        let now = Utc::now().timestamp();
        let max_refresh = i64::try_from(self.config.max_refresh_secs).unwrap_or(i64::MAX);
        if claims.orig_iat.saturating_add(max_refresh) < now {
            return Err(RowguardError::TokenExpired);
        }
        claims.exp = now.saturating_add(self.ttl_secs());
        tracing::debug!(target: "rowguard::auth", user_id = claims.id, "token refreshed");
        self.sign(&claims)
    }

    /// Bind the viewer carried by an `Authorization` header value to a context derived
    /// from `parent`.
    pub fn authorize(
        &self,
        parent: &RequestContext,
        header: Option<&str>,
    ) -> Result<RequestContext> {
        self.authorize_lookup(parent, &TokenLookup::header(header))
    }

    /// Like [`Authenticator::authorize`], but takes the token from the first source in
    /// `lookup` that carries one.
    pub fn authorize_lookup(
        &self,
        parent: &RequestContext,
        lookup: &TokenLookup<'_>,
    ) -> Result<RequestContext> {
        let token = self.find_token(lookup).ok_or(RowguardError::Unauthenticated)?;
        let viewer = self.reconstruct(token)?;
        tracing::debug!(
            target: "rowguard::auth",
            request_id = %parent.request_id(),
            %viewer,
            "viewer bound"
        );
        Ok(parent.with_viewer(viewer))
    }

    pub(crate) fn find_token<'a>(&self, lookup: &TokenLookup<'a>) -> Option<&'a str> {
        let raw = |value: Option<&'a str>| value.map(str::trim).filter(|token| !token.is_empty());
        lookup
            .authorization
            .and_then(|value| self.bearer_token(value))
            .or_else(|| raw(lookup.query))
            .or_else(|| raw(lookup.cookie))
    }

    /// Token from `"<token_head_name> <token>"`, ignoring surrounding whitespace.
    fn bearer_token<'h>(&self, header: &'h str) -> Option<&'h str> {
        let (head, token) = header.trim().split_once(' ')?;
        let token = token.trim();
        (head == self.config.token_head_name && !token.is_empty()).then_some(token)
    }

    fn sign(&self, claims: &Claims) -> Result<IssuedToken> {
        let token = self.keys.sign(claims)?;
        let expire = chrono::DateTime::from_timestamp(claims.exp, 0)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        Ok(IssuedToken { token, expire })
    }

    fn ttl_secs(&self) -> i64 {
        i64::try_from(self.config.token_ttl_secs).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::privacy::Policy;
    use crate::types::PolicyOptions;

    fn setup() -> Authenticator {
        let client = Client::new(Arc::new(Policy::standard(&PolicyOptions::default()).unwrap()));
        let internal = RequestContext::background().with_viewer(Viewer::internal_authn());
        client
            .users()
            .create()
            .username("erin")
            .password_hash(hash_password("pass1234").unwrap())
            .save(&internal)
            .unwrap();
        let config = AuthConfig::builder().signing_key("test-secret").build();
        Authenticator::new(client, config).unwrap()
    }

    #[test]
    fn bad_credentials_fail_the_same_way() {
        let auth = setup();
        let ctx = RequestContext::background();
        let unknown = auth
            .authenticate(&ctx, &Credentials::new("nobody", "pass1234"))
            .unwrap_err();
        let wrong = auth
            .authenticate(&ctx, &Credentials::new("erin", "nope"))
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.http_status(), 401);
    }

    #[test]
    fn authenticate_does_not_leak_internal_viewer() {
        let auth = setup();
        let ctx = RequestContext::background();
        let (viewer, username) = auth
            .authenticate(&ctx, &Credentials::new("ERIN", "pass1234"))
            .unwrap();
        assert_eq!(viewer, Viewer::user(1));
        assert_eq!(username, "erin");
        assert!(ctx.viewer().is_none());
    }

    #[test]
    fn header_parsing() {
        let auth = setup();
        let token = auth.issue_token(&Viewer::user(1), "erin").unwrap().token;
        let parent = RequestContext::background();
        let bound = auth
            .authorize(&parent, Some(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(bound.viewer(), Some(&Viewer::user(1)));
        assert_eq!(bound.request_id(), parent.request_id());

        for header in [None, Some(""), Some("Bearer"), Some(token.as_str()), Some("Basic abc")] {
            let err = auth.authorize(&parent, header).unwrap_err();
            assert!(matches!(err, RowguardError::Unauthenticated), "{header:?}");
        }
    }

    #[test]
    fn token_sources_are_tried_in_order() {
        let auth = setup();
        let erin = auth.issue_token(&Viewer::user(1), "erin").unwrap().token;
        let frank = auth.issue_token(&Viewer::user(2), "frank").unwrap().token;
        let parent = RequestContext::background();
        let bound_to = |lookup| {
            auth.authorize_lookup(&parent, &lookup)
                .map(|ctx| ctx.viewer().map(Viewer::subject_id))
        };

        let header = format!("Bearer {erin}");
        let all = TokenLookup {
            authorization: Some(&header),
            query: Some(&frank),
            cookie: Some(&frank),
        };
        assert_eq!(bound_to(all).unwrap(), Some(1));

        let from_query = TokenLookup {
            authorization: Some("Basic abc"),
            query: Some(&frank),
            cookie: Some(&erin),
        };
        assert_eq!(bound_to(from_query).unwrap(), Some(2));

        let from_cookie = TokenLookup {
            query: Some("  "),
            cookie: Some(&erin),
            ..TokenLookup::default()
        };
        assert_eq!(bound_to(from_cookie).unwrap(), Some(1));

        assert!(matches!(
            bound_to(TokenLookup::default()).unwrap_err(),
            RowguardError::Unauthenticated
        ));
    }

    #[test]
    fn oversized_lifetime_saturates_instead_of_overflowing() {
        let auth = setup();
        let unbounded = Authenticator {
            config: AuthConfig {
                token_ttl_secs: u64::MAX,
                ..auth.config.clone()
            },
            ..auth
        };
        let issued = unbounded.issue_token(&Viewer::user(1), "erin").unwrap();
        assert_eq!(issued.expire, chrono::DateTime::<Utc>::MAX_UTC);
        let claims = unbounded.keys.verify(&issued.token, false).unwrap();
        assert_eq!(claims.exp, i64::MAX);

        let refreshed = unbounded.refresh(&issued.token).unwrap();
        assert_eq!(refreshed.expire, chrono::DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn refresh_window_is_counted_from_first_login() {
        let auth = setup();
        let now = Utc::now().timestamp();
        let stale = auth
            .issue_token_at(&Viewer::user(1), "erin", now - 2 * 3600)
            .unwrap();
        assert!(matches!(
            auth.refresh(&stale.token).unwrap_err(),
            RowguardError::TokenExpired
        ));

        let short = Authenticator::new(
            auth.client.clone(),
            AuthConfig::builder()
                .signing_key("test-secret")
                .token_ttl_secs(60)
                .build(),
        )
        .unwrap();
        let expired = short
            .issue_token_at(&Viewer::user(1), "erin", now - 600)
            .unwrap();
        assert!(matches!(
            short.reconstruct(&expired.token).unwrap_err(),
            RowguardError::TokenExpired
        ));
        let refreshed = short.refresh(&expired.token).unwrap();
        assert!(refreshed.expire > expired.expire);
        let claims = short.keys.verify(&refreshed.token, true).unwrap();
        assert_eq!(claims.orig_iat, now - 600);
        assert_eq!(short.reconstruct(&refreshed.token).unwrap(), Viewer::user(1));
    }
}
