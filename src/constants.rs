//! Shared constants.

/// Subject id bound to the internal authentication viewer. Real user ids start at 1.
pub const INTERNAL_AUTHN_SUBJECT_ID: i64 = 0;

pub const DEFAULT_REALM: &str = "rowguard";
pub const DEFAULT_TOKEN_HEAD_NAME: &str = "Bearer";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_MAX_REFRESH_SECS: u64 = 60 * 60;
/// Upper bound for both the token lifetime and the refresh window.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

pub const USERNAME_MAX_CHARS: usize = 64;
pub const PASSWORD_MIN_CHARS: usize = 4;
pub const PASSWORD_MAX_CHARS: usize = 32;

/// Column holding the todo → user ownership edge.
pub const TODO_OWNER_COLUMN: &str = "user_todos";
pub const ID_COLUMN: &str = "id";
