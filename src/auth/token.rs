//! Signed bearer tokens (HS256).

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RowguardError};
use crate::types::{Role, Viewer};

/// Token payload. `orig_iat` is the time of the original login and survives refreshes.
///
/// `role` holds the raw [`Role`] bits so the claim stays a plain number on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub role: u32,
    pub exp: i64,
    pub orig_iat: i64,
}

impl Claims {
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        Viewer::new(Role::from_bits_retain(self.role), self.id)
    }
}

#[derive(Clone)]
pub(crate) struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub(crate) fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(
            |err| RowguardError::InvalidToken {
                reason: err.to_string(),
            },
        )
    }

    /// Verify signature and, when `check_exp` is set, expiry (no leeway).
    pub(crate) fn verify(&self, token: &str, check_exp: bool) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => RowguardError::TokenExpired,
                _ => RowguardError::InvalidToken {
                    reason: err.to_string(),
                },
            })
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenKeys(..)")
    }
}
