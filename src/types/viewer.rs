//! Viewer identity attached to each request.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Capability bits held by a viewer.
    ///
    /// Bit 0 is unused so that a zero value always means "no capability".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Role: u32 {
        /// Bypasses ownership narrowing on user rows.
        const ADMIN = 1 << 1;

        /// Regular signed-in user.
        const VIEW = 1 << 2;

        const NONE = 0;
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::NONE
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        bitflags::parser::to_writer(self, f)
    }
}

/// Who is making the current request.
///
/// Built once per authenticated request and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewer {
    role: Role,
    id: i64,
}

impl Viewer {
    #[must_use]
    pub const fn new(role: Role, id: i64) -> Self {
        Self { role, id }
    }

    /// Regular signed-in user.
    #[must_use]
    pub const fn user(id: i64) -> Self {
        Self::new(Role::VIEW, id)
    }

    /// Identity used by the service itself for credential lookups and registration.
    #[must_use]
    pub const fn internal_authn() -> Self {
        Self::new(Role::ADMIN, crate::constants::INTERNAL_AUTHN_SUBJECT_ID)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn admin(&self) -> bool {
        self.role.contains(Role::ADMIN)
    }

    #[must_use]
    pub const fn subject_id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer {} ({})", self.id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_role_grants_nothing() {
        let viewer = Viewer::new(Role::NONE, 9);
        assert!(!viewer.admin());
        assert!(!viewer.role().intersects(Role::ADMIN | Role::VIEW));
        assert_eq!(Role::default(), Role::NONE);
        assert_eq!(Role::NONE.to_string(), "none");
    }

    #[test]
    fn role_bits_match_wire_values() {
        assert_eq!(Role::ADMIN.bits(), 2);
        assert_eq!(Role::VIEW.bits(), 4);
        let both = Role::ADMIN | Role::VIEW;
        assert!(both.contains(Role::ADMIN));
        assert!(both.contains(Role::VIEW));
        assert_eq!(both.to_string(), "ADMIN | VIEW");
    }

    #[test]
    fn unknown_bits_survive_decoding() {
        let role = Role::from_bits_retain(1 | Role::VIEW.bits());
        assert_eq!(role.bits(), 5);
        assert!(role.contains(Role::VIEW));
        assert!(!Viewer::new(role, 1).admin());
        assert_eq!(Role::from_bits(1), None);
    }

    #[test]
    fn accessors_are_pure() {
        let viewer = Viewer::user(42);
        assert_eq!(viewer.subject_id(), 42);
        assert!(!viewer.admin());
        assert!(Viewer::internal_authn().admin());
    }
}
