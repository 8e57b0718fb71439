//! Security: groups, method execution control, field access control and
//! record rules.
//!
//! Every check below is skipped for environments in sudo mode.
//!
//! - **Method execution control** decides whether a user may call a method,
//!   optionally only from a given caller method ([`MethodAcl`]).
//! - **Field access control** masks unreadable fields and drops unwritable
//!   ones ([`AccessControlList`]).
//! - **Record rules** narrow the records a user may read, write or unlink
//!   ([`RecordRule`]).

mod acl;
mod group;
mod rules;

pub use acl::{AccessControlList, CallerRef, MethodAcl};
pub use group::{Group, GroupRegistry};
pub use rules::{RecordRule, RuleFilter, RuleRegistry};

use std::fmt;

bitflags::bitflags! {
    /// Access permissions on fields and records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permission: u8 {
        /// Read access.
        const READ = 1 << 0;
        /// Write access.
        const WRITE = 1 << 1;
        /// Unlink (delete) access.
        const UNLINK = 1 << 2;
        /// Every permission.
        const ALL = Self::READ.bits() | Self::WRITE.bits() | Self::UNLINK.bits();
    }
}

/// Identity of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Groups and record rules of a registry.
///
/// Both are mutable at runtime: memberships, grants and rules may change
/// after bootstrap.
#[derive(Debug)]
pub struct SecurityRegistry {
    groups: GroupRegistry,
    rules: RuleRegistry,
}

impl SecurityRegistry {
    pub(crate) fn new(config: &crate::Config) -> Self {
        Self {
            groups: GroupRegistry::new(config),
            rules: RuleRegistry::new(),
        }
    }

    /// The group registry.
    #[must_use]
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// The record rule registry.
    #[must_use]
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }
}
