//! Access control lists for fields and methods.

use crate::security::Permission;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Per-field access control.
///
/// Every user starts with full access through the everyone group. Revoking
/// a permission from a group removes it from that baseline for the group's
/// members; an explicit grant to another group of the same user still
/// applies. Members of the admin group always have full access.
#[derive(Debug, Default)]
pub struct AccessControlList {
    inner: RwLock<AclEntries>,
}

#[derive(Debug, Default)]
struct AclEntries {
    granted: HashMap<String, Permission>,
    revoked: HashMap<String, Permission>,
}

impl AccessControlList {
    /// Creates an ACL giving everyone full access.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `perm` to `group`.
    pub fn grant(&self, group: &str, perm: Permission) {
        let mut entries = self.inner.write();
        *entries.granted.entry(group.to_string()).or_default() |= perm;
        if let Some(revoked) = entries.revoked.get_mut(group) {
            revoked.remove(perm);
        }
    }

    /// Revokes `perm` from `group`.
    pub fn revoke(&self, group: &str, perm: Permission) {
        let mut entries = self.inner.write();
        *entries.revoked.entry(group.to_string()).or_default() |= perm;
        if let Some(granted) = entries.granted.get_mut(group) {
            granted.remove(perm);
        }
    }

    /// Effective permission of a user belonging to `groups`.
    #[must_use]
    pub fn permission(&self, groups: &BTreeSet<String>, admin: &str, everyone: &str) -> Permission {
        if groups.contains(admin) {
            return Permission::ALL;
        }
        let entries = self.inner.read();
        let mut explicit = Permission::empty();
        let mut revoked = Permission::empty();
        for group in groups {
            if group != everyone {
                explicit |= entries.granted.get(group).copied().unwrap_or_default();
            }
            revoked |= entries.revoked.get(group).copied().unwrap_or_default();
        }
        explicit | (Permission::ALL - revoked)
    }
}

/// Reference to a method, used to condition grants on the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallerRef {
    /// Model of the calling method.
    pub model: String,
    /// Name of the calling method.
    pub method: String,
}

impl CallerRef {
    /// Creates a caller reference.
    pub fn new(model: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for CallerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model, self.method)
    }
}

#[derive(Debug, Clone, Default)]
struct Grant {
    unconditional: bool,
    callers: BTreeSet<CallerRef>,
}

/// Method execution grants.
///
/// A grant lets a group execute a method either unconditionally or only
/// when the immediate caller is one of a set of methods. Members of the
/// admin group may always execute every method.
#[derive(Debug, Default)]
pub struct MethodAcl {
    grants: RwLock<HashMap<String, Grant>>,
}

impl MethodAcl {
    /// Allows `group` to execute the method. With no callers the grant is
    /// unconditional, otherwise it only holds when called from one of them.
    pub fn allow(&self, group: &str, callers: impl IntoIterator<Item = CallerRef>) {
        let mut grants = self.grants.write();
        let grant = grants.entry(group.to_string()).or_default();
        let mut callers = callers.into_iter().peekable();
        if callers.peek().is_none() {
            grant.unconditional = true;
        }
        grant.callers.extend(callers);
    }

    /// Removes every grant of `group`.
    pub fn revoke(&self, group: &str) {
        self.grants.write().remove(group);
    }

    /// Decides whether a user belonging to `groups` may execute the method
    /// when called from `caller`.
    #[must_use]
    pub fn is_allowed(
        &self,
        groups: &BTreeSet<String>,
        admin: &str,
        caller: Option<&CallerRef>,
    ) -> bool {
        if groups.contains(admin) {
            return true;
        }
        let grants = self.grants.read();
        groups.iter().filter_map(|g| grants.get(g)).any(|grant| {
            grant.unconditional || caller.is_some_and(|c| grant.callers.contains(c))
        })
    }

    /// Groups holding a grant, sorted.
    #[must_use]
    pub fn granted_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.grants.read().keys().cloned().collect();
        groups.sort();
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn everyone_has_full_access_by_default() {
        let acl = AccessControlList::new();
        assert_eq!(
            acl.permission(&groups(&["everyone"]), "admin", "everyone"),
            Permission::ALL
        );
    }

    #[test]
    fn revocation_applies_to_members_only() {
        let acl = AccessControlList::new();
        acl.revoke("interns", Permission::READ);

        let intern = acl.permission(&groups(&["everyone", "interns"]), "admin", "everyone");
        assert!(!intern.contains(Permission::READ));
        assert!(intern.contains(Permission::WRITE));

        let other = acl.permission(&groups(&["everyone", "sales"]), "admin", "everyone");
        assert_eq!(other, Permission::ALL);
    }

    #[test]
    fn explicit_grant_overrides_revocation_of_another_group() {
        let acl = AccessControlList::new();
        acl.revoke("everyone", Permission::WRITE);
        acl.grant("managers", Permission::WRITE);

        let plain = acl.permission(&groups(&["everyone"]), "admin", "everyone");
        assert!(!plain.contains(Permission::WRITE));
        let manager = acl.permission(&groups(&["everyone", "managers"]), "admin", "everyone");
        assert!(manager.contains(Permission::WRITE));
    }

    #[test]
    fn admin_always_has_access() {
        let acl = AccessControlList::new();
        acl.revoke("everyone", Permission::ALL);
        assert_eq!(
            acl.permission(&groups(&["everyone", "admin"]), "admin", "everyone"),
            Permission::ALL
        );
    }

    #[test]
    fn method_grants() {
        let acl = MethodAcl::default();
        let user = groups(&["everyone", "sales"]);
        assert!(!acl.is_allowed(&user, "admin", None));
        assert!(acl.is_allowed(&groups(&["admin"]), "admin", None));

        acl.allow("sales", []);
        assert!(acl.is_allowed(&user, "admin", None));
        acl.revoke("sales");
        assert!(!acl.is_allowed(&user, "admin", None));
    }

    #[test]
    fn caller_conditioned_grant() {
        let acl = MethodAcl::default();
        let create = CallerRef::new("Partner", "Create");
        acl.allow("sales", [create.clone()]);

        let user = groups(&["everyone", "sales"]);
        assert!(!acl.is_allowed(&user, "admin", None));
        assert!(!acl.is_allowed(&user, "admin", Some(&CallerRef::new("Partner", "Copy"))));
        assert!(acl.is_allowed(&user, "admin", Some(&create)));
        assert_eq!(acl.granted_groups(), vec!["sales"]);
    }
}
