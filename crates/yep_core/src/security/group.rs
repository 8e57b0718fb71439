//! Groups and user memberships.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::security::UserId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// A security group.
///
/// Members of a group also belong to every group it inherits from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: String,
    name: String,
    inherits: Vec<String>,
}

impl Group {
    /// The group id, used in grants and rules.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of the groups this group inherits from.
    #[must_use]
    pub fn inherits(&self) -> &[String] {
        &self.inherits
    }
}

/// Registry of groups and of the users belonging to them.
///
/// The admin and everyone groups always exist. The superuser belongs to
/// the admin group and every user belongs to the everyone group, without
/// explicit membership.
#[derive(Debug)]
pub struct GroupRegistry {
    admin: String,
    everyone: String,
    superuser: UserId,
    groups: RwLock<BTreeMap<String, Group>>,
    memberships: RwLock<HashMap<UserId, BTreeSet<String>>>,
}

impl GroupRegistry {
    pub(crate) fn new(config: &Config) -> Self {
        let mut groups = BTreeMap::new();
        for (id, name) in [
            (&config.admin_group, "Administrators"),
            (&config.everyone_group, "Everyone"),
        ] {
            groups.insert(
                id.clone(),
                Group {
                    id: id.clone(),
                    name: name.to_string(),
                    inherits: Vec::new(),
                },
            );
        }
        Self {
            admin: config.admin_group.clone(),
            everyone: config.everyone_group.clone(),
            superuser: config.superuser_id,
            groups: RwLock::new(groups),
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Id of the admin group.
    #[must_use]
    pub fn admin_group(&self) -> &str {
        &self.admin
    }

    /// Id of the everyone group.
    #[must_use]
    pub fn everyone_group(&self) -> &str {
        &self.everyone
    }

    /// The superuser id.
    #[must_use]
    pub fn superuser(&self) -> UserId {
        self.superuser
    }

    /// Declares a group, or redefines it if the id already exists.
    ///
    /// # Errors
    ///
    /// Returns `UnknownGroup` if one of the inherited groups does not exist.
    pub fn new_group(&self, id: &str, name: &str, inherits: &[&str]) -> CoreResult<()> {
        let mut groups = self.groups.write();
        if let Some(missing) = inherits.iter().find(|g| !groups.contains_key(**g)) {
            return Err(CoreError::UnknownGroup {
                group: (*missing).to_string(),
            });
        }
        debug!(group = id, ?inherits, "declaring group");
        groups.insert(
            id.to_string(),
            Group {
                id: id.to_string(),
                name: name.to_string(),
                inherits: inherits.iter().map(|g| (*g).to_string()).collect(),
            },
        );
        Ok(())
    }

    /// Returns a group by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Group> {
        self.groups.read().get(id).cloned()
    }

    /// Returns true if the group exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.groups.read().contains_key(id)
    }

    /// Adds a user to a group.
    ///
    /// # Errors
    ///
    /// Returns `UnknownGroup` if the group does not exist.
    pub fn add_membership(&self, uid: UserId, group: &str) -> CoreResult<()> {
        if !self.contains(group) {
            return Err(CoreError::UnknownGroup {
                group: group.to_string(),
            });
        }
        self.memberships
            .write()
            .entry(uid)
            .or_default()
            .insert(group.to_string());
        Ok(())
    }

    /// Removes a user from a group. Returns false if the user was not a member.
    pub fn remove_membership(&self, uid: UserId, group: &str) -> bool {
        self.memberships
            .write()
            .get_mut(&uid)
            .is_some_and(|groups| groups.remove(group))
    }

    /// Groups the user was explicitly added to.
    #[must_use]
    pub fn direct_groups(&self, uid: UserId) -> BTreeSet<String> {
        self.memberships
            .read()
            .get(&uid)
            .cloned()
            .unwrap_or_default()
    }

    /// Every group the user belongs to, inherited and implicit ones included.
    #[must_use]
    pub fn user_groups(&self, uid: UserId) -> BTreeSet<String> {
        let mut pending: Vec<String> = self.direct_groups(uid).into_iter().collect();
        if uid == self.superuser {
            pending.push(self.admin.clone());
        }
        pending.push(self.everyone.clone());

        let groups = self.groups.read();
        let mut visited = BTreeSet::new();
        while let Some(id) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(group) = groups.get(&id) {
                pending.extend(group.inherits.iter().cloned());
            }
        }
        visited
    }

    /// Returns true if the user belongs to the admin group.
    #[must_use]
    pub fn is_admin(&self, uid: UserId) -> bool {
        self.user_groups(uid).contains(&self.admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> GroupRegistry {
        GroupRegistry::new(&Config::default())
    }

    #[test]
    fn builtin_groups_exist() {
        let groups = registry();
        assert!(groups.contains("admin"));
        assert!(groups.contains("everyone"));
    }

    #[test]
    fn every_user_is_in_everyone() {
        let groups = registry();
        let set = groups.user_groups(UserId::new(42));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["everyone"]);
    }

    #[test]
    fn superuser_is_admin() {
        let groups = registry();
        assert!(groups.is_admin(UserId::new(1)));
        assert!(!groups.is_admin(UserId::new(2)));
    }

    #[test]
    fn inheritance_is_transitive() {
        let groups = registry();
        groups.new_group("user", "User", &[]).unwrap();
        groups.new_group("manager", "Manager", &["user"]).unwrap();
        groups.new_group("director", "Director", &["manager"]).unwrap();
        groups.add_membership(UserId::new(5), "director").unwrap();

        let set = groups.user_groups(UserId::new(5));
        assert!(set.contains("user"));
        assert!(set.contains("manager"));
        assert!(!set.contains("admin"));
    }

    #[test]
    fn redefinition_cycles_terminate() {
        let groups = registry();
        groups.new_group("a", "A", &[]).unwrap();
        groups.new_group("b", "B", &["a"]).unwrap();
        groups.new_group("a", "A", &["b"]).unwrap();
        groups.add_membership(UserId::new(3), "a").unwrap();
        assert!(groups.user_groups(UserId::new(3)).contains("b"));
    }

    #[test]
    fn unknown_groups_are_rejected() {
        let groups = registry();
        assert!(matches!(
            groups.add_membership(UserId::new(2), "ghost"),
            Err(CoreError::UnknownGroup { .. })
        ));
        assert!(groups.new_group("x", "X", &["ghost"]).is_err());
    }

    #[test]
    fn membership_can_be_removed() {
        let groups = registry();
        groups.new_group("sales", "Sales", &[]).unwrap();
        groups.add_membership(UserId::new(2), "sales").unwrap();
        assert!(groups.remove_membership(UserId::new(2), "sales"));
        assert!(!groups.remove_membership(UserId::new(2), "sales"));
        assert!(!groups.user_groups(UserId::new(2)).contains("sales"));
    }
}
