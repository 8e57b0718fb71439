//! Record rules.

use crate::condition::Condition;
use crate::security::Permission;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// A row-level restriction on a model.
///
/// Global rules apply to every user. Group rules apply to the members of
/// their group.
#[derive(Debug, Clone)]
pub struct RecordRule {
    name: String,
    global: bool,
    group: Option<String>,
    condition: Condition,
    perms: Permission,
}

impl RecordRule {
    /// Creates a rule applying to every user.
    pub fn global(name: impl Into<String>, condition: Condition, perms: Permission) -> Self {
        Self {
            name: name.into(),
            global: true,
            group: None,
            condition,
            perms,
        }
    }

    /// Creates a rule applying to the members of `group`.
    pub fn for_group(
        name: impl Into<String>,
        group: impl Into<String>,
        condition: Condition,
        perms: Permission,
    ) -> Self {
        Self {
            name: name.into(),
            global: false,
            group: Some(group.into()),
            condition,
            perms,
        }
    }

    /// Rule name, unique per model.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for global rules.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.global
    }

    /// The group of a group rule.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// The condition records must satisfy.
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// The permissions the rule restricts.
    #[must_use]
    pub const fn perms(&self) -> Permission {
        self.perms
    }
}

/// Outcome of combining the record rules of a model for one user.
#[derive(Debug, Clone)]
pub enum RuleFilter {
    /// No rule restricts the permission.
    Unrestricted,
    /// Records must satisfy the condition.
    Restricted(Condition),
    /// Group rules exist but the user is in none of their groups.
    Denied,
}

/// Record rules of every model, keyed by rule name.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<String, BTreeMap<String, RecordRule>>>,
}

impl RuleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a rule to a model, replacing a rule of the same name.
    pub fn add(&self, model: &str, rule: RecordRule) {
        debug!(model, rule = rule.name(), "adding record rule");
        self.rules
            .write()
            .entry(model.to_string())
            .or_default()
            .insert(rule.name.clone(), rule);
    }

    /// Removes a rule. Returns false if the model had no rule of that name.
    pub fn remove(&self, model: &str, name: &str) -> bool {
        self.rules
            .write()
            .get_mut(model)
            .is_some_and(|rules| rules.remove(name).is_some())
    }

    /// Rules of a model, sorted by name.
    #[must_use]
    pub fn rules_of(&self, model: &str) -> Vec<RecordRule> {
        self.rules
            .read()
            .get(model)
            .map(|rules| rules.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Combines the rules restricting `perm` on `model` for a user in `groups`.
    ///
    /// Global rules are intersected. When group rules exist for the
    /// permission, the user must also satisfy one of the rules of a group
    /// they belong to; a user in none of those groups is denied.
    #[must_use]
    pub fn filter(&self, model: &str, perm: Permission, groups: &BTreeSet<String>) -> RuleFilter {
        let rules = self.rules.read();
        let Some(rules) = rules.get(model) else {
            return RuleFilter::Unrestricted;
        };

        let mut global = Vec::new();
        let mut has_group_rules = false;
        let mut granted = Vec::new();
        for rule in rules.values().filter(|r| r.perms.intersects(perm)) {
            if rule.global {
                global.push(rule.condition.clone());
                continue;
            }
            has_group_rules = true;
            if rule.group.as_ref().is_some_and(|g| groups.contains(g)) {
                granted.push(rule.condition.clone());
            }
        }

        if has_group_rules {
            if granted.is_empty() {
                return RuleFilter::Denied;
            }
            global.push(Condition::any(granted));
        }
        if global.is_empty() {
            RuleFilter::Unrestricted
        } else {
            RuleFilter::Restricted(Condition::all(global))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;

    fn groups(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn no_rules_means_unrestricted() {
        let rules = RuleRegistry::new();
        assert!(matches!(
            rules.filter("Post", Permission::READ, &groups(&["everyone"])),
            RuleFilter::Unrestricted
        ));
    }

    #[test]
    fn rules_only_restrict_their_permissions() {
        let rules = RuleRegistry::new();
        rules.add(
            "Post",
            RecordRule::global("published", Condition::eq("Published", true), Permission::WRITE),
        );
        assert!(matches!(
            rules.filter("Post", Permission::READ, &groups(&["everyone"])),
            RuleFilter::Unrestricted
        ));
        assert!(matches!(
            rules.filter("Post", Permission::WRITE, &groups(&["everyone"])),
            RuleFilter::Restricted(_)
        ));
    }

    #[test]
    fn outsiders_of_rule_groups_are_denied() {
        let rules = RuleRegistry::new();
        rules.add(
            "Post",
            RecordRule::for_group(
                "own",
                "writers",
                Condition::new("Title", Operator::Like, "%"),
                Permission::ALL,
            ),
        );
        assert!(matches!(
            rules.filter("Post", Permission::READ, &groups(&["everyone"])),
            RuleFilter::Denied
        ));
        assert!(matches!(
            rules.filter("Post", Permission::READ, &groups(&["everyone", "writers"])),
            RuleFilter::Restricted(_)
        ));
    }

    #[test]
    fn rules_are_removed_by_name() {
        let rules = RuleRegistry::new();
        rules.add("Post", RecordRule::global("r", Condition::eq("A", 1), Permission::READ));
        assert_eq!(rules.rules_of("Post").len(), 1);
        assert!(rules.remove("Post", "r"));
        assert!(!rules.remove("Post", "r"));
        assert!(rules.rules_of("Post").is_empty());
    }
}
