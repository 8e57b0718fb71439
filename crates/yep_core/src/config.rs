//! Registry configuration.

use crate::security::UserId;

/// Configuration of a model registry.
///
/// Group names are needed while models are declared (method and field
/// permissions default to them), so the configuration is handed to the
/// registry at construction and shared with every engine opened on it.
#[derive(Debug, Clone)]
pub struct Config {
    /// The user that belongs to the admin group without explicit membership.
    pub superuser_id: UserId,

    /// Group allowed to execute every method and access every field.
    pub admin_group: String,

    /// Group every user implicitly belongs to.
    pub everyone_group: String,

    /// Result bound of a name search that gives no explicit limit.
    pub name_search_limit: usize,

    /// Maximum nesting of recomputations triggered by one write.
    pub max_recompute_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            superuser_id: UserId::new(1),
            admin_group: "admin".to_string(),
            everyone_group: "everyone".to_string(),
            name_search_limit: 80,
            max_recompute_depth: 32,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the superuser id.
    #[must_use]
    pub const fn superuser_id(mut self, uid: UserId) -> Self {
        self.superuser_id = uid;
        self
    }

    /// Sets the admin group id.
    #[must_use]
    pub fn admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_group = group.into();
        self
    }

    /// Sets the everyone group id.
    #[must_use]
    pub fn everyone_group(mut self, group: impl Into<String>) -> Self {
        self.everyone_group = group.into();
        self
    }

    /// Sets the default name search limit.
    #[must_use]
    pub const fn name_search_limit(mut self, limit: usize) -> Self {
        self.name_search_limit = limit;
        self
    }

    /// Sets the maximum recomputation depth.
    #[must_use]
    pub const fn max_recompute_depth(mut self, depth: usize) -> Self {
        self.max_recompute_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.superuser_id, UserId::new(1));
        assert_eq!(config.admin_group, "admin");
        assert_eq!(config.everyone_group, "everyone");
        assert_eq!(config.name_search_limit, 80);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .admin_group("root")
            .name_search_limit(10)
            .max_recompute_depth(4);

        assert_eq!(config.admin_group, "root");
        assert_eq!(config.name_search_limit, 10);
        assert_eq!(config.max_recompute_depth, 4);
    }
}
