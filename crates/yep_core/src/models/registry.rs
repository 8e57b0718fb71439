//! The model registry.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::methods::{base, Method, Super};
use crate::models::{bootstrap, Field, Model, ModelOptions};
use crate::recordset::RecordSet;
use crate::security::{RecordRule, SecurityRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// All models of an application, with their security settings.
///
/// A registry is built in two phases. First models, fields and methods are
/// declared; then [`Registry::bootstrap`] resolves relations, builds the
/// dependency graph and freezes the declarations. Only a bootstrapped
/// registry can back an [`Engine`](crate::Engine).
#[derive(Debug)]
pub struct Registry {
    config: Config,
    models: BTreeMap<String, Arc<Model>>,
    security: SecurityRegistry,
    bootstrapped: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty registry.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let security = SecurityRegistry::new(&config);
        Self {
            config,
            models: BTreeMap::new(),
            security,
            bootstrapped: false,
        }
    }

    /// The registry configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Groups and record rules.
    #[must_use]
    pub fn security(&self) -> &SecurityRegistry {
        &self.security
    }

    /// Returns true once [`Registry::bootstrap`] succeeded.
    #[must_use]
    pub const fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Declares a model with the base methods every model has.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateModel` if the name is taken and
    /// `AlreadyBootstrapped` once the registry is frozen.
    pub fn new_model(&mut self, name: &str) -> CoreResult<Arc<Model>> {
        self.add_model(name, ModelOptions::empty())
    }

    pub(crate) fn add_model(&mut self, name: &str, options: ModelOptions) -> CoreResult<Arc<Model>> {
        if self.bootstrapped {
            return Err(CoreError::AlreadyBootstrapped);
        }
        if self.models.contains_key(name) {
            return Err(CoreError::DuplicateModel {
                model: name.to_string(),
            });
        }
        let model = Arc::new(Model::new(name, options));
        base::declare(&model)?;
        self.models.insert(name.to_string(), Arc::clone(&model));
        debug!(model = name, ?options, "model registered");
        Ok(model)
    }

    /// Returns a model by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    /// Returns a model by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` if no model has this name.
    pub fn must_get(&self, name: &str) -> CoreResult<Arc<Model>> {
        self.get(name).ok_or_else(|| CoreError::unknown_model(name))
    }

    /// All models, sorted by name.
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    /// Adds fields to a model.
    ///
    /// # Errors
    ///
    /// Fails if the model is unknown or a field cannot be added.
    pub fn add_fields(&self, model: &str, fields: impl IntoIterator<Item = Field>) -> CoreResult<()> {
        self.must_get(model)?.add_fields(fields)?;
        Ok(())
    }

    /// Declares a new method on a model.
    ///
    /// # Errors
    ///
    /// See [`Model::create_method`].
    pub fn create_method<A, R, F>(&self, model: &str, name: &str, layer: F) -> CoreResult<Arc<Method>>
    where
        A: 'static,
        R: 'static,
        F: Fn(&RecordSet, &Super<A, R>, A) -> CoreResult<R> + Send + Sync + 'static,
    {
        self.must_get(model)?.create_method(name, layer)
    }

    /// Adds a layer on top of a method of a model.
    ///
    /// # Errors
    ///
    /// See [`Model::extend_method`].
    pub fn extend_method<A, R, F>(&self, model: &str, name: &str, layer: F) -> CoreResult<Arc<Method>>
    where
        A: 'static,
        R: 'static,
        F: Fn(&RecordSet, &Super<A, R>, A) -> CoreResult<R> + Send + Sync + 'static,
    {
        self.must_get(model)?.extend_method(name, layer)
    }

    /// Adds a record rule to a model, replacing one with the same name.
    ///
    /// # Errors
    ///
    /// Fails if the model or the rule's group is unknown.
    pub fn add_record_rule(&self, model: &str, rule: RecordRule) -> CoreResult<()> {
        self.must_get(model)?;
        if let Some(group) = rule.group() {
            if !self.security.groups().contains(group) {
                return Err(CoreError::UnknownGroup {
                    group: group.to_string(),
                });
            }
        }
        self.security.rules().add(model, rule);
        Ok(())
    }

    /// Removes a record rule by name. Returns false if it did not exist.
    pub fn remove_record_rule(&self, model: &str, name: &str) -> bool {
        self.security.rules().remove(model, name)
    }

    /// Resolves a dotted path from `model`.
    ///
    /// Every token but the last must be a relation field. Returns the model
    /// owning the last field and the field itself.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedPath` if a token is unknown or not a relation.
    pub fn resolve_path(&self, model: &str, path: &str) -> CoreResult<(Arc<Model>, Arc<Field>)> {
        let tokens: Vec<&str> = path.split('.').collect();
        let (last, prefix) = tokens
            .split_last()
            .ok_or_else(|| CoreError::unresolved_path(model, path, "empty path"))?;
        let owner = self.follow(model, prefix, path)?;
        let field = owner
            .fields()
            .get(last)
            .ok_or_else(|| CoreError::unresolved_path(model, path, format!("no field {last} on {}", owner.name())))?;
        Ok((owner, field))
    }

    /// Follows relation fields `tokens` from `model` and returns the model reached.
    pub(crate) fn follow(&self, model: &str, tokens: &[&str], path: &str) -> CoreResult<Arc<Model>> {
        let mut current = self.must_get(model)?;
        for token in tokens {
            let field = current.fields().get(token).ok_or_else(|| {
                CoreError::unresolved_path(model, path, format!("no field {token} on {}", current.name()))
            })?;
            let target = field.relation_model().filter(|_| field.field_type().is_relation());
            let target = target.ok_or_else(|| {
                CoreError::unresolved_path(model, path, format!("{token} is not a relation"))
            })?;
            current = self.must_get(target)?;
        }
        Ok(current)
    }

    /// Resolves relations, builds the dependency graph, checks compute
    /// methods and freezes every model.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found. The registry is left
    /// unbootstrapped in that case.
    pub fn bootstrap(&mut self) -> CoreResult<()> {
        if self.bootstrapped {
            return Err(CoreError::AlreadyBootstrapped);
        }
        bootstrap::create_m2m_links(self)?;
        bootstrap::check_relations(self)?;
        bootstrap::check_related_fields(self)?;
        bootstrap::check_compute_methods(self)?;
        bootstrap::process_depends(self)?;
        bootstrap::check_cycles(self)?;
        for model in self.models.values() {
            model.mark_bootstrapped();
        }
        self.bootstrapped = true;
        info!(models = self.models.len(), "registry bootstrapped");
        Ok(())
    }
}
