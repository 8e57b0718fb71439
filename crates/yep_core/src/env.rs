//! Environments and the engine.

use crate::cache::RecordCache;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::models::Registry;
use crate::recordset::RecordSet;
use crate::security::{CallerRef, UserId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use yep_store::{StatsSnapshot, Store, TransactionId};
use yep_value::{RecordId, Value};

/// Free-form key/value settings travelling with an environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the key is set to a non-zero value.
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_zero())
    }

    /// Sets a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns a copy with a value set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Iterates over the settings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One frame of the method call stack.
#[derive(Debug)]
pub(crate) struct CallFrame {
    caller: CallerRef,
    parent: Option<Arc<CallFrame>>,
}

/// State shared by every environment of one transaction.
#[derive(Debug, Default)]
pub(crate) struct TxScope {
    pub(crate) cache: RecordCache,
    recomputing: Mutex<HashSet<(String, String, RecordId)>>,
    depth: AtomicUsize,
}

impl TxScope {
    /// Marks a recomputation as running. Returns false if it already is.
    pub(crate) fn begin_recompute(&self, model: &str, field: &str, id: RecordId) -> bool {
        self.recomputing
            .lock()
            .insert((model.to_string(), field.to_string(), id))
    }

    pub(crate) fn end_recompute(&self, model: &str, field: &str, id: RecordId) {
        self.recomputing
            .lock()
            .remove(&(model.to_string(), field.to_string(), id));
    }

    /// Enters one level of nested recomputation and returns the new depth.
    pub(crate) fn enter(&self) -> usize {
        self.depth.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn leave(&self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Shared {
    registry: Arc<Registry>,
    store: Arc<dyn Store>,
}

/// The context every record set operates in: a transaction, a user, a
/// context map, the sudo flag and the method call stack.
///
/// Environments are immutable. Every modifier returns a new environment
/// sharing the transaction and its record cache.
#[derive(Clone)]
pub struct Environment {
    shared: Arc<Shared>,
    tx: TransactionId,
    uid: UserId,
    context: Arc<Context>,
    sudo: bool,
    frame: Option<Arc<CallFrame>>,
    scope: Arc<TxScope>,
}

impl Environment {
    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.shared.store.as_ref()
    }

    /// The registry configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.shared.registry.config()
    }

    /// The store transaction.
    #[must_use]
    pub const fn tx(&self) -> TransactionId {
        self.tx
    }

    /// The current user.
    #[must_use]
    pub const fn uid(&self) -> UserId {
        self.uid
    }

    /// The context map.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns true if security checks are bypassed.
    #[must_use]
    pub const fn is_sudo(&self) -> bool {
        self.sudo
    }

    /// Returns true if the current user is the superuser.
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.uid == self.config().superuser_id
    }

    /// Every group the current user belongs to.
    #[must_use]
    pub fn user_groups(&self) -> BTreeSet<String> {
        self.registry().security().groups().user_groups(self.uid)
    }

    /// The method that made the current call, if any.
    #[must_use]
    pub fn caller(&self) -> Option<&CallerRef> {
        self.frame.as_deref().map(|f| &f.caller)
    }

    /// The method call stack, innermost first.
    #[must_use]
    pub fn call_stack(&self) -> Vec<CallerRef> {
        let mut out = Vec::new();
        let mut frame = self.frame.as_deref();
        while let Some(f) = frame {
            out.push(f.caller.clone());
            frame = f.parent.as_deref();
        }
        out
    }

    /// An environment bypassing security for the same user.
    #[must_use]
    pub fn sudo(&self) -> Self {
        Self {
            sudo: true,
            ..self.clone()
        }
    }

    /// An environment bypassing security, acting as `uid`.
    #[must_use]
    pub fn sudo_as(&self, uid: UserId) -> Self {
        Self {
            uid,
            sudo: true,
            ..self.clone()
        }
    }

    /// An environment acting as `uid` with security enforced.
    #[must_use]
    pub fn with_user(&self, uid: UserId) -> Self {
        Self {
            uid,
            sudo: false,
            ..self.clone()
        }
    }

    /// An environment with one more context value.
    #[must_use]
    pub fn with_context(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let context = (*self.context).clone().with(key, value);
        Self {
            context: Arc::new(context),
            ..self.clone()
        }
    }

    /// An environment with its context replaced.
    #[must_use]
    pub fn with_new_context(&self, context: Context) -> Self {
        Self {
            context: Arc::new(context),
            ..self.clone()
        }
    }

    /// An empty record set of `model`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` if the model does not exist.
    pub fn pool(&self, model: &str) -> CoreResult<RecordSet> {
        let model = self.registry().must_get(model)?;
        Ok(RecordSet::new(self.clone(), model, Vec::new()))
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Propagates store errors; committing twice fails.
    pub fn commit(self) -> CoreResult<()> {
        self.store().commit(self.tx)?;
        debug!(tx = %self.tx, cached = self.cache().len(), "transaction committed");
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn rollback(self) -> CoreResult<()> {
        self.store().rollback(self.tx)?;
        Ok(())
    }

    pub(crate) fn push_frame(&self, caller: CallerRef) -> Self {
        Self {
            frame: Some(Arc::new(CallFrame {
                caller,
                parent: self.frame.clone(),
            })),
            ..self.clone()
        }
    }

    /// The environment of the caller of the current method.
    pub(crate) fn pop_frame(&self) -> Self {
        Self {
            frame: self.frame.as_ref().and_then(|f| f.parent.clone()),
            ..self.clone()
        }
    }

    pub(crate) fn scope(&self) -> &TxScope {
        &self.scope
    }

    pub(crate) fn cache(&self) -> &RecordCache {
        &self.scope.cache
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("tx", &self.tx)
            .field("uid", &self.uid)
            .field("sudo", &self.sudo)
            .field("context", &self.context)
            .field("caller", &self.caller())
            .finish_non_exhaustive()
    }
}

/// A bootstrapped registry bound to a store.
///
/// ```rust
/// use std::sync::Arc;
/// use yep_core::{Engine, Registry, UserId};
/// use yep_core::models::Field;
/// use yep_store::MemoryStore;
/// use yep_value::field_map;
///
/// let mut registry = Registry::new();
/// registry.new_model("Partner").unwrap().add_field(Field::char("Name")).unwrap();
/// registry.bootstrap().unwrap();
///
/// let engine = Engine::open(registry, Arc::new(MemoryStore::new())).unwrap();
/// let name = engine
///     .execute(UserId::new(1), |env| {
///         let jane = env.pool("Partner")?.create(field_map! { "Name" => "Jane" })?;
///         jane.get("Name")
///     })
///     .unwrap();
/// assert_eq!(name.as_str().unwrap(), "Jane");
/// ```
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Binds a bootstrapped registry to a store.
    ///
    /// # Errors
    ///
    /// Returns `NotBootstrapped` if the registry was not bootstrapped.
    pub fn open(registry: Registry, store: Arc<dyn Store>) -> CoreResult<Self> {
        if !registry.is_bootstrapped() {
            return Err(CoreError::NotBootstrapped);
        }
        debug!(models = registry.models().count(), "engine opened");
        Ok(Self {
            shared: Arc::new(Shared {
                registry: Arc::new(registry),
                store,
            }),
        })
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.shared.store.as_ref()
    }

    /// The store's operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.store.stats()
    }

    /// Begins a transaction and returns its environment.
    ///
    /// The caller must [`commit`](Environment::commit) or
    /// [`rollback`](Environment::rollback) it.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn new_environment(&self, uid: UserId) -> CoreResult<Environment> {
        let tx = self.shared.store.begin()?;
        Ok(Environment {
            shared: Arc::clone(&self.shared),
            tx,
            uid,
            context: Arc::new(Context::new()),
            sudo: false,
            frame: None,
            scope: Arc::new(TxScope::default()),
        })
    }

    /// Executes a function in a new environment.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err`, the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Returns the function's error, or the store's commit error.
    pub fn execute<T, F>(&self, uid: UserId, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Environment) -> CoreResult<T>,
    {
        let env = self.new_environment(uid)?;
        match f(&env) {
            Ok(value) => {
                env.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = env.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}
