//! Method descriptors.

use crate::error::{CoreError, CoreResult};
use crate::methods::layer::{LayerFn, Layers, Signature, Super};
use crate::recordset::RecordSet;
use crate::security::{CallerRef, MethodAcl};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct Chain {
    len: usize,
    layers: Box<dyn Any + Send + Sync>,
}

/// A method of a model: its signature, its layers and its execution grants.
pub struct Method {
    id: Arc<CallerRef>,
    signature: Signature,
    chain: RwLock<Chain>,
    acl: MethodAcl,
}

impl Method {
    pub(crate) fn new<A, R>(model: &str, name: &str, layer: Arc<LayerFn<A, R>>) -> Self
    where
        A: 'static,
        R: 'static,
    {
        let layers: Layers<A, R> = Arc::new(vec![layer]);
        Self {
            id: Arc::new(CallerRef::new(model, name)),
            signature: Signature::of::<A, R>(),
            chain: RwLock::new(Chain {
                len: 1,
                layers: Box::new(layers),
            }),
            acl: MethodAcl::default(),
        }
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.id.method
    }

    /// Name of the owning model.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.id.model
    }

    /// The method's signature.
    #[must_use]
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Number of layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.chain.read().len
    }

    /// Reference to this method, for caller-conditioned grants.
    #[must_use]
    pub fn caller_ref(&self) -> CallerRef {
        (*self.id).clone()
    }

    /// The method's execution grants.
    #[must_use]
    pub fn acl(&self) -> &MethodAcl {
        &self.acl
    }

    /// Allows `group` to execute this method, from anywhere when `callers`
    /// is empty, otherwise only when called directly by one of `callers`.
    pub fn allow_group(&self, group: &str, callers: &[&Method]) -> &Self {
        self.acl
            .allow(group, callers.iter().map(|m| m.caller_ref()));
        self
    }

    /// Removes every grant of `group` on this method.
    pub fn revoke_group(&self, group: &str) -> &Self {
        self.acl.revoke(group);
        self
    }

    fn check_signature<A: 'static, R: 'static>(&self) -> CoreResult<()> {
        if self.signature.is::<A, R>() {
            return Ok(());
        }
        Err(CoreError::SignatureMismatch {
            model: self.id.model.clone(),
            method: self.id.method.clone(),
            expected: self.signature.to_string(),
            found: Signature::of::<A, R>().to_string(),
        })
    }

    fn layers<A: 'static, R: 'static>(&self) -> CoreResult<Layers<A, R>> {
        self.check_signature::<A, R>()?;
        self.chain
            .read()
            .layers
            .downcast_ref::<Layers<A, R>>()
            .cloned()
            .ok_or_else(|| CoreError::unknown_method(&self.id.model, &self.id.method))
    }

    /// Adds a layer on top of the existing ones.
    pub(crate) fn extend<A: 'static, R: 'static>(&self, layer: Arc<LayerFn<A, R>>) -> CoreResult<()> {
        self.check_signature::<A, R>()?;
        let mut chain = self.chain.write();
        let layers = chain
            .layers
            .downcast_mut::<Layers<A, R>>()
            .ok_or_else(|| CoreError::unknown_method(&self.id.model, &self.id.method))?;
        Arc::make_mut(layers).push(layer);
        chain.len += 1;
        Ok(())
    }

    /// Runs the top layer on `rs`.
    pub(crate) fn invoke<A: 'static, R: 'static>(&self, rs: &RecordSet, args: A) -> CoreResult<R> {
        let layers = self.layers::<A, R>()?;
        let top = layers.len() - 1;
        Super::new(Arc::clone(&self.id), layers, top).run(top, rs, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("model", &self.id.model)
            .field("name", &self.id.method)
            .field("signature", &self.signature.to_string())
            .field("layers", &self.layer_count())
            .finish()
    }
}

/// The methods of one model.
#[derive(Debug, Default)]
pub struct MethodsCollection {
    methods: RwLock<HashMap<String, Arc<Method>>>,
}

impl MethodsCollection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the method with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Method>> {
        self.methods.read().get(name).cloned()
    }

    /// Returns the method with the given name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod` if the model has no such method.
    pub fn must_get(&self, model: &str, name: &str) -> CoreResult<Arc<Method>> {
        self.get(name)
            .ok_or_else(|| CoreError::unknown_method(model, name))
    }

    /// Returns true if the method exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    /// Method names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn insert(&self, method: Method) -> CoreResult<Arc<Method>> {
        let mut methods = self.methods.write();
        if methods.contains_key(method.name()) {
            return Err(CoreError::DuplicateMethod {
                model: method.model_name().to_string(),
                method: method.name().to_string(),
            });
        }
        let method = Arc::new(method);
        methods.insert(method.name().to_string(), Arc::clone(&method));
        Ok(method)
    }
}
