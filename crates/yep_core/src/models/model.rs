//! Model descriptors.

use crate::error::{CoreError, CoreResult};
use crate::methods::{LayerFn, Method, MethodsCollection, Super};
use crate::models::{Field, FieldsCollection};
use crate::recordset::RecordSet;
use heck::ToSnakeCase;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

bitflags::bitflags! {
    /// Model options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModelOptions: u8 {
        /// Link model generated for a many-to-many relation.
        const MANY2MANY_LINK = 1 << 0;
    }
}

/// A model: a named set of fields and layered methods.
///
/// Fields and methods may only be added before the registry is
/// bootstrapped. Grants on methods and fields may change at any time.
#[derive(Debug)]
pub struct Model {
    name: String,
    table: String,
    options: ModelOptions,
    fields: FieldsCollection,
    methods: MethodsCollection,
    bootstrapped: AtomicBool,
}

impl Model {
    pub(crate) fn new(name: &str, options: ModelOptions) -> Self {
        Self {
            name: name.to_string(),
            table: name.to_snake_case(),
            options,
            fields: FieldsCollection::new(),
            methods: MethodsCollection::new(),
            bootstrapped: AtomicBool::new(false),
        }
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snake case table name in the store.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Model options.
    #[must_use]
    pub const fn options(&self) -> ModelOptions {
        self.options
    }

    /// Returns true for generated many-to-many link models.
    #[must_use]
    pub const fn is_link_model(&self) -> bool {
        self.options.contains(ModelOptions::MANY2MANY_LINK)
    }

    /// The model's fields.
    #[must_use]
    pub fn fields(&self) -> &FieldsCollection {
        &self.fields
    }

    /// The model's methods.
    #[must_use]
    pub fn methods(&self) -> &MethodsCollection {
        &self.methods
    }

    /// Returns a field by name or JSON name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the model has no such field.
    pub fn field(&self, name: &str) -> CoreResult<Arc<Field>> {
        self.fields.must_get(&self.name, name)
    }

    /// Returns a method by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod` if the model has no such method.
    pub fn method(&self, name: &str) -> CoreResult<Arc<Method>> {
        self.methods.must_get(&self.name, name)
    }

    /// Name of the field used as the display name of records.
    #[must_use]
    pub fn rec_name(&self) -> Option<Arc<Field>> {
        self.fields.get("Name")
    }

    /// Returns true once the registry has been bootstrapped.
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_bootstrapped(&self) {
        self.bootstrapped.store(true, Ordering::Release);
    }

    fn ensure_mutable(&self) -> CoreResult<()> {
        if self.is_bootstrapped() {
            return Err(CoreError::AlreadyBootstrapped);
        }
        Ok(())
    }

    /// Adds a field.
    ///
    /// # Errors
    ///
    /// Fails if the registry is bootstrapped, the field name is taken or the
    /// declaration is inconsistent.
    pub fn add_field(&self, field: Field) -> CoreResult<&Self> {
        self.ensure_mutable()?;
        self.fields.add(&self.name, field)?;
        Ok(self)
    }

    /// Adds several fields.
    ///
    /// # Errors
    ///
    /// Stops at the first field that cannot be added.
    pub fn add_fields(&self, fields: impl IntoIterator<Item = Field>) -> CoreResult<&Self> {
        for field in fields {
            self.add_field(field)?;
        }
        Ok(self)
    }

    /// Declares a new method with its bottom layer.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMethod` if the name is taken and
    /// `AlreadyBootstrapped` once the registry is frozen.
    pub fn create_method<A, R, F>(&self, name: &str, layer: F) -> CoreResult<Arc<Method>>
    where
        A: 'static,
        R: 'static,
        F: Fn(&RecordSet, &Super<A, R>, A) -> CoreResult<R> + Send + Sync + 'static,
    {
        self.ensure_mutable()?;
        let layer: Arc<LayerFn<A, R>> = Arc::new(layer);
        let method = self.methods.insert(Method::new(&self.name, name, layer))?;
        debug!(model = %self.name, method = name, "method created");
        Ok(method)
    }

    /// Adds a layer on top of an existing method.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod` if the method does not exist,
    /// `SignatureMismatch` if the layer's types differ from the method's and
    /// `AlreadyBootstrapped` once the registry is frozen.
    pub fn extend_method<A, R, F>(&self, name: &str, layer: F) -> CoreResult<Arc<Method>>
    where
        A: 'static,
        R: 'static,
        F: Fn(&RecordSet, &Super<A, R>, A) -> CoreResult<R> + Send + Sync + 'static,
    {
        self.ensure_mutable()?;
        let method = self.method(name)?;
        method.extend::<A, R>(Arc::new(layer))?;
        debug!(model = %self.name, method = name, layers = method.layer_count(), "method extended");
        Ok(method)
    }
}
