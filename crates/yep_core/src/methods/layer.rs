//! Method layers and call-through.

use crate::error::{CoreError, CoreResult};
use crate::recordset::RecordSet;
use crate::security::CallerRef;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// One implementation layer of a method.
///
/// A layer receives the record set it is called on, a handle to the layer
/// below it and the call arguments.
pub type LayerFn<A, R> = dyn Fn(&RecordSet, &Super<A, R>, A) -> CoreResult<R> + Send + Sync;

/// Argument and return types of a method.
///
/// Every layer of a method and every call to it must use the same
/// signature. Several arguments travel as a tuple.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    args: TypeId,
    ret: TypeId,
    args_name: &'static str,
    ret_name: &'static str,
}

impl Signature {
    /// The signature `fn(A) -> R`.
    #[must_use]
    pub fn of<A: 'static, R: 'static>() -> Self {
        Self {
            args: TypeId::of::<A>(),
            ret: TypeId::of::<R>(),
            args_name: type_name::<A>(),
            ret_name: type_name::<R>(),
        }
    }

    /// Returns true if this is the signature `fn(A) -> R`.
    #[must_use]
    pub fn is<A: 'static, R: 'static>(&self) -> bool {
        self.args == TypeId::of::<A>() && self.ret == TypeId::of::<R>()
    }

    /// Returns true if the method takes no argument.
    #[must_use]
    pub fn takes_unit(&self) -> bool {
        self.args == TypeId::of::<()>()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.args == other.args && self.ret == other.ret
    }
}

impl Eq for Signature {}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", self.args_name, self.ret_name)
    }
}

/// Ordered layers of a method, bottom first.
pub(crate) type Layers<A, R> = Arc<Vec<Arc<LayerFn<A, R>>>>;

/// Handle to the layers below the running one.
///
/// Calling [`Super::call`] runs the next lower layer with the same
/// receiver type. The bottom layer has nothing below it.
pub struct Super<A, R> {
    method: Arc<CallerRef>,
    layers: Layers<A, R>,
    index: usize,
}

impl<A: 'static, R: 'static> Super<A, R> {
    pub(crate) fn new(method: Arc<CallerRef>, layers: Layers<A, R>, index: usize) -> Self {
        Self {
            method,
            layers,
            index,
        }
    }

    /// Returns true if a layer exists below the running one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.index > 0
    }

    /// Runs the layer below the running one.
    ///
    /// # Errors
    ///
    /// Returns `NoSuperLayer` when called from the bottom layer, and
    /// propagates the lower layer's error unchanged.
    pub fn call(&self, rs: &RecordSet, args: A) -> CoreResult<R> {
        if self.index == 0 {
            return Err(CoreError::NoSuperLayer {
                model: self.method.model.clone(),
                method: self.method.method.clone(),
            });
        }
        let below = self.index - 1;
        trace!(method = %self.method, layer = below, "calling super");
        self.run(below, rs, args)
    }

    /// Runs the layer at `index`, handing it a `Super` for the layers below.
    pub(crate) fn run(&self, index: usize, rs: &RecordSet, args: A) -> CoreResult<R> {
        let next = Super::new(Arc::clone(&self.method), Arc::clone(&self.layers), index);
        (self.layers[index])(rs, &next, args)
    }
}

impl<A, R> fmt::Debug for Super<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Super")
            .field("method", &self.method)
            .field("index", &self.index)
            .finish()
    }
}
