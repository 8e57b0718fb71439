//! Layered methods.
//!
//! A method is a stack of layers. Calling it runs the top layer, which may
//! run the layer below through its [`Super`] handle. Modules extend a
//! method by pushing a new layer on top.

pub(crate) mod base;
mod layer;
mod method;

pub use base::NameSearchParams;
pub use layer::{LayerFn, Signature, Super};
pub use method::{Method, MethodsCollection};
