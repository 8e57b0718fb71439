//! # Yep Store
//!
//! The persistence collaborator of the Yep object layer.
//!
//! The object layer never talks SQL: it drives a [`Store`] through a small
//! row-level interface (insert, update, delete, get, list ids) scoped to a
//! transaction handle. Query evaluation, record rules and field security
//! all live above this crate.
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - Transactional in-memory store for tests and benches
//!
//! ## Example
//!
//! ```rust
//! use yep_store::{MemoryStore, Store};
//! use yep_value::field_map;
//!
//! let store = MemoryStore::new();
//! let tx = store.begin().unwrap();
//! let id = store.insert(tx, "partner", field_map! { "name" => "Jane" }).unwrap();
//! store.commit(tx).unwrap();
//!
//! let tx = store.begin().unwrap();
//! assert!(store.get(tx, "partner", id).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod stats;
mod store;
mod transaction;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use stats::{StatsSnapshot, StoreStats};
pub use store::Store;
pub use transaction::{PendingWrite, TransactionId, TransactionState};
