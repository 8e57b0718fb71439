//! # Yep Testkit
//!
//! Test utilities for the Yep object layer.
//!
//! This crate provides:
//! - A sample sales registry with computed, related and relational fields
//! - Engine helpers running closures as a given user
//! - Property-based test generators using proptest
//! - Tracing initialisation honouring `RUST_LOG`
//!
//! ## Usage
//!
//! ```rust
//! use yep_testkit::prelude::*;
//!
//! let kit = TestEngine::sales();
//! let count = kit
//!     .execute_as(ADMIN, |env| env.pool("Partner")?.search_count(Condition::True))
//!     .unwrap();
//! assert_eq!(count, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use yep_core::{Condition, CoreError, Environment, Operator, RecordSet, UserId};
    pub use yep_value::{field_map, FieldMap, RecordId, Value};
}

pub use fixtures::*;
pub use generators::*;

static TRACING: Once = Once::new();

/// Installs a formatting subscriber filtered by `RUST_LOG`, once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
