//! # Yep Core
//!
//! The object layer of the Yep business framework.
//!
//! This crate provides:
//! - A model registry with typed field declarations
//! - A dependency graph that keeps stored computed and related fields up
//!   to date when the fields they depend on are written
//! - Layered methods: every module may add a layer on top of a method and
//!   call the layer below through [`methods::Super`]
//! - Security enforced at dispatch and field access: method execution
//!   control, field access control and record rules
//!
//! Persistence is delegated to a [`yep_store::Store`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use yep_core::models::Field;
//! use yep_core::{Condition, Engine, Registry, UserId};
//! use yep_store::MemoryStore;
//! use yep_value::field_map;
//!
//! let mut registry = Registry::new();
//! let partner = registry.new_model("Partner").unwrap();
//! partner
//!     .add_fields([
//!         Field::char("Name"),
//!         Field::char("Greeting").compute("ComputeGreeting").depends(["Name"]).stored(),
//!     ])
//!     .unwrap();
//! partner
//!     .create_method("ComputeGreeting", |rs, _, ()| {
//!         let name = rs.get("Name")?;
//!         let greeting = format!("Hello {}", name.as_str()?);
//!         Ok((field_map! { "Greeting" => greeting }, Vec::<String>::new()))
//!     })
//!     .unwrap();
//! registry.bootstrap().unwrap();
//!
//! let engine = Engine::open(registry, Arc::new(MemoryStore::new())).unwrap();
//! engine
//!     .execute(UserId::new(1), |env| {
//!         let jane = env.pool("Partner")?.create(field_map! { "Name" => "Jane" })?;
//!         assert_eq!(jane.get("Greeting")?.as_str()?, "Hello Jane");
//!         jane.set("Name", "Joan")?;
//!         let found = env.pool("Partner")?.search(Condition::eq("Greeting", "Hello Joan"))?;
//!         assert_eq!(found, jane);
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod condition;
mod config;
mod env;
mod error;
pub mod methods;
pub mod models;
mod recordset;
pub mod security;

pub use condition::{Condition, DynamicValue, Operand, Operator};
pub use config::Config;
pub use env::{Context, Engine, Environment};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use methods::NameSearchParams;
pub use models::Registry;
pub use recordset::RecordSet;
pub use security::{Permission, UserId};
