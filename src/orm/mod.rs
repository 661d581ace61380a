//! # ORM Module
//!
//! The ORM module describes the contract starling consumes from an external ORM:
//! model metadata, field classification and asynchronous relation loading.
//! Query execution and persistence stay with the ORM itself; this module only
//! carries what the plugins need to map models onto validation schemas.
//!
//! ## Overview
//!
//! - [`ModelClass`] - a handle on one model's metadata with a process-unique identity
//! - [`OrmField`] / [`FieldKind`] / [`DataType`] - field classification (data,
//!   forward relations, reverse relations) and constraint flags
//! - [`ModelInstance`] - a domain object: values plus relation load state
//! - [`RelationLoader`] - async hook the ORM backend implements to materialize relations
//! - [`ModelRegistry`] - name lookup used to resolve relation targets
//!
//! ## Usage
//!
//! ```rust
//! use starling::orm::{ModelClass, OrmField};
//!
//! let event = ModelClass::builder("Event")
//!     .field(OrmField::int("id").pk().generated())
//!     .field(OrmField::text("name", Some(255)))
//!     .field(OrmField::foreign_key("tournament", "Tournament"))
//!     .build()
//!     .expect("valid model");
//!
//! assert_eq!(event.name(), "Event");
//! assert!(event.meta().field("tournament").is_some_and(|f| f.is_relational()));
//! ```
//!
//! Typed structs can opt into the same machinery through the [`Model`] trait,
//! which converts between the struct and a [`ModelInstance`] with serde.

mod error;
mod field;
mod instance;
mod loader;
mod model;

pub use error::OrmError;
pub use field::{DataType, FieldKind, OrmField};
pub use instance::{Model, ModelInstance, RelationState};
pub use loader::{NoopLoader, RelationLoader};
pub use model::{ModelClass, ModelClassBuilder, ModelId, ModelMeta, ModelRegistry};
