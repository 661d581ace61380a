//! # Schema Module
//!
//! Generated validation models: the target of every model-mapping plugin and of
//! handler signature resolution.
//!
//! ## Overview
//!
//! A [`SchemaModel`] is an ordered list of [`SchemaField`]s, each with a
//! [`SchemaType`], a `required` flag, an `allow_none` flag and an optional
//! default. The model renders itself as JSON Schema and validates input with the
//! `jsonschema` crate, producing a [`SchemaInstance`] that remembers which model
//! produced it.
//!
//! Validators are compiled once per schema model, on first use, one per field so
//! every reported issue carries the field it belongs to.
//!
//! ## Usage
//!
//! ```rust
//! use starling::schema::{SchemaField, SchemaModel, SchemaType};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let model = Arc::new(SchemaModel::new(
//!     "Pet",
//!     vec![
//!         SchemaField::new("name", SchemaType::string()),
//!         SchemaField::new("age", SchemaType::Integer).optional(),
//!     ],
//! ));
//!
//! let pet = model.validate(json!({"name": "Rex"})).expect("valid");
//! assert_eq!(pet.get("name"), Some(&json!("Rex")));
//! assert!(model.validate(json!({"age": 3})).is_err());
//! ```

mod instance;
mod model;

pub use instance::SchemaInstance;
pub use model::{SchemaField, SchemaModel, SchemaType};
