//! # Plugins Module
//!
//! Model-mapping plugins convert between domain models owned by an external
//! library (an ORM) and the generated [`SchemaModel`](crate::schema::SchemaModel)s
//! that starling validates requests against.
//!
//! ## Overview
//!
//! - [`Plugin`] - the capability contract every adapter implements
//! - [`get_plugin_for_value`] - picks the first registered plugin supporting a type hint
//! - [`PluginMapping`] - pairs a plugin with the model class a handler parameter
//!   declared, and turns validated schema instances back into domain instances
//! - [`OrmPlugin`] - the adapter for [`crate::orm`] models (feature `orm`)
//!
//! ## Resolution Flow
//!
//! ```text
//! handler parameter `data: List[Event]`
//!   -> get_plugin_for_value(List[Event])  unwraps to Event, OrmPlugin matches
//!   -> plugin.to_schema_model(Event, RequestBody)  memoized "EventRequestBody"
//!   -> request body validated as array of EventRequestBody
//!   -> PluginMapping::get_value_converted_to_model_class  Vec<ModelInstance>
//! ```

mod base;
#[cfg(feature = "orm")]
mod orm;

pub use base::{
    get_plugin_for_value, GenericOrigin, ModelValue, Plugin, PluginMapping, ScalarType,
    SchemaContext, SchemaValue, TypeHint,
};
#[cfg(feature = "orm")]
pub use orm::OrmPlugin;

use crate::config::SchemaCacheMode;
use crate::error::Result;
use crate::extras::ORM;
use crate::orm::{ModelRegistry, RelationLoader};
use std::sync::Arc;

/// The ORM plugin as a shareable trait object.
///
/// With [`SchemaCacheMode::Eager`] every registered model's schemas are
/// generated before this returns.
///
/// # Errors
///
/// `MissingDependency` when the `orm` feature is disabled, or a schema
/// generation error during eager precompilation.
pub fn orm_plugin(
    registry: ModelRegistry,
    loader: Option<Arc<dyn RelationLoader>>,
    cache: SchemaCacheMode,
) -> Result<Arc<dyn Plugin>> {
    ORM.require()?;
    build_orm_plugin(registry, loader, cache)
}

#[cfg(feature = "orm")]
fn build_orm_plugin(
    registry: ModelRegistry,
    loader: Option<Arc<dyn RelationLoader>>,
    cache: SchemaCacheMode,
) -> Result<Arc<dyn Plugin>> {
    let mut plugin = OrmPlugin::new(registry);
    if let Some(loader) = loader {
        plugin = plugin.with_loader(loader);
    }
    if cache == SchemaCacheMode::Eager {
        plugin.precompile()?;
    }
    Ok(Arc::new(plugin))
}

#[cfg(not(feature = "orm"))]
fn build_orm_plugin(
    _: ModelRegistry,
    _: Option<Arc<dyn RelationLoader>>,
    _: SchemaCacheMode,
) -> Result<Arc<dyn Plugin>> {
    ORM.require()?;
    Err(crate::error::FrameworkError::improperly_configured(
        "orm plugin unavailable",
    ))
}
