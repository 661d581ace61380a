//! # starling
//!
//! **starling** is the model and request plumbing of a web framework: it turns
//! raw request data into validated handler arguments, maps ORM models onto
//! generated validation schemas and back, marshals handler results into
//! responses, renders templates and installs a declarative logging setup.
//!
//! Transport is left to the host server. starling consumes a parsed request
//! ([`signature::RequestData`]) and produces a [`response::Response`].
//!
//! ## Architecture
//!
//! - **[`plugins`]** - the [`Plugin`](plugins::Plugin) contract, plugin lookup
//!   and [`PluginMapping`](plugins::PluginMapping), plus the ORM plugin
//! - **[`orm`]** - the model metadata contract plugins work against
//! - **[`schema`]** - generated validation models backed by `jsonschema`
//! - **[`signature`]** - handler parameter declaration and kwarg resolution
//! - **[`dto`]** - derived data transfer objects
//! - **[`response`]** - response marshaling
//! - **[`template`]** - template engine adapter (Jinja via `minijinja`)
//! - **[`logging`]** - declarative logging configuration on `tracing`
//! - **[`config`]** - file and environment configuration
//! - **[`error`]** / **[`extras`]** - framework errors and optional features
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host server
//!     participant Sig as SignatureModel
//!     participant Plugin as OrmPlugin
//!     participant Handler
//!     participant Resp as Response
//!
//!     Host->>Sig: parse_values(RequestData)
//!     Sig->>Sig: decode + validate against "{handler}_signature"
//!     Sig->>Plugin: from_schema_instance (via PluginMapping)
//!     Plugin-->>Sig: ModelInstance
//!     Sig-->>Host: Kwargs
//!     Host->>Handler: call(kwargs)
//!     Handler-->>Host: ResponseContent
//!     Host->>Resp: marshal(content, status, plugins, templates)
//!     Resp->>Plugin: to_dict (await relation loading)
//!     Resp-->>Host: status, content type, body
//! ```
//!
//! ## Cargo Features
//!
//! - `jinja` (default) - [`template::JinjaTemplateEngine`]
//! - `orm` (default) - [`plugins::OrmPlugin`]

pub mod config;
pub mod dto;
pub mod error;
pub mod extras;
pub mod ids;
pub mod logging;
pub mod orm;
pub mod plugins;
pub mod response;
pub mod schema;
pub mod signature;
pub mod template;

pub use error::{FrameworkError, Result, ValidationIssue};
pub use ids::RequestId;
