//! # Signature Module
//!
//! Resolves handler keyword arguments from request data.
//!
//! A [`SignatureModel`] is built once per handler from its declared
//! [`ParameterSpec`]s. Scalar parameters become plain schema fields, and model
//! parameters are handed to the first plugin that supports them. At request time
//! [`SignatureModel::parse_values`] decodes the raw strings, validates the
//! assembled object and converts plugin-backed values into domain instances.
//!
//! ```rust
//! use starling::plugins::{ScalarType, TypeHint};
//! use starling::signature::{ParamSource, ParameterSpec, SignatureModel};
//!
//! let signature = SignatureModel::create(
//!     "list_events",
//!     vec![ParameterSpec::new("limit", ParamSource::Query, TypeHint::Scalar(ScalarType::Int))
//!         .with_default(serde_json::json!(10))],
//!     &[],
//! )
//! .unwrap();
//! assert_eq!(signature.schema().name(), "list_events_signature");
//! ```

mod model;
mod request;

pub use model::{KwargValue, Kwargs, ParamSource, ParameterSpec, SignatureModel};
pub use request::{
    decode_param_value, parse_cookies, parse_query_params, HeaderVec, ParamVec, RequestData,
    MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
