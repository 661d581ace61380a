//! Optional integrations and the cargo features that enable them.
//!
//! Integrations that depend on optional crates are compiled only when their
//! feature is enabled. Code paths that select an integration at runtime (from
//! configuration, for example) call [`Feature::require`] first so a disabled
//! integration fails immediately with [`FrameworkError::MissingDependency`]
//! instead of somewhere deep inside request handling.

use crate::error::{FrameworkError, Result};

/// An optional integration and the cargo features that provide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub name: &'static str,
    pub available_in_extras: &'static [&'static str],
    enabled: bool,
}

impl Feature {
    /// Whether the integration was compiled into this build.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fail with `MissingDependency` unless the integration is compiled in.
    pub fn require(&self) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        tracing::error!(
            feature = self.name,
            extras = ?self.available_in_extras,
            "Optional integration requested but not compiled in"
        );
        Err(FrameworkError::MissingDependency {
            feature: self.name.to_string(),
            extras: self
                .available_in_extras
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
        })
    }
}

pub const JINJA: Feature = Feature {
    name: "jinja templates",
    available_in_extras: &["jinja"],
    enabled: cfg!(feature = "jinja"),
};

pub const ORM: Feature = Feature {
    name: "OrmPlugin",
    available_in_extras: &["orm"],
    enabled: cfg!(feature = "orm"),
};
