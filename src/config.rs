//! Container options.
//!
//! Options are fixed when the provider is built. They can be set in code
//! through the builder setters, read from environment variables, or
//! deserialized with the `serde` feature.

use std::env;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{DiError, DiResult};

/// Default bound on the length of one resolution chain.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Behavior switches for a built container.
///
/// # Examples
///
/// ```
/// use arbor_di::{ContainerOptions, DiError, Injectable, Resolver, ServiceCollection};
///
/// struct RequestState;
/// impl Injectable for RequestState {
///     type Deps = ();
///     fn construct(_: ()) -> Self { RequestState }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_service::<RequestState>();
/// services.with_options(ContainerOptions::default().validate_scopes(true));
///
/// let provider = services.build();
/// assert!(matches!(provider.get::<RequestState>(), Err(DiError::WrongLifetime(_))));
/// assert!(provider.create_scope().get::<RequestState>().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerOptions {
    /// Reject scoped services resolved directly from the root scope.
    pub validate_scopes: bool,
    /// Make [`ServiceCollection::try_build`](crate::ServiceCollection::try_build)
    /// fail when validation reports errors.
    pub validate_on_build: bool,
    /// Longest resolution chain before [`DiError::DepthExceeded`].
    pub max_depth: usize,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions {
            validate_scopes: false,
            validate_on_build: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Reads options from `{PREFIX}_VALIDATE_SCOPES`, `{PREFIX}_VALIDATE_ON_BUILD`
    /// and `{PREFIX}_MAX_DEPTH`, falling back to defaults for unset variables.
    ///
    /// Booleans accept `true/false/1/0/yes/no/on/off` in any case.
    pub fn from_env_with_prefix(prefix: &str) -> DiResult<Self> {
        let prefix = prefix.to_uppercase();
        let mut options = Self::default();

        if let Some(value) = read_var(&prefix, "VALIDATE_SCOPES") {
            options.validate_scopes = parse_bool(&prefix, "VALIDATE_SCOPES", &value)?;
        }
        if let Some(value) = read_var(&prefix, "VALIDATE_ON_BUILD") {
            options.validate_on_build = parse_bool(&prefix, "VALIDATE_ON_BUILD", &value)?;
        }
        if let Some(value) = read_var(&prefix, "MAX_DEPTH") {
            options.max_depth = value.trim().parse().map_err(|_| {
                DiError::InvalidConfiguration(format!(
                    "{}_MAX_DEPTH: expected a positive integer, got {:?}",
                    prefix, value
                ))
            })?;
        }

        options.check()?;
        Ok(options)
    }

    /// [`from_env_with_prefix`](Self::from_env_with_prefix) with prefix `ARBOR_DI`.
    pub fn from_env() -> DiResult<Self> {
        Self::from_env_with_prefix("ARBOR_DI")
    }

    pub(crate) fn check(&self) -> DiResult<()> {
        if self.max_depth == 0 {
            return Err(DiError::InvalidConfiguration(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_var(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{}_{}", prefix, name)).ok()
}

fn parse_bool(prefix: &str, name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(DiError::InvalidConfiguration(format!(
            "{}_{}: expected a boolean, got {:?}",
            prefix, name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ContainerOptions::default();
        assert!(!options.validate_scopes);
        assert!(options.validate_on_build);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn reads_prefixed_environment() {
        env::set_var("ARBOR_TEST_ENV_VALIDATE_SCOPES", "Yes");
        env::set_var("ARBOR_TEST_ENV_MAX_DEPTH", " 64 ");
        let options = ContainerOptions::from_env_with_prefix("arbor_test_env").unwrap();
        assert!(options.validate_scopes);
        assert!(options.validate_on_build);
        assert_eq!(options.max_depth, 64);
    }

    #[test]
    fn rejects_malformed_environment() {
        env::set_var("ARBOR_TEST_BAD_VALIDATE_ON_BUILD", "maybe");
        let err = ContainerOptions::from_env_with_prefix("ARBOR_TEST_BAD").unwrap_err();
        assert!(err.to_string().contains("ARBOR_TEST_BAD_VALIDATE_ON_BUILD"));

        env::set_var("ARBOR_TEST_ZERO_MAX_DEPTH", "0");
        assert!(ContainerOptions::from_env_with_prefix("ARBOR_TEST_ZERO").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_partial_json() {
        let options: ContainerOptions = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(options.max_depth, 8);
        assert!(options.validate_on_build);
    }
}
