//! Model definition: the knobs of the matcher that deployments may change
//! without recompiling.
//!
//! ```toml
//! [superadmin]
//! role = "superadmin"
//! bypass = true
//!
//! [matchers]
//! resource = "path"   # or "exact"
//! action = "glob"     # or "exact"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::vocabulary::Role;

/// Embedded default, used when no model file is configured.
pub const DEFAULT_MODEL: &str = r#"
[superadmin]
role = "superadmin"
bypass = true

[matchers]
resource = "path"
action = "glob"
"#;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid model definition: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMatch {
    Path,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMatch {
    Glob,
    Exact,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    #[serde(default)]
    superadmin: RawSuperadmin,
    #[serde(default)]
    matchers: RawMatchers,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSuperadmin {
    #[serde(default = "default_superadmin_role")]
    role: Role,
    #[serde(default = "default_true")]
    bypass: bool,
}

impl Default for RawSuperadmin {
    fn default() -> Self {
        Self {
            role: default_superadmin_role(),
            bypass: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMatchers {
    #[serde(default = "default_resource_match")]
    resource: ResourceMatch,
    #[serde(default = "default_action_match")]
    action: ActionMatch,
}

impl Default for RawMatchers {
    fn default() -> Self {
        Self {
            resource: default_resource_match(),
            action: default_action_match(),
        }
    }
}

fn default_superadmin_role() -> Role {
    Role::Superadmin
}

fn default_true() -> bool {
    true
}

fn default_resource_match() -> ResourceMatch {
    ResourceMatch::Path
}

fn default_action_match() -> ActionMatch {
    ActionMatch::Glob
}

/// Validated model definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    /// Role that, held in `sys`, short-circuits every decision to allow.
    pub superadmin_role: Role,
    pub superadmin_bypass: bool,
    pub resource_match: ResourceMatch,
    pub action_match: ActionMatch,
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self {
            superadmin_role: Role::Superadmin,
            superadmin_bypass: true,
            resource_match: ResourceMatch::Path,
            action_match: ActionMatch::Glob,
        }
    }
}

impl ModelDefinition {
    pub fn from_toml(text: &str) -> Result<Self, ModelError> {
        let raw: RawModel = toml::from_str(text)?;
        if raw.superadmin.role.is_wildcard() {
            return Err(ModelError::Invalid(
                "superadmin role must be a concrete role".to_string(),
            ));
        }
        Ok(Self {
            superadmin_role: raw.superadmin.role,
            superadmin_bypass: raw.superadmin.bypass,
            resource_match: raw.matchers.resource,
            action_match: raw.matchers.action,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// The configured model, or the embedded default when `path` is `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ModelError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::from_toml(DEFAULT_MODEL),
        }
    }

    pub fn with_superadmin_bypass(mut self, enabled: bool) -> Self {
        self.superadmin_bypass = enabled;
        self
    }
}
