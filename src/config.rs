use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_ENVIRONMENT: &str = "dev";
/// Longest name that keeps `certificate-monkey-<env>-policy` within IAM's 128 characters.
pub const MAX_ENVIRONMENT_LEN: usize = 102;
pub const DEFAULT_KMS_DELETION_WINDOW_DAYS: u32 = 7;

pub const ENVIRONMENT_VAR: &str = "CM_ENVIRONMENT";
pub const TABLE_NAME_VAR: &str = "CM_TABLE_NAME";
pub const KMS_DELETION_WINDOW_VAR: &str = "CM_KMS_DELETION_WINDOW_DAYS";
pub const DELETION_PROTECTION_VAR: &str = "CM_DELETION_PROTECTION";

/// Deployment context name, e.g. `dev`, `staging` or `prod`.
///
/// Every resource name and `Environment` tag in a graph is derived from one
/// value of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Environment(String);

impl Environment {
    /// Validates an environment name.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted, up to
    /// [`MAX_ENVIRONMENT_LEN`] characters, so that every name derived from it
    /// is a valid table, alias and policy name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::config("environment name must not be empty"));
        }
        if name.len() > MAX_ENVIRONMENT_LEN {
            return Err(Error::config(format!(
                "environment name is {} characters long, at most {MAX_ENVIRONMENT_LEN} are allowed",
                name.len()
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::config(format!(
                "environment name `{name}` contains invalid character `{c}`"
            )));
        }
        Ok(Self(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        matches!(self.0.as_str(), "prod" | "production")
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs of a graph build, read once before anything is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub environment: Environment,
    pub table_name: Option<String>,
    pub region: String,
    pub kms_deletion_window_days: u32,
    pub deletion_protection: bool,
}

impl Configuration {
    /// Configuration with every optional setting at its default.
    pub fn new(environment: &str, region: &str) -> Result<Self> {
        let environment = Environment::new(environment)?;
        Self::from_lookup(
            |key| (key == ENVIRONMENT_VAR).then(|| environment.name().to_owned()),
            Some(region),
        )
    }

    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env(region: Option<&str>) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), region)
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F, region: Option<&str>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment =
            Environment::new(get(ENVIRONMENT_VAR).unwrap_or_else(|| DEFAULT_ENVIRONMENT.into()))?;

        let region = region
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| Error::config("AWS region is not configured (set AWS_REGION)"))?
            .to_owned();

        let kms_deletion_window_days = match get(KMS_DELETION_WINDOW_VAR) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                Error::config(format!("{KMS_DELETION_WINDOW_VAR}=`{raw}` is not a number: {e}"))
            })?,
            None => DEFAULT_KMS_DELETION_WINDOW_DAYS,
        };

        let deletion_protection = match get(DELETION_PROTECTION_VAR) {
            Some(raw) => parse_bool(DELETION_PROTECTION_VAR, &raw)?,
            None => environment.is_production(),
        };

        let config = Self {
            table_name: get(TABLE_NAME_VAR),
            environment,
            region,
            kms_deletion_window_days,
            deletion_protection,
        };
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_deletion_protection(mut self, enabled: bool) -> Self {
        self.deletion_protection = enabled;
        self
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{key}=`{raw}` is not a boolean"))),
    }
}
