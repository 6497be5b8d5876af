use thiserror::Error;

/// Errors raised while declaring the resource graph or resolving its outputs.
///
/// Provider-side failures (permissions, quotas, name collisions) happen in the
/// external apply phase and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A resource references a node that is not declared in the same graph.
    #[error("resource `{from}` references undeclared resource `{to}`")]
    Dependency { from: String, to: String },

    /// A key attribute of the table or one of its indexes has no attribute definition.
    #[error("table `{table}` does not define key attribute `{attribute}`")]
    MissingKeyAttribute { table: String, attribute: String },

    /// A deferred value was read before the apply step produced it.
    #[error("`{resource}.{attribute}` is not resolved yet")]
    Unresolved { resource: String, attribute: String },

    #[error("resolved value `{value}` could not be parsed: {reason}")]
    InvalidResolvedValue { value: String, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Build(#[from] aws_sdk_dynamodb::error::BuildError),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
