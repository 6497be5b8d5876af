//! # Certificate Monkey Infrastructure
//!
//! Declares the AWS resources the Certificate Monkey service runs on: a KMS
//! key and alias for private key encryption, the DynamoDB certificate table,
//! and the IAM policy the application needs. The result is a typed
//! [`ResourceGraph`] handed to an external provisioning engine, together with
//! the outputs (table name, ARNs, environment variables) the application is
//! deployed with.
//!
//! ## Example
//!
//! ```
//! use certificate_monkey_infra::{Configuration, ResourceGraph};
//!
//! let config = Configuration::new("staging", "eu-west-1").unwrap();
//! let graph = ResourceGraph::build(&config).unwrap();
//!
//! assert_eq!(graph.table.name(), "certificate-monkey-staging");
//! assert_eq!(graph.kms_alias.name(), "alias/certificate-monkey-staging");
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod outputs;
pub mod pending;
pub mod resources;

pub use config::{Configuration, Environment};
pub use error::{Error, Result};
pub use graph::ResourceGraph;
pub use outputs::{EnvironmentVariables, OutputSet, ResolvedOutputs};
pub use pending::{ApplyState, AttrRef, Expr, Pending};

#[cfg(test)]
mod tests;
