//! # Resource Declarations
//!
//! Typed descriptions of the AWS resources backing Certificate Monkey. Nothing
//! in this module talks to AWS: each type is a declaration handed to an
//! external provisioning engine.
//!
//! ## Components
//!
//! - `KmsKey` / `KmsAlias`: the customer-managed key encrypting private key material.
//! - `DynamoTable`: the certificate storage table, its attributes and GSI.
//! - `PolicyDocument` / `IamPolicy`: the permissions the application needs.
//! - `Tags`: the tag set shared by every resource.
//!
//! Cross-resource values (ARNs, key ids) are [`Pending`](crate::pending::Pending)
//! references, so a resource can only be declared from values handed out by
//! the resource it depends on.

mod iam;
mod kms;
mod schema;
mod table;
mod tags;

pub use iam::{Condition, Effect, IamPolicy, PolicyDocument, Statement, POLICY_VERSION};
pub use kms::{KmsAlias, KmsKey, ALIAS_PREFIX};
pub use schema::{AttributeDefinition, FieldType, Schema};
pub use table::{
    BillingMode, DynamoTable, GlobalSecondaryIndex, PointInTimeRecovery, ProjectionType,
    ServerSideEncryption,
};
pub use tags::{Tags, APPLICATION};

use crate::pending::AttrRef;

/// A node of the resource graph.
pub trait Resource {
    /// Provider type token, e.g. `aws:kms/key:Key`.
    fn type_token(&self) -> &'static str;

    /// Name identifying the resource within the graph.
    fn logical_name(&self) -> &str;

    /// Attributes of other resources this declaration reads.
    fn references(&self) -> Vec<&AttrRef>;

    /// Logical names of the resources this one depends on, sorted and deduplicated.
    fn depends_on(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = self
            .references()
            .into_iter()
            .map(|attr| attr.resource.as_str())
            .filter(|name| *name != self.logical_name())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }
}
