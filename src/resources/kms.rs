use serde::Serialize;

use crate::pending::{AttrRef, Pending};
use crate::resources::{Resource, Tags};

/// Prefix every KMS alias name must start with.
pub const ALIAS_PREFIX: &str = "alias/";

/// A customer-managed KMS key.
///
/// The key is never mutated once created; deleting it is a scheduled operation
/// that only completes after `deletion_window_in_days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmsKey {
    #[serde(skip)]
    pub(crate) logical_name: String,
    pub(crate) description: String,
    pub(crate) deletion_window_in_days: u32,
    pub(crate) tags: Tags,
}

impl KmsKey {
    pub const TYPE_TOKEN: &'static str = "aws:kms/key:Key";
    pub const MIN_DELETION_WINDOW_DAYS: u32 = 7;
    pub const MAX_DELETION_WINDOW_DAYS: u32 = 30;

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn deletion_window_in_days(&self) -> u32 {
        self.deletion_window_in_days
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Provider-assigned key identifier.
    pub fn key_id(&self) -> Pending {
        Pending::attr(&self.logical_name, "key_id")
    }

    pub fn arn(&self) -> Pending {
        Pending::attr(&self.logical_name, "arn")
    }
}

impl Resource for KmsKey {
    fn type_token(&self) -> &'static str {
        Self::TYPE_TOKEN
    }

    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn references(&self) -> Vec<&AttrRef> {
        Vec::new()
    }
}

/// Human-readable name pointing at a [`KmsKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmsAlias {
    #[serde(skip)]
    pub(crate) logical_name: String,
    pub(crate) name: String,
    pub(crate) target_key_id: Pending,
}

impl KmsAlias {
    pub const TYPE_TOKEN: &'static str = "aws:kms/alias:Alias";

    /// The alias name, e.g. `alias/certificate-monkey-dev`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_output(&self) -> Pending {
        Pending::literal(self.name.clone())
    }

    pub fn target_key_id(&self) -> &Pending {
        &self.target_key_id
    }
}

impl Resource for KmsAlias {
    fn type_token(&self) -> &'static str {
        Self::TYPE_TOKEN
    }

    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn references(&self) -> Vec<&AttrRef> {
        self.target_key_id.references()
    }
}
