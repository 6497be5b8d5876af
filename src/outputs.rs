//! Values exported to the operator and to the application's process environment.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::pending::{ApplyState, Pending};

/// Variables injected into the Certificate Monkey process.
///
/// `KMS_KEY_ID` is the alias name, never the raw key id: the application
/// addresses the key through the alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentVariables<T = Pending> {
    #[serde(rename = "DYNAMODB_TABLE")]
    pub dynamodb_table: T,
    #[serde(rename = "KMS_KEY_ID")]
    pub kms_key_id: T,
    #[serde(rename = "AWS_REGION")]
    pub aws_region: T,
}

impl EnvironmentVariables<Pending> {
    pub fn resolve(&self, state: &ApplyState) -> Result<EnvironmentVariables<String>> {
        Ok(EnvironmentVariables {
            dynamodb_table: self.dynamodb_table.resolve(state)?,
            kms_key_id: self.kms_key_id.resolve(state)?,
            aws_region: self.aws_region.resolve(state)?,
        })
    }
}

impl EnvironmentVariables<String> {
    pub fn to_map(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([
            ("DYNAMODB_TABLE", self.dynamodb_table.as_str()),
            ("KMS_KEY_ID", self.kms_key_id.as_str()),
            ("AWS_REGION", self.aws_region.as_str()),
        ])
    }

    /// `KEY=value` lines suitable for a `.env` file.
    pub fn to_dotenv(&self) -> String {
        self.to_map()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect()
    }
}

/// Exported values of a graph, still deferred until the apply step completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSet<T = Pending> {
    pub dynamodb_table_name: T,
    pub dynamodb_table_arn: T,
    pub kms_key_id: T,
    pub kms_key_arn: T,
    pub kms_alias_name: T,
    pub iam_policy_arn: T,
    pub environment_variables: EnvironmentVariables<T>,
}

/// Outputs read back from an apply snapshot.
pub type ResolvedOutputs = OutputSet<String>;

impl OutputSet<Pending> {
    pub fn resolve(&self, state: &ApplyState) -> Result<ResolvedOutputs> {
        Ok(OutputSet {
            dynamodb_table_name: self.dynamodb_table_name.resolve(state)?,
            dynamodb_table_arn: self.dynamodb_table_arn.resolve(state)?,
            kms_key_id: self.kms_key_id.resolve(state)?,
            kms_key_arn: self.kms_key_arn.resolve(state)?,
            kms_alias_name: self.kms_alias_name.resolve(state)?,
            iam_policy_arn: self.iam_policy_arn.resolve(state)?,
            environment_variables: self.environment_variables.resolve(state)?,
        })
    }
}

impl<T> OutputSet<T> {
    /// Scalar outputs by export name, in export order.
    pub fn scalars(&self) -> [(&'static str, &T); 6] {
        [
            ("dynamodb_table_name", &self.dynamodb_table_name),
            ("dynamodb_table_arn", &self.dynamodb_table_arn),
            ("kms_key_id", &self.kms_key_id),
            ("kms_key_arn", &self.kms_key_arn),
            ("kms_alias_name", &self.kms_alias_name),
            ("iam_policy_arn", &self.iam_policy_arn),
        ]
    }
}
