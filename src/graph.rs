//! The resource graph builder.
//!
//! A single forward pass: key, alias, table, policy document, policy, outputs.
//! Each step takes the values it depends on as [`Pending`] references obtained
//! from the resources already declared, so a step cannot run before its
//! dependency exists.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, instrument};

use crate::config::{Configuration, Environment};
use crate::error::{Error, Result};
use crate::outputs::{EnvironmentVariables, OutputSet};
use crate::pending::Pending;
use crate::resources::{
    BillingMode, Condition, DynamoTable, FieldType, GlobalSecondaryIndex, IamPolicy, KmsAlias,
    KmsKey, PointInTimeRecovery, PolicyDocument, Resource, Schema, ServerSideEncryption,
    Statement, Tags, ALIAS_PREFIX, APPLICATION,
};

pub const KMS_KEY_LOGICAL_NAME: &str = "certificate-monkey-kms-key";
pub const KMS_ALIAS_LOGICAL_NAME: &str = "certificate-monkey-kms-alias";
pub const TABLE_LOGICAL_NAME: &str = "certificate-monkey-table";
pub const POLICY_LOGICAL_NAME: &str = "certificate-monkey-app-policy";

pub const ID_ATTRIBUTE: &str = "id";
pub const CREATED_AT_ATTRIBUTE: &str = "created_at";
pub const CREATED_AT_INDEX: &str = "created_at-index";

pub const KMS_KEY_DESCRIPTION: &str = "Certificate Monkey private key encryption";
pub const POLICY_DESCRIPTION: &str = "IAM policy for Certificate Monkey application";

pub const TABLE_ACTIONS: [&str; 5] = [
    "dynamodb:PutItem",
    "dynamodb:GetItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:Scan",
];
pub const KMS_ACTIONS: [&str; 2] = ["kms:Encrypt", "kms:Decrypt"];
pub const VIA_SERVICE_CONDITION_KEY: &str = "kms:ViaService";

/// `certificate-monkey-<environment>`, the stem of every derived name.
pub fn resource_name(environment: &Environment) -> String {
    format!("{APPLICATION}-{environment}")
}

/// Declares the encryption key.
pub fn build_kms_key(environment: &Environment, deletion_window_days: u32) -> Result<KmsKey> {
    let window = KmsKey::MIN_DELETION_WINDOW_DAYS..=KmsKey::MAX_DELETION_WINDOW_DAYS;
    if !window.contains(&deletion_window_days) {
        return Err(Error::config(format!(
            "KMS deletion window must be between {} and {} days, got {deletion_window_days}",
            window.start(),
            window.end()
        )));
    }

    Ok(KmsKey {
        logical_name: KMS_KEY_LOGICAL_NAME.to_owned(),
        description: KMS_KEY_DESCRIPTION.to_owned(),
        deletion_window_in_days: deletion_window_days,
        tags: Tags::new(environment, resource_name(environment))
            .with_purpose("private-key-encryption"),
    })
}

/// Declares `alias/certificate-monkey-<environment>` pointing at `key`.
pub fn build_kms_alias(environment: &Environment, key: &KmsKey) -> KmsAlias {
    KmsAlias {
        logical_name: KMS_ALIAS_LOGICAL_NAME.to_owned(),
        name: format!("{ALIAS_PREFIX}{}", resource_name(environment)),
        target_key_id: key.key_id(),
    }
}

/// Declares the certificate table, encrypted with the key behind `kms_key_arn`.
pub fn build_dynamo_table(
    environment: &Environment,
    table_name_override: Option<&str>,
    kms_key_arn: Pending,
    deletion_protection: bool,
) -> Result<DynamoTable> {
    let name = match table_name_override {
        Some(name) => name.to_owned(),
        None => resource_name(environment),
    };
    validate_table_name(&name)?;

    let table = DynamoTable {
        logical_name: TABLE_LOGICAL_NAME.to_owned(),
        billing_mode: BillingMode::PayPerRequest,
        hash_key: ID_ATTRIBUTE.to_owned(),
        range_key: None,
        attributes: Schema::new()
            .add_field(ID_ATTRIBUTE, FieldType::String)
            // ISO 8601 timestamp
            .add_field(CREATED_AT_ATTRIBUTE, FieldType::String),
        global_secondary_indexes: vec![GlobalSecondaryIndex::new(
            CREATED_AT_INDEX,
            CREATED_AT_ATTRIBUTE,
        )],
        server_side_encryption: ServerSideEncryption {
            enabled: true,
            kms_key_arn,
        },
        point_in_time_recovery: PointInTimeRecovery { enabled: true },
        deletion_protection_enabled: deletion_protection,
        tags: Tags::new(environment, name.clone()).with_purpose("certificate-storage"),
        name,
    };
    table.check_key_attributes()?;
    Ok(table)
}

/// Table CRUD on the table and its indexes, plus KMS use restricted to calls
/// made through DynamoDB in `region`.
pub fn build_policy_document(
    table_arn: Pending,
    kms_key_arn: Pending,
    region: &str,
) -> PolicyDocument {
    let index_arn = table_arn.concat("/index/*");
    let via_service = format!("dynamodb.{region}.amazonaws.com");
    debug!(%via_service, "KMS usage restricted");

    PolicyDocument::new(vec![
        Statement::allow(TABLE_ACTIONS)
            .resource(table_arn)
            .resource(index_arn),
        Statement::allow(KMS_ACTIONS)
            .resource(kms_key_arn)
            .condition(Condition::string_equals(VIA_SERVICE_CONDITION_KEY, via_service)),
    ])
}

pub fn build_iam_policy(environment: &Environment, document: PolicyDocument) -> IamPolicy {
    let name = format!("{}-policy", resource_name(environment));
    IamPolicy {
        logical_name: POLICY_LOGICAL_NAME.to_owned(),
        description: POLICY_DESCRIPTION.to_owned(),
        policy: document,
        tags: Tags::new(environment, name.clone()),
        name,
    }
}

pub fn collect_outputs(
    key: &KmsKey,
    alias: &KmsAlias,
    table: &DynamoTable,
    policy: &IamPolicy,
    region: &str,
) -> OutputSet {
    OutputSet {
        dynamodb_table_name: table.name_output(),
        dynamodb_table_arn: table.arn(),
        kms_key_id: key.key_id(),
        kms_key_arn: key.arn(),
        kms_alias_name: alias.name_output(),
        iam_policy_arn: policy.arn(),
        environment_variables: EnvironmentVariables {
            dynamodb_table: table.name_output(),
            kms_key_id: alias.name_output(),
            aws_region: Pending::literal(region),
        },
    }
}

fn validate_table_name(name: &str) -> Result<&str> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if (3..=255).contains(&name.len()) && valid_chars {
        Ok(name)
    } else {
        Err(Error::config(format!(
            "`{name}` is not a valid DynamoDB table name (3-255 characters of a-z, A-Z, 0-9, '_', '-', '.')"
        )))
    }
}

/// Every resource declared for one environment, plus the exported outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGraph {
    pub environment: Environment,
    pub kms_key: KmsKey,
    pub kms_alias: KmsAlias,
    pub table: DynamoTable,
    pub policy: IamPolicy,
    pub outputs: OutputSet,
}

impl ResourceGraph {
    /// Declares the whole graph for `config`.
    #[instrument(skip(config), fields(environment = %config.environment, region = %config.region))]
    pub fn build(config: &Configuration) -> Result<Self> {
        let environment = config.environment.clone();

        let kms_key = build_kms_key(&environment, config.kms_deletion_window_days)?;
        info!(name = KMS_KEY_LOGICAL_NAME, "KMS key declared");

        let kms_alias = build_kms_alias(&environment, &kms_key);
        info!(alias = kms_alias.name(), "KMS alias declared");

        let table = build_dynamo_table(
            &environment,
            config.table_name.as_deref(),
            kms_key.arn(),
            config.deletion_protection,
        )?;
        info!(
            table = table.name(),
            deletion_protection = table.deletion_protection_enabled(),
            "DynamoDB table declared"
        );

        let document = build_policy_document(table.arn(), kms_key.arn(), &config.region);
        let policy = build_iam_policy(&environment, document);
        info!(policy = policy.name(), "IAM policy declared");

        let outputs = collect_outputs(&kms_key, &kms_alias, &table, &policy, &config.region);

        let graph = Self {
            environment,
            kms_key,
            kms_alias,
            table,
            policy,
            outputs,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> [&dyn Resource; 4] {
        [&self.kms_key, &self.kms_alias, &self.table, &self.policy]
    }

    /// `(dependent, dependency)` edges derived from the references each resource holds.
    pub fn dependencies(&self) -> Vec<(&str, &str)> {
        self.resources()
            .into_iter()
            .flat_map(|resource| {
                resource
                    .depends_on()
                    .into_iter()
                    .map(move |dependency| (resource.logical_name(), dependency))
            })
            .collect()
    }

    /// Checks that every reference points at a resource declared earlier in this graph,
    /// and that outputs only read attributes of declared resources.
    pub fn validate(&self) -> Result<()> {
        let mut declared = HashSet::new();
        for resource in self.resources() {
            if let Some(missing) = resource
                .depends_on()
                .into_iter()
                .find(|dependency| !declared.contains(dependency))
            {
                return Err(Error::Dependency {
                    from: resource.logical_name().to_owned(),
                    to: missing.to_owned(),
                });
            }
            declared.insert(resource.logical_name());
        }

        let env = &self.outputs.environment_variables;
        let output_refs = self
            .outputs
            .scalars()
            .into_iter()
            .map(|(_, value)| value)
            .chain([&env.dynamodb_table, &env.kms_key_id, &env.aws_region])
            .flat_map(Pending::references);
        for attr in output_refs {
            if !declared.contains(attr.resource.as_str()) {
                return Err(Error::Dependency {
                    from: "outputs".to_owned(),
                    to: attr.resource.clone(),
                });
            }
        }
        Ok(())
    }

    /// The graph as a JSON document for a provisioning engine.
    pub fn to_document(&self) -> Result<Value> {
        let resources = self
            .resources()
            .into_iter()
            .zip(self.properties()?)
            .map(|(resource, properties)| {
                json!({
                    "type": resource.type_token(),
                    "name": resource.logical_name(),
                    "dependsOn": resource.depends_on(),
                    "properties": properties,
                })
            })
            .collect::<Vec<_>>();

        Ok(json!({
            "environment": self.environment,
            "resources": resources,
            "outputs": serde_json::to_value(&self.outputs)?,
        }))
    }

    fn properties(&self) -> Result<[Value; 4]> {
        Ok([
            serde_json::to_value(&self.kms_key)?,
            serde_json::to_value(&self.kms_alias)?,
            serde_json::to_value(&self.table)?,
            serde_json::to_value(&self.policy)?,
        ])
    }

    /// Human-readable description of the declared resources.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        self.write_summary(&mut out).map(|()| out).unwrap_or_default()
    }

    fn write_summary(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let table = &self.table;
        writeln!(out, "--- Certificate Monkey ({}) ---", self.environment)?;
        writeln!(
            out,
            "KMS Key: {} (deletion window {} days)",
            self.kms_key.description(),
            self.kms_key.deletion_window_in_days()
        )?;
        writeln!(out, "KMS Alias: {}", self.kms_alias.name())?;
        writeln!(out, "Table Name: {}", table.name())?;
        writeln!(out, "Partition Key: {}", table.hash_key())?;
        for field in table.attributes().fields() {
            writeln!(out, "  {}: {:?}", field.name, field.field_type)?;
        }
        for index in table.global_secondary_indexes() {
            writeln!(
                out,
                "Index: {} on {} ({:?})",
                index.name, index.hash_key, index.projection_type
            )?;
        }
        writeln!(
            out,
            "Encryption: {}, Point-in-time recovery: {}, Deletion protection: {}",
            table.server_side_encryption().enabled(),
            table.point_in_time_recovery().enabled(),
            table.deletion_protection_enabled()
        )?;
        writeln!(out, "IAM Policy: {}", self.policy.name())?;
        for (dependent, dependency) in self.dependencies() {
            writeln!(out, "  {dependent} -> {dependency}")?;
        }
        writeln!(out, "-------------------------")
    }
}
