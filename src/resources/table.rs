use aws_sdk_dynamodb::operation::create_table::CreateTableInput;
use aws_sdk_dynamodb::types::{
    self as sdk, KeySchemaElement, KeyType, Projection, SseSpecification, SseType, Tag,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::pending::{ApplyState, AttrRef, Pending};
use crate::resources::{Resource, Schema, Tags};

/// DynamoDB table declaration.
///
/// # Table Structure
///
/// - **Table Name**: unique within the account and region.
/// - **Primary Key**: a partition (hash) key and an optional sort (range) key.
/// - **Attributes**: only key attributes of the table and its indexes are declared.
///
/// # Capacity Mode
///
/// Tables are On-Demand (`PAY_PER_REQUEST`): capacity follows the workload, so
/// no read or write throughput is declared.
///
/// # Secondary Indexes
///
/// A global secondary index has its own partition key and sort key, which can
/// differ from the table's. Changing the table's key schema requires replacing
/// the table, so key attributes and indexes are effectively append-only.
///
/// Server-side encryption and point-in-time recovery have no setter: a
/// declaration built by this crate always has both enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamoTable {
    #[serde(skip)]
    pub(crate) logical_name: String,
    pub(crate) name: String,
    pub(crate) billing_mode: BillingMode,
    pub(crate) hash_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) range_key: Option<String>,
    pub(crate) attributes: Schema,
    pub(crate) global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    pub(crate) server_side_encryption: ServerSideEncryption,
    pub(crate) point_in_time_recovery: PointInTimeRecovery,
    pub(crate) deletion_protection_enabled: bool,
    pub(crate) tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    PayPerRequest,
}

impl From<BillingMode> for sdk::BillingMode {
    fn from(mode: BillingMode) -> Self {
        match mode {
            BillingMode::PayPerRequest => sdk::BillingMode::PayPerRequest,
        }
    }
}

/// Which attributes are copied into an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionType {
    All,
}

impl From<ProjectionType> for sdk::ProjectionType {
    fn from(projection: ProjectionType) -> Self {
        match projection {
            ProjectionType::All => sdk::ProjectionType::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSecondaryIndex {
    pub name: String,
    pub hash_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_key: Option<String>,
    pub projection_type: ProjectionType,
}

impl GlobalSecondaryIndex {
    pub fn new(name: impl Into<String>, hash_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash_key: hash_key.into(),
            range_key: None,
            projection_type: ProjectionType::All,
        }
    }

    fn key_attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash_key.as_str()).chain(self.range_key.as_deref())
    }

    fn to_sdk(&self) -> Result<sdk::GlobalSecondaryIndex> {
        Ok(sdk::GlobalSecondaryIndex::builder()
            .index_name(&self.name)
            .set_key_schema(Some(key_schema(&self.hash_key, self.range_key.as_deref())?))
            .projection(
                Projection::builder()
                    .projection_type(self.projection_type.into())
                    .build(),
            )
            .build()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSideEncryption {
    pub(crate) enabled: bool,
    pub(crate) kms_key_arn: Pending,
}

impl ServerSideEncryption {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn kms_key_arn(&self) -> &Pending {
        &self.kms_key_arn
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointInTimeRecovery {
    pub(crate) enabled: bool,
}

impl PointInTimeRecovery {
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl DynamoTable {
    pub const TYPE_TOKEN: &'static str = "aws:dynamodb/table:Table";

    /// Returns the name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table name as an output. Known at build time.
    pub fn name_output(&self) -> Pending {
        Pending::literal(self.name.clone())
    }

    pub fn arn(&self) -> Pending {
        Pending::attr(&self.logical_name, "arn")
    }

    pub fn billing_mode(&self) -> BillingMode {
        self.billing_mode
    }

    /// Returns the partition key of the table.
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Returns the sort key of the table, if any.
    pub fn range_key(&self) -> Option<&str> {
        self.range_key.as_deref()
    }

    pub fn attributes(&self) -> &Schema {
        &self.attributes
    }

    pub fn global_secondary_indexes(&self) -> &[GlobalSecondaryIndex] {
        &self.global_secondary_indexes
    }

    pub fn server_side_encryption(&self) -> &ServerSideEncryption {
        &self.server_side_encryption
    }

    pub fn point_in_time_recovery(&self) -> &PointInTimeRecovery {
        &self.point_in_time_recovery
    }

    pub fn deletion_protection_enabled(&self) -> bool {
        self.deletion_protection_enabled
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Checks that every key of the table and of its indexes has an attribute definition.
    pub fn check_key_attributes(&self) -> Result<()> {
        let table_keys = std::iter::once(self.hash_key.as_str()).chain(self.range_key.as_deref());
        let index_keys = self
            .global_secondary_indexes
            .iter()
            .flat_map(GlobalSecondaryIndex::key_attributes);

        match table_keys
            .chain(index_keys)
            .find(|key| !self.attributes.contains(key))
        {
            Some(missing) => Err(Error::MissingKeyAttribute {
                table: self.name.clone(),
                attribute: missing.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// The declaration as a DynamoDB `CreateTable` request.
    ///
    /// Needs the key ARN from `state`. Point-in-time recovery is not part of
    /// `CreateTable`; an engine enables it with `UpdateContinuousBackups`.
    pub fn create_table_input(&self, state: &ApplyState) -> Result<CreateTableInput> {
        let kms_key_arn = self.server_side_encryption.kms_key_arn.resolve(state)?;

        let global_secondary_indexes = self
            .global_secondary_indexes
            .iter()
            .map(GlobalSecondaryIndex::to_sdk)
            .collect::<Result<Vec<_>>>()?;

        let tags = self
            .tags
            .iter()
            .map(|(key, value)| -> Result<Tag> {
                Ok(Tag::builder().key(key).value(value).build()?)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CreateTableInput::builder()
            .table_name(&self.name)
            .billing_mode(self.billing_mode.into())
            .set_attribute_definitions(Some(self.attributes.to_sdk()?))
            .set_key_schema(Some(key_schema(&self.hash_key, self.range_key.as_deref())?))
            .set_global_secondary_indexes(Some(global_secondary_indexes))
            .sse_specification(
                SseSpecification::builder()
                    .enabled(self.server_side_encryption.enabled)
                    .sse_type(SseType::Kms)
                    .kms_master_key_id(kms_key_arn)
                    .build(),
            )
            .deletion_protection_enabled(self.deletion_protection_enabled)
            .set_tags(Some(tags))
            .build()?)
    }
}

impl Resource for DynamoTable {
    fn type_token(&self) -> &'static str {
        Self::TYPE_TOKEN
    }

    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn references(&self) -> Vec<&AttrRef> {
        self.server_side_encryption.kms_key_arn.references()
    }
}

fn key_schema(hash_key: &str, range_key: Option<&str>) -> Result<Vec<KeySchemaElement>> {
    let mut key_schema = vec![KeySchemaElement::builder()
        .attribute_name(hash_key)
        .key_type(KeyType::Hash)
        .build()?];

    if let Some(range_key) = range_key {
        key_schema.push(
            KeySchemaElement::builder()
                .attribute_name(range_key)
                .key_type(KeyType::Range)
                .build()?,
        );
    }

    Ok(key_schema)
}
