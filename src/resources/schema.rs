use aws_sdk_dynamodb::types::{self as sdk, ScalarAttributeType};
use serde::Serialize;

use crate::error::Result;

/// Attribute definitions of a DynamoDB table.
///
/// DynamoDB is schemaless for ordinary attributes: only attributes used as a
/// key (of the table or of a secondary index) are declared up front. The
/// definitions form a set keyed by attribute name; adding a field that is
/// already present replaces its type.
///
/// # Example
///
/// ```
/// use certificate_monkey_infra::resources::{FieldType, Schema};
///
/// let schema = Schema::new()
///     .add_field("id", FieldType::String)
///     .add_field("created_at", FieldType::String);
/// assert!(schema.contains("created_at"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<AttributeDefinition>,
}

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    /// Represents a string field.
    #[serde(rename = "S")]
    String,
    /// Represents a number field.
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

impl From<FieldType> for ScalarAttributeType {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::String => ScalarAttributeType::S,
            FieldType::Number => ScalarAttributeType::N,
            FieldType::Binary => ScalarAttributeType::B,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Schema {
    /// Creates a new empty `Schema`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the schema and returns the modified `Schema`.
    pub fn add_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(existing) => existing.field_type = field_type,
            None => self.fields.push(AttributeDefinition { name, field_type }),
        }
        self
    }

    /// Returns the declared fields in insertion order.
    pub fn fields(&self) -> &[AttributeDefinition] {
        &self.fields
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.field_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field_type(name).is_some()
    }

    /// Attribute definitions in the shape of the DynamoDB API.
    pub fn to_sdk(&self) -> Result<Vec<sdk::AttributeDefinition>> {
        self.fields
            .iter()
            .map(|field| -> Result<sdk::AttributeDefinition> {
                Ok(sdk::AttributeDefinition::builder()
                    .attribute_name(&field.name)
                    .attribute_type(field.field_type.into())
                    .build()?)
            })
            .collect()
    }
}
