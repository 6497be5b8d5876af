//! Tests for the resource graph builder
//!
//! These tests cover:
//! - Naming derived from the environment and the table name override
//! - The table schema, its index and the always-on encryption and recovery settings
//! - The IAM policy statements and the KMS `ViaService` restriction
//! - Outputs, including the environment variables handed to the application
//! - Dependency edges and resolution against an apply state
//!
//! Nothing here talks to AWS: the graph is a pure declaration.

use crate::graph::{
    build_dynamo_table, build_kms_key, CREATED_AT_ATTRIBUTE, CREATED_AT_INDEX, KMS_ACTIONS,
    KMS_ALIAS_LOGICAL_NAME, KMS_KEY_LOGICAL_NAME, POLICY_LOGICAL_NAME, TABLE_ACTIONS,
    TABLE_LOGICAL_NAME, VIA_SERVICE_CONDITION_KEY,
};
use crate::config::MAX_ENVIRONMENT_LEN;
use crate::resources::{
    Condition, Effect, FieldType, PolicyDocument, ProjectionType, Resource, Statement,
};
use crate::{ApplyState, Configuration, Environment, Error, Pending, ResourceGraph};
use anyhow::Result;
use aws_sdk_dynamodb::types::{BillingMode, SseType};
use serde_json::json;
use std::collections::BTreeMap;

const KEY_ARN: &str =
    "arn:aws:kms:eu-west-1:123456789012:key/12345678-1234-1234-1234-123456789012";
const KEY_ID: &str = "12345678-1234-1234-1234-123456789012";
const TABLE_ARN: &str = "arn:aws:dynamodb:eu-west-1:123456789012:table/certificate-monkey-staging";
const POLICY_ARN: &str = "arn:aws:iam::123456789012:policy/certificate-monkey-staging-policy";

fn build(environment: &str, region: &str) -> Result<ResourceGraph> {
    let config = Configuration::new(environment, region)?;
    Ok(ResourceGraph::build(&config)?)
}

fn applied_state() -> ApplyState {
    ApplyState::new()
        .with(KMS_KEY_LOGICAL_NAME, "key_id", KEY_ID)
        .with(KMS_KEY_LOGICAL_NAME, "arn", KEY_ARN)
        .with(TABLE_LOGICAL_NAME, "arn", TABLE_ARN)
        .with(POLICY_LOGICAL_NAME, "arn", POLICY_ARN)
}

#[test]
fn test_table_name_defaults_to_environment() -> Result<()> {
    for environment in ["dev", "staging", "prod", "qa_2"] {
        let graph = build(environment, "us-east-1")?;
        assert_eq!(
            graph.table.name(),
            format!("certificate-monkey-{environment}")
        );
    }
    Ok(())
}

#[test]
fn test_table_name_override() -> Result<()> {
    let config = Configuration::new("dev", "us-east-1")?.with_table_name("custom-table");
    let graph = ResourceGraph::build(&config)?;

    assert_eq!(graph.table.name(), "custom-table");
    assert_eq!(graph.table.tags().get("Name"), Some("custom-table"));
    assert_eq!(
        graph.outputs.environment_variables.dynamodb_table.known(),
        Some("custom-table")
    );
    // Other names still follow the environment.
    assert_eq!(graph.kms_alias.name(), "alias/certificate-monkey-dev");
    Ok(())
}

#[test]
fn test_invalid_table_name_override() -> Result<()> {
    let environment = Environment::new("dev")?;
    for name in ["ab", "bad name", "table/with/slashes"] {
        let result = build_dynamo_table(&environment, Some(name), Pending::literal(KEY_ARN), false);
        assert!(matches!(result, Err(Error::Config(_))), "{name}");
    }
    Ok(())
}

#[test]
fn test_longest_environment_fits_every_name_limit() -> Result<()> {
    let environment = "e".repeat(MAX_ENVIRONMENT_LEN);
    let graph = build(&environment, "us-east-1")?;
    assert_eq!(graph.policy.name().len(), 128);
    assert!(graph.table.name().len() <= 255);
    assert!(graph.kms_alias.name().len() <= 256);

    let too_long = "e".repeat(300);
    assert!(matches!(
        Configuration::new(&too_long, "us-east-1"),
        Err(Error::Config(_))
    ));
    Ok(())
}

#[test]
fn test_table_schema_and_index() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let table = &graph.table;

    assert_eq!(table.hash_key(), "id");
    assert_eq!(table.range_key(), None);
    assert_eq!(table.attributes().field_type("id"), Some(FieldType::String));
    assert_eq!(
        table.attributes().field_type(CREATED_AT_ATTRIBUTE),
        Some(FieldType::String)
    );

    let indexes = table.global_secondary_indexes();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, CREATED_AT_INDEX);
    assert_eq!(indexes[0].hash_key, CREATED_AT_ATTRIBUTE);
    assert_eq!(indexes[0].projection_type, ProjectionType::All);

    table.check_key_attributes()?;
    Ok(())
}

#[test]
fn test_encryption_and_recovery_always_enabled() -> Result<()> {
    for environment in ["dev", "staging", "prod"] {
        for deletion_protection in [true, false] {
            let config = Configuration::new(environment, "eu-central-1")?
                .with_deletion_protection(deletion_protection);
            let graph = ResourceGraph::build(&config)?;
            let table = &graph.table;

            assert!(table.server_side_encryption().enabled());
            assert_eq!(table.server_side_encryption().kms_key_arn(), &graph.kms_key.arn());
            assert!(table.point_in_time_recovery().enabled());
            assert_eq!(table.deletion_protection_enabled(), deletion_protection);
        }
    }
    Ok(())
}

#[test]
fn test_kms_key_declaration() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let key = &graph.kms_key;

    assert_eq!(key.description(), "Certificate Monkey private key encryption");
    assert_eq!(key.deletion_window_in_days(), 7);
    assert_eq!(key.tags().get("Purpose"), Some("private-key-encryption"));
    assert_eq!(graph.kms_alias.target_key_id(), &key.key_id());
    Ok(())
}

#[test]
fn test_kms_deletion_window_bounds() -> Result<()> {
    let environment = Environment::new("dev")?;
    assert!(build_kms_key(&environment, 7).is_ok());
    assert!(build_kms_key(&environment, 30).is_ok());
    assert!(matches!(build_kms_key(&environment, 6), Err(Error::Config(_))));
    assert!(matches!(build_kms_key(&environment, 31), Err(Error::Config(_))));
    Ok(())
}

#[test]
fn test_environment_is_consistent_across_resources() -> Result<()> {
    let graph = build("staging", "eu-west-1")?;
    let tag_sets = [
        graph.kms_key.tags(),
        graph.table.tags(),
        graph.policy.tags(),
    ];
    for tags in tag_sets {
        assert_eq!(tags.get("Environment"), Some("staging"));
        assert_eq!(tags.get("Application"), Some("certificate-monkey"));
    }
    assert_eq!(graph.policy.name(), "certificate-monkey-staging-policy");
    assert_eq!(
        graph.policy.description(),
        "IAM policy for Certificate Monkey application"
    );
    Ok(())
}

#[test]
fn test_policy_statements() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let statements = graph.policy.document().statements();
    assert_eq!(statements.len(), 2);

    let table_statement = &statements[0];
    assert_eq!(table_statement.effect(), Effect::Allow);
    assert_eq!(table_statement.actions(), TABLE_ACTIONS);
    assert_eq!(
        table_statement.resources(),
        [graph.table.arn(), graph.table.arn().concat("/index/*")]
    );
    assert!(table_statement.conditions().is_empty());

    let kms_statement = &statements[1];
    assert_eq!(kms_statement.actions(), KMS_ACTIONS);
    assert_eq!(kms_statement.resources(), [graph.kms_key.arn()]);
    let conditions = kms_statement.conditions();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].test, "StringEquals");
    assert_eq!(conditions[0].variable, VIA_SERVICE_CONDITION_KEY);
    assert_eq!(conditions[0].values, ["dynamodb.us-east-1.amazonaws.com"]);
    Ok(())
}

#[test]
fn test_policy_renders_iam_json() -> Result<()> {
    let graph = build("staging", "eu-west-1")?;
    let rendered = graph.policy.document().render(&applied_state())?;

    assert_eq!(
        rendered,
        json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": [
                        "dynamodb:PutItem",
                        "dynamodb:GetItem",
                        "dynamodb:UpdateItem",
                        "dynamodb:DeleteItem",
                        "dynamodb:Scan"
                    ],
                    "Resource": [TABLE_ARN, format!("{TABLE_ARN}/index/*")]
                },
                {
                    "Effect": "Allow",
                    "Action": ["kms:Encrypt", "kms:Decrypt"],
                    "Resource": [KEY_ARN],
                    "Condition": {
                        "StringEquals": {
                            "kms:ViaService": ["dynamodb.eu-west-1.amazonaws.com"]
                        }
                    }
                }
            ]
        })
    );
    Ok(())
}

#[test]
fn test_conditions_on_the_same_key_merge_their_values() -> Result<()> {
    let statement = Statement::allow(KMS_ACTIONS)
        .resource(Pending::literal(KEY_ARN))
        .condition(Condition::string_equals(
            VIA_SERVICE_CONDITION_KEY,
            "dynamodb.us-east-1.amazonaws.com",
        ))
        .condition(Condition::string_equals(
            VIA_SERVICE_CONDITION_KEY,
            "dynamodb.eu-west-1.amazonaws.com",
        ))
        .condition(Condition::string_equals(
            VIA_SERVICE_CONDITION_KEY,
            "dynamodb.us-east-1.amazonaws.com",
        ));
    let rendered = PolicyDocument::new(vec![statement]).render(&ApplyState::new())?;

    assert_eq!(
        rendered["Statement"][0]["Condition"],
        json!({
            "StringEquals": {
                "kms:ViaService": [
                    "dynamodb.us-east-1.amazonaws.com",
                    "dynamodb.eu-west-1.amazonaws.com"
                ]
            }
        })
    );
    Ok(())
}

#[test]
fn test_policy_render_requires_applied_arns() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let partial = ApplyState::new().with(KMS_KEY_LOGICAL_NAME, "arn", KEY_ARN);

    match graph.policy.document().render(&partial) {
        Err(Error::Unresolved { resource, attribute }) => {
            assert_eq!(resource, TABLE_LOGICAL_NAME);
            assert_eq!(attribute, "arn");
        }
        other => panic!("expected unresolved table arn, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_kms_key_id_output_is_alias_name() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let env = &graph.outputs.environment_variables;

    assert_eq!(env.kms_key_id.known(), Some("alias/certificate-monkey-dev"));
    assert_ne!(env.kms_key_id, graph.kms_key.key_id());

    let resolved = env.resolve(&applied_state())?;
    assert_eq!(resolved.kms_key_id, "alias/certificate-monkey-dev");
    assert_ne!(resolved.kms_key_id, KEY_ID);
    Ok(())
}

#[test]
fn test_staging_end_to_end() -> Result<()> {
    let graph = build("staging", "eu-west-1")?;

    assert_eq!(graph.table.name(), "certificate-monkey-staging");
    assert_eq!(graph.kms_alias.name(), "alias/certificate-monkey-staging");
    assert_eq!(
        graph.policy.document().statements()[1].conditions()[0].values,
        ["dynamodb.eu-west-1.amazonaws.com"]
    );

    // The environment variables are all known before apply.
    let env = graph
        .outputs
        .environment_variables
        .resolve(&ApplyState::new())?;
    assert_eq!(
        env.to_map(),
        BTreeMap::from([
            ("DYNAMODB_TABLE", "certificate-monkey-staging"),
            ("KMS_KEY_ID", "alias/certificate-monkey-staging"),
            ("AWS_REGION", "eu-west-1"),
        ])
    );
    assert_eq!(
        env.to_dotenv(),
        "AWS_REGION=eu-west-1\n\
         DYNAMODB_TABLE=certificate-monkey-staging\n\
         KMS_KEY_ID=alias/certificate-monkey-staging\n"
    );

    let outputs = graph.outputs.resolve(&applied_state())?;
    assert_eq!(outputs.dynamodb_table_name, "certificate-monkey-staging");
    assert_eq!(outputs.dynamodb_table_arn, TABLE_ARN);
    assert_eq!(outputs.kms_key_id, KEY_ID);
    assert_eq!(outputs.kms_key_arn, KEY_ARN);
    assert_eq!(outputs.kms_alias_name, "alias/certificate-monkey-staging");
    assert_eq!(outputs.iam_policy_arn, POLICY_ARN);
    Ok(())
}

#[test]
fn test_outputs_are_pending_until_applied() -> Result<()> {
    let graph = build("dev", "us-east-1")?;

    assert!(matches!(
        graph.outputs.resolve(&ApplyState::new()),
        Err(Error::Unresolved { .. })
    ));
    for (name, value) in graph.outputs.scalars() {
        let known = matches!(name, "dynamodb_table_name" | "kms_alias_name");
        assert_eq!(value.known().is_some(), known, "{name}");
    }
    Ok(())
}

#[test]
fn test_dependency_edges() -> Result<()> {
    let graph = build("dev", "us-east-1")?;

    assert_eq!(
        graph.dependencies(),
        vec![
            (KMS_ALIAS_LOGICAL_NAME, KMS_KEY_LOGICAL_NAME),
            (TABLE_LOGICAL_NAME, KMS_KEY_LOGICAL_NAME),
            (POLICY_LOGICAL_NAME, KMS_KEY_LOGICAL_NAME),
            (POLICY_LOGICAL_NAME, TABLE_LOGICAL_NAME),
        ]
    );
    assert!(graph.kms_key.depends_on().is_empty());
    graph.validate()?;
    Ok(())
}

#[test]
fn test_dangling_reference_is_rejected() -> Result<()> {
    let mut graph = build("dev", "us-east-1")?;
    graph.kms_alias.target_key_id = Pending::attr("some-other-key", "key_id");

    match graph.validate() {
        Err(Error::Dependency { from, to }) => {
            assert_eq!(from, KMS_ALIAS_LOGICAL_NAME);
            assert_eq!(to, "some-other-key");
        }
        other => panic!("expected dependency error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_missing_key_attribute_is_rejected() -> Result<()> {
    let mut graph = build("dev", "us-east-1")?;
    graph.table.attributes = crate::resources::Schema::new().add_field("id", FieldType::String);

    assert!(matches!(
        graph.table.check_key_attributes(),
        Err(Error::MissingKeyAttribute { attribute, .. }) if attribute == CREATED_AT_ATTRIBUTE
    ));
    Ok(())
}

#[test]
fn test_create_table_input() -> Result<()> {
    let config = Configuration::new("prod", "eu-west-1")?;
    let graph = ResourceGraph::build(&config)?;
    let input = graph.table.create_table_input(&applied_state())?;

    assert_eq!(input.table_name(), Some("certificate-monkey-prod"));
    assert_eq!(input.billing_mode(), Some(&BillingMode::PayPerRequest));
    assert_eq!(input.deletion_protection_enabled(), Some(true));

    let sse = input.sse_specification().expect("sse specification");
    assert_eq!(sse.enabled(), Some(true));
    assert_eq!(sse.sse_type(), Some(&SseType::Kms));
    assert_eq!(sse.kms_master_key_id(), Some(KEY_ARN));
    Ok(())
}

#[test]
fn test_create_table_input_requires_key_arn() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    assert!(matches!(
        graph.table.create_table_input(&ApplyState::new()),
        Err(Error::Unresolved { .. })
    ));
    Ok(())
}

#[test]
fn test_document() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let document = graph.to_document()?;

    let resources = document["resources"].as_array().expect("resources array");
    let names: Vec<&str> = resources
        .iter()
        .filter_map(|resource| resource["name"].as_str())
        .collect();
    assert_eq!(
        names,
        [
            KMS_KEY_LOGICAL_NAME,
            KMS_ALIAS_LOGICAL_NAME,
            TABLE_LOGICAL_NAME,
            POLICY_LOGICAL_NAME
        ]
    );

    let table = &resources[2];
    assert_eq!(table["type"], "aws:dynamodb/table:Table");
    assert_eq!(table["dependsOn"], json!([KMS_KEY_LOGICAL_NAME]));
    assert_eq!(table["properties"]["billingMode"], "PAY_PER_REQUEST");
    assert_eq!(
        table["properties"]["globalSecondaryIndexes"][0]["projectionType"],
        "ALL"
    );
    assert_eq!(
        resources[3]["properties"]["policy"]["statements"][0]["effect"],
        "Allow"
    );
    assert_eq!(
        table["properties"]["serverSideEncryption"],
        json!({
            "enabled": true,
            "kmsKeyArn": {"resource": KMS_KEY_LOGICAL_NAME, "attribute": "arn"}
        })
    );
    assert_eq!(
        table["properties"]["attributes"],
        json!([{"name": "id", "type": "S"}, {"name": "created_at", "type": "S"}])
    );

    assert_eq!(
        document["outputs"]["environment_variables"]["KMS_KEY_ID"],
        "alias/certificate-monkey-dev"
    );
    Ok(())
}

#[test]
fn test_summary_mentions_every_resource() -> Result<()> {
    let graph = build("dev", "us-east-1")?;
    let summary = graph.summary();

    assert!(summary.contains("Table Name: certificate-monkey-dev"));
    assert!(summary.contains("KMS Alias: alias/certificate-monkey-dev"));
    assert!(summary.contains("IAM Policy: certificate-monkey-dev-policy"));
    assert!(summary.contains("Index: created_at-index on created_at (All)"));
    assert!(summary.contains(&format!(
        "  {KMS_ALIAS_LOGICAL_NAME} -> {KMS_KEY_LOGICAL_NAME}\n"
    )));
    assert!(summary.starts_with("--- Certificate Monkey (dev) ---\n"));
    assert!(summary.ends_with("-------------------------\n"));
    Ok(())
}
