use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::pending::{ApplyState, AttrRef, Pending};
use crate::resources::{Resource, Tags};

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

/// A condition block entry, e.g. `StringEquals kms:ViaService = [...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub test: String,
    pub variable: String,
    pub values: Vec<String>,
}

impl Condition {
    pub fn string_equals(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            test: "StringEquals".to_owned(),
            variable: variable.into(),
            values: vec![value.into()],
        }
    }
}

/// One permission statement. Actions, resources and conditions are sets:
/// adding a duplicate is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub(crate) effect: Effect,
    pub(crate) actions: Vec<String>,
    pub(crate) resources: Vec<Pending>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) conditions: Vec<Condition>,
}

impl Statement {
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statement = Self {
            effect: Effect::Allow,
            actions: Vec::new(),
            resources: Vec::new(),
            conditions: Vec::new(),
        };
        actions
            .into_iter()
            .fold(statement, |statement, action| statement.action(action))
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        let action = action.into();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    pub fn resource(mut self, resource: Pending) -> Self {
        if !self.resources.contains(&resource) {
            self.resources.push(resource);
        }
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
        self
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn resources(&self) -> &[Pending] {
        &self.resources
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn render(&self, state: &ApplyState) -> Result<Value> {
        let resources = self
            .resources
            .iter()
            .map(|resource| resource.resolve(state))
            .collect::<Result<Vec<String>>>()?;

        let mut statement = Map::new();
        statement.insert("Effect".into(), json!(self.effect));
        statement.insert("Action".into(), json!(self.actions));
        statement.insert("Resource".into(), json!(resources));

        if !self.conditions.is_empty() {
            let mut tests = Map::new();
            for condition in &self.conditions {
                let variables = tests
                    .entry(condition.test.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(variables) = variables {
                    let values = variables
                        .entry(condition.variable.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(values) = values {
                        for value in &condition.values {
                            let value = json!(value);
                            if !values.contains(&value) {
                                values.push(value);
                            }
                        }
                    }
                }
            }
            statement.insert("Condition".into(), Value::Object(tests));
        }

        Ok(Value::Object(statement))
    }
}

/// An ordered list of permission statements. Computed, not a provider resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    pub(crate) version: String,
    pub(crate) statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_owned(),
            statements,
        }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn references(&self) -> Vec<&AttrRef> {
        self.statements
            .iter()
            .flat_map(|statement| statement.resources.iter())
            .flat_map(Pending::references)
            .collect()
    }

    /// Standard IAM JSON, with every ARN resolved from `state`.
    pub fn render(&self, state: &ApplyState) -> Result<Value> {
        let statements = self
            .statements
            .iter()
            .map(|statement| statement.render(state))
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({
            "Version": self.version,
            "Statement": statements,
        }))
    }
}

/// A named, attachable IAM policy wrapping a [`PolicyDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicy {
    #[serde(skip)]
    pub(crate) logical_name: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) policy: PolicyDocument,
    pub(crate) tags: Tags,
}

impl IamPolicy {
    pub const TYPE_TOKEN: &'static str = "aws:iam/policy:Policy";

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.policy
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn arn(&self) -> Pending {
        Pending::attr(&self.logical_name, "arn")
    }
}

impl Resource for IamPolicy {
    fn type_token(&self) -> &'static str {
        Self::TYPE_TOKEN
    }

    fn logical_name(&self) -> &str {
        &self.logical_name
    }

    fn references(&self) -> Vec<&AttrRef> {
        self.policy.references()
    }
}
