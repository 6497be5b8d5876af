//! Deferred values.
//!
//! Provider-assigned attributes (ARNs, key ids) only exist after the external
//! provisioning engine has applied the graph. Declarations carry them as
//! [`Pending`] expressions instead of plain strings, and the only way to read
//! one is [`Pending::resolve`] against an [`ApplyState`] snapshot.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A provider-assigned attribute of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AttrRef {
    pub resource: String,
    pub attribute: String,
}

impl AttrRef {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// String expression over literals and resource attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Expr {
    Literal(String),
    Attr(AttrRef),
    Concat { concat: Vec<Expr> },
}

impl Expr {
    /// Every attribute this expression needs before it can be evaluated.
    pub fn references(&self) -> Vec<&AttrRef> {
        match self {
            Expr::Literal(_) => Vec::new(),
            Expr::Attr(attr) => vec![attr],
            Expr::Concat { concat } => concat.iter().flat_map(Expr::references).collect(),
        }
    }

    fn evaluate(&self, state: &ApplyState) -> Result<String> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Attr(attr) => state.get(attr).map(str::to_owned),
            Expr::Concat { concat } => concat.iter().map(|part| part.evaluate(state)).collect(),
        }
    }
}

/// A value that is only valid once the external apply step has completed.
///
/// Literal values (names derived from configuration) are already known at
/// build time and can be read with [`Pending::known`]; everything else must go
/// through [`Pending::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending<T = String> {
    expr: Expr,
    _value: PhantomData<fn() -> T>,
}

impl<T> Pending<T> {
    fn from_expr(expr: Expr) -> Self {
        Self {
            expr,
            _value: PhantomData,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::from_expr(Expr::Literal(value.into()))
    }

    pub(crate) fn attr(resource: &str, attribute: &str) -> Self {
        Self::from_expr(Expr::Attr(AttrRef::new(resource, attribute)))
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn references(&self) -> Vec<&AttrRef> {
        self.expr.references()
    }

    /// The value, if it does not depend on any provider-assigned attribute.
    pub fn known(&self) -> Option<&str> {
        match &self.expr {
            Expr::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Appends a literal suffix, keeping the result deferred.
    pub fn concat(&self, suffix: &str) -> Pending<String> {
        let mut parts = match &self.expr {
            Expr::Concat { concat } => concat.clone(),
            other => vec![other.clone()],
        };
        parts.push(Expr::Literal(suffix.to_owned()));
        Pending::from_expr(Expr::Concat { concat: parts })
    }

    /// Reads the value out of an apply snapshot.
    pub fn resolve(&self, state: &ApplyState) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.expr.evaluate(state)?;
        raw.parse::<T>()
            .map_err(|e| Error::InvalidResolvedValue {
                value: raw.clone(),
                reason: e.to_string(),
            })
    }
}

impl<T> Serialize for Pending<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.expr.serialize(serializer)
    }
}

/// Attribute values assigned by the provider after the graph was applied,
/// keyed by logical resource name and attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ApplyState {
    resources: HashMap<String, HashMap<String, String>>,
}

impl ApplyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Records an attribute and returns the modified state.
    pub fn with(
        mut self,
        resource: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.resources
            .entry(resource.into())
            .or_default()
            .insert(attribute.into(), value.into());
        self
    }

    pub fn get(&self, attr: &AttrRef) -> Result<&str> {
        self.resources
            .get(&attr.resource)
            .and_then(|attributes| attributes.get(&attr.attribute))
            .map(String::as_str)
            .ok_or_else(|| Error::Unresolved {
                resource: attr.resource.clone(),
                attribute: attr.attribute.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_is_known_without_state() {
        let name: Pending = Pending::literal("certificate-monkey-dev");
        assert_eq!(name.known(), Some("certificate-monkey-dev"));
        assert!(name.references().is_empty());
        assert_eq!(
            name.resolve(&ApplyState::new()).unwrap(),
            "certificate-monkey-dev"
        );
    }

    #[test]
    fn attribute_requires_state() {
        let arn: Pending = Pending::attr("table", "arn");
        assert_eq!(arn.known(), None);
        match arn.resolve(&ApplyState::new()) {
            Err(Error::Unresolved { resource, attribute }) => {
                assert_eq!(resource, "table");
                assert_eq!(attribute, "arn");
            }
            other => panic!("expected unresolved error, got {other:?}"),
        }
    }

    #[test]
    fn concat_resolves_each_part() {
        let index_arn = Pending::<String>::attr("table", "arn").concat("/index/*");
        assert_eq!(index_arn.references(), vec![&AttrRef::new("table", "arn")]);

        let state = ApplyState::new().with("table", "arn", "arn:aws:dynamodb:::table/t");
        assert_eq!(
            index_arn.resolve(&state).unwrap(),
            "arn:aws:dynamodb:::table/t/index/*"
        );
    }

    #[test]
    fn typed_resolution_reports_parse_failures() {
        let state = ApplyState::new().with("key", "window", "seven");
        let window: Pending<u32> = Pending::attr("key", "window");
        assert!(matches!(
            window.resolve(&state),
            Err(Error::InvalidResolvedValue { .. })
        ));
    }

    #[test]
    fn state_loads_from_json() {
        let state = ApplyState::from_json_str(r#"{"key": {"arn": "arn:aws:kms:k"}}"#).unwrap();
        assert_eq!(state.get(&AttrRef::new("key", "arn")).unwrap(), "arn:aws:kms:k");
    }
}
