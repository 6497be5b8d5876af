use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Environment;

pub const APPLICATION: &str = "certificate-monkey";

/// Tags attached to a resource.
///
/// Always carries `Name`, `Environment` and `Application`; the environment tag
/// comes from the same [`Environment`] value the resource names are built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new(environment: &Environment, name: impl Into<String>) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("Name".to_owned(), name.into());
        tags.insert("Environment".to_owned(), environment.name().to_owned());
        tags.insert("Application".to_owned(), APPLICATION.to_owned());
        Self(tags)
    }

    /// Adds a `Purpose` tag.
    pub fn with_purpose(self, purpose: impl Into<String>) -> Self {
        self.with("Purpose", purpose)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
