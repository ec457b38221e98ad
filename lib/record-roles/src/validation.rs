//! Attribute validation rules and the per-record error collection.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{AttributeAccess, Value};

/// Validation messages keyed by attribute name.
///
/// Merging appends messages per attribute; existing messages are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        let messages = self.0.entry(attribute.into()).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    /// Union `other` into this collection.
    pub fn merge(&mut self, other: &FieldErrors) {
        for (attribute, messages) in &other.0 {
            for message in messages {
                self.add(attribute.clone(), message.clone());
            }
        }
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.0.get(attribute).is_some_and(|m| !m.is_empty())
    }

    pub fn get(&self, attribute: &str) -> &[String] {
        self.0.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A validation rule over one or more attributes.
///
/// Every rule except [`Rule::Required`] skips empty values.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required(Vec<String>),
    Integer(Vec<String>),
    Number(Vec<String>),
    Boolean(Vec<String>),
    MaxLength { attributes: Vec<String>, max: usize },
}

fn names<I, S>(attributes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    attributes.into_iter().map(Into::into).collect()
}

impl Rule {
    pub fn required<I: IntoIterator<Item = S>, S: Into<String>>(attributes: I) -> Self {
        Rule::Required(names(attributes))
    }

    pub fn integer<I: IntoIterator<Item = S>, S: Into<String>>(attributes: I) -> Self {
        Rule::Integer(names(attributes))
    }

    pub fn number<I: IntoIterator<Item = S>, S: Into<String>>(attributes: I) -> Self {
        Rule::Number(names(attributes))
    }

    pub fn boolean<I: IntoIterator<Item = S>, S: Into<String>>(attributes: I) -> Self {
        Rule::Boolean(names(attributes))
    }

    pub fn max_length<I: IntoIterator<Item = S>, S: Into<String>>(
        attributes: I,
        max: usize,
    ) -> Self {
        Rule::MaxLength {
            attributes: names(attributes),
            max,
        }
    }

    pub fn attributes(&self) -> &[String] {
        match self {
            Rule::Required(attributes)
            | Rule::Integer(attributes)
            | Rule::Number(attributes)
            | Rule::Boolean(attributes)
            | Rule::MaxLength { attributes, .. } => attributes,
        }
    }

    /// Check the rule against `target`, recording failures in `errors`.
    pub fn validate(&self, target: &dyn AttributeAccess, errors: &mut FieldErrors) {
        for attribute in self.attributes() {
            let value = target.try_get(attribute).unwrap_or_default();
            if let Some(message) = self.check(attribute, &value) {
                errors.add(attribute.clone(), message);
            }
        }
    }

    fn check(&self, attribute: &str, value: &Value) -> Option<String> {
        if value.is_empty() {
            return match self {
                Rule::Required(_) => Some(format!("{} cannot be blank.", attribute)),
                _ => None,
            };
        }

        match self {
            Rule::Required(_) => None,
            Rule::Integer(_) => (!is_integer(value))
                .then(|| format!("{} must be an integer.", attribute)),
            Rule::Number(_) => {
                (!is_number(value)).then(|| format!("{} must be a number.", attribute))
            }
            Rule::Boolean(_) => (!is_boolean(value))
                .then(|| format!("{} must be either true or false.", attribute)),
            Rule::MaxLength { max, .. } => match value {
                Value::String(s) if s.chars().count() > *max => Some(format!(
                    "{} should contain at most {} characters.",
                    attribute, max
                )),
                Value::String(_) => None,
                _ => Some(format!("{} must be a string.", attribute)),
            },
        }
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Int(_) => true,
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_number(value: &Value) -> bool {
    match value {
        Value::Int(_) | Value::Float(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Int(n) => *n == 0 || *n == 1,
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordError, Row};

    struct Attributes(Row);

    impl AttributeAccess for Attributes {
        fn try_get(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }

        fn try_set(&mut self, name: &str, value: Value) -> Result<bool, RecordError> {
            Ok(self.0.insert(name.to_string(), value).is_some())
        }
    }

    fn target(pairs: &[(&str, Value)]) -> Attributes {
        Attributes(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn required_rejects_null_and_empty_string() {
        let mut errors = FieldErrors::new();
        let t = target(&[("name", Value::Null), ("address", Value::from(""))]);

        Rule::required(["name", "address"]).validate(&t, &mut errors);

        assert_eq!(errors.first("name"), Some("name cannot be blank."));
        assert!(errors.has("address"));
    }

    #[test]
    fn integer_accepts_numeric_strings() {
        let mut errors = FieldErrors::new();
        let t = target(&[("a", Value::from("12")), ("b", Value::from("invalid"))]);

        Rule::integer(["a", "b"]).validate(&t, &mut errors);

        assert!(!errors.has("a"));
        assert_eq!(errors.first("b"), Some("b must be an integer."));
    }

    #[test]
    fn type_rules_skip_empty_values() {
        let mut errors = FieldErrors::new();
        let t = target(&[("hasScholarship", Value::Null)]);

        Rule::boolean(["hasScholarship", "missing"]).validate(&t, &mut errors);
        Rule::integer(["hasScholarship"]).validate(&t, &mut errors);

        assert!(errors.is_empty());
    }

    #[test]
    fn boolean_accepts_flags() {
        let mut errors = FieldErrors::new();
        let t = target(&[
            ("a", Value::Bool(true)),
            ("b", Value::Int(0)),
            ("c", Value::from("yes")),
        ]);

        Rule::boolean(["a", "b", "c"]).validate(&t, &mut errors);

        assert!(!errors.has("a"));
        assert!(!errors.has("b"));
        assert!(errors.has("c"));
    }

    #[test]
    fn max_length_counts_characters() {
        let mut errors = FieldErrors::new();
        let t = target(&[("name", Value::from("Åsa")), ("address", Value::from("long"))]);

        Rule::max_length(["name", "address"], 3).validate(&t, &mut errors);

        assert!(!errors.has("name"));
        assert!(errors.has("address"));
    }

    #[test]
    fn merge_unions_messages() {
        let mut primary = FieldErrors::new();
        primary.add("name", "name cannot be blank.");

        let mut extension = FieldErrors::new();
        extension.add("name", "name cannot be blank.");
        extension.add("name", "name is taken.");
        extension.add("studyGroupId", "studyGroupId must be an integer.");

        primary.merge(&extension);

        assert_eq!(
            primary.get("name"),
            ["name cannot be blank.".to_string(), "name is taken.".to_string()]
        );
        assert!(primary.has("studyGroupId"));
    }
}
