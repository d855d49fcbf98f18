use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Kind, Number};

/// Expected type of a parameter as named in the rules file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Float,
    String,
    Boolean,
    List,
}

impl ValueType {
    /// Strict kind match, except that whole numbers are valid floats.
    pub fn accepts(self, kind: Kind) -> bool {
        match self {
            ValueType::Integer => kind == Kind::Integer,
            ValueType::Float => matches!(kind, Kind::Integer | Kind::Float),
            ValueType::String => kind == Kind::String,
            ValueType::Boolean => kind == Kind::Boolean,
            ValueType::List => kind == Kind::List,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::List => "list",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected shape of one configuration parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub parameter: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Number>,
}

impl Rule {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value_type: None,
            min: None,
            max: None,
        }
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_min(mut self, min: impl Into<Number>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<Number>) -> Self {
        self.max = Some(max.into());
        self
    }
}

/// Reasons a single rule record cannot be evaluated.
#[derive(Debug, Error)]
pub enum RuleFault {
    #[error("rule must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("rule has no string `parameter`")]
    MissingParameter,
    #[error("invalid `{field}`: {source}")]
    InvalidField {
        field: &'static str,
        source: serde_json::Error,
    },
    #[error("malformed rule: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One element of the rules array, decoded lazily so that a bad record only
/// affects its own rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RuleRecord(serde_json::Value);

impl RuleRecord {
    /// The `parameter` key when present and a string, even if the rest of the
    /// record is invalid.
    pub fn parameter_hint(&self) -> Option<&str> {
        self.0.get("parameter").and_then(serde_json::Value::as_str)
    }

    pub fn parameter(&self) -> Result<&str, RuleFault> {
        self.object()?;
        self.parameter_hint().ok_or(RuleFault::MissingParameter)
    }

    /// The declared `type`; absent or null means unconstrained.
    pub fn value_type(&self) -> Result<Option<ValueType>, RuleFault> {
        self.field("type")
    }

    /// A `min` or `max` bound; absent or null means unbounded.
    pub fn bound(&self, field: &'static str) -> Result<Option<Number>, RuleFault> {
        self.field(field)
    }

    /// Strict decode of the whole record.
    pub fn resolve(&self) -> Result<Rule, RuleFault> {
        self.object()?;
        Ok(Rule::deserialize(&self.0)?)
    }

    fn object(&self) -> Result<&serde_json::Map<String, serde_json::Value>, RuleFault> {
        self.0
            .as_object()
            .ok_or_else(|| RuleFault::NotAnObject(json_kind(&self.0)))
    }

    fn field<T: serde::de::DeserializeOwned>(
        &self,
        field: &'static str,
    ) -> Result<Option<T>, RuleFault> {
        match self.object()?.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(raw) => T::deserialize(raw)
                .map(Some)
                .map_err(|source| RuleFault::InvalidField { field, source }),
        }
    }
}

impl From<serde_json::Value> for RuleRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let mut object = serde_json::Map::new();
        object.insert("parameter".into(), rule.parameter.into());
        if let Some(value_type) = rule.value_type {
            object.insert("type".into(), value_type.name().into());
        }
        if let Some(min) = rule.min {
            object.insert("min".into(), serde_json::Number::from(min).into());
        }
        if let Some(max) = rule.max {
            object.insert("max".into(), serde_json::Number::from(max).into());
        }
        Self(serde_json::Value::Object(object))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Ordered rule records; order only affects diagnostic order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    records: Vec<RuleRecord>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: impl Into<RuleRecord>) {
        self.records.push(record.into());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleRecord> {
        self.records.iter()
    }
}

impl<R: Into<RuleRecord>> FromIterator<R> for RuleSet {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a RuleRecord;
    type IntoIter = std::slice::Iter<'a, RuleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_full_record() {
        let record = RuleRecord::from(json!({
            "parameter": "port",
            "type": "integer",
            "min": 1024,
            "max": 65535
        }));
        let rule = record.resolve().expect("resolve");
        assert_eq!(
            rule,
            Rule::new("port")
                .with_type(ValueType::Integer)
                .with_min(1024)
                .with_max(65535)
        );
    }

    #[test]
    fn null_fields_mean_absent() {
        let record = RuleRecord::from(json!({
            "parameter": "name",
            "type": null,
            "min": null,
            "extra": "ignored"
        }));
        let rule = record.resolve().expect("resolve");
        assert_eq!(rule, Rule::new("name"));
    }

    #[test]
    fn float_bounds_keep_precision() {
        let record = RuleRecord::from(json!({"parameter": "ratio", "type": "float", "max": 0.75}));
        let rule = record.resolve().expect("resolve");
        assert_eq!(rule.max, Some(Number::Float(0.75)));
    }

    #[test]
    fn unknown_type_is_a_fault() {
        let record = RuleRecord::from(json!({"parameter": "port", "type": "double"}));
        let err = record.resolve().unwrap_err();
        assert!(matches!(err, RuleFault::Malformed(_)));
        assert!(err.to_string().contains("double"));
        assert_eq!(record.parameter_hint(), Some("port"));
    }

    #[test]
    fn non_numeric_bound_is_a_fault() {
        let record = RuleRecord::from(json!({"parameter": "port", "type": "integer", "min": "low"}));
        assert!(matches!(record.resolve(), Err(RuleFault::Malformed(_))));
    }

    #[test]
    fn fields_decode_independently() {
        let record = RuleRecord::from(json!({"parameter": "name", "type": "string", "min": "a"}));
        assert_eq!(record.parameter().expect("parameter"), "name");
        assert_eq!(record.value_type().expect("type"), Some(ValueType::String));
        assert!(matches!(
            record.bound("min"),
            Err(RuleFault::InvalidField { field: "min", .. })
        ));
        assert_eq!(record.bound("max").expect("max"), None);
    }

    #[test]
    fn unknown_type_field_names_the_field() {
        let record = RuleRecord::from(json!({"parameter": "port", "type": "double"}));
        let err = record.value_type().unwrap_err();
        assert!(err.to_string().starts_with("invalid `type`:"));
    }

    #[test]
    fn parameter_must_be_a_string() {
        let record = RuleRecord::from(json!({"parameter": 7, "type": "string"}));
        assert!(matches!(record.parameter(), Err(RuleFault::MissingParameter)));
        let record = RuleRecord::from(json!([1, 2]));
        assert!(matches!(record.parameter(), Err(RuleFault::NotAnObject("array"))));
    }

    #[test]
    fn non_object_record_is_a_fault() {
        let record = RuleRecord::from(json!("port"));
        assert!(matches!(record.resolve(), Err(RuleFault::NotAnObject("string"))));
        assert_eq!(record.parameter_hint(), None);
    }

    #[test]
    fn missing_parameter_name_is_a_fault() {
        let record = RuleRecord::from(json!({"type": "string"}));
        assert!(record.resolve().is_err());
    }

    #[test]
    fn built_rule_survives_conversion_to_record() {
        let rule = Rule::new("ratio")
            .with_type(ValueType::Float)
            .with_min(0.5)
            .with_max(2);
        let record = RuleRecord::from(rule.clone());
        assert_eq!(record.resolve().expect("resolve"), rule);
    }

    #[test]
    fn float_accepts_integers_but_integer_rejects_booleans() {
        assert!(ValueType::Float.accepts(Kind::Integer));
        assert!(!ValueType::Integer.accepts(Kind::Float));
        assert!(!ValueType::Integer.accepts(Kind::Boolean));
        assert!(!ValueType::Boolean.accepts(Kind::Integer));
    }
}
