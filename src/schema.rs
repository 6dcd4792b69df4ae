//! Schema System - Static Fragments, One Compiled Validator
//!
//! Plugins describe their fields with plain descriptors. The composer
//! merges every fragment into one closed [`Record`] and validates the raw
//! configuration against it once.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::ComposeError;
use crate::validation::{child_location, index_location, Violation, ViolationRule};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Integer,
    String,
    Path,
    List(Box<FieldType>),
    /// String-keyed mapping with uniformly typed values.
    Map(Box<FieldType>),
    Optional(Box<FieldType>),
    /// Accepts a single value or a list; always normalizes to a list.
    OneOrMany(Box<FieldType>),
    Record(Record),
    /// First alternative that validates without violations wins.
    Union(Vec<FieldType>),
    Any,
}

impl FieldType {
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn map(inner: FieldType) -> Self {
        Self::Map(Box::new(inner))
    }

    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn one_or_many(inner: FieldType) -> Self {
        Self::OneOrMany(Box::new(inner))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Bool => "bool".into(),
            Self::Integer => "integer".into(),
            Self::String => "string".into(),
            Self::Path => "path".into(),
            Self::List(inner) => format!("list<{}>", inner.describe()),
            Self::Map(inner) => format!("map<string, {}>", inner.describe()),
            Self::Optional(inner) => format!("optional<{}>", inner.describe()),
            Self::OneOrMany(inner) => format!("{0} | list<{0}>", inner.describe()),
            Self::Record(record) => record.describe(),
            Self::Union(alternatives) => alternatives
                .iter()
                .map(FieldType::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Any => "any".into(),
        }
    }

    /// Validate `value`, pushing every problem found, and return the
    /// normalized value (defaults applied, shorthands expanded).
    pub fn validate(&self, value: &Value, location: &str, violations: &mut Vec<Violation>) -> Value {
        match self {
            Self::Bool if value.is_boolean() => value.clone(),
            Self::Integer if value.is_i64() => value.clone(),
            Self::String | Self::Path if value.is_string() => value.clone(),
            Self::List(inner) | Self::OneOrMany(inner) if value.is_array() => {
                let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
                Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| inner.validate(item, &index_location(location, i), violations))
                        .collect(),
                )
            }
            Self::OneOrMany(inner) => {
                Value::Array(vec![inner.validate(value, &index_location(location, 0), violations)])
            }
            Self::Map(inner) if value.is_object() => {
                let mut out = Map::new();
                if let Some(entries) = value.as_object() {
                    for (key, item) in entries {
                        let normalized = inner.validate(item, &child_location(location, key), violations);
                        out.insert(key.clone(), normalized);
                    }
                }
                Value::Object(out)
            }
            Self::Optional(_) if value.is_null() => Value::Null,
            Self::Optional(inner) => inner.validate(value, location, violations),
            Self::Record(record) => record.validate(value, location, violations),
            Self::Union(alternatives) => {
                for alternative in alternatives {
                    let mut local = Vec::new();
                    let normalized = alternative.validate(value, location, &mut local);
                    if local.is_empty() {
                        return normalized;
                    }
                }
                violations.push(
                    Violation::new(location, ViolationRule::NoMatchingVariant, "Value matches none of the accepted forms")
                        .expected(self.describe())
                        .actual(type_name(value)),
                );
                value.clone()
            }
            Self::Any => value.clone(),
            _ => {
                violations.push(
                    Violation::new(location, ViolationRule::WrongType, "Wrong type")
                        .expected(self.describe())
                        .actual(type_name(value)),
                );
                value.clone()
            }
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: FieldType,
    /// `None` marks the field as required.
    pub default: Option<Value>,
}

impl Field {
    pub fn required(ty: FieldType) -> Self {
        Self { ty, default: None }
    }

    pub fn with_default(ty: FieldType, default: Value) -> Self {
        Self { ty, default: Some(default) }
    }

    /// Nullable field defaulting to `null`.
    pub fn optional(ty: FieldType) -> Self {
        Self {
            ty: FieldType::optional(ty),
            default: Some(Value::Null),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A closed set of named fields. Keys not declared here are rejected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Field>,
    shorthand: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// A bare scalar in place of this record is read as `{<name>: scalar}`.
    pub fn shorthand(mut self, name: impl Into<String>) -> Self {
        self.shorthand = Some(name.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        format!("{{{}}}", names.join(", "))
    }

    pub fn validate(&self, value: &Value, location: &str, violations: &mut Vec<Violation>) -> Value {
        let expanded;
        let object = match (value, &self.shorthand) {
            (Value::Object(object), _) => object,
            (Value::String(_) | Value::Number(_) | Value::Bool(_), Some(key)) => {
                let mut object = Map::new();
                object.insert(key.clone(), value.clone());
                expanded = object;
                &expanded
            }
            _ => {
                violations.push(
                    Violation::new(location, ViolationRule::WrongType, "Expected a mapping")
                        .expected(self.describe())
                        .actual(type_name(value)),
                );
                return value.clone();
            }
        };

        for key in object.keys() {
            if !self.fields.contains_key(key) {
                violations.push(Violation::new(
                    child_location(location, key),
                    ViolationRule::UnknownField,
                    "Extra fields are not permitted",
                ));
            }
        }

        let mut out = Map::new();
        for (name, field) in &self.fields {
            let field_location = child_location(location, name);
            match (object.get(name), &field.default) {
                (Some(raw), _) => {
                    let normalized = field.ty.validate(raw, &field_location, violations);
                    out.insert(name.clone(), normalized);
                }
                (None, Some(default)) => {
                    out.insert(name.clone(), default.clone());
                }
                (None, None) => {
                    violations.push(
                        Violation::new(field_location, ViolationRule::MissingField, "Field required")
                            .expected(field.ty.describe()),
                    );
                }
            }
        }
        Value::Object(out)
    }
}

/// Partial field set contributed by one plugin.
#[derive(Debug, Clone)]
pub struct SchemaFragment {
    owner: String,
    fields: IndexMap<String, Field>,
}

impl SchemaFragment {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }
}

/// The closed schema produced by merging every fragment.
#[derive(Debug, Clone, Default)]
pub struct ComposedSchema {
    record: Record,
    owners: IndexMap<String, String>,
}

impl ComposedSchema {
    pub fn compose<I>(fragments: I) -> Result<Self, ComposeError>
    where
        I: IntoIterator<Item = SchemaFragment>,
    {
        let mut schema = Self::default();
        for fragment in fragments {
            schema.merge(fragment)?;
        }
        Ok(schema)
    }

    /// Field-name union. Identical re-declarations are accepted; any other
    /// overlap is rejected rather than letting one plugin silently win.
    pub fn merge(&mut self, fragment: SchemaFragment) -> Result<(), ComposeError> {
        let SchemaFragment { owner, fields } = fragment;
        for (name, field) in fields {
            self.insert(&owner, name, field)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, owner: &str, name: String, field: Field) -> Result<(), ComposeError> {
        if let Some(existing) = self.record.fields.get(&name) {
            if *existing == field {
                return Ok(());
            }
            let first = self.owners.get(&name).cloned().unwrap_or_default();
            return Err(ComposeError::SchemaComposition {
                field: name,
                first,
                second: owner.to_string(),
            });
        }
        self.owners.insert(name.clone(), owner.to_string());
        self.record.fields.insert(name, field);
        Ok(())
    }

    pub fn owner_of(&self, field: &str) -> Option<&str> {
        self.owners.get(field).map(String::as_str)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(ty: &FieldType, value: Value) -> (Value, Vec<Violation>) {
        let mut violations = Vec::new();
        let out = ty.validate(&value, "x", &mut violations);
        (out, violations)
    }

    #[test]
    fn test_record_applies_defaults_and_rejects_unknown() {
        let record = Record::new()
            .field("name", Field::required(FieldType::String))
            .field("count", Field::with_default(FieldType::Integer, json!(3)));

        let (out, violations) = validate(&FieldType::Record(record.clone()), json!({"name": "a"}));
        assert!(violations.is_empty());
        assert_eq!(out, json!({"name": "a", "count": 3}));

        let (_, violations) = validate(&FieldType::Record(record), json!({"nope": 1}));
        let rules: Vec<_> = violations.iter().map(|v| v.rule).collect();
        assert!(rules.contains(&ViolationRule::UnknownField));
        assert!(rules.contains(&ViolationRule::MissingField));
    }

    #[test]
    fn test_integer_out_of_range_is_wrong_type() {
        let (_, violations) = validate(&FieldType::Integer, json!(u64::MAX));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::WrongType);

        let (_, violations) = validate(&FieldType::Integer, json!(i64::MIN));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_shorthand_expands_scalar() {
        let record = Record::new()
            .field("path", Field::required(FieldType::Path))
            .shorthand("path");
        let (out, violations) = validate(&FieldType::Record(record), json!("ms.tex"));
        assert!(violations.is_empty());
        assert_eq!(out, json!({"path": "ms.tex"}));
    }

    #[test]
    fn test_one_or_many_normalizes_to_list() {
        let ty = FieldType::one_or_many(FieldType::Path);
        assert_eq!(validate(&ty, json!("a")).0, json!(["a"]));
        assert_eq!(validate(&ty, json!(["a", "b"])).0, json!(["a", "b"]));
        assert_eq!(validate(&ty, json!(1)).1.len(), 1);
    }

    #[test]
    fn test_union_picks_first_clean_alternative() {
        let ty = FieldType::Union(vec![FieldType::Integer, FieldType::list(FieldType::String)]);
        assert!(validate(&ty, json!(4)).1.is_empty());
        assert!(validate(&ty, json!(["a"])).1.is_empty());
        let (_, violations) = validate(&ty, json!({"a": 1}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::NoMatchingVariant);
    }

    #[test]
    fn test_nested_locations_are_reported() {
        let ty = FieldType::list(FieldType::Record(
            Record::new().field("deps", Field::with_default(FieldType::list(FieldType::Path), json!([]))),
        ));
        let (_, violations) = validate(&ty, json!([{"deps": 1}]));
        assert_eq!(violations[0].location, "x[0].deps");
    }

    #[test]
    fn test_identical_fragments_merge() {
        let a = SchemaFragment::new("a").field("shared", Field::with_default(FieldType::Bool, json!(true)));
        let b = SchemaFragment::new("b").field("shared", Field::with_default(FieldType::Bool, json!(true)));
        let schema = ComposedSchema::compose([a, b]).unwrap();
        assert_eq!(schema.record().len(), 1);
        assert_eq!(schema.owner_of("shared"), Some("a"));
    }

    #[test]
    fn test_conflicting_fragments_rejected() {
        let a = SchemaFragment::new("a").field("shared", Field::with_default(FieldType::Bool, json!(true)));
        let b = SchemaFragment::new("b").field("shared", Field::with_default(FieldType::Bool, json!(false)));
        let err = ComposedSchema::compose([a, b]).unwrap_err();
        match err {
            ComposeError::SchemaComposition { field, first, second } => {
                assert_eq!(field, "shared");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
