//! Declarative value schemas and the validator that checks JSON values
//! against them.
//!
//! A [`Schema`] is a tagged variant (string, number, boolean, enum, array,
//! object). Schemas are built once through the small builder API in this
//! module and are immutable afterwards:
//!
//! ```
//! use sentinel_core::schema;
//!
//! let location = schema::object()
//!     .field("latitude", schema::number().range(-90.0, 90.0))
//!     .field("longitude", schema::number().range(-180.0, 180.0))
//!     .optional("label", schema::string());
//! let schema: sentinel_core::Schema = location.into();
//!
//! assert!(schema.validate(&serde_json::json!({"latitude": 1.0, "longitude": 2.0})).is_ok());
//! ```
//!
//! Validation is pure and total: every failure comes back as a
//! [`ValidationFailure`] carrying the dot-separated path of the offending
//! value. Fields are checked in declaration order, so the reported failure is
//! stable for a given input.

use serde_json::{Map, Value, json};

use crate::error::ValidationFailure;

/// The shape of an expected value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String(StringSchema),
    Number(NumberSchema),
    Boolean(BooleanSchema),
    Enum(EnumSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    pub description: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// Reject values with a fractional part.
    pub integer: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanSchema {
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub description: Option<String>,
    /// Allowed literals, compared case-sensitively.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub description: Option<String>,
    pub items: Box<Schema>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub description: Option<String>,
    pub fields: Vec<Field>,
    /// When set, fields not declared here are rejected.
    pub closed: bool,
}

/// A named member of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

// ── Builders ──────────────────────────────────────────────────────────────

pub fn string() -> StringSchema {
    StringSchema::default()
}

pub fn number() -> NumberSchema {
    NumberSchema::default()
}

pub fn integer() -> NumberSchema {
    NumberSchema {
        integer: true,
        ..NumberSchema::default()
    }
}

pub fn boolean() -> BooleanSchema {
    BooleanSchema::default()
}

pub fn enumeration<I, S>(values: I) -> EnumSchema
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    EnumSchema {
        description: None,
        values: values.into_iter().map(Into::into).collect(),
    }
}

pub fn array(items: impl Into<Schema>) -> ArraySchema {
    ArraySchema {
        description: None,
        items: Box::new(items.into()),
        min_items: None,
        max_items: None,
    }
}

pub fn object() -> ObjectSchema {
    ObjectSchema::default()
}

impl StringSchema {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

impl NumberSchema {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn minimum(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    pub fn maximum(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.minimum(min).maximum(max)
    }
}

impl BooleanSchema {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

impl EnumSchema {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

impl ArraySchema {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

impl ObjectSchema {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema: schema.into(),
            required: true,
        });
        self
    }

    /// Add an optional field.
    pub fn optional(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema: schema.into(),
            required: false,
        });
        self
    }

    /// Reject fields that are not declared.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

macro_rules! into_schema {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Schema {
            fn from(s: $ty) -> Self {
                Schema::$variant(s)
            }
        })*
    };
}

into_schema! {
    StringSchema => String,
    NumberSchema => Number,
    BooleanSchema => Boolean,
    EnumSchema => Enum,
    ArraySchema => Array,
    ObjectSchema => Object,
}

// ── Validation ────────────────────────────────────────────────────────────

impl Schema {
    /// Validate `value` and return it unchanged on success.
    ///
    /// Unknown object fields are kept unless the object schema is closed.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationFailure> {
        let mut path = Vec::new();
        self.check(value, &mut path)?;
        Ok(value.clone())
    }

    /// Short human-readable description of what this schema expects.
    pub fn expected(&self) -> String {
        match self {
            Schema::String(_) => "string".into(),
            Schema::Number(n) if n.integer => "integer".into(),
            Schema::Number(_) => "number".into(),
            Schema::Boolean(_) => "boolean".into(),
            Schema::Enum(e) => {
                let literals: Vec<String> = e.values.iter().map(|v| format!("\"{v}\"")).collect();
                format!("one of {}", literals.join(", "))
            }
            Schema::Array(_) => "array".into(),
            Schema::Object(_) => "object".into(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Schema::String(s) => s.description.as_deref(),
            Schema::Number(s) => s.description.as_deref(),
            Schema::Boolean(s) => s.description.as_deref(),
            Schema::Enum(s) => s.description.as_deref(),
            Schema::Array(s) => s.description.as_deref(),
            Schema::Object(s) => s.description.as_deref(),
        }
    }

    /// Follow a field path through nested object schemas.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<&Schema> {
        let mut current = self;
        for segment in path {
            match current {
                Schema::Object(obj) => current = &obj.get(segment.as_ref())?.schema,
                _ => return None,
            }
        }
        Some(current)
    }

    fn check(&self, value: &Value, path: &mut Vec<String>) -> Result<(), ValidationFailure> {
        match self {
            Schema::String(s) => {
                let Some(text) = value.as_str() else {
                    return Err(mismatch(path, self, value));
                };
                let len = text.chars().count();
                if let Some(min) = s.min_length.filter(|min| len < *min) {
                    return Err(failure(
                        path,
                        format!("string of at least {min} characters"),
                        format!("string of {len} characters"),
                    ));
                }
                if let Some(max) = s.max_length.filter(|max| len > *max) {
                    return Err(failure(
                        path,
                        format!("string of at most {max} characters"),
                        format!("string of {len} characters"),
                    ));
                }
                Ok(())
            }
            Schema::Number(n) => {
                let Some(x) = value.as_f64() else {
                    return Err(mismatch(path, self, value));
                };
                if n.integer && x.fract() != 0.0 {
                    return Err(mismatch(path, self, value));
                }
                if let Some(min) = n.minimum.filter(|min| x < *min) {
                    return Err(failure(
                        path,
                        format!("number >= {min}"),
                        describe_value(value),
                    ));
                }
                if let Some(max) = n.maximum.filter(|max| x > *max) {
                    return Err(failure(
                        path,
                        format!("number <= {max}"),
                        describe_value(value),
                    ));
                }
                Ok(())
            }
            Schema::Boolean(_) => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(mismatch(path, self, value))
                }
            }
            Schema::Enum(e) => match value.as_str() {
                Some(s) if e.values.iter().any(|v| v == s) => Ok(()),
                _ => Err(mismatch(path, self, value)),
            },
            Schema::Array(a) => {
                let Some(items) = value.as_array() else {
                    return Err(mismatch(path, self, value));
                };
                if let Some(min) = a.min_items.filter(|min| items.len() < *min) {
                    return Err(failure(
                        path,
                        format!("array of at least {min} items"),
                        describe_value(value),
                    ));
                }
                if let Some(max) = a.max_items.filter(|max| items.len() > *max) {
                    return Err(failure(
                        path,
                        format!("array of at most {max} items"),
                        describe_value(value),
                    ));
                }
                for (index, item) in items.iter().enumerate() {
                    path.push(index.to_string());
                    a.items.check(item, path)?;
                    path.pop();
                }
                Ok(())
            }
            Schema::Object(o) => {
                let Some(map) = value.as_object() else {
                    return Err(mismatch(path, self, value));
                };
                for field in &o.fields {
                    match map.get(&field.name) {
                        None | Some(Value::Null) if !field.required => {}
                        None => {
                            path.push(field.name.clone());
                            let err = failure(path, field.schema.expected(), "nothing (field is missing)");
                            path.pop();
                            return Err(err);
                        }
                        Some(v) => {
                            path.push(field.name.clone());
                            field.schema.check(v, path)?;
                            path.pop();
                        }
                    }
                }
                if o.closed {
                    if let Some((key, v)) = map.iter().find(|(k, _)| o.get(k).is_none()) {
                        path.push(key.clone());
                        let err = failure(path, "no such field", describe_value(v));
                        path.pop();
                        return Err(err);
                    }
                }
                Ok(())
            }
        }
    }

    // ── JSON Schema export ────────────────────────────────────────────────

    /// Export as a JSON Schema document (draft 2020-12 subset), as sent to the
    /// model for tool parameters and structured output.
    pub fn to_json_schema(&self) -> Value {
        let mut out = match self {
            Schema::String(s) => {
                let mut v = json!({ "type": "string" });
                if let Some(min) = s.min_length {
                    v["minLength"] = json!(min);
                }
                if let Some(max) = s.max_length {
                    v["maxLength"] = json!(max);
                }
                v
            }
            Schema::Number(n) => {
                let mut v = json!({ "type": if n.integer { "integer" } else { "number" } });
                if let Some(min) = n.minimum {
                    v["minimum"] = json!(min);
                }
                if let Some(max) = n.maximum {
                    v["maximum"] = json!(max);
                }
                v
            }
            Schema::Boolean(_) => json!({ "type": "boolean" }),
            Schema::Enum(e) => json!({ "type": "string", "enum": e.values }),
            Schema::Array(a) => {
                let mut v = json!({ "type": "array", "items": a.items.to_json_schema() });
                if let Some(min) = a.min_items {
                    v["minItems"] = json!(min);
                }
                if let Some(max) = a.max_items {
                    v["maxItems"] = json!(max);
                }
                v
            }
            Schema::Object(o) => {
                let mut properties = Map::new();
                for field in &o.fields {
                    properties.insert(field.name.clone(), field.schema.to_json_schema());
                }
                let required: Vec<&str> = o
                    .fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                let mut v = json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                });
                if o.closed {
                    v["additionalProperties"] = json!(false);
                }
                v
            }
        };
        if let Some(description) = self.description() {
            out["description"] = json!(description);
        }
        out
    }
}

fn failure(path: &[String], expected: impl Into<String>, actual: impl Into<String>) -> ValidationFailure {
    ValidationFailure::new(path.join("."), expected, actual)
}

fn mismatch(path: &[String], schema: &Schema, value: &Value) -> ValidationFailure {
    failure(path, schema.expected(), describe_value(value))
}

/// Describe a JSON value briefly for failure messages.
pub fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => {
            const MAX: usize = 40;
            if s.chars().count() > MAX {
                let head: String = s.chars().take(MAX).collect();
                format!("string \"{head}…\"")
            } else {
                format!("string \"{s}\"")
            }
        }
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Object(_) => "object".into(),
    }
}
