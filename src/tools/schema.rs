//! Tool descriptors and argument validation.
//!
//! A [`ToolDescriptor`] is the single source for the JSON schema advertised in
//! `tools/list`; [`ArgumentValidator`] compiles that same schema to check calls
//! before an executor runs.

use jsonschema::{error::ValidationErrorKind, ValidationError, Validator};
use serde_json::{json, Map, Value};

use crate::error::ToolError;

/// Structural type of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// A string, optionally restricted to an enumerated set.
    String { allowed: &'static [&'static str] },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Array(Box<ParamKind>),
    Object(Vec<ParamSpec>),
}

/// One named field of a tool's input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    fn new(name: &'static str, description: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::String { allowed: &[] })
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(
            name,
            description,
            ParamKind::Integer {
                minimum: None,
                maximum: None,
            },
        )
    }

    pub fn array(name: &'static str, description: &'static str, items: ParamKind) -> Self {
        Self::new(name, description, ParamKind::Array(Box::new(items)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict a string parameter to `allowed`.
    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        if let ParamKind::String { allowed: slot } = &mut self.kind {
            *slot = allowed;
        }
        self
    }

    pub fn range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        if let ParamKind::Integer { minimum, maximum } = &mut self.kind {
            *minimum = min;
            *maximum = max;
        }
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = kind_schema(&self.kind);
        if let Value::Object(map) = &mut schema {
            if !self.description.is_empty() {
                map.insert("description".into(), json!(self.description));
            }
            if let Some(default) = &self.default {
                map.insert("default".into(), default.clone());
            }
        }
        schema
    }
}

fn kind_schema(kind: &ParamKind) -> Value {
    match kind {
        ParamKind::String { allowed } if allowed.is_empty() => json!({ "type": "string" }),
        ParamKind::String { allowed } => json!({ "type": "string", "enum": allowed }),
        ParamKind::Integer { minimum, maximum } => {
            let mut map = Map::new();
            map.insert("type".into(), json!("integer"));
            if let Some(min) = minimum {
                map.insert("minimum".into(), json!(min));
            }
            if let Some(max) = maximum {
                map.insert("maximum".into(), json!(max));
            }
            Value::Object(map)
        }
        ParamKind::Array(items) => json!({ "type": "array", "items": kind_schema(items) }),
        ParamKind::Object(fields) => object_schema(fields),
    }
}

fn object_schema(fields: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.to_string(), f.schema()))
        .collect();
    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();

    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Immutable description of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: &'static str, description: &'static str, params: Vec<ParamSpec>) -> Self {
        Self {
            name,
            description,
            params,
        }
    }

    /// JSON schema for `inputSchema`.
    pub fn input_schema(&self) -> Value {
        object_schema(&self.params)
    }
}

/// Compiled validator for one tool's `inputSchema`.
///
/// Built once per tool when the registry is assembled.
pub struct ArgumentValidator {
    validator: Validator,
}

impl ArgumentValidator {
    pub fn compile(descriptor: &ToolDescriptor) -> anyhow::Result<Self> {
        let validator = jsonschema::validator_for(&descriptor.input_schema())
            .map_err(|e| anyhow::anyhow!("invalid schema for `{}`: {}", descriptor.name, e))?;
        Ok(Self { validator })
    }

    /// Check `arguments` against the compiled schema.
    ///
    /// `null` is accepted as "no arguments". Unknown fields are ignored; optional
    /// fields given as `null` are treated as absent.
    pub fn validate(&self, arguments: &Value) -> Result<Arguments, ToolError> {
        let mut map = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => return Err(ToolError::validation("arguments must be a JSON object")),
        };
        map.retain(|_, v| !v.is_null());

        let instance = Value::Object(map.clone());
        if let Some(error) = self.validator.iter_errors(&instance).next() {
            return Err(ToolError::validation(describe(&error)));
        }
        Ok(Arguments { values: map })
    }
}

/// Render one schema violation with the offending field spelled `messages[1].role`.
fn describe(error: &ValidationError<'_>) -> String {
    let path = field_path(&error.instance_path.to_string());
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
            if path.is_empty() {
                format!("missing required field `{}`", name)
            } else {
                format!("missing required field `{}.{}`", path, name)
            }
        }
        _ if path.is_empty() => error.to_string(),
        _ => format!("field `{}`: {}", path, error),
    }
}

fn field_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1) {
        if segment.parse::<usize>().is_ok() {
            path.push('[');
            path.push_str(segment);
            path.push(']');
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&segment.replace("~1", "/").replace("~0", "~"));
        }
    }
    path
}

/// Arguments that passed [`ArgumentValidator::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.raw(name).and_then(Value::as_str)
    }

    /// A string that must be present and non-blank.
    pub fn require_str(&self, name: &str) -> Result<&str, ToolError> {
        match self.str(name).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s),
            Some(_) => Err(ToolError::validation(format!(
                "field `{}` must not be empty",
                name
            ))),
            None => Err(ToolError::validation(format!(
                "missing required field `{}`",
                name
            ))),
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.raw(name).and_then(Value::as_i64)
    }

    pub fn string_list(&self, name: &str) -> Vec<String> {
        self.raw(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
