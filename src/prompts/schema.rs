// Output schemas: plain field descriptors shared by prompt hinting and validation

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Primitive types a structured model answer may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// A number in `[0, 1]`.
    Score,
    StringArray,
}

impl FieldType {
    fn describe(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Score => "number between 0 and 1",
            FieldType::StringArray => "array of strings",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Score => value
                .as_f64()
                .map(|score| (0.0..=1.0).contains(&score))
                .unwrap_or(false),
            FieldType::StringArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub description: &'static str,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(
        name: &'static str,
        field_type: FieldType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            field_type,
            description,
            required: true,
        }
    }
}

/// The shape a prompt's answer must have: a flat JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputSchema {
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
}

impl OutputSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON Schema document describing this shape.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            let mut prop = match field.field_type {
                FieldType::String => json!({ "type": "string" }),
                FieldType::Score => json!({ "type": "number", "minimum": 0, "maximum": 1 }),
                FieldType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
            };
            prop["title"] = Value::String(field.description.to_string());
            properties.insert(field.name.to_string(), prop);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// GBNF grammar (llama.cpp dialect) that only admits this object shape.
    ///
    /// Required fields are emitted in declaration order.
    pub fn to_gbnf(&self) -> String {
        let mut members = Vec::new();
        for field in self.fields.iter().filter(|f| f.required) {
            let value_rule = match field.field_type {
                FieldType::String => "string",
                FieldType::Score => "number",
                FieldType::StringArray => "string-array",
            };
            members.push(format!(
                "\"\\\"{}\\\"\" ws \":\" ws {}",
                field.name, value_rule
            ));
        }

        let mut grammar = String::new();
        grammar.push_str("root ::= \"{\" ws ");
        grammar.push_str(&members.join(" \",\" ws "));
        grammar.push_str(" \"}\" ws\n");
        grammar.push_str(
            "string ::= \"\\\"\" ( [^\"\\\\\\x7F\\x00-\\x1F] | \"\\\\\" ( [\"\\\\/bfnrt] | \"u\" [0-9a-fA-F] [0-9a-fA-F] [0-9a-fA-F] [0-9a-fA-F] ) )* \"\\\"\" ws\n",
        );
        grammar.push_str(
            "number ::= \"-\"? ( [0-9] | [1-9] [0-9]* ) ( \".\" [0-9]+ )? ( [eE] [-+]? [0-9]+ )? ws\n",
        );
        grammar.push_str("string-array ::= \"[\" ws ( string ( \",\" ws string )* )? \"]\" ws\n");
        grammar.push_str("ws ::= [ \\t\\n]*\n");
        grammar
    }

    /// Human-readable key list, used in the strict-JSON retry reminder.
    pub fn key_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{} ({})", f.name, f.field_type.describe()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check that `value` is an object with every required field of the right type.
    pub fn validate(&self, value: Value) -> Result<StructuredValue, String> {
        let Value::Object(map) = value else {
            return Err(format!("expected a JSON object for {}", self.title));
        };

        for field in self.fields {
            match map.get(field.name) {
                Some(v) if field.field_type.matches(v) => {}
                Some(v) if v.is_null() && !field.required => {}
                Some(_) => {
                    return Err(format!(
                        "field `{}` must be {}",
                        field.name,
                        field.field_type.describe()
                    ));
                }
                None if field.required => {
                    return Err(format!("missing required field `{}`", field.name));
                }
                None => {}
            }
        }

        Ok(StructuredValue { fields: map })
    }
}

/// A model answer that passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StructuredValue {
    fields: Map<String, Value>,
}

impl StructuredValue {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn string_list(&self, name: &str) -> Option<Vec<String>> {
        self.fields.get(name).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Parse a model's raw text as a JSON value.
///
/// Tolerates a surrounding markdown fence or chatter by falling back to the
/// outermost `{ ... }` span.
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| format!("invalid JSON: {}", e)),
        _ => Err("no JSON object found in model output".to_string()),
    }
}
