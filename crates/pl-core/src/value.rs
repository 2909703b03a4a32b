use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PromptValue>),
    Map(BTreeMap<String, PromptValue>),
}

impl PromptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PromptValue]> {
        match self {
            Self::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PromptValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Truthiness used by conditions: null, false, 0, "", [] and {} are
    /// falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::List(values) => !values.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Numeric view used by arithmetic and ordering. Strings are parsed,
    /// everything else that is not a number coerces to None instead of
    /// raising, so templates can probe missing data.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::String(value) => value.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Equality used by `==`/`!=`: structural within a type, deep for lists
    /// and maps, with number/string cross-coercion.
    pub fn loose_eq(&self, other: &PromptValue) -> bool {
        match (self, other) {
            (Self::Number(_), Self::String(_)) | (Self::String(_), Self::Number(_)) => {
                match (self.coerce_number(), other.coerce_number()) {
                    (Some(left), Some(right)) => left == right,
                    _ => false,
                }
            }
            _ => self == other,
        }
    }

    /// Output stringification: null and containers render as nothing, bools
    /// as words, integral numbers without a trailing ".0".
    pub fn to_display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => {
                if *value {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            Self::Number(value) => format_number(*value),
            Self::String(value) => value.clone(),
            Self::List(_) | Self::Map(_) => String::new(),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn value_from_json(json: JsonValue) -> PromptValue {
    match json {
        JsonValue::Null => PromptValue::Null,
        JsonValue::Bool(value) => PromptValue::Bool(value),
        JsonValue::Number(value) => PromptValue::Number(value.as_f64().unwrap_or(0.0)),
        JsonValue::String(value) => PromptValue::String(value),
        JsonValue::Array(values) => {
            PromptValue::List(values.into_iter().map(value_from_json).collect())
        }
        JsonValue::Object(entries) => PromptValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, value_from_json(value)))
                .collect(),
        ),
    }
}

pub fn value_to_json(value: &PromptValue) -> JsonValue {
    match value {
        PromptValue::Null => JsonValue::Null,
        PromptValue::Bool(value) => JsonValue::Bool(*value),
        PromptValue::Number(value) => serde_json::Number::from_f64(*value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        PromptValue::String(value) => JsonValue::String(value.clone()),
        PromptValue::List(values) => JsonValue::Array(values.iter().map(value_to_json).collect()),
        PromptValue::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), value_to_json(value)))
                .collect(),
        ),
    }
}
