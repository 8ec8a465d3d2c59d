//! Raw field extraction from a JSON microarchitecture descriptor.
//!
//! Descriptors come from the simulator's `configs/` directory and are loose
//! about types: scalars may be JSON numbers or numeric strings, and per-unit
//! lists are strings such as `"{1,1},{1,1},{-1}"` where braces only group
//! related entries and carry no meaning of their own.

use serde_json::{Map, Value};

use super::HardwareError;

/// A parsed descriptor document.
#[derive(Debug)]
pub(crate) struct Descriptor {
    fields: Map<String, Value>,
}

impl Descriptor {
    /// Parse a descriptor document.
    pub(crate) fn parse(text: &str) -> Result<Self, HardwareError> {
        let value: Value = serde_json::from_str(text).map_err(|e| HardwareError::MalformedConfig {
            field: "<document>".to_string(),
            reason: e.to_string(),
        })?;

        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(HardwareError::MalformedConfig {
                field: "<document>".to_string(),
                reason: "top-level value is not an object".to_string(),
            }),
        }
    }

    fn field(&self, key: &str) -> Result<&Value, HardwareError> {
        self.fields.get(key).ok_or_else(|| HardwareError::MalformedConfig {
            field: key.to_string(),
            reason: "missing".to_string(),
        })
    }

    /// Read a required numeric scalar.
    pub(crate) fn scalar(&self, key: &str) -> Result<f64, HardwareError> {
        let malformed = |reason: String| HardwareError::MalformedConfig {
            field: key.to_string(),
            reason,
        };

        match self.field(key)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| malformed(format!("{} is not representable", n))),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| malformed(format!("`{}` is not a number", s))),
            other => Err(malformed(format!("expected number, found {}", other))),
        }
    }

    /// Read a required flag, encoded as `0`/`1` or a JSON boolean.
    pub(crate) fn flag(&self, key: &str) -> Result<bool, HardwareError> {
        match self.field(key)? {
            Value::Bool(b) => Ok(*b),
            _ => Ok(self.scalar(key)? != 0.0),
        }
    }

    /// Read a required brace-wrapped, comma-separated list of numbers.
    pub(crate) fn list(&self, key: &str) -> Result<Vec<f64>, HardwareError> {
        match self.field(key)? {
            Value::String(s) => parse_list(key, s),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_f64().ok_or_else(|| HardwareError::MalformedConfig {
                        field: key.to_string(),
                        reason: format!("element {} ({}) is not a number", i, item),
                    })
                })
                .collect(),
            other => Err(HardwareError::MalformedConfig {
                field: key.to_string(),
                reason: format!("expected delimited list, found {}", other),
            }),
        }
    }
}

/// Parse `"{1,2},{3},4"` into `[1.0, 2.0, 3.0, 4.0]`.
pub(crate) fn parse_list(key: &str, text: &str) -> Result<Vec<f64>, HardwareError> {
    text.split(',')
        .enumerate()
        .map(|(i, element)| {
            let cleaned = element.replace(['{', '}'], "");
            let cleaned = cleaned.trim();
            cleaned.parse::<f64>().map_err(|_| HardwareError::MalformedConfig {
                field: key.to_string(),
                reason: format!("element {} `{}` is not a number", i, element.trim()),
            })
        })
        .collect()
}
