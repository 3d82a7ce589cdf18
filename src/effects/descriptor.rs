use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Modality;
use crate::foundation::error::{FxError, FxResult};

/// Declared type (and bounds) of one effect parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamKind {
    /// Floating-point value, clamped to the optional bounds.
    Float {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// Integer value, truncated then clamped to the optional bounds.
    Int {
        /// Lower bound.
        min: Option<i64>,
        /// Upper bound.
        max: Option<i64>,
    },
    /// Boolean flag.
    Bool,
    /// One of a fixed set of strings; anything else falls back to the default.
    Choice {
        /// Accepted values.
        choices: &'static [&'static str],
    },
}

impl ParamKind {
    /// Schema name (`float`, `int`, `bool`, `choice`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float { .. } => "float",
            Self::Int { .. } => "int",
            Self::Bool => "bool",
            Self::Choice { .. } => "choice",
        }
    }
}

/// A coerced parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Choice value.
    Choice(String),
}

impl ParamValue {
    /// Convert to JSON for presets.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Choice(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// One entry of an effect's ordered parameter schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Type and bounds.
    pub kind: ParamKind,
    /// Value used when the parameter is missing (or an invalid choice).
    pub default: ParamDefault,
}

/// Compile-time default for a [`ParamSpec`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamDefault {
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Int(i64),
    /// Floating-point default.
    Float(f64),
    /// Choice default.
    Choice(&'static str),
}

impl ParamDefault {
    fn to_value(self) -> ParamValue {
        match self {
            Self::Bool(b) => ParamValue::Bool(b),
            Self::Int(i) => ParamValue::Int(i),
            Self::Float(f) => ParamValue::Float(f),
            Self::Choice(s) => ParamValue::Choice(s.to_string()),
        }
    }
}

/// Immutable description of a registered effect.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectDescriptor {
    /// Canonical effect name.
    pub name: &'static str,
    /// Stream kind the effect operates on.
    pub modality: Modality,
    /// One-line description for listings.
    pub summary: &'static str,
    /// Ordered parameter schema.
    pub params: &'static [ParamSpec],
}

/// Coerced parameter map, keyed by parameter name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(BTreeMap<&'static str, ParamValue>);

impl Params {
    /// Float parameter (ints are widened).
    pub fn float(&self, name: &str) -> f64 {
        match self.0.get(name) {
            Some(ParamValue::Float(f)) => *f,
            Some(ParamValue::Int(i)) => *i as f64,
            _ => 0.0,
        }
    }

    /// Integer parameter.
    pub fn int(&self, name: &str) -> i64 {
        match self.0.get(name) {
            Some(ParamValue::Int(i)) => *i,
            Some(ParamValue::Float(f)) => *f as i64,
            _ => 0,
        }
    }

    /// Boolean parameter.
    pub fn bool(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(ParamValue::Bool(true)))
    }

    /// Choice parameter.
    pub fn choice(&self, name: &str) -> &str {
        match self.0.get(name) {
            Some(ParamValue::Choice(s)) => s,
            _ => "",
        }
    }

    /// Insert or replace a value.
    pub fn set(&mut self, name: &'static str, value: ParamValue) {
        self.0.insert(name, value);
    }

    /// Iterate `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// JSON object form used by presets.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.to_json()))
            .collect()
    }
}

impl EffectDescriptor {
    /// Validate and coerce user-supplied parameters against this schema.
    ///
    /// Unknown keys are ignored and missing keys take their declared default. Floats and ints
    /// are clamped to `[min, max]`; an unknown choice falls back to the default. Values that
    /// cannot be cast at all are rejected.
    pub fn coerce(&self, raw: &serde_json::Map<String, serde_json::Value>) -> FxResult<Params> {
        let mut out = Params::default();
        for spec in self.params {
            let value = match raw.get(spec.name) {
                None | Some(serde_json::Value::Null) => spec.default.to_value(),
                Some(v) => coerce_one(self.name, spec, v)?,
            };
            out.set(spec.name, value);
        }
        Ok(out)
    }

    /// Schema defaults for every parameter.
    pub fn defaults(&self) -> Params {
        let mut out = Params::default();
        for spec in self.params {
            out.set(spec.name, spec.default.to_value());
        }
        out
    }
}

fn coerce_one(effect: &str, spec: &ParamSpec, v: &serde_json::Value) -> FxResult<ParamValue> {
    let bad = |expected: &str| {
        FxError::validation(format!(
            "{effect}.{} must be {expected}, got {v}",
            spec.name
        ))
    };
    match spec.kind {
        ParamKind::Float { min, max } => {
            let mut f = as_f64(v).ok_or_else(|| bad("a number"))?;
            if !f.is_finite() {
                return Err(bad("finite"));
            }
            if let Some(lo) = min {
                f = f.max(lo);
            }
            if let Some(hi) = max {
                f = f.min(hi);
            }
            Ok(ParamValue::Float(f))
        }
        ParamKind::Int { min, max } => {
            let f = as_f64(v).ok_or_else(|| bad("an integer"))?;
            if !f.is_finite() {
                return Err(bad("finite"));
            }
            let mut i = f.trunc() as i64;
            if let Some(lo) = min {
                i = i.max(lo);
            }
            if let Some(hi) = max {
                i = i.min(hi);
            }
            Ok(ParamValue::Int(i))
        }
        ParamKind::Bool => {
            let b = match v {
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" | "" => false,
                    _ => return Err(bad("a boolean")),
                },
                _ => return Err(bad("a boolean")),
            };
            Ok(ParamValue::Bool(b))
        }
        ParamKind::Choice { choices } => {
            let s = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if choices.contains(&s.as_str()) {
                Ok(ParamValue::Choice(s))
            } else {
                tracing::debug!(effect, param = spec.name, value = %s, "unknown choice, using default");
                Ok(spec.default.to_value())
            }
        }
    }
}

fn as_f64(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/descriptor.rs"]
mod tests;
