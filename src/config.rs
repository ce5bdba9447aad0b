//! Parameter Sources
//!
//! Every module pulls its configuration at the moment an operation runs,
//! through the narrow [`ParameterSource`] capability injected at
//! construction. Missing, non-numeric and non-finite values never become
//! errors: the `read_*` helpers resolve them to the caller's default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// A scalar control value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Finite numeric interpretation; numeric text is parsed
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            ParamValue::Number(n) => *n,
            ParamValue::Text(s) => s.trim().parse::<f64>().ok()?,
            ParamValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        };
        n.is_finite().then_some(n)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Number(n) if n.is_finite() => Some(*n != 0.0),
            ParamValue::Number(_) => None,
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Some(true),
                "false" | "off" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Pull-based access to control values, keyed `group.field`
pub trait ParameterSource: Send + Sync {
    fn get_parameter(&self, name: &str) -> Option<ParamValue>;
}

/// Write side of a parameter store, used when importing a snapshot
pub trait ParameterSink {
    fn set_parameter(&self, name: &str, value: ParamValue);
}

/// Shared handle every module holds
pub type SharedSource = Arc<dyn ParameterSource>;

/// Write handle the engine keeps for snapshot imports
pub type SharedSink = Arc<dyn ParameterSink + Send + Sync>;

impl ParameterSource for HashMap<String, ParamValue> {
    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.get(name).cloned()
    }
}

/// In-memory parameter store, readable by the engine while a control surface
/// writes to it
#[derive(Debug, Default)]
pub struct MapParameterSource {
    values: RwLock<HashMap<String, ParamValue>>,
}

impl MapParameterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from `(name, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<ParamValue> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored value
    pub fn snapshot(&self) -> HashMap<String, ParamValue> {
        self.values.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ParameterSource for MapParameterSource {
    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl ParameterSink for MapParameterSource {
    fn set_parameter(&self, name: &str, value: ParamValue) {
        self.set(name, value);
    }
}

/// Numeric value or `default` when missing or invalid
pub fn read_number(source: &dyn ParameterSource, name: &str, default: f64) -> f64 {
    source
        .get_parameter(name)
        .and_then(|v| v.as_number())
        .unwrap_or(default)
}

/// Numeric value clamped to `[min, max]`, or `default`
pub fn read_clamped(
    source: &dyn ParameterSource,
    name: &str,
    default: f64,
    min: f64,
    max: f64,
) -> f64 {
    read_number(source, name, default).clamp(min, max)
}

pub fn read_bool(source: &dyn ParameterSource, name: &str, default: bool) -> bool {
    source
        .get_parameter(name)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

/// Enum parsed from text, or `default` when missing or unrecognized
pub fn read_enum<T: FromStr>(source: &dyn ParameterSource, name: &str, default: T) -> T {
    source
        .get_parameter(name)
        .and_then(|v| v.as_text().and_then(|s| s.parse().ok()))
        .unwrap_or(default)
}

/// Non-negative integer count (rounded), or `default`
pub fn read_count(source: &dyn ParameterSource, name: &str, default: usize) -> usize {
    source
        .get_parameter(name)
        .and_then(|v| v.as_number())
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as usize)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Waveform;

    #[test]
    fn test_param_value_coercion() {
        assert_eq!(ParamValue::from(2.5).as_number(), Some(2.5));
        assert_eq!(ParamValue::from(" 3 ").as_number(), Some(3.0));
        assert_eq!(ParamValue::from("abc").as_number(), None);
        assert_eq!(ParamValue::Number(f64::NAN).as_number(), None);
        assert_eq!(ParamValue::from("on").as_bool(), Some(true));
        assert_eq!(ParamValue::from(0.0).as_bool(), Some(false));
    }

    #[test]
    fn test_missing_and_invalid_fall_back() {
        let source = MapParameterSource::from_pairs([
            ("a", ParamValue::from(f64::INFINITY)),
            ("b", ParamValue::from("loud")),
            ("c", ParamValue::from(0.25)),
        ]);
        assert_eq!(read_number(&source, "a", 1.0), 1.0);
        assert_eq!(read_number(&source, "b", 2.0), 2.0);
        assert_eq!(read_number(&source, "c", 2.0), 0.25);
        assert_eq!(read_number(&source, "missing", 3.0), 3.0);
        assert_eq!(read_clamped(&source, "c", 0.0, 0.5, 1.0), 0.5);
    }

    #[test]
    fn test_read_enum_and_count() {
        let source = MapParameterSource::new();
        source.set("osc.0.waveform", "triangle");
        source.set("osc.1.waveform", "noise");
        source.set("osc.count", 2.6);
        source.set("lfo.count", -1.0);

        assert_eq!(
            read_enum(&source, "osc.0.waveform", Waveform::Sine),
            Waveform::Triangle
        );
        assert_eq!(
            read_enum(&source, "osc.1.waveform", Waveform::Sine),
            Waveform::Sine
        );
        assert_eq!(read_count(&source, "osc.count", 1), 3);
        assert_eq!(read_count(&source, "lfo.count", 1), 1);
    }

    #[test]
    fn test_map_source_shared_writes() {
        let source = MapParameterSource::new().shared();
        let reader: SharedSource = source.clone();
        source.set_parameter("master.polyphonic", ParamValue::Bool(false));
        assert!(!read_bool(reader.as_ref(), "master.polyphonic", true));
        assert_eq!(source.len(), 1);
        assert!(source.remove("master.polyphonic").is_some());
        assert!(source.is_empty());
    }

    #[test]
    fn test_param_value_json_shape() {
        let json = serde_json::to_string(&vec![
            ParamValue::from(1.5),
            ParamValue::from(true),
            ParamValue::from("sine"),
        ])
        .unwrap();
        assert_eq!(json, r#"[1.5,true,"sine"]"#);
    }
}
