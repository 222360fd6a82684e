//! Named strategy parameters, their schema, and construction-time validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{Error, Result};

/// A single configuration value as it arrives from TOML, JSON or code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

/// Parameter name → value.
pub type Params = BTreeMap<String, ParamValue>;

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers, or floats with no fractional part (`20.0` from a JSON form).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

impl TryFrom<toml::Value> for ParamValue {
    type Error = Error;

    fn try_from(value: toml::Value) -> Result<Self> {
        match value {
            toml::Value::Boolean(v) => Ok(ParamValue::Bool(v)),
            toml::Value::Integer(v) => Ok(ParamValue::Int(v)),
            toml::Value::Float(v) => Ok(ParamValue::Float(v)),
            toml::Value::String(v) => Ok(ParamValue::Text(v)),
            toml::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s),
                    other => Err(Error::Config(format!(
                        "list parameters must contain strings, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(ParamValue::List),
            other => Err(Error::Config(format!("unsupported parameter value: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    Text,
    Select,
    List,
}

/// Declared parameter: type, default, and valid range or options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub default: ParamValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn int(name: &'static str, default: i64, min: i64, max: i64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
            default: ParamValue::Int(default),
            min: Some(min as f64),
            max: Some(max as f64),
            options: Vec::new(),
            description,
        }
    }

    pub fn float(name: &'static str, default: f64, min: f64, max: f64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            min: Some(min),
            max: Some(max),
            options: Vec::new(),
            description,
        }
    }

    pub fn boolean(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: ParamValue::Bool(default),
            min: None,
            max: None,
            options: Vec::new(),
            description,
        }
    }

    pub fn text(name: &'static str, default: &str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Text,
            default: ParamValue::Text(default.to_string()),
            min: None,
            max: None,
            options: Vec::new(),
            description,
        }
    }

    pub fn select(
        name: &'static str,
        default: &'static str,
        options: &[&'static str],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Select,
            default: ParamValue::Text(default.to_string()),
            min: None,
            max: None,
            options: options.to_vec(),
            description,
        }
    }

    pub fn list(name: &'static str, default: &[&str], description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::List,
            default: ParamValue::List(default.iter().map(|s| s.to_string()).collect()),
            min: None,
            max: None,
            options: Vec::new(),
            description,
        }
    }

    /// Check `value` against this spec's type, range and options.
    pub fn validate(&self, value: &ParamValue) -> Result<()> {
        let type_error = || {
            Error::invalid_parameter(self.name, format!("expected {:?} value, got {value:?}", self.kind))
        };

        match self.kind {
            ParamKind::Int => {
                let v = value.as_i64().ok_or_else(type_error)?;
                self.check_range(v as f64)
            }
            ParamKind::Float => {
                let v = value.as_f64().ok_or_else(type_error)?;
                if !v.is_finite() {
                    return Err(Error::invalid_parameter(self.name, "must be a finite number"));
                }
                self.check_range(v)
            }
            ParamKind::Bool => value.as_bool().map(|_| ()).ok_or_else(type_error),
            ParamKind::Text => value.as_str().map(|_| ()).ok_or_else(type_error),
            ParamKind::Select => {
                let v = value.as_str().ok_or_else(type_error)?;
                if self.options.iter().any(|o| o.eq_ignore_ascii_case(v)) {
                    Ok(())
                } else {
                    Err(Error::invalid_parameter(
                        self.name,
                        format!("'{v}' is not one of {:?}", self.options),
                    ))
                }
            }
            ParamKind::List => value.as_list().map(|_| ()).ok_or_else(type_error),
        }
    }

    fn check_range(&self, v: f64) -> Result<()> {
        let below = self.min.is_some_and(|min| v < min);
        let above = self.max.is_some_and(|max| v > max);
        if below || above {
            return Err(Error::invalid_parameter(
                self.name,
                format!(
                    "{v} outside valid range {}..={}",
                    self.min.unwrap_or(f64::NEG_INFINITY),
                    self.max.unwrap_or(f64::INFINITY)
                ),
            ));
        }
        Ok(())
    }
}

/// Typed, validated access to a parameter map under a schema.
///
/// Missing keys take the schema default; present keys must satisfy the
/// schema. Keys the schema does not declare are ignored with a warning.
pub struct ParamReader<'a> {
    params: &'a Params,
    schema: Vec<ParamSpec>,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Params, schema: Vec<ParamSpec>) -> Self {
        for key in params.keys() {
            if !schema.iter().any(|s| s.name == key) {
                warn!(parameter = %key, "Ignoring undeclared strategy parameter");
            }
        }
        Self { params, schema }
    }

    pub fn schema(&self) -> &[ParamSpec] {
        &self.schema
    }

    fn value(&self, name: &str) -> Result<ParamValue> {
        let spec = self
            .schema
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::invalid_parameter(name, "not declared in schema"))?;
        let value = self.params.get(name).cloned().unwrap_or_else(|| spec.default.clone());
        spec.validate(&value)?;
        Ok(value)
    }

    pub fn usize(&self, name: &str) -> Result<usize> {
        let v = self.value(name)?;
        v.as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| Error::invalid_parameter(name, "must be a non-negative integer"))
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        let v = self.value(name)?;
        v.as_i64()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| Error::invalid_parameter(name, "must be a non-negative integer"))
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        let v = self.value(name)?;
        v.as_f64()
            .ok_or_else(|| Error::invalid_parameter(name, "must be a number"))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        let v = self.value(name)?;
        v.as_bool()
            .ok_or_else(|| Error::invalid_parameter(name, "must be true or false"))
    }

    pub fn string(&self, name: &str) -> Result<String> {
        let v = self.value(name)?;
        v.as_str()
            .map(str::to_lowercase)
            .ok_or_else(|| Error::invalid_parameter(name, "must be a string"))
    }

    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        let v = self.value(name)?;
        v.as_list()
            .map(<[String]>::to_vec)
            .ok_or_else(|| Error::invalid_parameter(name, "must be a list of strings"))
    }

    /// Every declared parameter with its effective value.
    pub fn resolved(&self) -> Result<Params> {
        self.schema
            .iter()
            .map(|spec| Ok((spec.name.to_string(), self.value(spec.name)?)))
            .collect()
    }
}

/// Fail with `InvalidParameter` on `name` unless `ok`.
pub fn ensure(ok: bool, name: &str, reason: impl Into<String>) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("period", 20, 10, 50, "window"),
            ParamSpec::float("std", 2.0, 1.0, 3.0, "multiplier"),
            ParamSpec::select("model", "a", &["a", "b"], "model"),
            ParamSpec::list("cols", &["close"], "columns"),
        ]
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let params = Params::new();
        let reader = ParamReader::new(&params, schema());
        assert_eq!(reader.usize("period").unwrap(), 20);
        assert_eq!(reader.f64("std").unwrap(), 2.0);
        assert_eq!(reader.list("cols").unwrap(), vec!["close".to_string()]);
        assert_eq!(reader.resolved().unwrap().len(), 4);
    }

    #[test]
    fn out_of_range_values_fail() {
        let mut params = Params::new();
        params.insert("period".into(), ParamValue::Int(5));
        let reader = ParamReader::new(&params, schema());
        let err = reader.usize("period").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "period"));
    }

    #[test]
    fn ints_are_accepted_for_floats_but_not_the_reverse() {
        let mut params = Params::new();
        params.insert("std".into(), ParamValue::Int(2));
        params.insert("period".into(), ParamValue::Float(20.5));
        let reader = ParamReader::new(&params, schema());
        assert_eq!(reader.f64("std").unwrap(), 2.0);
        assert!(reader.usize("period").is_err());
    }

    #[test]
    fn select_rejects_unknown_option() {
        let mut params = Params::new();
        params.insert("model".into(), "c".into());
        let reader = ParamReader::new(&params, schema());
        assert!(reader.string("model").is_err());
    }

    #[test]
    fn toml_values_convert() {
        let value: toml::Value = toml::from_str::<toml::Table>("x = [\"rsi\", \"macd\"]")
            .unwrap()
            .remove("x")
            .unwrap();
        assert_eq!(
            ParamValue::try_from(value).unwrap(),
            ParamValue::List(vec!["rsi".into(), "macd".into()])
        );
    }

    #[test]
    fn untagged_json_deserialization() {
        let params: Params = serde_json::from_str(r#"{"a": 20, "b": 2.5, "c": true, "d": "x"}"#).unwrap();
        assert_eq!(params["a"], ParamValue::Int(20));
        assert_eq!(params["b"], ParamValue::Float(2.5));
        assert_eq!(params["c"], ParamValue::Bool(true));
        assert_eq!(params["d"], ParamValue::Text("x".into()));
    }
}
