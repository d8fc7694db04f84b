// src/deutils.rs
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn bool_from_value(v: &Value) -> Option<bool> {
    if let Value::Bool(b) = v {
        return Some(*b);
    }
    let s = v.to_string().trim_matches('"').trim().to_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "y" | "t" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "f" | "off" => Some(false),
        _ => None,
    }
}

/// Loose booleans for config keys (`yes`, `on`, `1` ...); `null` and absent keys stay `None`.
/// Unrecognised values are dropped with a warning so the default applies.
pub fn deserialize_opt_bool_from_anything<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let b = bool_from_value(&v);
            if b.is_none() {
                warn!("Ignoring non-boolean config value {}", v);
            }
            Ok(b)
        }
    }
}

fn i64_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integers that may be written as numbers or numeric strings. Range checks
/// happen at normalisation; here anything non-numeric becomes `None`.
pub fn deserialize_opt_i64_from_anything<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = i64_from_value(&v);
            if n.is_none() {
                warn!("Ignoring non-numeric config value {}", v);
            }
            Ok(n)
        }
    }
}

fn f64_from_value(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Numbers that may arrive as JSON numbers or numeric strings.
/// Anything unparseable becomes `None` rather than failing the whole record.
pub fn deserialize_opt_f64_from_anything<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(f64_from_value))
}

/// Colour limit: an integer, a numeric string, or `false`/empty for "off".
/// Zero and negatives are also "off".
pub fn deserialize_limit_colors<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    let n = match v {
        None | Some(Value::Null) | Some(Value::Bool(_)) => None,
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    Ok(n.filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok()))
}

/// Converts total seconds into a "HH:MM:SS" or "MM:SS" string.
/// If hours is zero, only MM:SS is surfaced.
pub fn seconds_to_hms(total_seconds: f64) -> String {
    let total = if total_seconds.is_finite() && total_seconds > 0.0 { total_seconds as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "deserialize_limit_colors")]
        limit: Option<u32>,
        #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
        flag: Option<bool>,
        #[serde(default, deserialize_with = "deserialize_opt_f64_from_anything")]
        num: Option<f64>,
        #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
        int: Option<i64>,
    }

    fn probe(s: &str) -> Probe {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_limit_colors_forms() {
        assert_eq!(probe(r#"{"limit": 8}"#).limit, Some(8));
        assert_eq!(probe(r#"{"limit": "16"}"#).limit, Some(16));
        assert_eq!(probe(r#"{"limit": "false"}"#).limit, None);
        assert_eq!(probe(r#"{"limit": ""}"#).limit, None);
        assert_eq!(probe(r#"{"limit": 0}"#).limit, None);
        assert_eq!(probe(r#"{"limit": false}"#).limit, None);
        assert_eq!(probe("{}").limit, None);
    }

    #[test]
    fn test_bool_forms() {
        assert_eq!(probe(r#"{"flag": "yes"}"#).flag, Some(true));
        assert_eq!(probe(r#"{"flag": 0}"#).flag, Some(false));
        assert_eq!(probe(r#"{"flag": true}"#).flag, Some(true));
        assert_eq!(probe(r#"{"flag": "maybe"}"#).flag, None);
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(probe(r#"{"num": "21.5"}"#).num, Some(21.5));
        assert_eq!(probe(r#"{"num": 3}"#).num, Some(3.0));
        assert_eq!(probe(r#"{"num": "unknown"}"#).num, None);
    }

    #[test]
    fn test_loose_integers() {
        assert_eq!(probe(r#"{"int": 300}"#).int, Some(300));
        assert_eq!(probe(r#"{"int": " -1 "}"#).int, Some(-1));
        assert_eq!(probe(r#"{"int": 2.6}"#).int, Some(3));
        assert_eq!(probe(r#"{"int": "big"}"#).int, None);
        assert_eq!(probe(r#"{"int": [1]}"#).int, None);
        assert_eq!(probe("{}").int, None);
    }

    #[test]
    fn test_seconds_to_hms() {
        assert_eq!(seconds_to_hms(65.0), "01:05");
        assert_eq!(seconds_to_hms(3725.0), "01:02:05");
        assert_eq!(seconds_to_hms(-3.0), "00:00");
    }
}
