//! Typed extraction of tool parameters from the JSON the model sends.
//!
//! Models routinely send `""` or `null` for parameters they mean to omit, so
//! every optional accessor treats both as absent.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{AdapterError, Result};

/// Fetch a required, non-empty string parameter.
pub fn required_str<'a>(params: &'a Value, key: &str, tool_name: &str) -> Result<&'a str> {
    optional_str(params, key).ok_or_else(|| {
        AdapterError::invalid(tool_name, format!("missing required string field `{key}`"))
    })
}

/// Fetch an optional string parameter; empty strings count as absent.
pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Fetch a required free-text parameter exactly as sent.
///
/// Blank values are rejected, but surrounding whitespace and line breaks are
/// kept since they are part of the text.
pub fn required_text<'a>(params: &'a Value, key: &str, tool_name: &str) -> Result<&'a str> {
    optional_text(params, key).ok_or_else(|| {
        AdapterError::invalid(tool_name, format!("missing required string field `{key}`"))
    })
}

/// Fetch an optional free-text parameter exactly as sent; blank counts as absent.
pub fn optional_text<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Fetch an optional unsigned integer.
///
/// Accepts JSON numbers and numeric strings, since ids such as ClickUp list
/// ids exceed what models reliably emit as numbers.
pub fn optional_u64(params: &Value, key: &str, tool_name: &str) -> Result<Option<u64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            AdapterError::invalid(tool_name, format!("`{key}` must be a non-negative integer"))
        }),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
            AdapterError::invalid(tool_name, format!("`{key}` must be a non-negative integer"))
        }),
        Some(_) => Err(AdapterError::invalid(
            tool_name,
            format!("`{key}` must be a non-negative integer"),
        )),
    }
}

/// Fetch an optional boolean.
pub fn optional_bool(params: &Value, key: &str, tool_name: &str) -> Result<Option<bool>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(AdapterError::invalid(
            tool_name,
            format!("`{key}` must be a boolean"),
        )),
    }
}

/// Fetch an optional array of strings.  Numbers are stringified so that
/// user-id lists can be given either way.
pub fn optional_str_list(params: &Value, key: &str, tool_name: &str) -> Result<Vec<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(AdapterError::invalid(
                    tool_name,
                    format!("`{key}` must contain only strings or numbers"),
                )),
            })
            .collect(),
        Some(_) => Err(AdapterError::invalid(
            tool_name,
            format!("`{key}` must be an array"),
        )),
    }
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_iso_date(raw: &str, key: &str, tool_name: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AdapterError::invalid(
            tool_name,
            format!("`{key}` must be a date in YYYY-MM-DD format, got `{raw}`"),
        )
    })
}

/// Check that `value` is one of `allowed` (case-sensitive).
pub fn ensure_one_of(value: &str, allowed: &[&str], key: &str, tool_name: &str) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(AdapterError::invalid(
            tool_name,
            format!(
                "`{key}` must be one of {}, got `{value}`",
                allowed.join(", ")
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_str_rejects_missing_and_empty() {
        let params = json!({"a": "x", "b": "  "});
        assert_eq!(required_str(&params, "a", "t").unwrap(), "x");
        let err = required_str(&params, "b", "t").unwrap_err();
        assert!(err.to_string().contains("`b`"));
        assert!(required_str(&params, "c", "t").is_err());
    }

    #[test]
    fn text_accessors_keep_whitespace() {
        let params = json!({"m": "  - item one\n- item two\n", "blank": " \n "});
        assert_eq!(required_text(&params, "m", "t").unwrap(), "  - item one\n- item two\n");
        assert!(required_text(&params, "blank", "t").is_err());
        assert_eq!(optional_text(&params, "blank"), None);
        assert_eq!(optional_text(&params, "missing"), None);
    }

    #[test]
    fn optional_u64_accepts_numeric_strings() {
        let params = json!({"n": 901307715461u64, "s": "42", "bad": "x1", "neg": -3});
        assert_eq!(optional_u64(&params, "n", "t").unwrap(), Some(901307715461));
        assert_eq!(optional_u64(&params, "s", "t").unwrap(), Some(42));
        assert_eq!(optional_u64(&params, "missing", "t").unwrap(), None);
        assert!(optional_u64(&params, "bad", "t").is_err());
        assert!(optional_u64(&params, "neg", "t").is_err());
    }

    #[test]
    fn optional_str_list_stringifies_numbers() {
        let params = json!({"ids": [81918955, "abc"]});
        let ids = optional_str_list(&params, "ids", "t").unwrap();
        assert_eq!(ids, vec!["81918955".to_owned(), "abc".to_owned()]);
        assert!(optional_str_list(&json!({"ids": "x"}), "ids", "t").is_err());
        assert!(optional_str_list(&json!({}), "ids", "t").unwrap().is_empty());
    }

    #[test]
    fn parse_iso_date_is_strict() {
        assert!(parse_iso_date("2025-03-07", "d", "t").is_ok());
        assert!(parse_iso_date("07/03/2025", "d", "t").is_err());
        assert!(parse_iso_date("2025-02-30", "d", "t").is_err());
    }

    #[test]
    fn ensure_one_of_lists_allowed_values() {
        assert!(ensure_one_of("High", &["High", "Low"], "priority", "t").is_ok());
        let err = ensure_one_of("high", &["High", "Low"], "priority", "t").unwrap_err();
        assert!(err.to_string().contains("High, Low"));
    }
}
