//! Lenient deserializers for spreadsheet cells.
//!
//! The remote store serializes whatever a cell holds: text, numbers, booleans
//! or `null` for blanks. Record fields are all text on our side, so every
//! scalar is folded into its string form.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize any scalar cell into a `String`. `null` becomes empty.
///
/// # Errors
///
/// Returns the deserializer's error if the input is not valid JSON.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

/// Deserialize a cell into an id newtype.
///
/// # Errors
///
/// Returns the deserializer's error if the input is not valid JSON.
pub fn id<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    text(deserializer).map(T::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "super::text")]
        value: String,
    }

    fn parse(json: &str) -> String {
        serde_json::from_str::<Row>(json).unwrap().value
    }

    #[test]
    fn test_text_accepts_scalars() {
        assert_eq!(parse(r#"{"value":"abc"}"#), "abc");
        assert_eq!(parse(r#"{"value":12345}"#), "12345");
        assert_eq!(parse(r#"{"value":true}"#), "true");
        assert_eq!(parse(r#"{"value":null}"#), "");
    }
}
