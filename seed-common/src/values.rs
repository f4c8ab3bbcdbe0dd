//! Blank-value helpers and stable hashing of raw strings
//!
//! Imported spreadsheets are full of empty cells. A value is blank when it is
//! missing, JSON `null`, or a string that is empty after trimming; blank values
//! never override a populated value during a merge.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Whether a scalar cell is blank
pub fn is_blank_str(value: &str) -> bool {
    value.trim().is_empty()
}

/// Whether a free-form extra-data value is blank
///
/// Numbers, booleans, arrays and objects always count as populated.
pub fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => is_blank_str(s),
        _ => false,
    }
}

/// SHA-256 hex digest of a raw source string (e.g. a spreadsheet header)
pub fn source_string_sha(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_strings() {
        assert!(is_blank_str(""));
        assert!(is_blank_str("   \t"));
        assert!(!is_blank_str(" a "));
    }

    #[test]
    fn test_blank_json_values() {
        assert!(is_blank_value(&Value::Null));
        assert!(is_blank_value(&json!("")));
        assert!(!is_blank_value(&json!(0)));
        assert!(!is_blank_value(&json!(false)));
        assert!(!is_blank_value(&json!("Not Available")));
    }

    #[test]
    fn test_source_string_sha_is_stable() {
        let a = source_string_sha("Property Id");
        assert_eq!(a.len(), 64);
        assert_eq!(a, source_string_sha("Property Id"));
        assert_ne!(a, source_string_sha("Property ID"));
    }
}
