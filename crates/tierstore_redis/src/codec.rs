// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Text encoding of cached values.
//!
//! Strings are stored exactly as given unless that text would read back as
//! JSON, in which case they are stored as a JSON string. Every other value is
//! stored as JSON. Decoding therefore never confuses a string with the value
//! its text spells.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tierstore_tier::Error;

/// Encodes `value` into the text stored in the remote cache.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if `value` cannot be represented as JSON.
///
/// # Examples
///
/// ```
/// use tierstore_redis::codec;
///
/// assert_eq!(codec::encode(&"plain").unwrap(), "plain");
/// assert_eq!(codec::encode(&"123").unwrap(), "\"123\"");
/// assert_eq!(codec::encode(&vec![1, 2]).unwrap(), "[1,2]");
/// ```
pub fn encode<V: Serialize + ?Sized>(value: &V) -> Result<String, Error> {
    match serde_json::to_value(value).map_err(Error::serialization)? {
        Value::String(text) if serde_json::from_str::<Value>(&text).is_err() => Ok(text),
        other => serde_json::to_string(&other).map_err(Error::serialization),
    }
}

/// Decodes text read from the remote cache.
///
/// The text is read as JSON first. Text that is not JSON is a bare string,
/// which is how [`encode`] stores most strings and how other clients usually
/// write them.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the text decodes to neither form.
pub fn decode<V: DeserializeOwned>(text: &str) -> Result<V, Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_json::from_value(Value::String(text.to_owned())).map_err(|_string_err| Error::serialization(json_err)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn plain_strings_pass_through_unchanged() {
        assert_eq!(encode("hello world").unwrap(), "hello world");
        assert_eq!(encode("").unwrap(), "");
    }

    #[test]
    fn strings_that_spell_json_are_quoted() {
        assert_eq!(encode("123").unwrap(), "\"123\"");
        assert_eq!(encode("{\"a\":1}").unwrap(), "\"{\\\"a\\\":1}\"");
    }

    #[test]
    fn quoted_string_round_trips() {
        let quoted = String::from("\"quoted\"");
        let decoded: String = decode(&encode(&quoted).unwrap()).unwrap();
        assert_eq!(decoded, quoted);
    }

    #[test]
    fn json_string_values_round_trip() {
        for text in ["123", "true", "null", "[1]", "plain", ""] {
            let value = Value::String(text.to_owned());
            let decoded: Value = decode(&encode(&value).unwrap()).unwrap();
            assert_eq!(decoded, value, "round trip of {text:?}");
        }
    }

    #[test]
    fn objects_round_trip_as_values() {
        let value = serde_json::json!({"name": "Alice", "age": 30});
        assert_eq!(decode::<Value>(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn maps_are_stored_as_json() {
        let mut fields = BTreeMap::new();
        fields.insert("age", 30);
        assert_eq!(encode(&fields).unwrap(), "{\"age\":30}");
    }

    #[test]
    fn decode_reads_json() {
        let fields: BTreeMap<String, i32> = decode("{\"age\":30}").unwrap();
        assert_eq!(fields.get("age"), Some(&30));
    }

    #[test]
    fn decode_falls_back_to_bare_string() {
        let text: String = decode("hello world").unwrap();
        assert_eq!(text, "hello world");

        let digits: String = decode("123").unwrap();
        assert_eq!(digits, "123");
    }

    #[test]
    fn decode_rejects_mismatched_shape() {
        let err = decode::<Vec<i32>>("not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
