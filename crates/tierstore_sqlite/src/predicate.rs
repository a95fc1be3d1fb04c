// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Translation of [`FieldCondition`]s into SQL over a JSON body column.
//!
//! Every clause checks `json_type` first, so a row without the field, or with
//! a field of another JSON type, never matches. Times are compared through
//! `julianday`, which normalizes offsets and fractional seconds.

use chrono::SecondsFormat;
use rusqlite::types::Value as SqlValue;
use tierstore_tier::{Error, FieldCondition, FieldValue, Predicate};

/// A `WHERE` clause and the parameters it binds, in order.
#[derive(Debug, PartialEq)]
pub(crate) struct SqlPredicate {
    pub(crate) clause: String,
    pub(crate) params: Vec<SqlValue>,
}

const EXTRACT: &str = "json_extract(body, ?1)";
const NUMERIC: &str = "json_type(body, ?1) IN ('integer', 'real')";
const TEXT: &str = "json_type(body, ?1) = 'text'";

/// Translates `condition`.
///
/// Returns `Ok(None)` when the condition can never match, such as a range whose
/// bounds are neither both numeric nor both times.
pub(crate) fn translate(condition: &FieldCondition) -> Result<Option<SqlPredicate>, Error> {
    let path = SqlValue::Text(json_path(condition.field())?);

    let predicate = match condition.predicate() {
        Predicate::Exact(value) => exact(path, value),
        Predicate::Range { min, max } => {
            let clause = if min.is_numeric() && max.is_numeric() {
                format!("{NUMERIC} AND {EXTRACT} BETWEEN ?2 AND ?3")
            } else if matches!((min, max), (FieldValue::Time(_), FieldValue::Time(_))) {
                format!("{TEXT} AND julianday({EXTRACT}) BETWEEN julianday(?2) AND julianday(?3)")
            } else {
                return Ok(None);
            };
            SqlPredicate {
                clause,
                params: vec![path, to_sql(min), to_sql(max)],
            }
        }
        Predicate::Like(pattern) => SqlPredicate {
            clause: format!("{TEXT} AND instr({EXTRACT}, ?2) > 0"),
            params: vec![path, SqlValue::Text(pattern.clone())],
        },
    };

    Ok(Some(predicate))
}

fn exact(path: SqlValue, value: &FieldValue) -> SqlPredicate {
    let clause = match value {
        FieldValue::Null => "json_type(body, ?1) = 'null'".to_owned(),
        FieldValue::Bool(b) => format!("json_type(body, ?1) = '{b}'"),
        FieldValue::Integer(_) | FieldValue::Float(_) => format!("{NUMERIC} AND {EXTRACT} = ?2"),
        FieldValue::Text(_) => format!("{TEXT} AND {EXTRACT} = ?2"),
        FieldValue::Time(_) => format!("{TEXT} AND julianday({EXTRACT}) = julianday(?2)"),
    };

    // Null and booleans are fully decided by the JSON type and bind no value.
    let params = if matches!(value, FieldValue::Null | FieldValue::Bool(_)) {
        vec![path]
    } else {
        vec![path, to_sql(value)]
    };

    SqlPredicate { clause, params }
}

/// Builds the JSON path of a top-level field, rejecting names that would need escaping.
fn json_path(field: &str) -> Result<String, Error> {
    let valid = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::backing_store("find_all", format!("unsupported field name `{field}`")));
    }
    Ok(format!("$.{field}"))
}

/// Converts a field value to the form `json_extract` produces for it.
pub(crate) fn to_sql(value: &FieldValue) -> SqlValue {
    match value {
        FieldValue::Null => SqlValue::Null,
        FieldValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        FieldValue::Integer(i) => SqlValue::Integer(*i),
        FieldValue::Float(f) => SqlValue::Real(*f),
        FieldValue::Text(s) => SqlValue::Text(s.clone()),
        FieldValue::Time(t) => SqlValue::Text(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_number_is_typed_equality() {
        let predicate = translate(&FieldCondition::exact("age", 30)).unwrap().unwrap();
        assert_eq!(
            predicate.clause,
            "json_type(body, ?1) IN ('integer', 'real') AND json_extract(body, ?1) = ?2"
        );
        assert_eq!(
            predicate.params,
            vec![SqlValue::Text("$.age".into()), SqlValue::Integer(30)]
        );
    }

    #[test]
    fn exact_null_and_bool_test_the_json_type() {
        let null = translate(&FieldCondition::exact("deleted_at", FieldValue::Null)).unwrap().unwrap();
        assert_eq!(null.clause, "json_type(body, ?1) = 'null'");
        assert_eq!(null.params, vec![SqlValue::Text("$.deleted_at".into())]);

        let flag = translate(&FieldCondition::exact("active", true)).unwrap().unwrap();
        assert_eq!(flag.clause, "json_type(body, ?1) = 'true'");
        assert_eq!(flag.params.len(), 1);
    }

    #[test]
    fn numeric_range_is_between() {
        let predicate = translate(&FieldCondition::range("age", 20, 28)).unwrap().unwrap();
        assert!(predicate.clause.ends_with("BETWEEN ?2 AND ?3"));
        assert_eq!(predicate.params.len(), 3);
    }

    #[test]
    fn time_range_compares_julian_days() {
        use chrono::{TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let predicate = translate(&FieldCondition::range("at", start, end)).unwrap().unwrap();
        assert!(predicate.clause.ends_with("julianday(json_extract(body, ?1)) BETWEEN julianday(?2) AND julianday(?3)"));
        assert_eq!(predicate.params[1], SqlValue::Text("2024-03-01T00:00:00Z".into()));
    }

    #[test]
    fn range_over_text_bounds_matches_nothing() {
        assert_eq!(translate(&FieldCondition::range("name", "a", "z")).unwrap(), None);
    }

    #[test]
    fn like_is_a_substring_test_on_text() {
        let predicate = translate(&FieldCondition::like("name", "Ali")).unwrap().unwrap();
        assert!(predicate.clause.contains("instr("));
        assert!(predicate.clause.contains("'text'"));
    }

    #[test]
    fn field_names_are_validated() {
        let err = translate(&FieldCondition::exact("a') OR 1=1 --", 1)).unwrap_err();
        assert!(matches!(err, Error::BackingStore { operation: "find_all", .. }));
    }

    #[test]
    fn booleans_bind_as_integers() {
        assert_eq!(to_sql(&FieldValue::Bool(true)), SqlValue::Integer(1));
    }
}
