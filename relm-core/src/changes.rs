use crate::{Result, Struct, Value};

/// Semi-deep copy of `source`.
///
/// The copy is rebuilt from the field values, so optional fields get their own holder and
/// sequence fields their own backing storage: mutating the source afterwards never shows
/// through the copy. Fields holding shared handles (`Arc`, ...) still share what they point
/// to when the record's `scan` reuses them.
pub fn copy<S: Struct>(source: &S) -> Result<S> {
    S::from_row(source.values())
}

/// Columns whose values differ between `old` and `new`, in column order.
pub fn changed_fields<S: Struct>(old: &S, new: &S) -> Vec<&'static str> {
    let view = S::view();
    let (old, new) = (old.values(), new.values());
    old.iter()
        .zip(new.iter())
        .zip(view.column_names())
        .filter(|((o, n), _)| !values_equal(o, n))
        .map(|(_, column)| column)
        .collect()
}

/// Logical equality used by change tracking.
///
/// - Timestamps with a zone are equal when they denote the same instant.
/// - Json documents are decoded and compared structurally (key order and whitespace are
///   irrelevant), falling back to the encoded text when either side is not valid json.
/// - Lists compare element by element with these same rules.
/// - Everything else uses structural equality.
pub fn values_equal(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::TimestampWithTimezone(Some(o)), Value::TimestampWithTimezone(Some(n))) => {
            o.unix_timestamp_nanos() == n.unix_timestamp_nanos()
        }
        (Value::Json(Some(o)), Value::Json(Some(n))) => {
            if o == n {
                return true;
            }
            match (
                serde_json::from_str::<serde_json::Value>(o),
                serde_json::from_str::<serde_json::Value>(n),
            ) {
                (Ok(o), Ok(n)) => o == n,
                _ => false,
            }
        }
        (Value::List(Some(o), o_type), Value::List(Some(n), n_type)) => {
            o_type.same_type(n_type)
                && o.len() == n.len()
                && o.iter().zip(n.iter()).all(|(o, n)| values_equal(o, n))
        }
        _ => old == new,
    }
}

#[cfg(test)]
mod tests {
    use super::values_equal;
    use crate::Value;
    use time::macros::datetime;

    #[test]
    fn timestamps_compare_instants() {
        let utc = datetime!(2024-03-01 10:00 UTC);
        let rome = utc.to_offset(time::macros::offset!(+1));
        assert!(values_equal(
            &Value::TimestampWithTimezone(Some(utc)),
            &Value::TimestampWithTimezone(Some(rome)),
        ));
        assert!(!values_equal(
            &Value::TimestampWithTimezone(Some(utc)),
            &Value::TimestampWithTimezone(None),
        ));
    }

    #[test]
    fn json_ignores_key_order() {
        let a = Value::Json(Some(r#"{"a":1,"b":[1,2]}"#.into()));
        let b = Value::Json(Some(r#"{ "b": [1, 2], "a": 1 }"#.into()));
        let c = Value::Json(Some(r#"{"a":1,"b":[2,1]}"#.into()));
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &c));
        assert!(!values_equal(&a, &Value::Json(Some("{broken".into()))));
    }

    #[test]
    fn lists_compare_elements() {
        let list = |v: &[i32]| {
            Value::List(
                Some(v.iter().map(|v| Value::Int32(Some(*v))).collect()),
                Box::new(Value::Int32(None)),
            )
        };
        assert!(values_equal(&list(&[1, 2]), &list(&[1, 2])));
        assert!(!values_equal(&list(&[1, 2]), &list(&[1, 2, 3])));
        assert!(!values_equal(
            &list(&[1]),
            &Value::List(None, Box::new(Value::Int32(None)))
        ));
    }
}
