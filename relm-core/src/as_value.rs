use crate::{Error, Result, Value, truncate_long};
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use std::{any, fmt::Display};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Conversion between native Rust field types and the dynamically typed [`Value`].
///
/// This is what binds a record's fields to the metadata contract: `as_value` produces the
/// entries of `Struct::values`, `try_from_value` is the scan side used to write decoded
/// columns back into fields, and `as_empty_value` gives the `NULL` of the type.
///
/// # Conversion rules
/// - The canonical variant for the type is always accepted.
/// - Integers accept every other integer width (and integral decimals) after a range check,
///   drivers are free to report a `BIGINT` for an `INTEGER` column.
/// - `Option<T>` maps `NULL` to `None`, every other wrapper rejects `NULL`.
///
/// ```rust
/// use relm_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int32(Some(42)));
/// let n = i64::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The `NULL` of this type.
    fn as_empty_value() -> Value;
    /// Owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn conversion_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} to {}",
        truncate_long!(format!("{value:?}")),
        any::type_name::<T>(),
    ))
}

fn convert_integer<S, D>(v: S) -> Result<D>
where
    S: Display + Copy,
    D: TryFrom<S>,
{
    D::try_from(v).map_err(|_| {
        Error::msg(format!(
            "Value {v} is out of range for {}",
            any::type_name::<D>()
        ))
    })
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path, $from_decimal:ident) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    #[allow(unreachable_patterns)]
                    Value::Int8(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::Int16(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::Int32(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::Int64(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::UInt8(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::UInt16(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::UInt32(Some(v)) => convert_integer(v),
                    #[allow(unreachable_patterns)]
                    Value::UInt64(Some(v)) => convert_integer(v),
                    Value::Decimal(Some(v)) => {
                        let error = Error::msg(format!(
                            "Value {v}: Decimal does not fit into {}",
                            any::type_name::<Self>()
                        ));
                        if !v.is_integer() {
                            return Err(error.context("The value is not a integer"));
                        }
                        v.$from_decimal().ok_or(error)
                    }
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value_integer!(i8, Value::Int8, to_i8);
impl_as_value_integer!(i16, Value::Int16, to_i16);
impl_as_value_integer!(i32, Value::Int32, to_i32);
impl_as_value_integer!(i64, Value::Int64, to_i64);
impl_as_value_integer!(u8, Value::UInt8, to_u8);
impl_as_value_integer!(u16, Value::UInt16, to_u16);
impl_as_value_integer!(u32, Value::UInt32, to_u32);
impl_as_value_integer!(u64, Value::UInt64, to_u64);

macro_rules! impl_as_value {
    ($source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self.into()))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v.into()),
                    $($pat_rest => $expr_rest,)*
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value!(
    bool,
    Value::Boolean,
    Value::Int8(Some(v)) => Ok(v != 0),
    Value::Int16(Some(v)) => Ok(v != 0),
    Value::Int32(Some(v)) => Ok(v != 0),
    Value::Int64(Some(v)) => Ok(v != 0),
    Value::UInt8(Some(v)) => Ok(v != 0),
);
impl_as_value!(
    f32,
    Value::Float32,
    Value::Float64(Some(v)) => Ok(v as _),
    Value::Decimal(Some(v)) => v
        .to_f32()
        .ok_or_else(|| Error::msg(format!("Value {v}: Decimal does not fit into f32"))),
);
impl_as_value!(
    f64,
    Value::Float64,
    Value::Float32(Some(v)) => Ok(v as _),
    Value::Decimal(Some(v)) => v
        .to_f64()
        .ok_or_else(|| Error::msg(format!("Value {v}: Decimal does not fit into f64"))),
);
impl_as_value!(String, Value::Varchar, Value::Json(Some(v)) => Ok(v));
impl_as_value!(Box<[u8]>, Value::Blob);
impl_as_value!(
    time::Date,
    Value::Date,
    Value::Varchar(Some(ref v)) => time::Date::parse(
        v,
        time::macros::format_description!("[year]-[month]-[day]"),
    )
    .map_err(|e| Error::new(e).context(format!("While decoding `{}` as a date", truncate_long!(v)))),
);
impl_as_value!(time::Time, Value::Time);
impl_as_value!(
    time::PrimitiveDateTime,
    Value::Timestamp,
    Value::TimestampWithTimezone(Some(v)) => {
        let v = v.to_offset(time::UtcOffset::UTC);
        Ok(time::PrimitiveDateTime::new(v.date(), v.time()))
    },
);
impl_as_value!(
    time::OffsetDateTime,
    Value::TimestampWithTimezone,
    Value::Timestamp(Some(v)) => Ok(v.assume_utc()),
    Value::Varchar(Some(ref v)) => time::OffsetDateTime::parse(v, &Rfc3339)
        .map_err(|e| Error::new(e).context(format!("While decoding `{}` as a timestamp", truncate_long!(v)))),
);
impl_as_value!(
    Uuid,
    Value::Uuid,
    Value::Varchar(Some(ref v)) => Uuid::parse_str(v)
        .map_err(|e| Error::new(e).context(format!("While decoding `{}` as a uuid", truncate_long!(v)))),
    Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(Into::into),
);
impl_as_value!(
    Decimal,
    Value::Decimal,
    Value::Int32(Some(v)) => Ok(Decimal::from(v)),
    Value::Int64(Some(v)) => Ok(Decimal::from(v)),
    Value::Float64(Some(v)) => Decimal::from_f64(v)
        .ok_or_else(|| Error::msg(format!("Cannot convert {v} to Decimal"))),
    Value::Varchar(Some(ref v)) => v.parse::<Decimal>().map_err(Into::into),
);

/// Structured document stored in its encoded (JSON text) form.
///
/// Equality of two `Json` fields in change tracking is decided on the decoded document, so
/// two encodings differing only in key order or whitespace are the same value.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Json(pub String);

impl Json {
    pub fn encode(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }
    pub fn decode(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.0).map_err(|e| {
            Error::new(e).context(format!(
                "While decoding `{}` as json",
                truncate_long!(self.0)
            ))
        })
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsValue for Json {
    fn as_empty_value() -> Value {
        Value::Json(None)
    }
    fn as_value(self) -> Value {
        Value::Json(Some(self.0))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(Some(v)) | Value::Varchar(Some(v)) => Ok(Json(v)),
            Value::Blob(Some(v)) => Ok(Json(String::from_utf8(v.into_vec())?)),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(T::try_from_value(value)?))
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Box::new(T::try_from_value(value)?))
    }
}

impl<T: AsValue> AsValue for Vec<T> {
    fn as_empty_value() -> Value {
        Value::List(None, Box::new(T::as_empty_value()))
    }
    fn as_value(self) -> Value {
        Value::List(
            Some(self.into_iter().map(AsValue::as_value).collect()),
            Box::new(T::as_empty_value()),
        )
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(Some(v), ..) => v.into_iter().map(T::try_from_value).collect(),
            Value::List(None, ..) => Ok(Vec::new()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}
