use crate::{Error, Value, truncate_long};
use log::Level;
use regex::{Captures, Regex};
use std::{fmt::Write, sync::LazyLock, time::Duration};
use time::macros::format_description;

/// Hooks bracketing every statement sent by a `Querier`.
///
/// `after` is called once for every `before`, also when the statement fails or the request
/// is cancelled.
pub trait Logger: Send + Sync {
    fn before(&self, query: &str, args: &[Value]);
    fn after(&self, query: &str, args: &[Value], elapsed: Duration, error: Option<&Error>);
}

/// [`Logger`] writing to the `log` facade.
///
/// The statement is printed with its arguments inlined so it can be pasted in a SQL console.
/// This is not a faithful SQL rendering: strings are wrapped in single quotes without
/// escaping. Placeholders inside single quoted literals are left alone, and `?` counts as a
/// placeholder only in statements without `$n` ones, so Postgres `?` operators survive.
#[derive(Debug, Clone)]
pub struct LogLogger {
    level: Level,
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<quoted>'(?:[^']|'')*')|\$(?P<n>\d+)|\?").expect("constant pattern")
});

impl LogLogger {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// `query` with every `$n` / `?` placeholder replaced by the rendered argument.
    pub fn inline(query: &str, args: &[Value]) -> String {
        let numbered = PLACEHOLDER
            .captures_iter(query)
            .any(|captures| captures.name("n").is_some());
        let mut position = 0;
        PLACEHOLDER
            .replace_all(query, |captures: &Captures| {
                if captures.name("quoted").is_some() {
                    return captures[0].to_string();
                }
                let index = match captures.name("n") {
                    Some(n) => n.as_str().parse::<usize>().ok().and_then(|n| n.checked_sub(1)),
                    None if numbered => None,
                    None => {
                        position += 1;
                        Some(position - 1)
                    }
                };
                match index.and_then(|i| args.get(i)) {
                    Some(value) => render(value),
                    None => captures[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl Default for LogLogger {
    fn default() -> Self {
        Self::new(Level::Debug)
    }
}

impl Logger for LogLogger {
    fn before(&self, query: &str, args: &[Value]) {
        let query = Self::inline(query, args);
        log::log!(self.level, ">>> {}", truncate_long!(query));
    }

    fn after(&self, query: &str, args: &[Value], elapsed: Duration, error: Option<&Error>) {
        let query = Self::inline(query, args);
        match error {
            None => log::log!(self.level, "<<< {elapsed:.2?} {}", truncate_long!(query)),
            Some(error) => log::log!(
                self.level,
                "<<< {elapsed:.2?} {} failed: {error:#}",
                truncate_long!(query)
            ),
        }
    }
}

fn render(value: &Value) -> String {
    if value.is_null() {
        return "NULL".into();
    }
    let timestamp = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    match value {
        Value::Boolean(Some(v)) => String::from(if *v { "'t'" } else { "'f'" }),
        Value::Int8(Some(v)) => v.to_string(),
        Value::Int16(Some(v)) => v.to_string(),
        Value::Int32(Some(v)) => v.to_string(),
        Value::Int64(Some(v)) => v.to_string(),
        Value::UInt8(Some(v)) => v.to_string(),
        Value::UInt16(Some(v)) => v.to_string(),
        Value::UInt32(Some(v)) => v.to_string(),
        Value::UInt64(Some(v)) => v.to_string(),
        Value::Float32(Some(v)) => v.to_string(),
        Value::Float64(Some(v)) => v.to_string(),
        Value::Decimal(Some(v)) => v.to_string(),
        Value::Varchar(Some(v)) | Value::Json(Some(v)) => format!("'{v}'"),
        Value::Blob(Some(v)) => format!("'\\x{}'", hex::encode(v)),
        Value::Date(Some(v)) => format!("'{v}'"),
        Value::Time(Some(v)) => format!("'{v}'"),
        Value::Timestamp(Some(v)) => v
            .format(timestamp)
            .map(|v| format!("'{v}'"))
            .unwrap_or_else(|_| format!("'{v}'")),
        Value::TimestampWithTimezone(Some(v)) => v
            .format(timestamp)
            .map(|v| format!("'{v}'"))
            .unwrap_or_else(|_| format!("'{v}'")),
        Value::Uuid(Some(v)) => format!("'{v}'"),
        Value::List(Some(v), ..) => {
            let mut out = String::from("ARRAY[");
            for (i, v) in v.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}", render(v));
            }
            out.push(']');
            out
        }
        _ => "NULL".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::LogLogger;
    use crate::Value;
    use time::macros::datetime;

    #[test]
    fn inline_numbered() {
        let query = "UPDATE people SET name = $1, active = $2 WHERE id = $3";
        assert_eq!(
            LogLogger::inline(
                query,
                &[
                    Value::Varchar(Some("Ada".into())),
                    Value::Boolean(Some(false)),
                    Value::Int64(Some(10)),
                ]
            ),
            "UPDATE people SET name = 'Ada', active = 'f' WHERE id = 10"
        );
    }

    #[test]
    fn inline_positional() {
        let query = "INSERT INTO logs (at, payload, data) VALUES (?, ?, ?)";
        assert_eq!(
            LogLogger::inline(
                query,
                &[
                    Value::Timestamp(Some(datetime!(2024-01-02 03:04:05))),
                    Value::Varchar(None),
                    Value::Blob(Some([0xde, 0xad].into())),
                ]
            ),
            r"INSERT INTO logs (at, payload, data) VALUES ('2024-01-02 03:04:05', NULL, '\xdead')"
        );
    }

    #[test]
    fn inline_skips_literals_and_operators() {
        assert_eq!(
            LogLogger::inline(
                "SELECT * FROM docs WHERE body ? 'key' AND title = $1 AND note = 'cost: $1?'",
                &[Value::Varchar(Some("Minutes".into()))]
            ),
            "SELECT * FROM docs WHERE body ? 'key' AND title = 'Minutes' AND note = 'cost: $1?'"
        );
        assert_eq!(
            LogLogger::inline(
                "UPDATE notes SET body = ? WHERE title = 'why?' AND id = ?",
                &[Value::Varchar(Some("it's".into())), Value::Int64(Some(7))]
            ),
            "UPDATE notes SET body = 'it's' WHERE title = 'why?' AND id = 7"
        );
    }

    #[test]
    fn inline_missing_argument_keeps_placeholder() {
        assert_eq!(
            LogLogger::inline("SELECT 1 WHERE a = $1 AND b = $2", &[Value::Int32(Some(1))]),
            "SELECT 1 WHERE a = 1 AND b = $2"
        );
    }
}
