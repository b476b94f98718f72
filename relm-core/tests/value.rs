#[cfg(test)]
mod tests {
    use relm_core::{AsValue, Json, Value};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    #[test]
    fn integers() {
        assert_eq!(7i16.as_value(), Value::Int16(Some(7)));
        assert_eq!(i64::try_from_value(Value::Int8(Some(-3))).unwrap(), -3);
        assert_eq!(u8::try_from_value(Value::Int64(Some(200))).unwrap(), 200);
        assert!(u8::try_from_value(Value::Int64(Some(300))).is_err());
        assert!(i32::try_from_value(Value::Int64(Some(-1 << 40))).is_err());
        assert_eq!(
            i32::try_from_value(Value::Decimal(Some(Decimal::from(12)))).unwrap(),
            12
        );
        assert!(i32::try_from_value(Value::Decimal(Some(Decimal::from_str("1.5").unwrap()))).is_err());
        assert!(i32::try_from_value(Value::Varchar(Some("12".into()))).is_err());
        assert!(i32::try_from_value(Value::Int32(None)).is_err());
    }

    #[test]
    fn options() {
        assert_eq!(None::<i32>.as_value(), Value::Int32(None));
        assert_eq!(Some(5i32).as_value(), Value::Int32(Some(5)));
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::try_from_value(Value::Int64(None)).unwrap(), None);
        assert_eq!(
            Option::<String>::try_from_value(Value::Varchar(Some("x".into()))).unwrap(),
            Some("x".into())
        );
        assert!(Value::Varchar(None).is_null());
        assert!(!Value::Varchar(Some("".into())).is_null());
    }

    #[test]
    fn text_and_time() {
        assert_eq!(Value::from("abc"), Value::Varchar(Some("abc".into())));
        assert_eq!(
            time::Date::try_from_value(Value::Varchar(Some("2024-02-29".into()))).unwrap(),
            date!(2024 - 02 - 29)
        );
        assert_eq!(
            time::OffsetDateTime::try_from_value(Value::Varchar(Some(
                "2024-02-29T12:00:00+02:00".into()
            )))
            .unwrap(),
            datetime!(2024-02-29 10:00 UTC)
        );
        assert_eq!(
            time::OffsetDateTime::try_from_value(Value::Timestamp(Some(datetime!(2024-02-29 10:00))))
                .unwrap(),
            datetime!(2024-02-29 10:00 UTC)
        );
        let id = Uuid::new_v4();
        assert_eq!(
            Uuid::try_from_value(Value::Varchar(Some(id.to_string()))).unwrap(),
            id
        );
        assert!(Uuid::try_from_value(Value::Varchar(Some("not a uuid".into()))).is_err());
    }

    #[test]
    fn lists_and_json() {
        let value = vec![1i32, 2, 3].as_value();
        assert_eq!(
            value,
            Value::List(
                Some(vec![
                    Value::Int32(Some(1)),
                    Value::Int32(Some(2)),
                    Value::Int32(Some(3))
                ]),
                Box::new(Value::Int32(None))
            )
        );
        assert!(value.same_type(&Vec::<i32>::new().as_value()));
        assert!(!value.same_type(&Vec::<i64>::new().as_value()));
        assert_eq!(Vec::<i64>::try_from_value(value).unwrap(), [1, 2, 3]);
        assert!(
            Vec::<i32>::try_from_value(Value::List(None, Box::new(Value::Int32(None))))
                .unwrap()
                .is_empty()
        );

        let json = Json::encode(&serde_json::json!({ "a": [1, 2] }));
        assert_eq!(json.as_str(), r#"{"a":[1,2]}"#);
        assert_eq!(
            json.clone().as_value(),
            Value::Json(Some(r#"{"a":[1,2]}"#.into()))
        );
        assert_eq!(
            json.decode().unwrap(),
            serde_json::json!({ "a": [1, 2] })
        );
        assert!(Json("{".into()).decode().is_err());
        assert_eq!(
            String::try_from_value(Value::Json(Some("{}".into()))).unwrap(),
            "{}"
        );
    }
}
