//! Property-based tests using proptest

use proptest::prelude::*;
use scoped_sql::prelude::*;

fn any_value() -> impl Strategy<Value = DatabaseValue> {
    prop_oneof![
        Just(DatabaseValue::Null),
        any::<bool>().prop_map(DatabaseValue::Bool),
        any::<i32>().prop_map(DatabaseValue::Int),
        any::<i64>().prop_map(DatabaseValue::Long),
        any::<f64>()
            .prop_filter("finite", |v| v.is_finite())
            .prop_map(DatabaseValue::Double),
        ".*".prop_map(DatabaseValue::String),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(DatabaseValue::Bytes),
    ]
}

fn any_type() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::Bool),
        Just(ValueType::Int),
        Just(ValueType::Long),
        Just(ValueType::Float),
        Just(ValueType::Double),
        Just(ValueType::String),
        Just(ValueType::Bytes),
        Just(ValueType::Timestamp),
    ]
}

// ============================================================================
// Type hint coercion
// ============================================================================

proptest! {
    /// Coercion either yields the requested type or a type mismatch
    #[test]
    fn test_coerce_yields_target_or_mismatch(value in any_value(), target in any_type()) {
        let was_null = value.is_null();
        match value.coerce(target) {
            Ok(coerced) if was_null => prop_assert!(coerced.is_null()),
            Ok(coerced) => prop_assert_eq!(coerced.value_type(), target),
            Err(e) => prop_assert!(matches!(e, DatabaseError::TypeMismatch { .. }), "unexpected error: {}", e),
        }
    }

    /// Coercing to the value's own type is the identity
    #[test]
    fn test_coerce_to_own_type(value in any_value()) {
        let target = value.value_type();
        prop_assert_eq!(value.clone().coerce(target).ok(), Some(value));
    }

    /// Integers survive a trip through their decimal text
    #[test]
    fn test_long_text_coercion(value in any::<i64>()) {
        let text = DatabaseValue::from(value).coerce(ValueType::String).unwrap();
        prop_assert_eq!(text.coerce(ValueType::Long).unwrap(), DatabaseValue::Long(value));
    }

    /// Everything but non-UTF-8 bytes converts to text, and bytes keep their content
    #[test]
    fn test_coerce_to_string(value in any_value()) {
        match (&value, value.clone().coerce(ValueType::String)) {
            (DatabaseValue::Bytes(bytes), Ok(text)) => {
                prop_assert_eq!(text.as_str().map(str::as_bytes), Some(bytes.as_slice()));
            }
            (DatabaseValue::Bytes(bytes), Err(_)) => {
                prop_assert!(std::str::from_utf8(bytes).is_err());
            }
            (_, result) => prop_assert!(result.is_ok()),
        }
    }
}

// ============================================================================
// Formatted SQL
// ============================================================================

proptest! {
    /// N sequential holes bind @0..@N-1 in argument order
    #[test]
    fn test_sequential_holes_are_numbered(args in prop::collection::vec(any::<i64>(), 0..12)) {
        let template = format!("values({})", vec!["{}"; args.len()].join(","));
        let values: Vec<DatabaseValue> = args.iter().copied().map(DatabaseValue::from).collect();
        let stmt = FormattedSql::new(&template, values).unwrap();

        let expected: Vec<String> = (0..args.len()).map(|i| format!("@{}", i)).collect();
        prop_assert_eq!(stmt.sql(), format!("values({})", expected.join(",")));
        for (i, param) in stmt.parameters().iter().enumerate() {
            prop_assert_eq!(param.name(), expected[i].as_str());
            prop_assert_eq!(param.value(), &DatabaseValue::Long(args[i]));
        }
    }

    /// Text without braces passes through unchanged
    #[test]
    fn test_text_without_holes_is_unchanged(text in "[^{}]*") {
        let stmt = FormattedSql::new(&text, Vec::new()).unwrap();
        prop_assert_eq!(stmt.sql(), text.as_str());
        prop_assert!(stmt.parameters().is_empty());
    }

    /// Argument values never appear in the generated SQL
    #[test]
    fn test_values_are_never_spliced(value in "[a-z]{8,16}") {
        let stmt = FormattedSql::new("select * from T where c = {}", vec![value.clone().into()]).unwrap();
        prop_assert!(!stmt.sql().contains(&value));
    }
}

// ============================================================================
// Rows and serialization
// ============================================================================

proptest! {
    /// Rows keep column order and serialize without panicking
    #[test]
    fn test_row_order_and_json(values in prop::collection::vec(any_value(), 0..20)) {
        let mut row = DatabaseRow::new();
        for (i, value) in values.iter().enumerate() {
            row.insert(format!("col{}", i), value.clone());
        }

        let names: Vec<String> = row.keys().cloned().collect();
        let expected: Vec<String> = (0..values.len()).map(|i| format!("col{}", i)).collect();
        prop_assert_eq!(names, expected);
        prop_assert!(serde_json::to_string(&row).is_ok());
    }
}

// ============================================================================
// Binding through SQLite
// ============================================================================

#[cfg(feature = "sqlite")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any text bound as a parameter reads back unchanged
    #[test]
    fn test_text_parameter_round_trip(text in "\\PC*") {
        let db = Database::new(SqliteDriver, ":memory:");
        let value = db
            .process(|conn| conn.execute_scalar("select @v", &[Parameter::new("@v", text.as_str())], None))
            .unwrap();
        prop_assert_eq!(value, Some(DatabaseValue::String(text)));
    }
}
