//! Integration tests for scoped_sql
//!
//! End-to-end scenarios against SQLite:
//! - Parameter round-trips and row mapping
//! - Transaction commit and rollback across independent scopes
//! - Error wrapping inside transactional scopes
//! - Formatted SQL and the async variants

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use scoped_sql::params;
    use scoped_sql::prelude::*;
    use scoped_sql::sql;
    use tempfile::TempDir;

    /// File-backed database so that separate scopes see the same data
    fn file_database() -> (TempDir, Database<SqliteDriver>) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        let db = Database::new(SqliteDriver, path.to_string_lossy().to_string());
        (dir, db)
    }

    fn create_test_table(db: &Database<SqliteDriver>) {
        db.process(|conn| {
            conn.execute_non_query(
                "create table TEST_TABLE(COL1 text, COL2 integer)",
                &[],
                None,
            )
        })
        .expect("Failed to create table");
    }

    fn row_count(db: &Database<SqliteDriver>) -> Option<DatabaseValue> {
        db.process(|conn| conn.execute_scalar("select count(*) from TEST_TABLE", &[], None))
            .expect("Failed to count rows")
    }

    #[test]
    fn test_parameter_round_trip() {
        let db = Database::new(SqliteDriver, ":memory:");

        let rows = db
            .process(|conn| {
                conn.execute_non_query("create table T(c text)", &[], None)?;
                conn.execute_non_query(
                    "insert into T(c) values(@v)",
                    &params![("@v", "abc")],
                    None,
                )?;
                conn.load_all("select c from T", &[], None)
            })
            .expect("Round trip failed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("c"), Some(&DatabaseValue::from("abc")));
    }

    #[test]
    fn test_create_insert_query() {
        let (_dir, db) = file_database();
        create_test_table(&db);

        db.process_transaction(|conn, tx| {
            conn.execute_non_query(
                "insert into TEST_TABLE(COL1, COL2) values(@testVal1, @testVal2)",
                &params![("@testVal1", "abcdef"), ("testVal2", 123)],
                Some(&*tx),
            )
        })
        .expect("Insert failed");

        let rows = db
            .process(|conn| {
                conn.query("select * from TEST_TABLE", &[], None, |cursor| {
                    cursor
                        .rows_as(|row| (row["COL1"].as_string(), row["COL2"].as_long()))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .expect("Query failed");

        assert_eq!(rows, vec![("abcdef".to_string(), Some(123))]);
    }

    #[test]
    fn test_explicit_rollback_leaves_no_rows() {
        let (_dir, db) = file_database();
        create_test_table(&db);

        db.process_transaction(|conn, tx| {
            conn.execute_non_query(
                "insert into TEST_TABLE(COL1, COL2) values(@a, @b)",
                &params![("@a", "x"), ("@b", 1)],
                Some(&*tx),
            )?;
            tx.rollback(conn)
        })
        .expect("Transaction failed");

        let observed = db
            .process_transaction(|conn, tx| {
                conn.load_all("select * from TEST_TABLE", &[], Some(&*tx))
            })
            .expect("Query failed");
        assert!(observed.is_empty());
    }

    #[test]
    fn test_body_error_is_wrapped_and_rolled_back() {
        let (_dir, db) = file_database();
        create_test_table(&db);

        let err = db
            .process_transaction(|conn, tx| {
                conn.execute_non_query(
                    "insert into TEST_TABLE(COL1, COL2) values(@a, @b)",
                    &params![("@a", "x"), ("@b", 1)],
                    Some(&*tx),
                )?;
                Err::<(), _>(DatabaseError::other("Intentional error"))
            })
            .expect_err("Body error should surface");

        assert!(matches!(err, DatabaseError::ExecutionFailed { .. }));
        assert_eq!(
            err.cause().map(ToString::to_string),
            Some("Intentional error".to_string())
        );
        assert_eq!(row_count(&db), Some(DatabaseValue::Long(0)));
    }

    #[test]
    fn test_transaction_is_bound_to_its_connection() {
        let (_dir, db) = file_database();
        create_test_table(&db);

        let err = db
            .process_transaction(|_outer, tx| {
                db.process(|inner| {
                    inner.execute_non_query(
                        "insert into TEST_TABLE(COL1, COL2) values(@a, @b)",
                        &params![("@a", "stray"), ("@b", 1)],
                        Some(&*tx),
                    )
                })
            })
            .expect_err("Statement on another connection should fail");

        assert!(matches!(
            err.cause(),
            Some(DatabaseError::TransactionError(_))
        ));
        assert_eq!(row_count(&db), Some(DatabaseValue::Long(0)));
    }

    #[test]
    fn test_driver_error_outside_transaction_is_not_wrapped() {
        let db = Database::new(SqliteDriver, ":memory:");

        let err = db
            .process(|conn| conn.execute_non_query("select * from missing_table", &[], None))
            .expect_err("Missing table should fail");

        assert!(matches!(err, DatabaseError::SqliteError(_)));
    }

    #[test]
    fn test_formatted_sql() {
        let db = Database::new(SqliteDriver, ":memory:");
        let value = "TESTVALUE".to_string();

        let (sql_text, rows) = db
            .process(|conn| {
                conn.execute_non_query("create table T(a text, b integer)", &[], None)?;
                conn.execute_formatted_non_query(&sql!("insert into T(a, b) values({},{})", &value, 2)?, None)?;

                let select = sql!("select a, b from T where a = {0} and b = {1}", &value, 2)?;
                conn.query_formatted(&select, None, |cursor| {
                    let rows = cursor.rows().collect::<Result<Vec<_>>>()?;
                    Ok((cursor.sql().to_string(), rows))
                })
            })
            .expect("Formatted SQL failed");

        assert_eq!(sql_text, "select a, b from T where a = @0 and b = @1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], DatabaseValue::from("TESTVALUE"));
        assert_eq!(rows[0]["b"], DatabaseValue::Long(2));
    }

    #[test]
    fn test_scalar_without_rows_is_none() {
        let db = Database::new(SqliteDriver, ":memory:");

        let value = db
            .process(|conn| {
                conn.execute_non_query("create table T(a integer)", &[], None)?;
                conn.execute_formatted_scalar(&sql!("select a from T where a = {}", 1)?, None)
            })
            .expect("Scalar failed");

        assert_eq!(value, None);
    }

    #[test]
    fn test_cursor_views() {
        let db = Database::new(SqliteDriver, ":memory:");

        db.process(|conn| {
            conn.query("select 1 as a, 'x' as b union all select 2, 'y'", &[], None, |cursor| {
                assert!(matches!(
                    cursor.row(),
                    Err(DatabaseError::InvalidCursorState { .. })
                ));

                assert!(cursor.advance()?);
                let fields = cursor.fields()?;
                assert_eq!(&*fields, &["a".to_string(), "b".to_string()]);
                assert!(std::sync::Arc::ptr_eq(&fields, &cursor.fields()?));

                let tuples = cursor.tuples()?;
                assert_eq!(tuples[1], ("b".to_string(), DatabaseValue::from("x")));
                assert_eq!(cursor.get("a")?, DatabaseValue::Long(1));

                let rest = cursor.rows_as(|row| row["b"].as_string()).collect::<Result<Vec<_>>>()?;
                assert_eq!(rest, vec!["y".to_string()]);

                assert_eq!(cursor.state(), CursorState::Exhausted);
                assert!(cursor.row().is_err());
                Ok(())
            })
        })
        .expect("Cursor checks failed");
    }

    #[test]
    fn test_type_hint_coerces_before_binding() {
        let db = Database::new(SqliteDriver, ":memory:");

        let value = db
            .process(|conn| {
                conn.execute_scalar(
                    "select typeof(@n)",
                    &[Parameter::new("@n", "42").with_type(ValueType::Long)],
                    None,
                )
            })
            .expect("Scalar failed");

        assert_eq!(value, Some(DatabaseValue::from("integer")));
    }

    #[test]
    fn test_string_hint_on_bytes_keeps_content() {
        let db = Database::new(SqliteDriver, ":memory:");

        let stored = db
            .process(|conn| {
                conn.execute_non_query("create table T(c text)", &[], None)?;
                conn.execute_non_query(
                    "insert into T(c) values(@v)",
                    &[Parameter::new("@v", b"ab".to_vec()).with_type(ValueType::String)],
                    None,
                )?;
                conn.execute_scalar("select c from T", &[], None)
            })
            .expect("Insert failed");
        assert_eq!(stored, Some(DatabaseValue::from("ab")));

        let err = db
            .process(|conn| {
                conn.execute_scalar(
                    "select @v",
                    &[Parameter::new("@v", vec![0xffu8, 0xfe]).with_type(ValueType::String)],
                    None,
                )
            })
            .expect_err("Invalid UTF-8 should not bind as text");
        assert!(matches!(err, DatabaseError::TypeMismatch { .. }));
    }

    #[test]
    fn test_connection_builder_database() {
        let (dir, _) = file_database();
        let path = dir.path().join("builder.db");
        let db = ConnectionBuilder::new(DatabaseType::Sqlite)
            .database(path.to_string_lossy())
            .build(SqliteDriver);

        assert_eq!(db.database_type(), DatabaseType::Sqlite);
        let value = db
            .process(|conn| conn.execute_scalar("select 7", &[], None))
            .expect("Scalar failed");
        assert_eq!(value, Some(DatabaseValue::Long(7)));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_async_transaction_commit_and_rollback() {
        let (_dir, db) = file_database();
        create_test_table(&db);

        db.process_transaction_async(|conn, tx| {
            Box::pin(async move {
                conn.execute_non_query_async(
                    "insert into TEST_TABLE(COL1, COL2) values(@a, @b)",
                    &params![("@a", "kept"), ("@b", 1)],
                    Some(&*tx),
                )
                .await
            })
        })
        .await
        .expect("Async insert failed");

        let err = db
            .process_transaction_async(|conn, tx| {
                Box::pin(async move {
                    conn.execute_non_query_async(
                        "insert into TEST_TABLE(COL1, COL2) values(@a, @b)",
                        &params![("@a", "dropped"), ("@b", 2)],
                        Some(&*tx),
                    )
                    .await?;
                    Err::<u64, _>(DatabaseError::other("Intentional error"))
                })
            })
            .await
            .expect_err("Body error should surface");
        assert_eq!(
            err.cause().map(ToString::to_string),
            Some("Intentional error".to_string())
        );

        let names = db
            .process_async(|conn| {
                Box::pin(async move {
                    conn.query_async("select COL1 from TEST_TABLE", &[], None, |cursor| {
                        cursor
                            .rows_as(|row| row["COL1"].as_string())
                            .collect::<Result<Vec<_>>>()
                    })
                    .await
                })
            })
            .await
            .expect("Async query failed");
        assert_eq!(names, vec!["kept".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_on_multi_thread_runtime() {
        let db = Database::new(SqliteDriver, ":memory:");

        let rows = db
            .process_async(|conn| {
                Box::pin(async move {
                    conn.execute_non_query_async("create table T(a integer)", &[], None)
                        .await?;
                    conn.execute_formatted_non_query_async(&sql!("insert into T(a) values({})", 5)?, None)
                        .await?;
                    conn.load_all_async("select a from T", &[], None).await
                })
            })
            .await
            .expect("Async scope failed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], DatabaseValue::Long(5));
    }
}
