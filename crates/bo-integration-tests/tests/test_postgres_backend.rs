//! PostgreSQL backend against a live server.
//!
//! Requires DATABASE_URL; without it every test returns early. Run with:
//!   DATABASE_URL=postgres://... cargo test -p bo-integration-tests --test test_postgres_backend
//!
//! Each test installs its routines into its own schema (dropped and
//! recreated first), so the tests can run in parallel and be rerun.

use std::sync::Arc;

use bo_core::{
    CallForm, CallRequest, ConnectionSource, CursorRow, DriverError, ErrorKind, ParameterDescriptor,
    RoutineConnection as _, RoutineName, Row, SqlType, Value,
};
use bo_engine::{EngineConfig, PgConnectionSource, ProcedureExecutor};
use chrono::NaiveDate;
use rust_decimal::Decimal;

async fn database() -> Option<PgConnectionSource> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping PostgreSQL backend test");
        return None;
    };
    let source = PgConnectionSource::connect(&EngineConfig::local(&url))
        .await
        .expect("connect to DATABASE_URL");
    Some(source)
}

async fn install(source: &PgConnectionSource, schema: &str, ddl: &[&str]) {
    let pool = source.pool();
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(pool)
        .await
        .unwrap();
    for statement in ddl {
        sqlx::query(statement).execute(pool).await.unwrap();
    }
}

fn executor(source: &PgConnectionSource, fetch_size: usize) -> ProcedureExecutor {
    ProcedureExecutor::new(Arc::new(source.clone())).with_fetch_size(fetch_size)
}

#[tokio::test]
async fn refcursor_rows_arrive_in_order_across_batches() {
    let Some(source) = database().await else {
        return;
    };
    install(
        &source,
        "bo_pg_list",
        &[r#"
        CREATE PROCEDURE bo_pg_list.list(
            p_limit bigint,
            INOUT p_total bigint,
            INOUT p_cursor refcursor)
        LANGUAGE plpgsql AS $$
        BEGIN
            p_total := p_limit;
            OPEN p_cursor FOR
                SELECT g::bigint AS id, 'row ' || g AS label
                FROM generate_series(1, p_limit) AS g
                ORDER BY g;
        END
        $$"#],
    )
    .await;

    let exec = executor(&source, 40);
    let req = CallRequest::builder("BO_PG_LIST", "LIST")
        .input("P_LIMIT", SqlType::Integer, 250_i64)
        .output("P_TOTAL", SqlType::Integer)
        .cursor("P_CURSOR")
        .build()
        .unwrap();

    let id_of = |row: &CursorRow| {
        row.by_name("ID")
            .and_then(Value::as_i64)
            .ok_or_else(|| DriverError::decode("ID", "not an integer"))
    };
    let result = exec.call_cursor_with_outputs::<i64>(&req, &id_of).await.unwrap();
    assert_eq!(result.rows, (1..=250).collect::<Vec<i64>>());
    assert_eq!(result.output("P_TOTAL"), Some(&Value::Integer(250)));

    let empty = exec
        .call_cursor_with_outputs::<i64>(
            &CallRequest::builder("BO_PG_LIST", "LIST")
                .input("P_LIMIT", SqlType::Integer, 0_i64)
                .output("P_TOTAL", SqlType::Integer)
                .cursor("P_CURSOR")
                .build()
                .unwrap(),
            &id_of,
        )
        .await
        .unwrap();
    assert!(empty.rows.is_empty());
    assert_eq!(empty.output("P_TOTAL"), Some(&Value::Integer(0)));
}

#[tokio::test]
async fn null_binds_against_every_declared_type() {
    let Some(source) = database().await else {
        return;
    };
    install(
        &source,
        "bo_pg_nulls",
        &[r#"
        CREATE FUNCTION bo_pg_nulls.count_nulls(
            p_varchar varchar, p_char char(1), p_clob text, p_number numeric,
            p_integer bigint, p_date date, p_timestamp timestamp,
            p_flag boolean, p_blob bytea)
        RETURNS bigint
        LANGUAGE sql AS $$
            SELECT num_nulls(p_varchar, p_char, p_clob, p_number, p_integer,
                             p_date, p_timestamp, p_flag, p_blob)::bigint
        $$"#],
    )
    .await;

    let mut builder = CallRequest::builder("BO_PG_NULLS", "COUNT_NULLS").returns(SqlType::Integer);
    for (name, ty) in [
        ("P_VARCHAR", SqlType::Varchar),
        ("P_CHAR", SqlType::Char),
        ("P_CLOB", SqlType::Clob),
        ("P_NUMBER", SqlType::Number),
        ("P_INTEGER", SqlType::Integer),
        ("P_DATE", SqlType::Date),
        ("P_TIMESTAMP", SqlType::Timestamp),
        ("P_FLAG", SqlType::Flag),
        ("P_BLOB", SqlType::Blob),
    ] {
        builder = builder.input(name, ty, Value::Null);
    }
    let req = builder.build().unwrap();

    let count = executor(&source, 10).call_scalar(&req).await.unwrap();
    assert_eq!(count, Value::Integer(9));
}

#[tokio::test]
async fn outputs_decode_to_their_declared_types() {
    let Some(source) = database().await else {
        return;
    };
    install(
        &source,
        "bo_pg_echo",
        &[r#"
        CREATE PROCEDURE bo_pg_echo.echo(
            p_text varchar, p_code char(1), p_amount numeric, p_count bigint,
            p_day date, p_at timestamp, p_active boolean, p_body bytea,
            INOUT o_text varchar, INOUT o_code char(1), INOUT o_amount numeric,
            INOUT o_count bigint, INOUT o_day date, INOUT o_at timestamp,
            INOUT o_active boolean, INOUT o_body bytea, INOUT o_unset varchar)
        LANGUAGE plpgsql AS $$
        BEGIN
            o_text := p_text;
            o_code := p_code;
            o_amount := p_amount;
            o_count := p_count;
            o_day := p_day;
            o_at := p_at;
            o_active := p_active;
            o_body := p_body;
        END
        $$"#],
    )
    .await;

    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let at = day.and_hms_opt(23, 59, 58).unwrap();
    let req = CallRequest::builder("BO_PG_ECHO", "ECHO")
        .input("P_TEXT", SqlType::Varchar, "Acme Trading")
        .input("P_CODE", SqlType::Char, "Y")
        .input("P_AMOUNT", SqlType::Number, "1234.50")
        .input("P_COUNT", SqlType::Integer, "42")
        .input("P_DAY", SqlType::Date, "2024-02-29")
        .input("P_AT", SqlType::Timestamp, Value::Timestamp(at))
        .input("P_ACTIVE", SqlType::Flag, true)
        .input("P_BODY", SqlType::Blob, Value::Blob(b"%PDF".to_vec()))
        .output("O_TEXT", SqlType::Varchar)
        .output("O_CODE", SqlType::Char)
        .output("O_AMOUNT", SqlType::Number)
        .output("O_COUNT", SqlType::Integer)
        .output("O_DAY", SqlType::Date)
        .output("O_AT", SqlType::Timestamp)
        .output("O_ACTIVE", SqlType::Flag)
        .output("O_BODY", SqlType::Blob)
        .output("O_UNSET", SqlType::Varchar)
        .build()
        .unwrap();

    let outputs = executor(&source, 10).call_with_outputs(&req).await.unwrap();
    assert_eq!(outputs["O_TEXT"], Value::from("Acme Trading"));
    assert_eq!(outputs["O_CODE"], Value::from("Y"));
    assert_eq!(outputs["O_AMOUNT"], Value::Number(Decimal::new(123450, 2)));
    assert_eq!(outputs["O_COUNT"], Value::Integer(42));
    assert_eq!(outputs["O_DAY"], Value::Date(day));
    assert_eq!(outputs["O_AT"], Value::Timestamp(at));
    assert_eq!(outputs["O_ACTIVE"], Value::Flag(true));
    assert_eq!(outputs["O_BODY"], Value::Blob(b"%PDF".to_vec()));
    assert_eq!(outputs["O_UNSET"], Value::Null);
}

#[tokio::test]
async fn raise_exception_is_a_business_error_and_strict_select_is_not() {
    let Some(source) = database().await else {
        return;
    };
    install(
        &source,
        "bo_pg_raise",
        &[
            r#"
            CREATE PROCEDURE bo_pg_raise.archive(p_customer_id bigint)
            LANGUAGE plpgsql AS $$
            BEGIN
                RAISE EXCEPTION 'customer % is archived', p_customer_id;
            END
            $$"#,
            r#"
            CREATE FUNCTION bo_pg_raise.lookup(p_customer_id bigint)
            RETURNS bigint
            LANGUAGE plpgsql AS $$
            DECLARE
                hit bigint;
            BEGIN
                SELECT g INTO STRICT hit
                FROM generate_series(1, 3) AS g
                WHERE g = p_customer_id;
                RETURN hit;
            END
            $$"#,
        ],
    )
    .await;
    let exec = executor(&source, 10);

    let err = exec
        .call_void(
            &CallRequest::builder("BO_PG_RAISE", "ARCHIVE")
                .input("P_CUSTOMER_ID", SqlType::Integer, 7_i64)
                .build()
                .unwrap(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Business);
    assert_eq!(err.code.as_deref(), Some("P0001"));
    assert!(err.message.contains("customer 7 is archived"), "{}", err.message);

    let lookup = |id: i64| {
        CallRequest::builder("BO_PG_RAISE", "LOOKUP")
            .input("P_CUSTOMER_ID", SqlType::Integer, id)
            .returns(SqlType::Integer)
            .build()
            .unwrap()
    };
    assert_eq!(exec.call_scalar(&lookup(2)).await.unwrap(), Value::Integer(2));
    let err = exec.call_scalar(&lookup(99)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Connectivity);
    assert_eq!(err.code.as_deref(), Some("P0002"));

    let err = exec
        .call_void(&CallRequest::builder("BO_PG_RAISE", "MISSING").build().unwrap())
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn finished_lease_commits_and_dropped_lease_rolls_back() {
    let Some(source) = database().await else {
        return;
    };
    install(
        &source,
        "bo_pg_audit",
        &[
            "CREATE TABLE bo_pg_audit.entries (label text NOT NULL)",
            r#"
            CREATE PROCEDURE bo_pg_audit.record(p_label varchar)
            LANGUAGE sql AS $$
                INSERT INTO bo_pg_audit.entries (label) VALUES (p_label)
            $$"#,
        ],
    )
    .await;

    executor(&source, 10)
        .call_void(
            &CallRequest::builder("BO_PG_AUDIT", "RECORD")
                .input("P_LABEL", SqlType::Varchar, "kept")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    let routine = RoutineName::new("BO_PG_AUDIT", "RECORD").unwrap();
    let mut lease = source.acquire().await.unwrap();
    lease
        .bind(
            &ParameterDescriptor::input("P_LABEL", SqlType::Varchar),
            &Value::from("abandoned"),
        )
        .unwrap();
    lease.execute(&routine, CallForm::Procedure).await.unwrap();
    drop(lease);

    let labels: Vec<String> = sqlx::query_scalar("SELECT label FROM bo_pg_audit.entries ORDER BY label")
        .fetch_all(source.pool())
        .await
        .unwrap();
    assert_eq!(labels, ["kept"]);
}

#[tokio::test]
async fn unopened_cursor_reads_as_empty() {
    let Some(source) = database().await else {
        return;
    };
    install(
        &source,
        "bo_pg_empty",
        &[r#"
        CREATE PROCEDURE bo_pg_empty.nothing(INOUT p_cursor refcursor)
        LANGUAGE plpgsql AS $$
        BEGIN
            p_cursor := NULL;
        END
        $$"#],
    )
    .await;

    let rows: Vec<Row> = executor(&source, 10)
        .call_cursor_rows(
            &CallRequest::builder("BO_PG_EMPTY", "NOTHING")
                .cursor("P_CURSOR")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}
