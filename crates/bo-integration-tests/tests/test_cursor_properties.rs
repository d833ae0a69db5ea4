//! Property tests for cursor draining, binding and lease release.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bo_core::{CallRequest, CursorRow, DriverError, Row, SqlType, Value};
use bo_engine::ProcedureExecutor;
use bo_stub::{Stage, StubCursor, StubDatabase, StubResponse};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn arb_type() -> impl Strategy<Value = SqlType> {
    prop::sample::select(vec![
        SqlType::Varchar,
        SqlType::Char,
        SqlType::Clob,
        SqlType::Number,
        SqlType::Integer,
        SqlType::Date,
        SqlType::Timestamp,
        SqlType::Flag,
        SqlType::Blob,
    ])
}

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop::sample::select(vec![
        Stage::Acquire,
        Stage::Bind,
        Stage::Execute,
        Stage::Fetch,
        Stage::Close,
        Stage::Output,
        Stage::Finish,
    ])
}

fn listing(rows: usize) -> StubDatabase {
    let db = StubDatabase::new();
    let rows = (1..=rows as i64).map(|i| Row::new().with("ID", i)).collect();
    db.on_static(
        "BO_X.LIST",
        StubResponse::new()
            .output("P_TOTAL", 0_i64)
            .cursor("P_CURSOR", StubCursor::from_rows(rows)),
    );
    db
}

fn id_of(row: &CursorRow) -> Result<i64, DriverError> {
    row.get(0)
        .and_then(Value::as_i64)
        .ok_or_else(|| DriverError::decode("ID", "not an integer"))
}

proptest! {
    #[test]
    fn every_row_is_mapped_once_in_cursor_order(rows in 0usize..150, fetch in 1usize..40) {
        let db = listing(rows);
        let exec = ProcedureExecutor::new(Arc::new(db.clone())).with_fetch_size(fetch);
        let req = CallRequest::builder("BO_X", "LIST").cursor("P_CURSOR").build().unwrap();

        let invoked = AtomicUsize::new(0);
        let mapper = |row: &CursorRow| {
            invoked.fetch_add(1, Ordering::SeqCst);
            id_of(row)
        };
        let ids = runtime().block_on(exec.call_cursor::<i64>(&req, &mapper)).unwrap();

        prop_assert_eq!(ids, (1..=rows as i64).collect::<Vec<_>>());
        prop_assert_eq!(invoked.load(Ordering::SeqCst), rows);
        prop_assert_eq!(db.stats().outstanding(), 0);
        prop_assert_eq!(db.stats().cursors_closed, 1);
    }

    #[test]
    fn null_binds_for_every_declared_type(ty in arb_type()) {
        let db = StubDatabase::new();
        db.on_static("BO_X.WRITE", StubResponse::new());
        let exec = ProcedureExecutor::new(Arc::new(db.clone()));
        let req = CallRequest::builder("BO_X", "WRITE")
            .input("P_VALUE", ty, Value::Null)
            .build()
            .unwrap();

        runtime().block_on(exec.call_void(&req)).unwrap();
        let calls = db.calls();
        prop_assert_eq!(calls[0].input("P_VALUE"), Some(&Value::Null));
        prop_assert_eq!(calls[0].inputs[0].0.sql_type(), ty);
    }

    #[test]
    fn lease_is_released_whatever_stage_fails(stage in arb_stage(), rows in 0usize..20) {
        let db = listing(rows);
        db.inject(stage, DriverError::Connection { message: "injected".into() });
        let exec = ProcedureExecutor::new(Arc::new(db.clone())).with_fetch_size(4);
        let req = CallRequest::builder("BO_X", "LIST")
            .input("P_FILTER", SqlType::Varchar, "all")
            .output("P_TOTAL", SqlType::Integer)
            .cursor("P_CURSOR")
            .build()
            .unwrap();

        let result = runtime().block_on(exec.call_cursor_with_outputs::<i64>(&req, &id_of));
        // With no rows to fetch the only fetch still runs; every stage is visited.
        let err = result.unwrap_err();
        prop_assert!(err.is_connectivity());
        let stats = db.stats();
        prop_assert_eq!(stats.outstanding(), 0);
        prop_assert_eq!(stats.finished, 0);
    }

    #[test]
    fn integer_text_binds_coerce_like_integers(n in any::<i64>()) {
        let db = StubDatabase::new();
        db.on_static("BO_X.WRITE", StubResponse::new());
        let exec = ProcedureExecutor::new(Arc::new(db.clone()));
        let req = CallRequest::builder("BO_X", "WRITE")
            .input("P_ID", SqlType::Integer, n.to_string())
            .input("P_AMOUNT", SqlType::Number, n)
            .build()
            .unwrap();

        runtime().block_on(exec.call_void(&req)).unwrap();
        let call = &db.calls()[0];
        prop_assert_eq!(call.input("P_ID"), Some(&Value::Integer(n)));
        prop_assert_eq!(call.input("P_AMOUNT").and_then(Value::as_i64), Some(n));
    }
}
