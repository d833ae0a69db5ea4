//! Demo routines served in `--stub` mode.
//!
//! | Routine | Shape |
//! |---------|-------|
//! | `BO_AUTH.GET_USER_PERMISSIONS` | cursor `P_CURSOR` for input `P_USERNAME` |
//! | `BO_CUSTOMER.FIND` | cursor `P_CURSOR` for input `P_CUSTOMER_ID` |
//! | `BO_CUSTOMER.GET_STATUS` | function returning `VARCHAR` |
//! | `BO_CUSTOMER.CREATE` | output `P_RESULT` |
//! | `BO_PAYMENT.STATEMENT` | cursors `P_PAYMENTS`, `P_FEES`, output `P_TOTAL_COUNT` |

use bo_core::{DriverError, Row, Value};
use bo_stub::{Invocation, StubCursor, StubDatabase, StubResponse};
use chrono::NaiveDate;
use rust_decimal::Decimal;

const CUSTOMERS: &[(i64, &str, &str)] = &[
    (7, "Acme Trading", "ACTIVE"),
    (8, "Birch Logistics", "SUSPENDED"),
];

/// A stub database with the demo routines registered.
pub fn database() -> StubDatabase {
    let db = StubDatabase::new();
    db.on("BO_AUTH.GET_USER_PERMISSIONS", permissions);
    db.on("BO_CUSTOMER.FIND", find_customer);
    db.on("BO_CUSTOMER.GET_STATUS", |call| {
        let status = customer(call).map(|(_, _, status)| *status);
        Ok(StubResponse::new().returning(status))
    });
    db.on("BO_CUSTOMER.CREATE", |call| {
        let code = match call.input("P_NAME") {
            Some(Value::Text(name)) if !name.trim().is_empty() => 1001_i64,
            _ => -4,
        };
        Ok(StubResponse::new().output("P_RESULT", code))
    });
    db.on_static("BO_PAYMENT.STATEMENT", statement());
    db
}

fn permissions(call: &Invocation) -> Result<StubResponse, DriverError> {
    let granted: &[(&str, &str)] = match call.input("P_USERNAME").and_then(Value::as_str) {
        Some("USER1") => &[("BO_CUSTOMER", "FIND"), ("BO_CUSTOMER", "CREATE")],
        Some("AUDITOR") => &[("BO_CUSTOMER", "FIND"), ("BO_PAYMENT", "STATEMENT")],
        _ => &[],
    };
    let rows = granted
        .iter()
        .map(|(package, procedure)| {
            Row::new()
                .with("PACKAGE_NAME", *package)
                .with("PROCEDURE_NAME", *procedure)
        })
        .collect();
    Ok(StubResponse::new().cursor("P_CURSOR", StubCursor::from_rows(rows)))
}

fn customer(call: &Invocation) -> Option<&'static (i64, &'static str, &'static str)> {
    let id = call.input("P_CUSTOMER_ID").and_then(Value::as_i64)?;
    CUSTOMERS.iter().find(|(known, _, _)| *known == id)
}

fn find_customer(call: &Invocation) -> Result<StubResponse, DriverError> {
    let rows = customer(call)
        .map(|(id, name, status)| {
            vec![Row::new()
                .with("CUSTOMER_ID", *id)
                .with("NAME", *name)
                .with("STATUS", *status)]
        })
        .unwrap_or_default();
    Ok(StubResponse::new().cursor("P_CURSOR", StubCursor::from_rows(rows)))
}

fn statement() -> StubResponse {
    let line = |day: u32, description: &str, cents: i64| {
        Row::new()
            .with("BOOKED_ON", NaiveDate::from_ymd_opt(2024, 6, day))
            .with("DESCRIPTION", description)
            .with("AMOUNT", Decimal::new(cents, 2))
    };
    StubResponse::new()
        .output("P_TOTAL_COUNT", 2_i64)
        .cursor(
            "P_PAYMENTS",
            StubCursor::from_rows(vec![
                line(3, "invoice 17", 12000),
                line(9, "invoice 18", 4550),
            ]),
        )
        .cursor("P_FEES", StubCursor::from_rows(vec![line(30, "monthly fee", 250)]))
}
