//! Domain services against the scripted stub database.

use std::sync::Arc;

use bo_core::{DriverError, ErrorKind, Row, Value};
use bo_engine::ProcedureExecutor;
use bo_services::{
    BackOffice, ContactUpdate, CustomerSearch, NewCustomer, NewLicense, NewOfficer, Outcome,
    PaymentSearch, ServiceError, SmsRequest,
};
use bo_stub::{Stage, StubCursor, StubDatabase, StubResponse};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

fn back_office(db: &StubDatabase) -> BackOffice {
    BackOffice::new(ProcedureExecutor::new(Arc::new(db.clone())))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
}

fn connection_lost() -> DriverError {
    DriverError::Connection {
        message: "connection reset by peer".into(),
    }
}

fn customer_row(id: i64, name: &str) -> Row {
    Row::new()
        .with("CUSTOMER_ID", id)
        .with("NAME", name)
        .with("TAX_NUMBER", Value::Null)
        .with("EMAIL", format!("{}@example.com", name.to_lowercase()))
        .with("PHONE", Value::Null)
        .with("STATUS", "ACTIVE")
        .with("CREATED_AT", at(2024, 3, 1, 9))
}

// -- customers -------------------------------------------------------------

#[tokio::test]
async fn find_customer_reshapes_the_first_row() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_CUSTOMER.FIND",
        StubResponse::new().cursor("P_CURSOR", StubCursor::from_rows(vec![customer_row(7, "Acme")])),
    );

    let customer = back_office(&db).customer().find(7).await.unwrap().unwrap();
    assert_eq!(customer.id, 7);
    assert_eq!(customer.name, "Acme");
    assert_eq!(customer.tax_number, None);
    assert_eq!(customer.email.as_deref(), Some("acme@example.com"));
    assert_eq!(customer.created_at, at(2024, 3, 1, 9));
    assert_eq!(db.calls()[0].input("P_CUSTOMER_ID"), Some(&Value::Integer(7)));
}

#[tokio::test]
async fn find_missing_customer_is_none() {
    let db = StubDatabase::new();
    db.on_static("BO_CUSTOMER.FIND", StubResponse::new());
    assert_eq!(back_office(&db).customer().find(99).await.unwrap(), None);
}

#[tokio::test]
async fn search_passes_unset_filters_as_null() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_CUSTOMER.SEARCH",
        StubResponse::new().cursor(
            "P_CURSOR",
            StubCursor::from_rows(vec![customer_row(1, "Acme"), customer_row(2, "Birch")]),
        ),
    );

    let criteria = CustomerSearch {
        status: Some("ACTIVE".into()),
        ..CustomerSearch::default()
    };
    let found = back_office(&db).customer().search(&criteria).await.unwrap();
    assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 2]);

    let call = &db.calls()[0];
    assert_eq!(call.input("P_NAME"), Some(&Value::Null));
    assert_eq!(call.input("P_STATUS"), Some(&Value::from("ACTIVE")));
}

#[tokio::test]
async fn malformed_row_fails_as_a_decode_error() {
    let db = StubDatabase::new();
    let broken = customer_row(1, "Acme").with("NAME", Value::Null);
    db.on_static(
        "BO_CUSTOMER.FIND",
        StubResponse::new().cursor("P_CURSOR", StubCursor::from_rows(vec![broken])),
    );

    let err = back_office(&db).customer().find(1).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Connectivity));
    assert!(err.to_string().contains("NAME"));
    assert_eq!(db.call_count("BO_CUSTOMER.FIND"), 1);
    assert_eq!(db.stats().outstanding(), 0);
}

#[tokio::test]
async fn create_customer_completes_with_new_id() {
    let db = StubDatabase::new();
    db.on_static("BO_CUSTOMER.CREATE", StubResponse::new().output("P_RESULT", 812_i64));

    let outcome = back_office(&db)
        .customer()
        .create(&NewCustomer {
            name: "Acme".into(),
            tax_number: Some("TX-1".into()),
            email: None,
            phone: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed(812));
}

#[tokio::test]
async fn negative_result_code_is_a_rejection_with_reason() {
    let db = StubDatabase::new();
    db.on_static("BO_CUSTOMER.UPDATE_CONTACT", StubResponse::new().output("P_RESULT", -3_i64));

    let outcome = back_office(&db)
        .customer()
        .update_contact(5, &ContactUpdate::default())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Rejected {
            code: -3,
            reason: "customer is archived".into()
        }
    );
}

#[tokio::test]
async fn missing_result_code_is_unexpected() {
    let db = StubDatabase::new();
    db.on_static("BO_CUSTOMER.CREATE", StubResponse::new());

    let err = back_office(&db)
        .customer()
        .create(&NewCustomer {
            name: "Acme".into(),
            tax_number: None,
            email: None,
            phone: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnexpectedResult { ref routine, .. } if routine == "BO_CUSTOMER.CREATE"));
}

#[tokio::test]
async fn scalar_status_maps_null_to_none() {
    let db = StubDatabase::new();
    db.on("BO_CUSTOMER.GET_STATUS", |call| {
        let known = call.input("P_CUSTOMER_ID") == Some(&Value::Integer(1));
        Ok(StubResponse::new().returning(if known { Value::from("ACTIVE") } else { Value::Null }))
    });

    let customers = back_office(&db).customer();
    assert_eq!(customers.status(1).await.unwrap().as_deref(), Some("ACTIVE"));
    assert_eq!(customers.status(2).await.unwrap(), None);
}

// -- retry policy ----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reads_are_retried_after_connectivity_failures() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_CUSTOMER.FIND",
        StubResponse::new().cursor("P_CURSOR", StubCursor::from_rows(vec![customer_row(7, "Acme")])),
    );
    db.inject_times(Stage::Execute, connection_lost(), 2);

    let customer = back_office(&db).customer().find(7).await.unwrap();
    assert!(customer.is_some());
    assert_eq!(db.stats().acquired, 3);
    assert_eq!(db.stats().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn reads_give_up_after_the_retry_budget() {
    let db = StubDatabase::new();
    db.on_static("BO_CUSTOMER.FIND", StubResponse::new());
    db.inject(Stage::Acquire, connection_lost());

    let err = back_office(&db).customer().find(7).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Connectivity));
    assert_eq!(db.call_count("BO_CUSTOMER.FIND"), 0);
}

#[tokio::test]
async fn business_errors_on_reads_are_not_retried() {
    let db = StubDatabase::new();
    db.on("BO_CUSTOMER.FIND", |_| {
        Err(DriverError::Database {
            code: Some("P0001".into()),
            message: "access to customer denied".into(),
        })
    });

    let err = back_office(&db).customer().find(7).await.unwrap_err();
    assert!(err.is_business());
    assert_eq!(db.call_count("BO_CUSTOMER.FIND"), 1);
}

#[tokio::test]
async fn writes_are_never_retried() {
    let db = StubDatabase::new();
    db.on_static("BO_CUSTOMER.CREATE", StubResponse::new().output("P_RESULT", 1_i64));
    db.inject_times(Stage::Finish, connection_lost(), 1);

    let err = back_office(&db)
        .customer()
        .create(&NewCustomer {
            name: "Acme".into(),
            tax_number: None,
            email: None,
            phone: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Connectivity));
    assert_eq!(db.call_count("BO_CUSTOMER.CREATE"), 1);
    assert_eq!(db.stats().finished, 0);
}

// -- payments --------------------------------------------------------------

fn payment_row(id: i64, amount: Decimal) -> Row {
    Row::new()
        .with("PAYMENT_ID", id)
        .with("REFERENCE", format!("PAY-{id:04}"))
        .with("CUSTOMER_ID", 42_i64)
        .with("AMOUNT", amount)
        .with("CURRENCY", "EUR")
        .with("STATUS", "SETTLED")
        .with("CREATED_AT", at(2024, 5, 2, 14))
}

#[tokio::test]
async fn payment_search_returns_page_with_total() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_PAYMENT.SEARCH",
        StubResponse::new().output("P_TOTAL_COUNT", 57_i64).cursor(
            "P_CURSOR",
            StubCursor::from_rows(vec![
                payment_row(1, Decimal::new(1050, 2)),
                payment_row(2, Decimal::new(99, 0)),
            ]),
        ),
    );

    let page = back_office(&db)
        .payment()
        .search(&PaymentSearch {
            customer_id: Some(42),
            page: 0,
            ..PaymentSearch::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 57);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].amount, Decimal::new(1050, 2));
    assert_eq!(page.items[1].reference, "PAY-0002");

    let call = &db.calls()[0];
    assert_eq!(call.input("P_PAGE"), Some(&Value::Integer(1)));
    assert_eq!(call.input("P_PAGE_SIZE"), Some(&Value::Integer(50)));
}

#[tokio::test]
async fn statement_drains_both_cursors() {
    let line = |day: u32, description: &str, cents: i64| {
        Row::new()
            .with("BOOKED_ON", date(2024, 6, day))
            .with("DESCRIPTION", description)
            .with("AMOUNT", Decimal::new(cents, 2))
    };
    let db = StubDatabase::new();
    db.on_static(
        "BO_PAYMENT.STATEMENT",
        StubResponse::new()
            .output("P_TOTAL_COUNT", 2_i64)
            .cursor(
                "P_PAYMENTS",
                StubCursor::from_rows(vec![line(3, "invoice 17", 12000), line(9, "invoice 18", 4550)]),
            )
            .cursor("P_FEES", StubCursor::from_rows(vec![line(30, "monthly fee", 250)])),
    );

    let statement = back_office(&db)
        .payment()
        .statement(42, date(2024, 6, 1), date(2024, 6, 30))
        .await
        .unwrap();
    assert_eq!(statement.total_count, 2);
    assert_eq!(statement.payments.len(), 2);
    assert_eq!(statement.payments[1].description, "invoice 18");
    assert_eq!(statement.fees.len(), 1);
    assert_eq!(statement.fees[0].amount, Decimal::new(250, 2));
    assert_eq!(db.stats().cursors_closed, 2);
}

#[tokio::test]
async fn cancel_unknown_code_gets_generic_reason() {
    let db = StubDatabase::new();
    db.on_static("BO_PAYMENT.CANCEL", StubResponse::new().output("P_RESULT", -40_i64));

    let outcome = back_office(&db).payment().cancel(1, "duplicate").await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Rejected {
            code: -40,
            reason: "refused with code -40".into()
        }
    );
}

// -- documents and messages ------------------------------------------------

#[tokio::test]
async fn document_content_is_returned_as_bytes() {
    let db = StubDatabase::new();
    db.on_static("BO_DOCUMENT.GET_CONTENT", StubResponse::new().returning(vec![0x25_u8, 0x50, 0x44, 0x46]));

    let content = back_office(&db).document().content(3).await.unwrap();
    assert_eq!(content.as_deref(), Some(&b"%PDF"[..]));
}

#[tokio::test]
async fn reject_document_binds_the_reason() {
    let db = StubDatabase::new();
    db.on_static("BO_DOCUMENT.REJECT", StubResponse::new().output("P_RESULT", 0_i64));

    let outcome = back_office(&db)
        .document()
        .reject(3, "officer1", "illegible scan")
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed(()));
    assert_eq!(db.calls()[0].input("P_REASON"), Some(&Value::from("illegible scan")));
}

#[tokio::test]
async fn inbox_reads_legacy_flags() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_MESSAGE.INBOX",
        StubResponse::new().cursor(
            "P_CURSOR",
            StubCursor::new(&["MESSAGE_ID", "SENDER", "SUBJECT", "BODY", "SENT_AT", "IS_READ"])
                .row(vec![
                    Value::Integer(11),
                    Value::from("officer2"),
                    Value::from("Renewal"),
                    Value::from("Please review."),
                    Value::from(at(2024, 7, 1, 8)),
                    Value::from("N"),
                ]),
        ),
    );

    let inbox = back_office(&db).messaging().inbox("officer1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(!inbox[0].read);
    assert_eq!(inbox[0].subject, "Renewal");
}

#[tokio::test]
async fn mark_read_raises_business_errors() {
    let db = StubDatabase::new();
    db.on("BO_MESSAGE.MARK_READ", |_| {
        Err(DriverError::Database {
            code: Some("P0001".into()),
            message: "message not found".into(),
        })
    });

    let err = back_office(&db).messaging().mark_read(1, "officer1").await.unwrap_err();
    assert!(err.is_business());
    assert!(err.to_string().contains("message not found"));
}

// -- outbound gateways -----------------------------------------------------

#[tokio::test]
async fn sms_queue_and_delivery_status() {
    let db = StubDatabase::new();
    db.on_static("BO_SMS.QUEUE", StubResponse::new().output("P_RESULT", 3001_i64));
    db.on("BO_SMS.DELIVERY_STATUS", |call| {
        if call.input("P_ID") == Some(&Value::Integer(3001)) {
            Ok(StubResponse::new()
                .output("P_STATUS", "DELIVERED")
                .output("P_DELIVERED_AT", at(2024, 8, 1, 10)))
        } else {
            Ok(StubResponse::new())
        }
    });

    let sms = back_office(&db).sms();
    let id = sms
        .queue(&SmsRequest {
            recipient: "+15550100".into(),
            body: "Your license was renewed.".into(),
            sender_id: None,
        })
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(id, 3001);

    let status = sms.delivery_status(id).await.unwrap().unwrap();
    assert_eq!(status.status, "DELIVERED");
    assert_eq!(status.delivered_at, Some(at(2024, 8, 1, 10)));
    assert_eq!(status.error, None);
    assert_eq!(sms.delivery_status(1).await.unwrap(), None);
}

#[tokio::test]
async fn fax_history_reuses_delivery_records() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_FAX.HISTORY",
        StubResponse::new().cursor(
            "P_CURSOR",
            StubCursor::from_rows(vec![Row::new()
                .with("ID", 5_i64)
                .with("RECIPIENT", "+15550199")
                .with("STATUS", "FAILED")
                .with("QUEUED_AT", at(2024, 8, 2, 9))
                .with("DELIVERED_AT", Value::Null)]),
        ),
    );

    let history = back_office(&db).fax().history("+15550199").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, "FAILED");
    assert_eq!(history[0].delivered_at, None);
}

// -- licenses and officers -------------------------------------------------

#[tokio::test]
async fn renew_license_returns_new_expiry() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_LICENSE.RENEW",
        StubResponse::new()
            .output("P_RESULT", 0_i64)
            .output("P_NEW_EXPIRY", date(2026, 1, 31)),
    );

    let outcome = back_office(&db).license().renew(9, 12).await.unwrap();
    assert_eq!(outcome, Outcome::Completed(date(2026, 1, 31)));
}

#[tokio::test]
async fn renew_rejection_skips_expiry() {
    let db = StubDatabase::new();
    db.on_static("BO_LICENSE.RENEW", StubResponse::new().output("P_RESULT", -4_i64));

    let outcome = back_office(&db).license().renew(9, 12).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Rejected {
            code: -4,
            reason: "license is revoked".into()
        }
    );
}

#[tokio::test]
async fn issue_license_completes_with_id() {
    let db = StubDatabase::new();
    db.on_static("BO_LICENSE.ISSUE", StubResponse::new().output("P_RESULT", 77_i64));

    let outcome = back_office(&db)
        .license()
        .issue(&NewLicense {
            customer_id: 42,
            license_type: "TRADE".into(),
            valid_months: 12,
        })
        .await
        .unwrap();
    assert_eq!(outcome.completed(), Some(77));
}

#[tokio::test]
async fn officer_list_binds_flag_and_reads_optional_role() {
    let db = StubDatabase::new();
    db.on_static(
        "BO_OFFICER.LIST",
        StubResponse::new().cursor(
            "P_CURSOR",
            StubCursor::from_rows(vec![
                Row::new()
                    .with("OFFICER_ID", 1_i64)
                    .with("USERNAME", "USER1")
                    .with("FULL_NAME", "First Officer")
                    .with("EMAIL", Value::Null)
                    .with("ACTIVE", "Y")
                    .with("ROLE_NAME", "REVIEWER"),
                Row::new()
                    .with("OFFICER_ID", 2_i64)
                    .with("USERNAME", "USER2")
                    .with("FULL_NAME", "Second Officer")
                    .with("ACTIVE", "N"),
            ]),
        ),
    );

    let officers = back_office(&db).officer().list(true).await.unwrap();
    assert_eq!(officers.len(), 2);
    assert_eq!(officers[0].role.as_deref(), Some("REVIEWER"));
    assert!(!officers[1].active);
    assert_eq!(officers[1].role, None);
    assert_eq!(db.calls()[0].input("P_INCLUDE_INACTIVE"), Some(&Value::Flag(true)));
}

#[tokio::test]
async fn create_officer_rejects_taken_username() {
    let db = StubDatabase::new();
    db.on_static("BO_OFFICER.CREATE", StubResponse::new().output("P_RESULT", -2_i64));

    let outcome = back_office(&db)
        .officer()
        .create(&NewOfficer {
            username: "user1".into(),
            full_name: "Duplicate".into(),
            email: None,
        })
        .await
        .unwrap();
    assert!(!outcome.is_completed());
}
