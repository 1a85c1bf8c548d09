//! PostgreSQL adapter tests
//!
//! These start a PostgreSQL container and are ignored by default.
//! Run with `cargo test -p infra_db -- --ignored` on a machine with Docker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{HealthCheckable, ManualClock, OperationMetadata, PortError};
use domain_ledger::{
    AuditQuery, ContentHash, ErrorKind, LedgerConfig, LedgerEngine, LedgerStore, ReportArtifact,
    ReportRegistry, ReportRetention, SortDirection, SortKey,
};
use infra_db::{PostgresLedgerStore, PostgresReportRegistry};
use test_utils::{
    amount, assert_error_kind, create_isolated_test_database, key, user, TemporalFixtures,
    TestDatabase,
};

async fn engine(db: &TestDatabase) -> (Arc<PostgresLedgerStore>, LedgerEngine) {
    let store = Arc::new(PostgresLedgerStore::new(db.pool().clone()));
    let engine = LedgerEngine::new(store.clone(), LedgerConfig::default());
    (store, engine)
}

async fn main_and_reserved(store: &PostgresLedgerStore, id: u32) -> (Decimal, Decimal) {
    let account = store.account(user(id)).await.unwrap().unwrap();
    (account.main.value(), account.reserved.value())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_full_lifecycle_scenario() {
    let db = create_isolated_test_database().await.unwrap();
    let (store, engine) = engine(&db).await;
    let meta = OperationMetadata::default();

    engine.register_user(user(1)).await.unwrap();
    engine.register_user(user(2)).await.unwrap();
    engine.top_up(user(1), amount(dec!(100)), &meta).await.unwrap();
    engine.top_up(user(2), amount(dec!(100)), &meta).await.unwrap();
    engine.transfer(user(1), user(2), amount(dec!(40)), &meta).await.unwrap();
    engine.withdraw(user(1), amount(dec!(10)), &meta).await.unwrap();
    engine.reserve(key(1, 1, 1), amount(dec!(20)), &meta).await.unwrap();
    engine.accept_revenue(key(1, 1, 1), amount(dec!(20)), &meta).await.unwrap();

    assert_eq!(main_and_reserved(&store, 1).await, (dec!(30.00), dec!(0.00)));
    assert_eq!(main_and_reserved(&store, 2).await, (dec!(140.00), dec!(0.00)));

    let amounts: Vec<Decimal> = engine
        .audit_entries(&AuditQuery::for_user(user(1)))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.amount.value())
        .collect();
    assert_eq!(amounts, vec![dec!(100), dec!(40), dec!(10), dec!(20), dec!(20)]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_conditional_updates_and_conflicts() {
    let db = create_isolated_test_database().await.unwrap();
    let (store, engine) = engine(&db).await;
    let meta = OperationMetadata::default();

    engine.register_user(user(1)).await.unwrap();
    assert!(!engine.register_user(user(1)).await.unwrap());
    engine.top_up(user(1), amount(dec!(10)), &meta).await.unwrap();

    assert_error_kind(
        engine.withdraw(user(1), amount(dec!(10.01)), &meta).await,
        ErrorKind::InsufficientFunds,
    );
    engine.reserve(key(1, 1, 1), amount(dec!(4)), &meta).await.unwrap();
    assert_error_kind(
        engine.reserve(key(1, 1, 1), amount(dec!(1)), &meta).await,
        ErrorKind::Conflict,
    );
    assert_error_kind(
        engine.accept_revenue(key(1, 1, 1), amount(dec!(3)), &meta).await,
        ErrorKind::NotFound,
    );

    assert_eq!(main_and_reserved(&store, 1).await, (dec!(6.00), dec!(4.00)));
    assert_error_kind(engine.balance(user(5)).await, ErrorKind::NotFound);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_audit_sorting_and_paging() {
    let db = create_isolated_test_database().await.unwrap();
    let (_store, engine) = engine(&db).await;
    let meta = OperationMetadata::default();

    engine.register_user(user(1)).await.unwrap();
    for value in [dec!(30), dec!(10), dec!(20)] {
        engine.top_up(user(1), amount(value), &meta).await.unwrap();
    }

    let query = AuditQuery::for_user(user(1))
        .sorted_by(SortKey::Amount, SortDirection::Desc)
        .with_page(1, 2)
        .unwrap();
    let amounts: Vec<Decimal> = engine
        .audit_entries(&query)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.amount.value())
        .collect();
    assert_eq!(amounts, vec![dec!(30), dec!(20)]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_default_audit_order_is_commit_order() {
    let db = create_isolated_test_database().await.unwrap();
    let store = Arc::new(PostgresLedgerStore::new(db.pool().clone()));
    let clock = Arc::new(ManualClock::new(TemporalFixtures::mid_march()));
    let engine = LedgerEngine::new(store, LedgerConfig::default()).with_clock(clock.clone());
    let meta = OperationMetadata::default();

    engine.register_user(user(1)).await.unwrap();
    engine.top_up(user(1), amount(dec!(100)), &meta).await.unwrap();
    clock.advance(chrono::Duration::minutes(-5));
    engine.withdraw(user(1), amount(dec!(10)), &meta).await.unwrap();

    let amounts: Vec<Decimal> = engine
        .audit_entries(&AuditQuery::for_user(user(1)))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.amount.value())
        .collect();
    assert_eq!(amounts, vec![dec!(100), dec!(10)]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_row_lock_held_elsewhere_times_out() {
    let db = create_isolated_test_database().await.unwrap();
    let (store, engine) = engine(&db).await;
    let meta = OperationMetadata::default();

    engine.register_user(user(1)).await.unwrap();
    engine.top_up(user(1), amount(dec!(10)), &meta).await.unwrap();

    let mut blocker = db.pool().begin().await.unwrap();
    sqlx::query("SELECT main FROM account WHERE user_id = 1 FOR UPDATE")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let short = OperationMetadata::with_correlation_id("blocked").with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    assert_error_kind(
        engine.withdraw(user(1), amount(dec!(1)), &short).await,
        ErrorKind::Timeout,
    );
    assert!(started.elapsed() < Duration::from_secs(2));

    blocker.rollback().await.unwrap();
    assert_eq!(main_and_reserved(&store, 1).await, (dec!(10.00), dec!(0.00)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_numeric_overflow_is_rejected_as_validation() {
    let db = create_isolated_test_database().await.unwrap();
    let (store, engine) = engine(&db).await;

    engine.register_user(user(1)).await.unwrap();
    let mut unit = store.begin(Instant::now() + Duration::from_secs(5)).await.unwrap();
    unit.create_account_if_absent(user(1)).await.unwrap();
    let err = unit
        .adjust_main(user(1), dec!(10000000000000000000))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation { .. }), "{:?}", err);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_revenue_totals_and_expiry_queries() {
    let db = create_isolated_test_database().await.unwrap();
    let (store, engine) = engine(&db).await;
    let meta = OperationMetadata::default();

    engine.register_user(user(1)).await.unwrap();
    engine.top_up(user(1), amount(dec!(100)), &meta).await.unwrap();
    for (service, order, value) in [(1, 1, dec!(10)), (1, 2, dec!(2.5)), (2, 3, dec!(7))] {
        engine.reserve(key(1, service, order), amount(value), &meta).await.unwrap();
        engine.accept_revenue(key(1, service, order), amount(value), &meta).await.unwrap();
    }
    engine.reserve(key(1, 9, 9), amount(dec!(1)), &meta).await.unwrap();

    let now = chrono::Utc::now();
    let window = core_kernel::ReportWindow::new(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1)).unwrap();
    let totals = store.revenue_totals(&window).await.unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].total, dec!(12.50));
    assert_eq!(totals[1].total, dec!(7.00));

    let open = store.reservations_created_before(now + chrono::Duration::seconds(1)).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].key, key(1, 9, 9));

    assert_eq!(store.health_check().await.status, core_kernel::AdapterHealth::Healthy);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_report_registry_retention() {
    let db = create_isolated_test_database().await.unwrap();
    let registry = PostgresReportRegistry::new(db.pool().clone());

    let artifact = |content: &[u8]| {
        let hash = ContentHash::of(content);
        ReportArtifact {
            location: format!("/reports/{}/{}.csv", hash.shard(), hash),
            hash,
            window: TemporalFixtures::march_window(),
            created_at: TemporalFixtures::mid_march(),
        }
    };
    let first = artifact(b"1,10.00\n");
    let second = artifact(b"2,20.00\n");

    assert!(registry.record(&first, ReportRetention::KeepHistory).await.unwrap().is_empty());
    assert!(registry.record(&first, ReportRetention::KeepHistory).await.unwrap().is_empty());
    assert_eq!(registry.lookup(&first.hash).await.unwrap(), Some(first.clone()));

    let evicted = registry.record(&second, ReportRetention::SingleSlot).await.unwrap();
    assert_eq!(evicted, vec![first.clone()]);
    assert!(registry.lookup(&first.hash).await.unwrap().is_none());
    assert!(registry.lookup(&second.hash).await.unwrap().is_some());
}
