//! Checkout, voids and the loyalty ledger against `PostgreSQL`.
//!
//! These tests require a migrated database named by
//! `SALON_TEST_DATABASE_URL` and are ignored by default.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::PgPool;

use salonhub_admin::db::{
    AppointmentRepository, BranchRepository, DashboardRepository, LedgerError, LoyaltyRepository, ProductRepository,
    RepositoryError, SalonServiceRepository,
};
use salonhub_admin::models::{
    AppointmentRecord, BranchInput, LoyaltyPosting, NewUser, ProductInput, SaleItem, SaleRequest,
    ServiceInput, User,
};
use salonhub_admin::services::{AuthService, CheckoutError, CheckoutService};
use salonhub_core::hours::OperatingHours;
use salonhub_core::loyalty::{LedgerReason, LoyaltyError, LoyaltyPolicy, PointsChange};
use salonhub_core::pos::{Discount, ItemKind};
use salonhub_core::{BranchId, Money, PaymentMethod, ProductId, Role, ServiceId};

use salonhub_integration_tests::test_pool;

fn unique(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{nanos}")
}

async fn branch(pool: &PgPool) -> BranchId {
    BranchRepository::new(pool)
        .create(&BranchInput {
            name: unique("Branch"),
            address: "1 Test Street".to_owned(),
            phone: None,
            email: None,
            operating_hours: OperatingHours::default_week(),
            tax_rate: Decimal::ZERO,
        })
        .await
        .unwrap()
        .id
}

async fn account(pool: &PgPool, role: Role, branch_id: Option<BranchId>) -> User {
    AuthService::new(pool)
        .create_user(&NewUser {
            email: format!("{}@example.com", unique("user")),
            name: "Test Account".to_owned(),
            phone: None,
            role,
            branch_id,
            password: None,
        })
        .await
        .unwrap()
}

fn credit(client: &User, branch_id: BranchId, points: i64) -> LoyaltyPosting {
    LoyaltyPosting {
        client_id: client.id,
        branch_id,
        change: PointsChange::Credit(points),
        reason: LedgerReason::ManualAdjustment,
        actor_id: None,
        transaction_id: None,
        note: None,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SALON_TEST_DATABASE_URL)"]
async fn test_concurrent_redemptions_never_overdraw() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let branch_id = branch(&pool).await;
    let client = Arc::new(account(&pool, Role::Client, None).await);
    LoyaltyRepository::new(&pool)
        .apply(&credit(&client, branch_id, 100))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let pool = pool.clone();
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            LoyaltyRepository::new(&pool)
                .apply(&LoyaltyPosting {
                    change: PointsChange::Redeem(30),
                    reason: LedgerReason::Redemption,
                    ..credit(&client, branch_id, 0)
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::Loyalty(LoyaltyError::InsufficientPoints { .. })) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 3);
    let balance = LoyaltyRepository::new(&pool).balance(client.id).await.unwrap();
    assert_eq!(balance.points_at(branch_id), 10);
    assert_eq!(balance.total(), 10);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SALON_TEST_DATABASE_URL)"]
async fn test_concurrent_bookings_never_double_book() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let branch_id = branch(&pool).await;
    let stylist = account(&pool, Role::Stylist, Some(branch_id)).await;
    let service_id = SalonServiceRepository::new(&pool)
        .create(&ServiceInput {
            name: unique("Blow dry"),
            description: String::new(),
            category: "hair".to_owned(),
            price: Money::from_minor(4_000),
            duration_minutes: 30,
            branch_ids: vec![branch_id],
            image_url: None,
        })
        .await
        .unwrap()
        .id;

    let starts_at = chrono::NaiveDate::from_ymd_opt(2099, 6, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let ends_at = starts_at + chrono::Duration::minutes(30);

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let pool = pool.clone();
        let client = account(&pool, Role::Client, None).await;
        let record = AppointmentRecord {
            branch_id,
            client_id: client.id,
            stylist_id: stylist.id,
            service_id,
            starts_at,
            ends_at,
            price: Money::from_minor(4_000),
            notes: None,
            created_by: client.id,
        };
        tasks.push(tokio::spawn(async move {
            AppointmentRepository::new(&pool).create(&record).await
        }));
    }

    let mut booked = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => booked += 1,
            Err(RepositoryError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(booked, 1);
    assert!(
        AppointmentRepository::new(&pool)
            .has_conflict(stylist.id, starts_at, ends_at, None)
            .await
            .unwrap()
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SALON_TEST_DATABASE_URL)"]
async fn test_branch_dashboard_counts_visiting_clients() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let visited = branch(&pool).await;
    let quiet = branch(&pool).await;
    let stylist = account(&pool, Role::Stylist, Some(visited)).await;
    let client = account(&pool, Role::Client, None).await;
    let service_id = SalonServiceRepository::new(&pool)
        .create(&ServiceInput {
            name: unique("Trim"),
            description: String::new(),
            category: "hair".to_owned(),
            price: Money::from_minor(2_000),
            duration_minutes: 20,
            branch_ids: vec![visited],
            image_url: None,
        })
        .await
        .unwrap()
        .id;
    let starts_at = chrono::NaiveDate::from_ymd_opt(2099, 7, 1)
        .unwrap()
        .and_hms_opt(11, 0, 0)
        .unwrap();
    AppointmentRepository::new(&pool)
        .create(&AppointmentRecord {
            branch_id: visited,
            client_id: client.id,
            stylist_id: stylist.id,
            service_id,
            starts_at,
            ends_at: starts_at + chrono::Duration::minutes(20),
            price: Money::from_minor(2_000),
            notes: None,
            created_by: client.id,
        })
        .await
        .unwrap();

    let today = chrono::Local::now().date_naive();
    let dashboards = DashboardRepository::new(&pool);
    let summary = dashboards.operations(Some(visited), today).await.unwrap();
    assert_eq!(summary.active_clients, 1);
    assert_eq!(summary.active_staff, 1);
    let summary = dashboards.operations(Some(quiet), today).await.unwrap();
    assert_eq!(summary.active_clients, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SALON_TEST_DATABASE_URL)"]
async fn test_checkout_and_void() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let branch_id = branch(&pool).await;
    let staff = account(&pool, Role::BranchManager, Some(branch_id)).await;
    let client = account(&pool, Role::Client, None).await;

    let service_id: ServiceId = SalonServiceRepository::new(&pool)
        .create(&ServiceInput {
            name: unique("Cut"),
            description: String::new(),
            category: "hair".to_owned(),
            price: Money::from_minor(30_000),
            duration_minutes: 45,
            branch_ids: vec![branch_id],
            image_url: None,
        })
        .await
        .unwrap()
        .id;
    let product_id: ProductId = ProductRepository::new(&pool)
        .create(&ProductInput {
            branch_id,
            supplier_id: None,
            name: unique("Shampoo"),
            sku: None,
            category: "retail".to_owned(),
            description: String::new(),
            price: Money::from_minor(5_000),
            cost: None,
            stock: 3,
            reorder_level: 1,
            image_url: None,
        })
        .await
        .unwrap()
        .id;

    LoyaltyRepository::new(&pool)
        .apply(&credit(&client, branch_id, 40))
        .await
        .unwrap();

    let checkout = CheckoutService::new(&pool, LoyaltyPolicy::default());
    let request = SaleRequest {
        branch_id,
        client_id: Some(client.id),
        items: vec![
            SaleItem {
                kind: ItemKind::Service,
                item_id: service_id.as_i32(),
                quantity: 1,
            },
            SaleItem {
                kind: ItemKind::Product,
                item_id: product_id.as_i32(),
                quantity: 2,
            },
        ],
        discount: Discount::None,
        points_to_redeem: 40,
        payment_method: PaymentMethod::Card,
        notes: None,
    };

    let sale = checkout.checkout(&request, staff.id).await.unwrap();
    // 400.00 - 40 points = 360.00, earning 3
    assert_eq!(sale.totals.total, Money::from_minor(36_000));
    assert_eq!(sale.totals.points_earned, 3);

    let products = ProductRepository::new(&pool);
    assert_eq!(products.get(product_id).await.unwrap().unwrap().stock, 1);
    let balance = LoyaltyRepository::new(&pool).balance(client.id).await.unwrap();
    assert_eq!(balance.points_at(branch_id), 3);

    // Only one shampoo is left
    let err = checkout.checkout(&request, staff.id).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InsufficientStock { .. } | CheckoutError::Ledger(_)
    ));

    let voided = checkout.void(sale.id, staff.id, "customer changed mind").await.unwrap();
    assert_eq!(voided.voided_by, Some(staff.id));
    assert_eq!(products.get(product_id).await.unwrap().unwrap().stock, 3);
    let balance = LoyaltyRepository::new(&pool).balance(client.id).await.unwrap();
    assert_eq!(balance.points_at(branch_id), 40);

    let again = checkout.void(sale.id, staff.id, "twice").await.unwrap_err();
    assert!(matches!(again, CheckoutError::AlreadyVoided));
}
