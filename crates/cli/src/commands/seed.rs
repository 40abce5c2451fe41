//! Demo data for local development.
//!
//! Creates two branches, a service menu shared between them, one supplier
//! and a handful of retail products at each branch. Does nothing if any
//! branch already exists.

use rust_decimal::Decimal;
use tracing::info;

use salonhub_admin::db::{
    BranchRepository, ProductRepository, SalonServiceRepository, SupplierRepository,
};
use salonhub_admin::models::{BranchInput, ProductInput, ServiceInput, SupplierInput};
use salonhub_core::hours::OperatingHours;
use salonhub_core::{BranchId, Money, SupplierId};

/// (name, category, price in cents, minutes)
const SERVICES: [(&str, &str, i64, i32); 5] = [
    ("Women's cut & style", "hair", 6_500, 60),
    ("Men's cut", "hair", 3_500, 30),
    ("Full colour", "colour", 12_000, 120),
    ("Manicure", "nails", 3_000, 45),
    ("Express facial", "skin", 5_500, 40),
];

/// (name, sku prefix, price in cents, cost in cents, stock)
const PRODUCTS: [(&str, &str, i64, i64, i32); 3] = [
    ("Argan oil shampoo 250ml", "SHA", 2_400, 1_100, 24),
    ("Repair conditioner 250ml", "CON", 2_600, 1_200, 18),
    ("Texturising spray", "TEX", 1_900, 800, 12),
];

fn branch(name: &str, address: &str) -> BranchInput {
    BranchInput {
        name: name.to_owned(),
        address: address.to_owned(),
        phone: None,
        email: None,
        operating_hours: OperatingHours::default_week(),
        tax_rate: Decimal::new(8, 2),
    }
}

fn product(
    branch_id: BranchId,
    supplier_id: SupplierId,
    (name, sku, price, cost, stock): (&str, &str, i64, i64, i32),
) -> ProductInput {
    ProductInput {
        branch_id,
        supplier_id: Some(supplier_id),
        name: name.to_owned(),
        sku: Some(format!("{sku}-{branch_id}")),
        category: "retail".to_owned(),
        description: String::new(),
        price: Money::from_minor(price),
        cost: Some(Money::from_minor(cost)),
        stock,
        reorder_level: 5,
        image_url: None,
    }
}

/// Load the demo data set.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let branches = BranchRepository::new(&pool);
    if !branches.list(false).await?.is_empty() {
        info!("Branches already exist, skipping demo seed");
        return Ok(());
    }

    let downtown = branches
        .create(&branch("Downtown", "12 Market Street"))
        .await?;
    let riverside = branches
        .create(&branch("Riverside", "3 Quay Road"))
        .await?;
    info!("Created branches {} and {}", downtown.name, riverside.name);

    let services = SalonServiceRepository::new(&pool);
    for (name, category, price, minutes) in SERVICES {
        services
            .create(&ServiceInput {
                name: name.to_owned(),
                description: String::new(),
                category: category.to_owned(),
                price: Money::from_minor(price),
                duration_minutes: minutes,
                branch_ids: vec![downtown.id, riverside.id],
                image_url: None,
            })
            .await?;
    }
    info!("Created {} services", SERVICES.len());

    let supplier = SupplierRepository::new(&pool)
        .create(&SupplierInput {
            name: "Pro Hair Supplies".to_owned(),
            contact_name: Some("Accounts".to_owned()),
            email: Some("orders@prohair.example".to_owned()),
            phone: None,
            address: None,
            notes: None,
        })
        .await?;

    let products = ProductRepository::new(&pool);
    for branch_id in [downtown.id, riverside.id] {
        for entry in PRODUCTS {
            products.create(&product(branch_id, supplier.id, entry)).await?;
        }
    }
    info!("Created {} products", PRODUCTS.len() * 2);

    info!("Demo data loaded");
    Ok(())
}
