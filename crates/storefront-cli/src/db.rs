//! `db` subcommands.

use rust_decimal::Decimal;
use storefront_core::{DefaultVariantSettings, ErrorCode, NewOption, NewOptionValue, NewProduct};
use storefront_variants::products;

pub(crate) const DEMO_BASE_SKU: &str = "TSHIRT-001";

pub(crate) async fn run_ping(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    storefront_db::health_check(pool).await?;
    println!("database ok");
    Ok(())
}

pub(crate) async fn run_migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let applied = storefront_db::run_migrations(pool).await?;
    tracing::info!(applied, "migrations complete");
    println!("applied {applied} migration(s)");
    Ok(())
}

fn option_values(values: &[(&str, &str, Option<&str>)]) -> Vec<NewOptionValue> {
    values
        .iter()
        .map(|(value, display_name, color_code)| NewOptionValue {
            value: (*value).to_string(),
            display_name: Some((*display_name).to_string()),
            color_code: color_code.map(str::to_string),
            position: None,
        })
        .collect()
}

/// The demo product: color {red, blue} × size {s, m}, four variants.
pub(crate) fn demo_product(seller_id: i64) -> NewProduct {
    NewProduct {
        seller_id: Some(seller_id),
        name: "Classic Tee".to_string(),
        brand: Some("Storefront".to_string()),
        base_sku: DEMO_BASE_SKU.to_string(),
        category_id: None,
        description: Some("Cotton crew-neck t-shirt".to_string()),
        options: vec![
            NewOption {
                name: "color".to_string(),
                display_name: Some("Color".to_string()),
                position: Some(0),
                values: option_values(&[
                    ("red", "Red", Some("#ff0000")),
                    ("blue", "Blue", Some("#0000ff")),
                ]),
            },
            NewOption {
                name: "size".to_string(),
                display_name: Some("Size".to_string()),
                position: Some(1),
                values: option_values(&[("s", "Small", None), ("m", "Medium", None)]),
            },
        ],
        auto_generate_variants: true,
        default_variant_settings: Some(DefaultVariantSettings {
            price: Decimal::new(2500, 2),
            stock: Some(10),
            allow_purchase: true,
            is_popular: false,
            images: Vec::new(),
        }),
        variants: Vec::new(),
    }
}

/// Creates the demo product. Runs as admin so the owner comes from
/// `seller_id`; an existing `TSHIRT-001` is left untouched.
pub(crate) async fn run_seed(pool: &sqlx::PgPool, seller_id: i64) -> anyhow::Result<()> {
    match products::create_product(pool, None, &demo_product(seller_id)).await {
        Ok(detail) => {
            tracing::info!(
                product_id = detail.product.id,
                variants = detail.variants.len(),
                "demo product seeded"
            );
            println!(
                "seeded {DEMO_BASE_SKU} as product {} with {} variants",
                detail.product.id,
                detail.variants.len()
            );
            Ok(())
        }
        Err(err) if err.code == ErrorCode::ProductSkuConflict => {
            println!("{DEMO_BASE_SKU} already present; nothing to do");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
