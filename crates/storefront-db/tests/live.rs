//! Live integration tests for storefront-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/storefront-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use storefront_core::{
    BulkVariantPatch, ProductPatch, SortBy, SortOrder, VariantFilters, VariantListRequest,
    VariantPatch,
};
use storefront_db::{
    options, products, read_models, variant_options, variants, DbError, Entity, OptionRow,
    OptionValueInsert, OptionValueRow, OptionValueUpdate, ProductInsert, VariantInsert,
    VariantOptionValueInsert, VariantRow,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_product(pool: &sqlx::PgPool, seller_id: i64, base_sku: &str) -> i64 {
    products::create_product(
        pool,
        &ProductInsert {
            seller_id,
            name: format!("Product {base_sku}"),
            slug: base_sku.to_lowercase(),
            brand: Some("Acme".to_string()),
            base_sku: base_sku.to_string(),
            category_id: None,
            description: None,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_product failed for '{base_sku}': {e}"))
    .id
}

async fn insert_option(
    pool: &sqlx::PgPool,
    product_id: i64,
    name: &str,
    position: i32,
    values: &[&str],
) -> (OptionRow, Vec<OptionValueRow>) {
    let option = options::create_option(pool, product_id, name, name, position)
        .await
        .expect("create_option failed");
    let inserts: Vec<OptionValueInsert> = values
        .iter()
        .zip(0..)
        .map(|(v, position)| OptionValueInsert {
            value: (*v).to_string(),
            display_name: v.to_uppercase(),
            color_code: None,
            position,
        })
        .collect();
    let rows = options::bulk_create_values(pool, option.id, &inserts)
        .await
        .expect("bulk_create_values failed");
    (option, rows)
}

fn variant(sku: &str, price: &str, is_default: bool) -> VariantInsert {
    VariantInsert {
        sku: sku.to_string(),
        price: price.parse::<Decimal>().expect("valid decimal"),
        images: vec![format!("https://img.example/{sku}.jpg")],
        is_default,
        is_popular: false,
        allow_purchase: true,
        stock: Some(5),
    }
}

async fn link(pool: &sqlx::PgPool, variant: &VariantRow, option: &OptionRow, value: &OptionValueRow) {
    variant_options::create_variant_option_values(
        pool,
        &[VariantOptionValueInsert {
            variant_id: variant.id,
            option_id: option.id,
            option_value_id: value.id,
        }],
    )
    .await
    .expect("create_variant_option_values failed");
}

fn selection(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Section 1: Products
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_crud_round_trip(pool: sqlx::PgPool) {
    let id = insert_product(&pool, 1, "TSHIRT-001").await;

    let updated = products::update_product(
        &pool,
        id,
        &ProductPatch {
            name: Some("Better Shirt".to_string()),
            ..ProductPatch::default()
        },
        Some("better-shirt"),
    )
    .await
    .expect("update_product failed");
    assert_eq!(updated.name, "Better Shirt");
    assert_eq!(updated.slug, "better-shirt");
    assert_eq!(updated.brand.as_deref(), Some("Acme"));

    let deleted = products::delete_product(&pool, id).await.expect("delete");
    assert_eq!(deleted, 1);

    let err = products::find_product_by_id(&pool, id)
        .await
        .expect_err("product should be gone");
    assert!(matches!(
        err,
        DbError::NotFound {
            entity: Entity::Product,
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_base_sku_is_a_conflict(pool: sqlx::PgPool) {
    insert_product(&pool, 1, "DUP-1").await;
    let err = products::create_product(
        &pool,
        &ProductInsert {
            seller_id: 2,
            name: "Other".to_string(),
            slug: "other".to_string(),
            brand: None,
            base_sku: "DUP-1".to_string(),
            category_id: None,
            description: None,
        },
    )
    .await
    .expect_err("base sku must be unique");
    assert!(matches!(err, DbError::Conflict { ref constraint } if constraint == "products_base_sku_key"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_filters_by_seller(pool: sqlx::PgPool) {
    insert_product(&pool, 1, "A-1").await;
    insert_product(&pool, 1, "A-2").await;
    insert_product(&pool, 2, "B-1").await;

    let mine = products::list_products(&pool, Some(1), 10, 0)
        .await
        .expect("list_products failed");
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|p| p.seller_id == 1));

    let total = products::count_products(&pool, None).await.expect("count");
    assert_eq!(total, 3);
}

// ---------------------------------------------------------------------------
// Section 2: Options and values
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn option_values_are_returned_in_input_order(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "OPT-1").await;
    let (option, values) = insert_option(&pool, product_id, "size", 0, &["s", "m", "l"]).await;

    let names: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
    assert_eq!(names, vec!["s", "m", "l"]);

    let fetched = options::find_values_by_option(&pool, option.id)
        .await
        .expect("find_values_by_option failed");
    assert_eq!(fetched.len(), 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_option_name_is_a_conflict(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "OPT-2").await;
    insert_option(&pool, product_id, "color", 0, &["red"]).await;

    let err = options::create_option(&pool, product_id, "color", "Color", 1)
        .await
        .expect_err("option names are unique per product");
    assert!(matches!(err, DbError::Conflict { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_update_values_keeps_value_and_changes_display(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "OPT-3").await;
    let (option, values) = insert_option(&pool, product_id, "color", 0, &["red", "blue"]).await;

    let updated = options::bulk_update_values(
        &pool,
        option.id,
        &[OptionValueUpdate {
            id: values[0].id,
            display_name: Some("Crimson".to_string()),
            color_code: Some("#dc143c".to_string()),
            position: None,
        }],
    )
    .await
    .expect("bulk_update_values failed");

    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].value, "red");
    assert_eq!(updated[0].display_name, "Crimson");
    assert_eq!(updated[0].color_code.as_deref(), Some("#dc143c"));
    assert_eq!(updated[0].position, values[0].position);
}

#[sqlx::test(migrations = "../../migrations")]
async fn option_lookup_is_scoped_to_product(pool: sqlx::PgPool) {
    let first = insert_product(&pool, 1, "SCOPE-1").await;
    let second = insert_product(&pool, 1, "SCOPE-2").await;
    let (option, _) = insert_option(&pool, first, "size", 0, &["s"]).await;

    let err = options::find_option_by_id(&pool, second, option.id)
        .await
        .expect_err("option belongs to another product");
    assert!(matches!(
        err,
        DbError::NotFound {
            entity: Entity::Option,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Section 3: Variants
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_create_returns_rows_in_request_order(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "BULK-1").await;
    let inserts = vec![
        variant("BULK-1-Z", "10.00", true),
        variant("BULK-1-A", "12.00", false),
        variant("BULK-1-M", "11.00", false),
    ];

    let rows = variants::bulk_create_variants(&pool, product_id, &inserts)
        .await
        .expect("bulk_create_variants failed");

    let skus: Vec<&str> = rows.iter().map(|r| r.sku.as_str()).collect();
    assert_eq!(skus, vec!["BULK-1-Z", "BULK-1-A", "BULK-1-M"]);
    assert_eq!(rows[0].images, vec!["https://img.example/BULK-1-Z.jpg"]);
    assert!(rows[0].is_default);
    assert!(rows.iter().all(|r| r.in_stock));
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_default_is_rejected_by_index(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "DEF-1").await;
    variants::create_variant(&pool, product_id, &variant("DEF-1-A", "5.00", true))
        .await
        .expect("first default");

    let err = variants::create_variant(&pool, product_id, &variant("DEF-1-B", "5.00", true))
        .await
        .expect_err("only one default per product");
    assert!(
        matches!(err, DbError::Conflict { ref constraint } if constraint == "idx_product_variant_single_default")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn default_can_be_moved_and_promoted(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "DEF-2").await;
    let rows = variants::bulk_create_variants(
        &pool,
        product_id,
        &[variant("DEF-2-A", "5.00", true), variant("DEF-2-B", "6.00", false)],
    )
    .await
    .expect("bulk create");

    variants::unset_all_defaults_for_product(&pool, product_id, None)
        .await
        .expect("unset defaults");
    variants::set_default_variant(&pool, product_id, rows[1].id)
        .await
        .expect("set default");
    assert_eq!(
        variants::find_default_variant_id(&pool, product_id)
            .await
            .expect("find default"),
        Some(rows[1].id)
    );

    variants::delete_variant(&pool, product_id, rows[1].id)
        .await
        .expect("delete");
    let promoted = variants::promote_first_variant_to_default(&pool, product_id)
        .await
        .expect("promote");
    assert_eq!(promoted, Some(rows[0].id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_update_applies_sparse_patches(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "UPD-1").await;
    let rows = variants::bulk_create_variants(
        &pool,
        product_id,
        &[variant("UPD-1-A", "5.00", true), variant("UPD-1-B", "6.00", false)],
    )
    .await
    .expect("bulk create");

    let patches = vec![
        BulkVariantPatch {
            variant_id: rows[1].id,
            patch: VariantPatch {
                price: Some("9.50".parse().expect("decimal")),
                images: Some(vec!["a.jpg".to_string(), "b.jpg".to_string()]),
                ..VariantPatch::default()
            },
        },
        BulkVariantPatch {
            variant_id: rows[0].id,
            patch: VariantPatch {
                stock: Some(0),
                ..VariantPatch::default()
            },
        },
    ];
    let updated = variants::bulk_update_variants(&pool, product_id, &patches)
        .await
        .expect("bulk_update_variants failed");

    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0].id, rows[1].id);
    assert_eq!(updated[0].price, "9.50".parse::<Decimal>().expect("decimal"));
    assert_eq!(updated[0].images, vec!["a.jpg", "b.jpg"]);
    assert_eq!(updated[0].sku, "UPD-1-B");
    assert_eq!(updated[1].stock, Some(0));
    assert!(!updated[1].in_stock);
    assert!(updated[1].is_default);
}

#[sqlx::test(migrations = "../../migrations")]
async fn variant_lookup_is_scoped_to_product(pool: sqlx::PgPool) {
    let first = insert_product(&pool, 1, "VSCOPE-1").await;
    let second = insert_product(&pool, 1, "VSCOPE-2").await;
    let row = variants::create_variant(&pool, first, &variant("VSCOPE-1-A", "1.00", true))
        .await
        .expect("create");

    let err = variants::find_variant_by_id(&pool, second, row.id)
        .await
        .expect_err("variant belongs to another product");
    assert!(matches!(
        err,
        DbError::NotFound {
            entity: Entity::Variant,
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn find_by_options_requires_exact_selection(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "FIND-1").await;
    let (color, colors) = insert_option(&pool, product_id, "color", 0, &["red", "blue"]).await;
    let (size, sizes) = insert_option(&pool, product_id, "size", 1, &["s", "m"]).await;

    let red_s = variants::create_variant(&pool, product_id, &variant("FIND-1-RED-S", "10.00", true))
        .await
        .expect("create");
    link(&pool, &red_s, &color, &colors[0]).await;
    link(&pool, &red_s, &size, &sizes[0]).await;

    let blue_m = variants::create_variant(&pool, product_id, &variant("FIND-1-BLUE-M", "10.00", false))
        .await
        .expect("create");
    link(&pool, &blue_m, &color, &colors[1]).await;
    link(&pool, &blue_m, &size, &sizes[1]).await;

    let found = variants::find_variant_by_options(
        &pool,
        product_id,
        &selection(&[("color", "blue"), ("size", "m")]),
    )
    .await
    .expect("find_variant_by_options failed");
    assert_eq!(found, Some(blue_m.id));

    let subset = variants::find_variant_by_options(&pool, product_id, &selection(&[("color", "red")]))
        .await
        .expect("query");
    assert_eq!(subset, None, "a partial selection must not match");

    let mismatch = variants::find_variant_by_options(
        &pool,
        product_id,
        &selection(&[("color", "red"), ("size", "m")]),
    )
    .await
    .expect("query");
    assert_eq!(mismatch, None);

    let selections = variants::find_variant_selections_by_product(&pool, product_id)
        .await
        .expect("selections");
    assert_eq!(selections.len(), 2);
    assert_eq!(selections[0].1, selection(&[("color", "red"), ("size", "s")]));
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_value_for_same_option_is_rejected(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "JOIN-1").await;
    let (color, colors) = insert_option(&pool, product_id, "color", 0, &["red", "blue"]).await;
    let row = variants::create_variant(&pool, product_id, &variant("JOIN-1-A", "1.00", true))
        .await
        .expect("create");
    link(&pool, &row, &color, &colors[0]).await;

    let err = variant_options::create_variant_option_values(
        &pool,
        &[VariantOptionValueInsert {
            variant_id: row.id,
            option_id: color.id,
            option_value_id: colors[1].id,
        }],
    )
    .await
    .expect_err("one value per option per variant");
    assert!(matches!(err, DbError::Conflict { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn negative_stock_is_a_check_violation(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "STOCK-1").await;
    let row = variants::create_variant(&pool, product_id, &variant("STOCK-1-A", "1.00", true))
        .await
        .expect("create");

    let err = variants::set_variant_stock(&pool, product_id, row.id, -1)
        .await
        .expect_err("stock cannot go negative");
    assert!(matches!(err, DbError::CheckViolation { .. }));

    let ok = variants::set_variant_stock(&pool, product_id, row.id, 0)
        .await
        .expect("set stock");
    assert!(!ok.in_stock);
}

// ---------------------------------------------------------------------------
// Section 4: Read models
// ---------------------------------------------------------------------------

async fn seed_shirt(pool: &sqlx::PgPool, seller_id: i64, base_sku: &str) -> i64 {
    let product_id = insert_product(pool, seller_id, base_sku).await;
    let (color, colors) = insert_option(pool, product_id, "color", 0, &["red", "blue", "green"]).await;
    let (size, sizes) = insert_option(pool, product_id, "size", 1, &["s", "m"]).await;

    let specs = [
        (0_usize, 0_usize, "10.00", true),
        (0, 1, "12.00", false),
        (1, 0, "15.00", false),
    ];
    for (ci, si, price, is_default) in specs {
        let sku = format!("{base_sku}-{}-{}", colors[ci].value, sizes[si].value);
        let row = variants::create_variant(pool, product_id, &variant(&sku, price, is_default))
            .await
            .expect("create");
        link(pool, &row, &color, &colors[ci]).await;
        link(pool, &row, &size, &sizes[si]).await;
    }
    product_id
}

#[sqlx::test(migrations = "../../migrations")]
async fn variants_with_options_are_ordered_by_option_position(pool: sqlx::PgPool) {
    let product_id = seed_shirt(&pool, 1, "RM-1").await;

    let rows = read_models::get_product_variants_with_options(&pool, product_id)
        .await
        .expect("get_product_variants_with_options failed");
    assert_eq!(rows.len(), 3);
    let names: Vec<&str> = rows[0].options.iter().map(|o| o.option_name.as_str()).collect();
    assert_eq!(names, vec!["color", "size"]);
    assert_eq!(rows[0].selection(), selection(&[("color", "red"), ("size", "s")]));
}

#[sqlx::test(migrations = "../../migrations")]
async fn options_carry_variant_counts(pool: sqlx::PgPool) {
    let product_id = seed_shirt(&pool, 1, "RM-2").await;

    let catalog = read_models::get_options_with_variant_counts(&pool, product_id)
        .await
        .expect("get_options_with_variant_counts failed");
    assert_eq!(catalog.len(), 2);

    let color = &catalog[0];
    assert_eq!(color.option.name, "color");
    let counts: Vec<(&str, i64)> = color
        .values
        .iter()
        .map(|v| (v.value.as_str(), v.variant_count))
        .collect();
    assert_eq!(counts, vec![("red", 2), ("blue", 1), ("green", 0)]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn aggregation_summarises_variants(pool: sqlx::PgPool) {
    let product_id = seed_shirt(&pool, 1, "RM-3").await;

    let agg = read_models::get_variant_aggregation(&pool, product_id)
        .await
        .expect("get_variant_aggregation failed");
    assert!(agg.has_variants);
    assert_eq!(agg.total_variants, 3);
    assert_eq!(agg.min_price, Some("10.00".parse().expect("decimal")));
    assert_eq!(agg.max_price, Some("15.00".parse().expect("decimal")));
    assert_eq!(agg.main_image.as_deref(), Some("https://img.example/RM-3-red-s.jpg"));
    assert!(agg.allow_purchase);
    assert_eq!(agg.option_names, vec!["color", "size"]);
    assert_eq!(agg.option_values["color"], vec!["red", "blue"]);
    assert_eq!(agg.option_values["size"], vec!["s", "m"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn batch_aggregation_includes_products_without_variants(pool: sqlx::PgPool) {
    let shirt = seed_shirt(&pool, 1, "RM-4").await;
    let empty = insert_product(&pool, 1, "RM-EMPTY").await;

    let map = read_models::get_variants_aggregations(&pool, &[shirt, empty])
        .await
        .expect("get_variants_aggregations failed");
    assert_eq!(map.len(), 2);
    assert_eq!(map[&shirt].total_variants, 3);
    assert!(!map[&empty].has_variants);
    assert!(map[&empty].option_names.is_empty());
    assert!(!map[&empty].allow_purchase);
}

fn list_request(filters: VariantFilters) -> VariantListRequest {
    VariantListRequest {
        page: 1,
        page_size: 2,
        sort_by: SortBy::Price,
        sort_order: SortOrder::Desc,
        filters,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_variants_filters_sorts_and_pages(pool: sqlx::PgPool) {
    let mine = seed_shirt(&pool, 1, "LIST-1").await;
    seed_shirt(&pool, 2, "LIST-2").await;

    let (items, total) = read_models::list_variants_with_filters(
        &pool,
        &list_request(VariantFilters::default()),
        Some(1),
    )
    .await
    .expect("list_variants_with_filters failed");
    assert_eq!(total, 3);
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.variant.product_id == mine));
    assert_eq!(items[0].variant.price, "15.00".parse::<Decimal>().expect("decimal"));

    let (red, red_total) = read_models::list_variants_with_filters(
        &pool,
        &list_request(VariantFilters {
            options: selection(&[("color", "red")]),
            max_price: Some("11.00".parse().expect("decimal")),
            ..VariantFilters::default()
        }),
        None,
    )
    .await
    .expect("list_variants_with_filters failed");
    assert_eq!(red_total, 2);
    assert!(red.iter().all(|i| i.selection()["color"] == "red"));

    let (by_sku, _) = read_models::list_variants_with_filters(
        &pool,
        &list_request(VariantFilters {
            sku: Some("list-1-blue".to_string()),
            ..VariantFilters::default()
        }),
        None,
    )
    .await
    .expect("list_variants_with_filters failed");
    assert_eq!(by_sku.len(), 1);
    assert_eq!(by_sku[0].variant.sku, "LIST-1-blue-s");
}

// ---------------------------------------------------------------------------
// Section 5: Transactions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn dropped_transaction_rolls_back(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, 1, "TX-1").await;
    {
        let mut tx = storefront_db::begin(&pool).await.expect("begin");
        products::lock_product(&mut *tx, product_id)
            .await
            .expect("lock_product");
        variants::create_variant(&mut *tx, product_id, &variant("TX-1-A", "1.00", true))
            .await
            .expect("create inside tx");
    }

    let count = variants::count_variants_by_product(&pool, product_id)
        .await
        .expect("count");
    assert_eq!(count, 0);
}
