//! Read-only `products` and `variants` subcommands. They run as admin and
//! print JSON to stdout.

use std::collections::BTreeMap;

use serde::Serialize;
use storefront_variants::{products, query};

/// Parses `name=value` for `--option`.
pub(crate) fn parse_selection_pair(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return Err(format!("expected name=value, got '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run_list_products(
    pool: &sqlx::PgPool,
    seller_id: Option<i64>,
    page: Option<i64>,
    page_size: Option<i64>,
) -> anyhow::Result<()> {
    let page = products::list_products(pool, seller_id, page, page_size).await?;
    print_json(&page)
}

pub(crate) async fn run_show_product(pool: &sqlx::PgPool, product_id: i64) -> anyhow::Result<()> {
    let detail = products::get_product_detail(pool, product_id, None).await?;
    print_json(&detail)
}

pub(crate) async fn run_find_variant(
    pool: &sqlx::PgPool,
    product_id: i64,
    options: Vec<(String, String)>,
) -> anyhow::Result<()> {
    if options.is_empty() {
        anyhow::bail!("pass at least one --option name=value");
    }
    let selection: BTreeMap<String, String> = options.into_iter().collect();
    let variant = query::find_variant_by_options(pool, product_id, &selection, None).await?;
    print_json(&variant)
}

pub(crate) async fn run_aggregate(pool: &sqlx::PgPool, product_id: i64) -> anyhow::Result<()> {
    let aggregation = query::get_product_variant_aggregation(pool, product_id, None).await?;
    print_json(&aggregation)
}
