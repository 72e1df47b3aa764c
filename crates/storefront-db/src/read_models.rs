//! Read-side projections: variants joined with their options, option
//! catalogs with usage counts, per-product aggregations, and the filtered
//! variant listing.
//!
//! Nested collections are assembled in Postgres with `jsonb_agg` so each
//! projection is a single round-trip.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgExecutor, PgPool, Postgres, QueryBuilder};
use storefront_core::VariantListRequest;

use crate::{variants::VARIANT_COLUMNS, DbError, OptionRow, VariantRow};

/// Correlated subquery producing the option selection of `pv` as a JSON array
/// ordered by option position.
const VARIANT_OPTIONS_JSON: &str = "COALESCE(( \
     SELECT jsonb_agg(jsonb_build_object( \
         'optionId', po.id, \
         'optionName', po.name, \
         'optionDisplayName', po.display_name, \
         'optionPosition', po.position, \
         'valueId', pov.id, \
         'value', pov.value, \
         'valueDisplayName', pov.display_name, \
         'colorCode', pov.color_code \
     ) ORDER BY po.position, po.name) \
     FROM variant_option_values vov \
     JOIN product_options po ON po.id = vov.option_id \
     JOIN product_option_values pov ON pov.id = vov.option_value_id \
     WHERE vov.variant_id = pv.id \
 ), '[]'::jsonb) AS options";

/// One `option = value` pair of a variant's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOption {
    pub option_id: i64,
    pub option_name: String,
    pub option_display_name: String,
    pub option_position: i32,
    pub value_id: i64,
    pub value: String,
    pub value_display_name: String,
    pub color_code: Option<String>,
}

/// A variant together with its option selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantWithOptions {
    #[serde(flatten)]
    pub variant: VariantRow,
    pub options: Vec<VariantOption>,
}

impl VariantWithOptions {
    /// The selection as `option name → value`.
    #[must_use]
    pub fn selection(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .map(|o| (o.option_name.clone(), o.value.clone()))
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct VariantWithOptionsRow {
    #[sqlx(flatten)]
    variant: VariantRow,
    options: Json<Vec<VariantOption>>,
}

impl From<VariantWithOptionsRow> for VariantWithOptions {
    fn from(row: VariantWithOptionsRow) -> Self {
        Self {
            variant: row.variant,
            options: row.options.0,
        }
    }
}

/// An option value with the number of variants that use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionValueWithCount {
    pub id: i64,
    pub value: String,
    pub display_name: String,
    pub color_code: Option<String>,
    pub position: i32,
    pub variant_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionWithValues {
    #[serde(flatten)]
    pub option: OptionRow,
    pub values: Vec<OptionValueWithCount>,
}

#[derive(sqlx::FromRow)]
struct OptionWithValuesRow {
    #[sqlx(flatten)]
    option: OptionRow,
    // `values` is a reserved word in Postgres.
    value_list: Json<Vec<OptionValueWithCount>>,
}

/// Per-product summary of its variants, used by product list views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAggregation {
    pub product_id: i64,
    pub has_variants: bool,
    pub total_variants: i64,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// First image of the default variant, falling back to the earliest
    /// variant that has an image.
    pub main_image: Option<String>,
    /// True when any variant allows purchase.
    pub allow_purchase: bool,
    pub option_names: Vec<String>,
    /// Distinct values in use per option name.
    pub option_values: BTreeMap<String, Vec<String>>,
}

impl VariantAggregation {
    #[must_use]
    pub fn empty(product_id: i64) -> Self {
        Self {
            product_id,
            has_variants: false,
            total_variants: 0,
            min_price: None,
            max_price: None,
            main_image: None,
            allow_purchase: false,
            option_names: Vec::new(),
            option_values: BTreeMap::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AggregationRow {
    product_id: i64,
    total_variants: i64,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    main_image: Option<String>,
    allow_purchase: bool,
    option_names: Json<Vec<String>>,
    option_values: Json<BTreeMap<String, Vec<String>>>,
}

impl From<AggregationRow> for VariantAggregation {
    fn from(row: AggregationRow) -> Self {
        Self {
            product_id: row.product_id,
            has_variants: row.total_variants > 0,
            total_variants: row.total_variants,
            min_price: row.min_price,
            max_price: row.max_price,
            main_image: row.main_image,
            allow_purchase: row.allow_purchase,
            option_names: row.option_names.0,
            option_values: row.option_values.0,
        }
    }
}

const AGGREGATION_QUERY: &str = "\
WITH ids AS ( \
    SELECT DISTINCT UNNEST($1::bigint[]) AS product_id \
), stats AS ( \
    SELECT pv.product_id, COUNT(*) AS total, MIN(pv.price) AS min_price, \
           MAX(pv.price) AS max_price, BOOL_OR(pv.allow_purchase) AS allow_purchase \
    FROM product_variants pv \
    WHERE pv.product_id IN (SELECT product_id FROM ids) \
    GROUP BY pv.product_id \
), main_images AS ( \
    SELECT DISTINCT ON (pv.product_id) pv.product_id, pv.images[1] AS main_image \
    FROM product_variants pv \
    WHERE pv.product_id IN (SELECT product_id FROM ids) AND cardinality(pv.images) > 0 \
    ORDER BY pv.product_id, pv.is_default DESC, pv.created_at, pv.id \
), used_values AS ( \
    SELECT DISTINCT po.product_id, po.id AS option_id, po.name, po.position AS option_position, \
           pov.value, pov.position AS value_position \
    FROM variant_option_values vov \
    JOIN product_options po ON po.id = vov.option_id \
    JOIN product_option_values pov ON pov.id = vov.option_value_id \
    WHERE po.product_id IN (SELECT product_id FROM ids) \
), per_option AS ( \
    SELECT product_id, option_id, name, option_position, \
           jsonb_agg(value ORDER BY value_position, value) AS option_values \
    FROM used_values \
    GROUP BY product_id, option_id, name, option_position \
), per_product AS ( \
    SELECT product_id, \
           jsonb_agg(name ORDER BY option_position, name) AS option_names, \
           jsonb_object_agg(name, option_values) AS option_values \
    FROM per_option \
    GROUP BY product_id \
) \
SELECT ids.product_id, \
       COALESCE(s.total, 0) AS total_variants, \
       s.min_price, s.max_price, m.main_image, \
       COALESCE(s.allow_purchase, FALSE) AS allow_purchase, \
       COALESCE(o.option_names, '[]'::jsonb) AS option_names, \
       COALESCE(o.option_values, '{}'::jsonb) AS option_values \
FROM ids \
LEFT JOIN stats s ON s.product_id = ids.product_id \
LEFT JOIN main_images m ON m.product_id = ids.product_id \
LEFT JOIN per_product o ON o.product_id = ids.product_id";

/// Every variant of a product with its option selection, ordered by
/// `(created_at, id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_variants_with_options<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Vec<VariantWithOptions>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, VariantWithOptionsRow>(&format!(
        "SELECT {VARIANT_COLUMNS}, {VARIANT_OPTIONS_JSON} \
         FROM product_variants pv \
         WHERE pv.product_id = $1 \
         ORDER BY pv.created_at, pv.id"
    ))
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(VariantWithOptions::from).collect())
}

/// Variants with the given ids and their selections, in id order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_variants_with_options_by_ids<'e, E>(
    executor: E,
    ids: &[i64],
) -> Result<Vec<VariantWithOptions>, DbError>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, VariantWithOptionsRow>(&format!(
        "SELECT {VARIANT_COLUMNS}, {VARIANT_OPTIONS_JSON} \
         FROM product_variants pv \
         WHERE pv.id = ANY($1) \
         ORDER BY pv.id"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(VariantWithOptions::from).collect())
}

/// Options of a product with their values, each value carrying the number of
/// variants that reference it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_options_with_variant_counts<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Vec<OptionWithValues>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, OptionWithValuesRow>(
        "SELECT po.id, po.product_id, po.name, po.display_name, po.position, \
                po.created_at, po.updated_at, \
                COALESCE(( \
                    SELECT jsonb_agg(jsonb_build_object( \
                        'id', pov.id, \
                        'value', pov.value, \
                        'displayName', pov.display_name, \
                        'colorCode', pov.color_code, \
                        'position', pov.position, \
                        'variantCount', vc.variant_count \
                    ) ORDER BY pov.position, pov.id) \
                    FROM product_option_values pov \
                    CROSS JOIN LATERAL ( \
                        SELECT COUNT(*) AS variant_count \
                        FROM variant_option_values vov \
                        WHERE vov.option_value_id = pov.id \
                    ) vc \
                    WHERE pov.option_id = po.id \
                ), '[]'::jsonb) AS value_list \
         FROM product_options po \
         WHERE po.product_id = $1 \
         ORDER BY po.position, po.id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| OptionWithValues {
            option: row.option,
            values: row.value_list.0,
        })
        .collect())
}

/// Aggregation for one product. A product without variants yields an empty
/// aggregation rather than an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_variant_aggregation<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<VariantAggregation, DbError>
where
    E: PgExecutor<'e>,
{
    let mut map = get_variants_aggregations(executor, &[product_id]).await?;
    Ok(map
        .remove(&product_id)
        .unwrap_or_else(|| VariantAggregation::empty(product_id)))
}

/// Aggregations for many products in one query, keyed by product id. Every
/// requested id is present in the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_variants_aggregations<'e, E>(
    executor: E,
    product_ids: &[i64],
) -> Result<HashMap<i64, VariantAggregation>, DbError>
where
    E: PgExecutor<'e>,
{
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, AggregationRow>(AGGREGATION_QUERY)
        .bind(product_ids)
        .fetch_all(executor)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.product_id, VariantAggregation::from(row)))
        .collect())
}

fn push_variant_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    request: &VariantListRequest,
    seller_id: Option<i64>,
) {
    let filters = &request.filters;
    qb.push(" FROM product_variants pv JOIN products p ON p.id = pv.product_id WHERE TRUE");

    if let Some(seller_id) = seller_id {
        qb.push(" AND p.seller_id = ").push_bind(seller_id);
    }
    if !filters.ids.is_empty() {
        qb.push(" AND pv.id = ANY(")
            .push_bind(filters.ids.clone())
            .push(")");
    }
    if !filters.product_ids.is_empty() {
        qb.push(" AND pv.product_id = ANY(")
            .push_bind(filters.product_ids.clone())
            .push(")");
    }
    if let Some(min) = filters.min_price {
        qb.push(" AND pv.price >= ").push_bind(min);
    }
    if let Some(max) = filters.max_price {
        qb.push(" AND pv.price <= ").push_bind(max);
    }
    if let Some(flag) = filters.allow_purchase {
        qb.push(" AND pv.allow_purchase = ").push_bind(flag);
    }
    if let Some(flag) = filters.is_popular {
        qb.push(" AND pv.is_popular = ").push_bind(flag);
    }
    if let Some(flag) = filters.is_default {
        qb.push(" AND pv.is_default = ").push_bind(flag);
    }
    if let Some(sku) = &filters.sku {
        qb.push(" AND pv.sku ILIKE ")
            .push_bind(format!("%{}%", escape_like(sku)));
    }
    for (name, value) in &filters.options {
        qb.push(
            " AND EXISTS (SELECT 1 FROM variant_option_values vov \
             JOIN product_options po ON po.id = vov.option_id \
             JOIN product_option_values pov ON pov.id = vov.option_value_id \
             WHERE vov.variant_id = pv.id AND po.name = ",
        )
        .push_bind(name.clone())
        .push(" AND pov.value = ")
        .push_bind(value.clone())
        .push(")");
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One page of variants matching `request`, plus the total match count.
/// `seller_id` restricts results to that seller's products.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_variants_with_filters(
    pool: &PgPool,
    request: &VariantListRequest,
    seller_id: Option<i64>,
) -> Result<(Vec<VariantWithOptions>, i64), DbError> {
    let mut count_qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*)");
    push_variant_filters(&mut count_qb, request, seller_id);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {VARIANT_COLUMNS}, {VARIANT_OPTIONS_JSON}"));
    push_variant_filters(&mut qb, request, seller_id);
    let order = request.sort_order.keyword();
    qb.push(format!(
        " ORDER BY {} {order}, pv.id {order}",
        request.sort_by.column()
    ));
    qb.push(" LIMIT ")
        .push_bind(i64::from(request.page_size))
        .push(" OFFSET ")
        .push_bind(request.offset());

    let rows = qb
        .build_query_as::<VariantWithOptionsRow>()
        .fetch_all(pool)
        .await?;

    Ok((rows.into_iter().map(VariantWithOptions::from).collect(), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("TS_01%"), "TS\\_01\\%");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn empty_aggregation_has_no_variants() {
        let agg = VariantAggregation::empty(7);
        assert_eq!(agg.product_id, 7);
        assert!(!agg.has_variants);
        assert_eq!(agg.total_variants, 0);
        assert!(agg.option_values.is_empty());
    }

    #[test]
    fn aggregation_serializes_camel_case() {
        let json = serde_json::to_value(VariantAggregation::empty(1)).expect("serialize");
        assert_eq!(json["hasVariants"], false);
        assert!(json.get("optionValues").is_some());
        assert!(json.get("mainImage").is_some());
    }

    #[test]
    fn variant_option_decodes_from_aggregated_json() {
        let raw = serde_json::json!({
            "optionId": 1,
            "optionName": "color",
            "optionDisplayName": "Color",
            "optionPosition": 0,
            "valueId": 4,
            "value": "red",
            "valueDisplayName": "Red",
            "colorCode": "#ff0000"
        });
        let option: VariantOption = serde_json::from_value(raw).expect("decode");
        assert_eq!(option.option_name, "color");
        assert_eq!(option.color_code.as_deref(), Some("#ff0000"));
    }
}
