use std::str::FromStr;

use async_trait::async_trait;
use lucia_core::domain::catalog::{
    CatalogPriceTier, CatalogProduct, ColorRecord, SpotPriceRecord, SpotPriceTier, SpotProduct,
    SpotProductRecord,
};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::{
    dedupe_last_wins, name_matches, single, CatalogRepository, CatalogWriter, RepositoryError,
};
use crate::DbPool;

/// SQLite-backed catalog store serving both tool reads and sync upserts.
///
/// Keyed lookups fetch at most two rows so a multi-row match is reported as
/// ambiguous without scanning the whole result. Name lookups fold case in
/// Rust because SQLite `LOWER` only folds ASCII.
#[derive(Clone)]
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal in {column}: {error}")))
}

fn spot_product_from_row(row: &SqliteRow) -> Result<SpotProduct, RepositoryError> {
    Ok(SpotProduct {
        id: row.try_get("id")?,
        reference: row.try_get("referencia_spot")?,
        name: row.try_get("nome_produto")?,
        short_description: row.try_get("descricao_curta")?,
        base_cost: decimal_column(row, "preco_custo_base_text")?,
    })
}

const SPOT_PRODUCT_COLUMNS: &str = r#"
    SELECT id, referencia_spot, nome_produto, descricao_curta,
           CAST(preco_custo_base AS TEXT) AS preco_custo_base_text
    FROM spot_produtos
"#;

#[async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_catalog_product(
        &self,
        name_fragment: &str,
    ) -> Result<Option<CatalogProduct>, RepositoryError> {
        let rows = sqlx::query("SELECT sku_base, nome_produto FROM produtos ORDER BY sku_base")
            .fetch_all(&self.pool)
            .await?;

        let products = rows
            .iter()
            .filter(|row| {
                row.try_get::<String, _>("nome_produto")
                    .is_ok_and(|name| name_matches(&name, name_fragment))
            })
            .take(2)
            .map(|row| {
                Ok(CatalogProduct {
                    sku_base: row.try_get("sku_base")?,
                    name: row.try_get("nome_produto")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        single(products, "produtos")
    }

    async fn find_catalog_price(
        &self,
        product_sku: &str,
        area_count: i64,
        quantity: i64,
    ) -> Result<Option<CatalogPriceTier>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT produto_sku, num_areas, quantidade_min, quantidade_max,
                   CAST(preco_unitario AS TEXT) AS preco_unitario_text
            FROM precos
            WHERE produto_sku = ?
              AND num_areas = ?
              AND quantidade_min <= ?
              AND quantidade_max >= ?
            LIMIT 2
            "#,
        )
        .bind(product_sku)
        .bind(area_count)
        .bind(quantity)
        .bind(quantity)
        .fetch_all(&self.pool)
        .await?;

        let tiers = rows
            .iter()
            .map(|row| {
                Ok(CatalogPriceTier {
                    product_sku: row.try_get("produto_sku")?,
                    area_count: row.try_get("num_areas")?,
                    min_quantity: row.try_get("quantidade_min")?,
                    max_quantity: row.try_get("quantidade_max")?,
                    unit_price: decimal_column(row, "preco_unitario_text")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        single(tiers, "precos")
    }

    async fn find_spot_product_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<SpotProduct>, RepositoryError> {
        let sql = format!("{SPOT_PRODUCT_COLUMNS} WHERE referencia_spot = ? LIMIT 2");
        let rows = sqlx::query(&sql)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        let products = rows.iter().map(spot_product_from_row).collect::<Result<Vec<_>, _>>()?;
        single(products, "spot_produtos")
    }

    async fn find_spot_product_by_name(
        &self,
        name_fragment: &str,
    ) -> Result<Option<SpotProduct>, RepositoryError> {
        let sql = format!("{SPOT_PRODUCT_COLUMNS} ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let products = rows
            .iter()
            .filter(|row| {
                row.try_get::<String, _>("nome_produto")
                    .is_ok_and(|name| name_matches(&name, name_fragment))
            })
            .take(2)
            .map(spot_product_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        single(products, "spot_produtos")
    }

    async fn find_spot_price(
        &self,
        product_id: i64,
        quantity: i64,
    ) -> Result<Option<SpotPriceTier>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT produto_id, quantidade_minima, quantidade_maxima,
                   CAST(preco_unitario AS TEXT) AS preco_unitario_text
            FROM spot_precos
            WHERE produto_id = ?
              AND quantidade_minima <= ?
              AND quantidade_maxima >= ?
            LIMIT 2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(quantity)
        .fetch_all(&self.pool)
        .await?;

        let tiers = rows
            .iter()
            .map(|row| {
                Ok(SpotPriceTier {
                    product_id: row.try_get("produto_id")?,
                    min_quantity: row.try_get("quantidade_minima")?,
                    max_quantity: row.try_get("quantidade_maxima")?,
                    unit_price: decimal_column(row, "preco_unitario_text")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        single(tiers, "spot_precos")
    }
}

#[async_trait]
impl CatalogWriter for SqlCatalogRepository {
    async fn upsert_colors(&self, batch: &[ColorRecord]) -> Result<u64, RepositoryError> {
        let colors = dedupe_last_wins(batch, |color| color.code.clone());
        if colors.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("INSERT INTO spot_cores (codigo_cor, nome_cor) ");
        builder.push_values(colors.iter(), |mut row, color| {
            row.push_bind(&color.code).push_bind(&color.name);
        });
        builder.push(
            " ON CONFLICT (codigo_cor) DO UPDATE SET \
             nome_cor = excluded.nome_cor, \
             atualizado_em = CURRENT_TIMESTAMP",
        );

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert_products(&self, batch: &[SpotProductRecord]) -> Result<u64, RepositoryError> {
        let products = dedupe_last_wins(batch, |product| product.reference.clone());
        if products.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "INSERT INTO spot_produtos (referencia_spot, nome_produto, descricao_curta, \
             descricao_completa, material, dimensoes, peso_aprox, cores_disponiveis, \
             preco_custo_base, fornecedor, imagem_principal, ativo) ",
        );
        builder.push_values(products.iter(), |mut row, product| {
            row.push_bind(&product.reference)
                .push_bind(&product.name)
                .push_bind(&product.short_description)
                .push_bind(&product.full_description)
                .push_bind(&product.material)
                .push_bind(&product.dimensions)
                .push_bind(&product.approximate_weight)
                .push_bind(&product.available_colors)
                .push_bind(product.base_cost.to_string())
                .push_bind(&product.supplier)
                .push_bind(&product.main_image)
                .push_bind(product.active);
        });
        builder.push(
            " ON CONFLICT (referencia_spot) DO UPDATE SET \
             nome_produto = excluded.nome_produto, \
             descricao_curta = excluded.descricao_curta, \
             descricao_completa = excluded.descricao_completa, \
             material = excluded.material, \
             dimensoes = excluded.dimensoes, \
             peso_aprox = excluded.peso_aprox, \
             cores_disponiveis = excluded.cores_disponiveis, \
             preco_custo_base = excluded.preco_custo_base, \
             fornecedor = excluded.fornecedor, \
             imagem_principal = excluded.imagem_principal, \
             ativo = excluded.ativo, \
             atualizado_em = CURRENT_TIMESTAMP",
        );

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert_prices(&self, batch: &[SpotPriceRecord]) -> Result<u64, RepositoryError> {
        let prices = dedupe_last_wins(batch, |price| price.sku.clone());
        if prices.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "INSERT INTO spot_precos (produto_id, referencia_spot, sku, quantidade_minima, \
             quantidade_maxima, preco_unitario) ",
        );
        builder.push_values(prices.iter(), |mut row, price| {
            row.push("(SELECT id FROM spot_produtos WHERE referencia_spot = ")
                .push_bind_unseparated(&price.product_reference)
                .push_unseparated(")")
                .push_bind(&price.product_reference)
                .push_bind(&price.sku)
                .push_bind(price.min_quantity)
                .push_bind(price.max_quantity)
                .push_bind(price.unit_price.to_string());
        });
        builder.push(
            " ON CONFLICT (sku) DO UPDATE SET \
             produto_id = excluded.produto_id, \
             referencia_spot = excluded.referencia_spot, \
             quantidade_minima = excluded.quantidade_minima, \
             quantidade_maxima = excluded.quantidade_maxima, \
             preco_unitario = excluded.preco_unitario, \
             atualizado_em = CURRENT_TIMESTAMP",
        );

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
