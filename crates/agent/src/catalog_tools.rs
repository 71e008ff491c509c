//! Tools the hosted assistant calls while answering a customer.
//!
//! Wire names, argument keys and result keys match the function definitions
//! configured on the assistant, which is why they are in Portuguese.

use std::sync::Arc;

use async_trait::async_trait;
use lucia_db::{CatalogRepository, RepositoryError};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::leads::{LeadNotifier, LeadQualification};
use crate::tools::{parse_arguments, Tool, ToolError, ToolRegistry};

pub const PRICE_LOOKUP_TOOL: &str = "buscar_preco_final";
pub const SPOT_INVENTORY_TOOL: &str = "buscar_estoque_spot";
pub const QUALIFY_LEAD_TOOL: &str = "finalizar_qualificacao";

const PRODUCT_NOT_FOUND: &str = "Produto não encontrado.";
const PRICE_NOT_FOUND: &str = "Não foi possível encontrar um preço para esta combinação.";
const SPOT_PRODUCT_NOT_FOUND: &str = "Produto não encontrado no catálogo Spot.";
const SPOT_PRICE_NOT_FOUND: &str = "Preço não disponível para esta quantidade.";
const LEAD_NOTIFY_FAILED: &str = "Ocorreu um erro ao notificar a equipe.";
const LEAD_SENT: &str = "Lead enviado para a equipe.";
const LEAD_SKIPPED: &str = "Qualificação registrada, mas notificação pulada.";
const STATUS_SUCCESS: &str = "sucesso";

/// Registry holding the three catalog tools.
pub fn catalog_registry(
    catalog: Arc<dyn CatalogRepository>,
    notifier: Option<Arc<dyn LeadNotifier>>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(PriceLookupTool::new(catalog.clone()));
    registry.register(SpotInventoryTool::new(catalog));
    registry.register(QualifyLeadTool::new(notifier));
    registry
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|error| ToolError::Failed(error.to_string()))
}

fn lookup_failure(tool: &'static str, error: &RepositoryError, message: &str) -> ToolError {
    warn!(event_name = "agent.tool.lookup_failed", tool, error = %error, "catalog lookup failed");
    ToolError::Failed(message.to_string())
}

/// Accepts `100`, `100.0` and `"100"`; the model does not always emit integer literals.
fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let as_whole = |number: f64| {
        (number.is_finite() && number.fract() == 0.0 && number.abs() < i64::MAX as f64)
            .then_some(number as i64)
    };
    let parsed = match &value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().and_then(as_whole)),
        Value::String(text) => text.trim().parse::<f64>().ok().and_then(as_whole),
        _ => None,
    };
    parsed.ok_or_else(|| de::Error::custom(format!("expected a whole number, got {value}")))
}

#[derive(Debug, Deserialize)]
struct PriceLookupArgs {
    nome_produto: String,
    #[serde(deserialize_with = "whole_number")]
    quantidade: i64,
    #[serde(deserialize_with = "whole_number")]
    areas_personalizacao: i64,
}

#[derive(Debug, Serialize)]
struct PriceQuote {
    #[serde(with = "rust_decimal::serde::float")]
    preco_final: Decimal,
}

/// Unit price of a customizable catalog product for a quantity and area count.
pub struct PriceLookupTool {
    catalog: Arc<dyn CatalogRepository>,
}

impl PriceLookupTool {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for PriceLookupTool {
    fn name(&self) -> &'static str {
        PRICE_LOOKUP_TOOL
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: PriceLookupArgs = parse_arguments(self.name(), input)?;
        info!(
            event_name = "agent.tool.price_lookup",
            product = %args.nome_produto,
            quantity = args.quantidade,
            areas = args.areas_personalizacao,
            "looking up catalog price"
        );

        let product = self
            .catalog
            .find_catalog_product(&args.nome_produto)
            .await
            .map_err(|error| lookup_failure(self.name(), &error, PRODUCT_NOT_FOUND))?
            .ok_or_else(|| ToolError::Failed(PRODUCT_NOT_FOUND.to_string()))?;

        let tier = self
            .catalog
            .find_catalog_price(&product.sku_base, args.areas_personalizacao, args.quantidade)
            .await
            .map_err(|error| lookup_failure(self.name(), &error, PRICE_NOT_FOUND))?
            .ok_or_else(|| ToolError::Failed(PRICE_NOT_FOUND.to_string()))?;

        to_payload(&PriceQuote { preco_final: tier.unit_price })
    }
}

#[derive(Debug, Deserialize)]
struct SpotInventoryArgs {
    nome_produto: String,
    #[serde(deserialize_with = "whole_number")]
    quantidade: i64,
}

#[derive(Debug, Serialize)]
struct SpotQuote {
    referencia: String,
    nome: String,
    descricao: String,
    quantidade_solicitada: i64,
    #[serde(with = "rust_decimal::serde::float")]
    preco_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    preco_total: Decimal,
    disponivel: bool,
}

/// Ready-stock product quote: exact reference first, then name match.
pub struct SpotInventoryTool {
    catalog: Arc<dyn CatalogRepository>,
}

impl SpotInventoryTool {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SpotInventoryTool {
    fn name(&self) -> &'static str {
        SPOT_INVENTORY_TOOL
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: SpotInventoryArgs = parse_arguments(self.name(), input)?;
        info!(
            event_name = "agent.tool.spot_lookup",
            product = %args.nome_produto,
            quantity = args.quantidade,
            "looking up spot inventory"
        );

        // A failed reference lookup (including an ambiguous one) skips the name fallback.
        let by_reference = self
            .catalog
            .find_spot_product_by_reference(&args.nome_produto)
            .await
            .map_err(|error| lookup_failure(self.name(), &error, SPOT_PRODUCT_NOT_FOUND))?;

        let product = match by_reference {
            Some(product) => product,
            None => self
                .catalog
                .find_spot_product_by_name(&args.nome_produto)
                .await
                .map_err(|error| lookup_failure(self.name(), &error, SPOT_PRODUCT_NOT_FOUND))?
                .ok_or_else(|| ToolError::Failed(SPOT_PRODUCT_NOT_FOUND.to_string()))?,
        };

        let tier = self
            .catalog
            .find_spot_price(product.id, args.quantidade)
            .await
            .map_err(|error| lookup_failure(self.name(), &error, SPOT_PRICE_NOT_FOUND))?
            .ok_or_else(|| ToolError::Failed(SPOT_PRICE_NOT_FOUND.to_string()))?;

        to_payload(&SpotQuote {
            referencia: product.reference,
            nome: product.name,
            descricao: product.short_description,
            quantidade_solicitada: args.quantidade,
            preco_unitario: tier.unit_price,
            preco_total: tier.unit_price * Decimal::from(args.quantidade),
            disponivel: true,
        })
    }
}

#[derive(Debug, Serialize)]
struct LeadAcknowledgement {
    status: &'static str,
    mensagem: &'static str,
}

/// Hands a qualified lead to the sales team through the configured webhook.
pub struct QualifyLeadTool {
    notifier: Option<Arc<dyn LeadNotifier>>,
}

impl QualifyLeadTool {
    pub fn new(notifier: Option<Arc<dyn LeadNotifier>>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Tool for QualifyLeadTool {
    fn name(&self) -> &'static str {
        QUALIFY_LEAD_TOOL
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let lead: LeadQualification = parse_arguments(self.name(), input)?;
        info!(
            event_name = "agent.tool.qualify_lead",
            classification = %lead.classification,
            "qualifying lead"
        );

        let Some(notifier) = &self.notifier else {
            info!(event_name = "agent.tool.qualify_lead.skipped", "no lead webhook configured");
            return to_payload(&LeadAcknowledgement { status: STATUS_SUCCESS, mensagem: LEAD_SKIPPED });
        };

        notifier.notify(&lead).await.map_err(|error| {
            warn!(event_name = "agent.tool.qualify_lead.failed", error = %error, "lead webhook failed");
            ToolError::Failed(LEAD_NOTIFY_FAILED.to_string())
        })?;

        to_payload(&LeadAcknowledgement { status: STATUS_SUCCESS, mensagem: LEAD_SENT })
    }
}
