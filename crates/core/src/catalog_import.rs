//! Vendor catalog records → upsert-ready rows.
//!
//! The vendor API is loosely typed: the same field may arrive as a JSON string,
//! a number, or be missing altogether. Every field is defaulted rather than
//! rejected, and numeric fields are read with the same prefix semantics the
//! vendor's own tooling uses (`"12.5 un"` reads as `12.5`, `"abc"` reads as nothing).

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::catalog::{
    ColorRecord, SpotPriceRecord, SpotProductRecord, MAX_TEXT_LEN, OPEN_ENDED_MAX_QUANTITY,
};

pub type VendorRecord = Map<String, Value>;

/// Number of numbered `PriceN` / `MinQtN` slots a vendor optional carries.
pub const PRICE_TIER_SLOTS: usize = 10;

const DEFAULT_SUPPLIER: &str = "SPOT";

pub fn color_records(colors: &[VendorRecord]) -> Vec<ColorRecord> {
    colors
        .iter()
        .enumerate()
        .map(|(index, color)| {
            let code = first_present(color, &["ColorCode"]).unwrap_or_else(|| index.to_string());
            let name = first_present(color, &["Description"])
                .unwrap_or_else(|| format!("Color {code}"));
            ColorRecord { name: truncate(&name), code }
        })
        .collect()
}

pub fn product_records(products: &[VendorRecord]) -> Vec<SpotProductRecord> {
    products
        .iter()
        .map(|product| SpotProductRecord {
            reference: bounded(product, &["ProdReference", "id"]),
            name: bounded(product, &["Name"]),
            short_description: bounded(product, &["ShortDescription"]),
            full_description: first_present(product, &["Description"]).unwrap_or_default(),
            material: bounded(product, &["Materials"]),
            dimensions: bounded(product, &["CombinedSizes"]),
            approximate_weight: bounded(product, &["Weight"]),
            available_colors: first_present(product, &["Colors"]).unwrap_or_default(),
            base_cost: product.get("Price").and_then(parse_decimal).unwrap_or(Decimal::ZERO),
            supplier: truncate(
                &first_present(product, &["Supplier"])
                    .unwrap_or_else(|| DEFAULT_SUPPLIER.to_string()),
            ),
            main_image: bounded(product, &["MainImage"]),
            active: true,
        })
        .collect()
}

pub fn price_records(optionals: &[VendorRecord]) -> Vec<SpotPriceRecord> {
    optionals.iter().flat_map(price_tiers).collect()
}

/// Expands the numbered tier slots of one vendor optional.
///
/// A slot counts when both its price and minimum quantity are positive. Its
/// maximum is one below the next slot's minimum when that minimum is larger,
/// otherwise the tier is open-ended.
pub fn price_tiers(optional: &VendorRecord) -> Vec<SpotPriceRecord> {
    let reference =
        first_present(optional, &["ProdReference", "ProductReference"]).unwrap_or_default();
    let mut tiers = Vec::new();

    for slot in 1..=PRICE_TIER_SLOTS {
        let price = optional.get(&format!("Price{slot}")).and_then(parse_decimal);
        let min_quantity = optional.get(&format!("MinQt{slot}")).and_then(parse_integer);

        let (Some(price), Some(min_quantity)) = (price, min_quantity) else {
            continue;
        };
        if price <= Decimal::ZERO || min_quantity <= 0 {
            continue;
        }

        let next_min = optional.get(&format!("MinQt{}", slot + 1)).and_then(parse_integer);
        let max_quantity = match next_min {
            Some(next) if next > min_quantity => next - 1,
            _ => OPEN_ENDED_MAX_QUANTITY,
        };

        tiers.push(SpotPriceRecord::new(&reference, min_quantity, max_quantity, price));
    }

    tiers
}

/// First field among `keys` holding a non-empty value, rendered as text.
fn first_present(record: &VendorRecord, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| record.get(*key)).find_map(text_value)
}

fn bounded(record: &VendorRecord, keys: &[&str]) -> String {
    truncate(&first_present(record, keys).unwrap_or_default())
}

/// Text form of a vendor value; `None` for values that count as absent
/// (null, empty string, zero, false).
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => {
            let as_float = number.as_f64().unwrap_or_default();
            if as_float == 0.0 {
                None
            } else if let Some(integer) = number.as_i64() {
                Some(integer.to_string())
            } else if as_float.fract() == 0.0 && as_float.abs() < 1e15 {
                Some(format!("{}", as_float as i64))
            } else {
                Some(number.to_string())
            }
        }
        Value::Array(items) => {
            Some(items.iter().map(|item| text_value(item).unwrap_or_default()).collect::<Vec<_>>().join(","))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

pub fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

/// Reads a decimal from the leading numeric part of a vendor value.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        _ => return None,
    };
    let prefix = float_prefix(&raw)?;
    if prefix.contains(['e', 'E']) {
        Decimal::from_scientific(&prefix).ok()
    } else {
        Decimal::from_str(&prefix).ok()
    }
}

/// Reads an integer from the leading digits of a vendor value (`"50.7"` → 50).
pub fn parse_integer(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(number) => match number.as_i64() {
            Some(integer) => return Some(integer),
            None => number.to_string(),
        },
        Value::String(text) => text.clone(),
        _ => return None,
    };

    let trimmed = raw.trim_start();
    let (negative, rest) = split_sign(trimmed);
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

/// Normalized numeric prefix (`"  -.5kg"` → `"-0.5"`), or `None` without digits.
fn float_prefix(raw: &str) -> Option<String> {
    let (negative, rest) = split_sign(raw.trim_start());
    let mut chars = rest.chars().peekable();

    let mut integer = String::new();
    while let Some(ch) = chars.next_if(char::is_ascii_digit) {
        integer.push(ch);
    }

    let mut fraction = String::new();
    if chars.next_if_eq(&'.').is_some() {
        while let Some(ch) = chars.next_if(char::is_ascii_digit) {
            fraction.push(ch);
        }
    }

    if integer.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut exponent = String::new();
    let remainder: String = chars.collect();
    if let Some(after_e) = remainder.strip_prefix(['e', 'E']) {
        let (exp_negative, exp_rest) = split_sign(after_e);
        let exp_digits: String = exp_rest.chars().take_while(char::is_ascii_digit).collect();
        if !exp_digits.is_empty() {
            exponent = format!("e{}{exp_digits}", if exp_negative { "-" } else { "" });
        }
    }

    let mut normalized = String::new();
    if negative {
        normalized.push('-');
    }
    normalized.push_str(if integer.is_empty() { "0" } else { &integer });
    if !fraction.is_empty() {
        normalized.push('.');
        normalized.push_str(&fraction);
    }
    normalized.push_str(&exponent);
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use super::{
        color_records, parse_decimal, parse_integer, price_records, price_tiers, product_records,
        VendorRecord,
    };
    use crate::domain::catalog::OPEN_ENDED_MAX_QUANTITY;

    fn record(value: Value) -> VendorRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn two_tier_optional_splits_at_next_minimum() {
        let optional = record(json!({
            "ProdReference": "MUG-01",
            "Price1": 10, "MinQt1": 1,
            "Price2": 8, "MinQt2": 50,
        }));

        let tiers = price_tiers(&optional);

        assert_eq!(tiers.len(), 2);
        assert_eq!((tiers[0].min_quantity, tiers[0].max_quantity), (1, 49));
        assert_eq!(tiers[0].unit_price, Decimal::from(10));
        assert_eq!(tiers[0].sku, "MUG-01-1-49");
        assert_eq!((tiers[1].min_quantity, tiers[1].max_quantity), (50, OPEN_ENDED_MAX_QUANTITY));
        assert_eq!(tiers[1].unit_price, Decimal::from(8));
        assert_eq!(tiers[1].sku, "MUG-01-50-999999");
    }

    #[test]
    fn invalid_slots_are_skipped_but_still_bound_previous_tier() {
        let optional = record(json!({
            "ProductReference": "PEN-7",
            "Price1": "2.50", "MinQt1": "100",
            "Price2": "0", "MinQt2": "250",
            "Price3": "abc", "MinQt3": "500",
            "Price4": "1.90", "MinQt4": "1000",
        }));

        let tiers = price_tiers(&optional);

        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0].product_reference, "PEN-7");
        assert_eq!((tiers[0].min_quantity, tiers[0].max_quantity), (100, 249));
        assert_eq!(tiers[0].unit_price, Decimal::new(250, 2));
        assert_eq!((tiers[1].min_quantity, tiers[1].max_quantity), (1000, OPEN_ENDED_MAX_QUANTITY));
    }

    #[test]
    fn non_increasing_next_minimum_leaves_tier_open_ended() {
        let optional = record(json!({
            "ProdReference": "CAP",
            "Price1": 5, "MinQt1": 100,
            "Price2": 4, "MinQt2": 100,
        }));

        let tiers = price_tiers(&optional);

        assert_eq!(tiers[0].max_quantity, OPEN_ENDED_MAX_QUANTITY);
        assert_eq!(tiers[1].max_quantity, OPEN_ENDED_MAX_QUANTITY);
    }

    #[test]
    fn price_records_flatten_all_optionals() {
        let optionals = vec![
            record(json!({"ProdReference": "A", "Price1": 1, "MinQt1": 1})),
            record(json!({"ProdReference": "B"})),
            record(json!({"ProdReference": "C", "Price1": 3, "MinQt1": 10, "Price2": 2, "MinQt2": 20})),
        ];

        let skus = price_records(&optionals).into_iter().map(|tier| tier.sku).collect::<Vec<_>>();

        assert_eq!(skus, vec!["A-1-999999", "C-10-19", "C-20-999999"]);
    }

    #[test]
    fn colors_default_code_and_name() {
        let colors = vec![
            record(json!({"ColorCode": "05", "Description": "Azul"})),
            record(json!({"Description": ""})),
            record(json!({"ColorCode": 12})),
        ];

        let rows = color_records(&colors);

        assert_eq!((rows[0].code.as_str(), rows[0].name.as_str()), ("05", "Azul"));
        assert_eq!((rows[1].code.as_str(), rows[1].name.as_str()), ("1", "Color 1"));
        assert_eq!((rows[2].code.as_str(), rows[2].name.as_str()), ("12", "Color 12"));
    }

    #[test]
    fn products_are_defaulted_and_truncated() {
        let long_name = "x".repeat(300);
        let products = vec![record(json!({
            "ProdReference": "BAG-3",
            "Name": long_name,
            "Description": "y".repeat(400),
            "Price": "not a price",
            "Colors": ["01", "05"],
        }))];

        let rows = product_records(&products);
        let product = &rows[0];

        assert_eq!(product.reference, "BAG-3");
        assert_eq!(product.name.chars().count(), 255);
        assert_eq!(product.full_description.chars().count(), 400);
        assert_eq!(product.base_cost, Decimal::ZERO);
        assert_eq!(product.supplier, "SPOT");
        assert_eq!(product.available_colors, "01,05");
        assert!(product.active);
    }

    #[test]
    fn product_reference_falls_back_to_id() {
        let rows = product_records(&[record(json!({"id": 991, "Price": 12.75}))]);

        assert_eq!(rows[0].reference, "991");
        assert_eq!(rows[0].base_cost, Decimal::new(1275, 2));
        assert_eq!(rows[0].name, "");
    }

    #[test]
    fn numeric_parsing_follows_prefix_rules() {
        assert_eq!(parse_decimal(&json!("12.5 un")), Some(Decimal::new(125, 1)));
        assert_eq!(parse_decimal(&json!(" .75")), Some(Decimal::new(75, 2)));
        assert_eq!(parse_decimal(&json!("1e2")), Some(Decimal::from(100)));
        assert_eq!(parse_decimal(&json!("abc")), None);
        assert_eq!(parse_decimal(&json!(null)), None);
        assert_eq!(parse_integer(&json!("50.7")), Some(50));
        assert_eq!(parse_integer(&json!(250)), Some(250));
        assert_eq!(parse_integer(&json!(" -3x")), Some(-3));
        assert_eq!(parse_integer(&json!("")), None);
    }
}
