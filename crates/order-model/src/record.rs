//! Raw order record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::columns::{
    self, BENEFIT_PER_ORDER, CUSTOMER_COUNTRY, CUSTOMER_SEGMENT, DAYS_FOR_SHIPMENT_SCHEDULED,
    DAYS_FOR_SHIPPING_REAL, DELIVERY_STATUS, MARKET, ORDER_ITEM_DISCOUNT,
    ORDER_ITEM_DISCOUNT_RATE, ORDER_ITEM_ID, ORDER_ITEM_PRODUCT_PRICE, ORDER_ITEM_PROFIT_RATIO,
    ORDER_ITEM_QUANTITY, PRODUCT_NAME, SHIPPING_MODE, TYPE,
};
use crate::error::{PredictError, Result};

/// One row of raw input, as uploaded or submitted through a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_item_id: String,
    pub product_name: String,

    #[serde(rename = "type")]
    pub payment_type: String,
    pub delivery_status: String,
    pub customer_country: String,
    pub customer_segment: String,
    pub market: String,
    pub shipping_mode: String,

    pub order_item_discount_rate: f64,
    pub order_item_product_price: f64,
    pub order_item_quantity: f64,
    pub order_item_discount: f64,
    pub benefit_per_order: f64,
    pub order_item_profit_ratio: f64,
    /// Actual shipping days.
    pub days_for_shipping_real: f64,
    /// Scheduled shipping days.
    pub days_for_shipment_scheduled: f64,
}

impl OrderRecord {
    /// Parse a record from named string fields (a form submission).
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Result<Self> {
        Self::from_lookup(|name| fields.get(name).map(String::as_str))
    }

    /// Parse a record from any name-to-value lookup.
    ///
    /// Absent columns are reported together as a schema mismatch; blank or
    /// unparseable values as malformed input for the first offending column.
    pub fn from_lookup<'a, F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let missing: Vec<&str> = columns::raw_columns()
            .into_iter()
            .filter(|name| lookup(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(PredictError::missing_columns(missing));
        }
        let text = |name: &str| -> Result<String> {
            let value = lookup(name).unwrap_or_default().trim();
            if value.is_empty() {
                return Err(PredictError::malformed(name, value, "missing value"));
            }
            Ok(value.to_string())
        };
        let number = |name: &str| -> Result<f64> { parse_number(name, lookup(name).unwrap_or_default()) };

        Ok(Self {
            order_item_id: text(ORDER_ITEM_ID)?,
            product_name: text(PRODUCT_NAME)?,
            payment_type: text(TYPE)?,
            delivery_status: text(DELIVERY_STATUS)?,
            customer_country: text(CUSTOMER_COUNTRY)?,
            customer_segment: text(CUSTOMER_SEGMENT)?,
            market: text(MARKET)?,
            shipping_mode: text(SHIPPING_MODE)?,
            order_item_discount_rate: number(ORDER_ITEM_DISCOUNT_RATE)?,
            order_item_product_price: number(ORDER_ITEM_PRODUCT_PRICE)?,
            order_item_quantity: number(ORDER_ITEM_QUANTITY)?,
            order_item_discount: number(ORDER_ITEM_DISCOUNT)?,
            benefit_per_order: number(BENEFIT_PER_ORDER)?,
            order_item_profit_ratio: number(ORDER_ITEM_PROFIT_RATIO)?,
            days_for_shipping_real: number(DAYS_FOR_SHIPPING_REAL)?,
            days_for_shipment_scheduled: number(DAYS_FOR_SHIPMENT_SCHEDULED)?,
        })
    }

    /// Raw value of a categorical column.
    pub fn categorical(&self, column: &str) -> Option<&str> {
        let value = match column {
            TYPE => &self.payment_type,
            DELIVERY_STATUS => &self.delivery_status,
            CUSTOMER_COUNTRY => &self.customer_country,
            CUSTOMER_SEGMENT => &self.customer_segment,
            MARKET => &self.market,
            SHIPPING_MODE => &self.shipping_mode,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Value of a numeric raw column.
    pub fn numeric(&self, column: &str) -> Option<f64> {
        let value = match column {
            ORDER_ITEM_DISCOUNT_RATE => self.order_item_discount_rate,
            ORDER_ITEM_PRODUCT_PRICE => self.order_item_product_price,
            ORDER_ITEM_QUANTITY => self.order_item_quantity,
            ORDER_ITEM_DISCOUNT => self.order_item_discount,
            BENEFIT_PER_ORDER => self.benefit_per_order,
            ORDER_ITEM_PROFIT_RATIO => self.order_item_profit_ratio,
            DAYS_FOR_SHIPPING_REAL => self.days_for_shipping_real,
            DAYS_FOR_SHIPMENT_SCHEDULED => self.days_for_shipment_scheduled,
            _ => return None,
        };
        Some(value)
    }

    /// Numeric columns that feed the model directly. Columns consumed by
    /// derivation are excluded.
    pub fn passthrough_numerics(&self) -> Vec<(&'static str, f64)> {
        columns::passthrough_columns()
            .filter_map(|name| self.numeric(name).map(|value| (name, value)))
            .collect()
    }
}

/// Parse a numeric cell, rejecting blanks and non-finite values.
pub fn parse_number(column: &str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PredictError::malformed(column, trimmed, "missing value"));
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(PredictError::malformed(column, trimmed, "value is not finite")),
        Err(_) => Err(PredictError::malformed(column, trimmed, "not a number")),
    }
}
