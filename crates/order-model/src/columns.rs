//! Canonical column and feature names.
//!
//! Raw column names are the snake_case form produced by header
//! normalization, so `"Order Item Discount Rate"` in an export becomes
//! [`ORDER_ITEM_DISCOUNT_RATE`].

pub const ORDER_ITEM_ID: &str = "order_item_id";
pub const PRODUCT_NAME: &str = "product_name";

pub const TYPE: &str = "type";
pub const DELIVERY_STATUS: &str = "delivery_status";
pub const CUSTOMER_COUNTRY: &str = "customer_country";
pub const CUSTOMER_SEGMENT: &str = "customer_segment";
pub const MARKET: &str = "market";
pub const SHIPPING_MODE: &str = "shipping_mode";

pub const ORDER_ITEM_DISCOUNT_RATE: &str = "order_item_discount_rate";
pub const ORDER_ITEM_PRODUCT_PRICE: &str = "order_item_product_price";
pub const ORDER_ITEM_QUANTITY: &str = "order_item_quantity";
pub const ORDER_ITEM_DISCOUNT: &str = "order_item_discount";
pub const BENEFIT_PER_ORDER: &str = "benefit_per_order";
pub const ORDER_ITEM_PROFIT_RATIO: &str = "order_item_profit_ratio";
pub const DAYS_FOR_SHIPPING_REAL: &str = "days_for_shipping_real";
pub const DAYS_FOR_SHIPMENT_SCHEDULED: &str = "days_for_shipment_scheduled";

pub const DELAY_ORDERED: &str = "DelayOrdered";
pub const DISCOUNT_PER_PRODUCT: &str = "DiscountPerProduct";
pub const BENEFIT_PER_PRODUCT: &str = "BenefitPerProduct";
pub const TOTAL_DISCOUNT_PER_PRODUCT: &str = "TotalDiscountPerProduct";
pub const MAX_DISCOUNT_PER_ORDER: &str = "MaxDiscountPerOrder";

/// Group-key columns. They partition aggregates and never reach the model.
pub const KEY_COLUMNS: [&str; 2] = [ORDER_ITEM_ID, PRODUCT_NAME];

/// Categorical columns, in encoding order.
pub const CATEGORICAL_COLUMNS: [&str; 6] = [
    TYPE,
    DELIVERY_STATUS,
    CUSTOMER_COUNTRY,
    CUSTOMER_SEGMENT,
    MARKET,
    SHIPPING_MODE,
];

/// Numeric raw columns, in record order.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    ORDER_ITEM_DISCOUNT_RATE,
    ORDER_ITEM_PRODUCT_PRICE,
    ORDER_ITEM_QUANTITY,
    ORDER_ITEM_DISCOUNT,
    BENEFIT_PER_ORDER,
    ORDER_ITEM_PROFIT_RATIO,
    DAYS_FOR_SHIPPING_REAL,
    DAYS_FOR_SHIPMENT_SCHEDULED,
];

/// Raw columns consumed by derivation and removed from the model input.
pub const CONSUMED_COLUMNS: [&str; 5] = [
    ORDER_ITEM_DISCOUNT,
    BENEFIT_PER_ORDER,
    ORDER_ITEM_PROFIT_RATIO,
    DAYS_FOR_SHIPPING_REAL,
    DAYS_FOR_SHIPMENT_SCHEDULED,
];

/// Derived feature names, in derivation order.
pub const DERIVED_FEATURES: [&str; 5] = [
    DELAY_ORDERED,
    DISCOUNT_PER_PRODUCT,
    BENEFIT_PER_PRODUCT,
    TOTAL_DISCOUNT_PER_PRODUCT,
    MAX_DISCOUNT_PER_ORDER,
];

/// Every column an upload (or a single form submission) must provide.
pub fn raw_columns() -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(
        KEY_COLUMNS.len() + CATEGORICAL_COLUMNS.len() + NUMERIC_COLUMNS.len(),
    );
    columns.extend(KEY_COLUMNS);
    columns.extend(CATEGORICAL_COLUMNS);
    columns.extend(NUMERIC_COLUMNS);
    columns
}

/// Numeric raw columns that pass straight through to the model.
pub fn passthrough_columns() -> impl Iterator<Item = &'static str> {
    NUMERIC_COLUMNS
        .into_iter()
        .filter(|name| !CONSUMED_COLUMNS.contains(name))
}

pub fn is_categorical(name: &str) -> bool {
    CATEGORICAL_COLUMNS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_excludes_consumed_columns() {
        let passthrough: Vec<&str> = passthrough_columns().collect();
        assert_eq!(
            passthrough,
            vec![
                ORDER_ITEM_DISCOUNT_RATE,
                ORDER_ITEM_PRODUCT_PRICE,
                ORDER_ITEM_QUANTITY
            ]
        );
    }

    #[test]
    fn raw_columns_are_unique() {
        let columns = raw_columns();
        let mut sorted = columns.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), columns.len());
        assert_eq!(columns.len(), 16);
    }
}
