use polars::df;
use polars::prelude::DataFrame;
use proptest::prelude::*;

use order_features::{
    CategoricalEncoder, DerivationIndexes, EncodingTable, FeatureAssembler, FeatureDeriver,
    FeaturePipeline,
};
use order_model::{
    ErrorKind, ExtraFieldPolicy, FeatureSchema, MissingKeyPolicy, OrderRecord, PipelineOptions,
    PredictError,
};

fn reference() -> DataFrame {
    df!(
        "order_item_id" => ["1", "2", "3"],
        "product_name" => ["A", "A", "B"],
        "type" => ["DEBIT", "CASH", "DEBIT"],
        "delivery_status" => ["Late delivery", "Shipping on time", "Late delivery"],
        "customer_country" => ["Mexico", "Francia", "Mexico"],
        "customer_segment" => ["Consumer", "Corporate", "Consumer"],
        "market" => ["LATAM", "Europe", "LATAM"],
        "shipping_mode" => ["Standard Class", "First Class", "Same Day"],
        "order_item_discount" => ["5", "10", "8"],
        "benefit_per_order" => ["20", "40", "-3"],
    )
    .expect("reference frame")
}

fn record_for_a() -> OrderRecord {
    OrderRecord {
        order_item_id: "2".to_string(),
        product_name: "A".to_string(),
        payment_type: "CASH".to_string(),
        delivery_status: "Shipping on time".to_string(),
        customer_country: "Francia".to_string(),
        customer_segment: "Corporate".to_string(),
        market: "Europe".to_string(),
        shipping_mode: "First Class".to_string(),
        order_item_discount_rate: 0.1,
        order_item_product_price: 50.0,
        order_item_quantity: 2.0,
        order_item_discount: 10.0,
        benefit_per_order: 40.0,
        order_item_profit_ratio: 0.2,
        days_for_shipping_real: 4.0,
        days_for_shipment_scheduled: 2.0,
    }
}

fn fitted() -> (DerivationIndexes, EncodingTable) {
    let reference = reference();
    let indexes = DerivationIndexes::build(&reference).expect("build indexes");
    let encodings = CategoricalEncoder::fit(&reference).expect("fit encodings");
    (indexes, encodings)
}

fn render(vector: &order_model::FeatureVector) -> String {
    vector
        .entries()
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn aggregates_for_two_products() {
    let (indexes, _) = fitted();
    assert_eq!(indexes.max_discount_by_product.lookup("A").value(), Some(10.0));
    assert_eq!(indexes.max_discount_by_product.lookup("B").value(), Some(8.0));
    let variance_a = indexes
        .discount_variance_by_product
        .lookup("A")
        .value()
        .expect("variance for A");
    assert!((variance_a - 12.5).abs() < 1e-9);
    assert_eq!(
        indexes.discount_variance_by_product.lookup("B").value(),
        Some(0.0)
    );
    assert_eq!(indexes.mean_benefit_by_product.lookup("A").value(), Some(30.0));
}

#[test]
fn record_assembles_into_standard_schema() {
    let (indexes, encodings) = fitted();
    let schema = FeatureSchema::standard();
    let options = PipelineOptions::default();
    let pipeline = FeaturePipeline::new(&indexes, &encodings, &schema, &options);

    let vector = pipeline.transform(&record_for_a()).expect("transform");
    assert!(vector.matches(&schema));
    assert_eq!(vector.get("DiscountPerProduct"), Some(10.0));
    let total = vector.get("TotalDiscountPerProduct").expect("variance feature");
    assert!((total - 12.5).abs() < 1e-9);
    assert_eq!(vector.get("order_item_discount"), None);
    assert_eq!(vector.get("benefit_per_order"), None);

    insta::assert_snapshot!(render(&vector), @r"
    order_item_discount_rate=0.1
    order_item_product_price=50
    order_item_quantity=2
    type=0
    delivery_status=1
    customer_country=0
    customer_segment=1
    market=0
    shipping_mode=0
    DelayOrdered=-2
    DiscountPerProduct=10
    BenefitPerProduct=30
    TotalDiscountPerProduct=12.5
    MaxDiscountPerOrder=10
    ");
}

#[test]
fn unseen_product_follows_missing_key_policy() {
    let (indexes, _) = fitted();
    let mut record = record_for_a();
    record.product_name = "C".to_string();

    let error = FeatureDeriver::new(&indexes, MissingKeyPolicy::Fail)
        .derive(&record)
        .unwrap_err();
    assert_eq!(
        error,
        PredictError::UnresolvedGroupKey {
            table: "max_discount_by_product".to_string(),
            key: "C".to_string(),
        }
    );

    let derived = FeatureDeriver::new(&indexes, MissingKeyPolicy::GlobalDefault)
        .derive(&record)
        .expect("derive with defaults");
    assert_eq!(derived.discount_per_product, 10.0);
    assert_eq!(derived.benefit_per_product, 19.0);
    assert_eq!(derived.max_discount_per_order, 10.0);
}

#[test]
fn unknown_category_is_reported() {
    let (indexes, encodings) = fitted();
    let schema = FeatureSchema::standard();
    let options = PipelineOptions::default();
    let pipeline = FeaturePipeline::new(&indexes, &encodings, &schema, &options);
    let mut record = record_for_a();
    record.market = "Africa".to_string();

    let error = pipeline.transform(&record).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnknownCategory);
    assert_eq!(encodings.encode("market", "Africa").unwrap_err(), error);
}

#[test]
fn schema_field_absent_from_record_is_a_mismatch() {
    let (indexes, encodings) = fitted();
    let record = record_for_a();
    let derived = FeatureDeriver::new(&indexes, MissingKeyPolicy::Fail)
        .derive(&record)
        .expect("derive");
    let encoded = encodings.apply(&record).expect("encode");
    let schema = FeatureSchema::new(["order_item_quantity", "Late_delivery_risk"]).expect("schema");

    let error = FeatureAssembler::new(ExtraFieldPolicy::Warn)
        .assemble(&record, &derived, &encoded, &schema)
        .unwrap_err();
    assert_eq!(
        error,
        PredictError::SchemaMismatch {
            missing: vec!["Late_delivery_risk".to_string()],
            unexpected: vec![],
        }
    );
}

#[test]
fn unused_fields_follow_the_schema() {
    let schema = FeatureSchema::new(["order_item_quantity", "DelayOrdered"]).expect("schema");
    let unused = FeatureAssembler::unused_fields(&schema);
    assert_eq!(unused.len(), 12);
    assert!(unused.contains(&"market".to_string()));
    assert!(!unused.contains(&"DelayOrdered".to_string()));
    assert!(FeatureAssembler::unused_fields(&FeatureSchema::standard()).is_empty());
}

#[test]
fn reject_policy_refuses_extra_fields() {
    let (indexes, encodings) = fitted();
    let record = record_for_a();
    let derived = FeatureDeriver::new(&indexes, MissingKeyPolicy::Fail)
        .derive(&record)
        .expect("derive");
    let encoded = encodings.apply(&record).expect("encode");
    let schema = FeatureSchema::new(["order_item_quantity", "DelayOrdered"]).expect("schema");

    let warned = FeatureAssembler::new(ExtraFieldPolicy::Warn)
        .assemble(&record, &derived, &encoded, &schema)
        .expect("extra fields dropped");
    assert_eq!(warned.values(), vec![2.0, -2.0]);

    let error = FeatureAssembler::new(ExtraFieldPolicy::Reject)
        .assemble(&record, &derived, &encoded, &schema)
        .unwrap_err();
    match error {
        PredictError::SchemaMismatch { missing, unexpected } => {
            assert!(missing.is_empty());
            assert_eq!(unexpected.len(), 12);
            assert!(unexpected.contains(&"market".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

proptest! {
    #[test]
    fn assemble_emits_schema_fields_in_schema_order(
        names in prop::sample::subsequence(
            FeatureSchema::standard().names().to_vec(),
            1..=14,
        )
        .prop_shuffle()
    ) {
        let (indexes, encodings) = fitted();
        let schema = FeatureSchema::new(names.clone()).expect("schema");
        let options = PipelineOptions::default();
        let pipeline = FeaturePipeline::new(&indexes, &encodings, &schema, &options);
        let vector = pipeline.transform(&record_for_a()).expect("transform");
        let emitted: Vec<String> = vector.names().map(str::to_string).collect();
        prop_assert_eq!(emitted, names);
    }

    #[test]
    fn encoding_is_idempotent_and_order_independent(
        values in prop::collection::vec("[A-Za-z ]{1,8}", 1..20)
    ) {
        let forward = CategoricalEncoder::fit_values(&values);
        let mut reversed_values = values.clone();
        reversed_values.reverse();
        let reversed = CategoricalEncoder::fit_values(&reversed_values);
        prop_assert_eq!(&forward, &reversed);

        let table = EncodingTable::from_columns([("market", forward)]);
        for value in values.iter().filter(|value| !value.trim().is_empty()) {
            let first = table.encode("market", value).expect("known value");
            let second = table.encode("market", value).expect("known value");
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn derivation_is_deterministic(scheduled in 0.0f64..10.0, real in 0.0f64..10.0) {
        let (indexes, _) = fitted();
        let mut record = record_for_a();
        record.days_for_shipment_scheduled = scheduled;
        record.days_for_shipping_real = real;
        let deriver = FeatureDeriver::new(&indexes, MissingKeyPolicy::Fail);
        let first = deriver.derive(&record).expect("derive");
        let second = deriver.derive(&record).expect("derive");
        prop_assert_eq!(first, second);
        prop_assert_eq!(first.delay_ordered, scheduled - real);
    }
}
