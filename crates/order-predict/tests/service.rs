use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use polars::df;
use proptest::prelude::*;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use order_artifact::{Manifest, ManifestHeader, ModelArtifact, ModelError, Predictor, ReferenceInfo};
use order_features::{CategoricalEncoder, DerivationIndexes};
use order_ingest::{CsvTable, read_csv_from};
use order_model::columns::{self, DELAY_ORDERED, MARKET, ORDER_ITEM_QUANTITY};
use order_model::{ErrorKind, FeatureSchema, FeatureVector, PipelineOptions, PredictError, Prediction};
use order_predict::PredictionService;

/// Labels a row by the sign of its delay; the score is the delay itself.
struct DelaySign {
    names: Vec<String>,
}

impl Predictor for DelaySign {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Prediction>, ModelError> {
        Ok(features
            .iter()
            .map(|vector| {
                let delay = vector.get(DELAY_ORDERED).unwrap_or(f64::NAN);
                let label = if delay < 0.0 { "late" } else { "on_time" };
                Prediction::new(label, delay)
            })
            .collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }
}

struct Unavailable {
    names: Vec<String>,
}

impl Predictor for Unavailable {
    fn predict(&self, _features: &[FeatureVector]) -> Result<Vec<Prediction>, ModelError> {
        Err(ModelError::Evaluation("backend unavailable".to_string()))
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }
}

fn standard_names() -> Vec<String> {
    FeatureSchema::standard().names().to_vec()
}

fn artifact(predictor: Arc<dyn Predictor>) -> Arc<ModelArtifact> {
    artifact_with_schema(predictor, FeatureSchema::standard())
}

fn artifact_with_schema(predictor: Arc<dyn Predictor>, schema: FeatureSchema) -> Arc<ModelArtifact> {
    let reference = df!(
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
    .expect("reference frame");
    let manifest = Manifest {
        manifest: ManifestHeader {
            schema: "order-risk.artifact-manifest".to_string(),
            schema_version: 1,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            builder: None,
        },
        reference: ReferenceInfo {
            sha256: "0".repeat(64),
            rows: reference.height(),
        },
        files: Vec::new(),
    };
    let artifact = ModelArtifact::from_parts(
        manifest,
        schema,
        DerivationIndexes::build(&reference).expect("indexes"),
        CategoricalEncoder::fit(&reference).expect("encodings"),
        predictor,
    )
    .expect("artifact");
    Arc::new(artifact)
}

fn delay_sign_service(options: PipelineOptions) -> PredictionService {
    let predictor = Arc::new(DelaySign {
        names: standard_names(),
    });
    PredictionService::new(artifact(predictor), options)
}

fn fields(scheduled: u32, real: u32) -> BTreeMap<String, String> {
    [
        ("order_item_id", "2".to_string()),
        ("product_name", "A".to_string()),
        ("type", "CASH".to_string()),
        ("delivery_status", "Shipping on time".to_string()),
        ("customer_country", "Francia".to_string()),
        ("customer_segment", "Corporate".to_string()),
        ("market", "Europe".to_string()),
        ("shipping_mode", "First Class".to_string()),
        ("order_item_discount_rate", "0.1".to_string()),
        ("order_item_product_price", "50".to_string()),
        ("order_item_quantity", "2".to_string()),
        ("order_item_discount", "10".to_string()),
        ("benefit_per_order", "40".to_string()),
        ("order_item_profit_ratio", "0.2".to_string()),
        ("days_for_shipping_real", real.to_string()),
        ("days_for_shipment_scheduled", scheduled.to_string()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

fn table(rows: &[BTreeMap<String, String>], skip: &[&str]) -> CsvTable {
    let headers: Vec<String> = columns::raw_columns()
        .into_iter()
        .filter(|name| !skip.contains(name))
        .map(str::to_string)
        .collect();
    let rows = rows
        .iter()
        .map(|row| {
            Ok(headers
                .iter()
                .map(|name| row.get(name).cloned().unwrap_or_default())
                .collect())
        })
        .collect();
    CsvTable { headers, rows }
}

#[test]
fn form_submission_predicts_one_record() {
    let service = delay_sign_service(PipelineOptions::default());
    let prediction = service.predict_fields(&fields(2, 4)).expect("prediction");
    assert_eq!(prediction, Prediction::new("late", -2.0));
}

#[test]
fn single_record_propagates_first_error() {
    let service = delay_sign_service(PipelineOptions::default());
    let mut form = fields(2, 4);
    form.insert(MARKET.to_string(), "Africa".to_string());
    let error = service.predict_fields(&form).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnknownCategory);
}

#[test]
fn missing_market_column_rejects_whole_upload() {
    let service = delay_sign_service(PipelineOptions::default());
    let upload = table(&[fields(2, 4), fields(4, 2)], &[MARKET]);
    let error = service.predict_batch(&upload).unwrap_err();
    assert_eq!(error, PredictError::missing_columns([MARKET]));
}

#[test]
fn row_errors_are_captured_per_row() {
    let service = delay_sign_service(PipelineOptions::default().with_chunk_size(2));
    let mut bad_number = fields(1, 1);
    bad_number.insert(ORDER_ITEM_QUANTITY.to_string(), "two".to_string());
    let mut unseen_product = fields(1, 1);
    unseen_product.insert("product_name".to_string(), "C".to_string());
    let upload = table(&[fields(2, 4), bad_number, unseen_product, fields(3, 1)], &[]);

    let batch = service.predict_batch(&upload).expect("batch");
    assert_eq!(batch.len(), 4);
    assert_eq!(batch.labels(), vec![Some("late"), None, None, Some("on_time")]);
    assert!(matches!(
        batch.rows[1].error(),
        Some(PredictError::MalformedInput { row: Some(1), .. })
    ));
    assert_eq!(
        batch.rows[2].error().map(PredictError::kind),
        Some(ErrorKind::UnresolvedGroupKey)
    );
    assert_eq!(batch.error_counts().len(), 2);
}

#[test]
fn unreadable_rows_fail_alone() {
    let headers = columns::raw_columns();
    let line = |row: &BTreeMap<String, String>| {
        headers
            .iter()
            .map(|name| row.get(*name).cloned().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",")
    };
    let mut upload = format!("{}\n{}\n", headers.join(","), line(&fields(2, 4))).into_bytes();
    let mut undecodable = fields(1, 1);
    undecodable.insert(MARKET.to_string(), "<market>".to_string());
    let undecodable = line(&undecodable);
    let (before, after) = undecodable.split_once("<market>").expect("placeholder");
    upload.extend_from_slice(before.as_bytes());
    upload.extend_from_slice(&[0xff, 0xfe]);
    upload.extend_from_slice(after.as_bytes());
    upload.extend_from_slice(format!("\n{},EXTRA,CELLS\n", line(&fields(1, 1))).as_bytes());
    upload.extend_from_slice(format!("{}\n", line(&fields(3, 1))).as_bytes());

    let table = read_csv_from(upload.as_slice(), ',').expect("upload is readable");
    let service = delay_sign_service(PipelineOptions::default());
    let batch = service.predict_batch(&table).expect("batch");
    assert_eq!(batch.len(), 4);
    assert_eq!(batch.labels(), vec![Some("late"), None, None, Some("on_time")]);
    assert!(matches!(
        batch.rows[1].error(),
        Some(PredictError::MalformedInput { row: Some(1), column, .. }) if column == MARKET
    ));
    assert!(matches!(
        batch.rows[2].error(),
        Some(PredictError::MalformedInput { row: Some(2), reason, .. })
            if reason == "row has 18 fields, header has 16"
    ));
}

/// Counts warn-level events.
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn unused_fields_are_reported_once_per_service() {
    let schema = FeatureSchema::new([DELAY_ORDERED, ORDER_ITEM_QUANTITY]).expect("schema");
    let predictor = Arc::new(DelaySign {
        names: schema.names().to_vec(),
    });
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());

    let batch = tracing::subscriber::with_default(subscriber, || {
        let service = PredictionService::new(
            artifact_with_schema(predictor, schema),
            PipelineOptions::default().with_parallel(false).with_chunk_size(2),
        );
        let upload = table(&[fields(2, 4), fields(1, 1), fields(3, 1), fields(5, 1)], &[]);
        service.predict_batch(&upload).expect("batch")
    });
    assert_eq!(batch.predicted_count(), 4);
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
}

#[test]
fn predictor_failure_is_terminal() {
    let service = PredictionService::new(
        artifact(Arc::new(Unavailable {
            names: standard_names(),
        })),
        PipelineOptions::default(),
    );
    let upload = table(&[fields(2, 4)], &[]);
    let error = service.predict_batch(&upload).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ModelInvocation);
    assert!(error.to_string().contains("backend unavailable"));
}

#[test]
fn chunks_report_totals_and_stop_after_failure() {
    let service = PredictionService::new(
        artifact(Arc::new(Unavailable {
            names: standard_names(),
        })),
        PipelineOptions::default().with_chunk_size(1),
    );
    let upload = table(&[fields(2, 4), fields(1, 1), fields(3, 1)], &[]);
    let mut chunks = service.batch_chunks(&upload).expect("layout");
    assert_eq!(chunks.total_chunks(), 3);
    assert!(matches!(chunks.next(), Some(Err(_))));
    assert!(chunks.next().is_none());
}

#[test]
fn empty_upload_yields_empty_batch() {
    let service = delay_sign_service(PipelineOptions::default());
    let batch = service.predict_batch(&table(&[], &[])).expect("batch");
    assert!(batch.is_empty());
}

proptest! {
    #[test]
    fn batch_output_is_aligned_with_input(
        rows in prop::collection::vec((0u32..6, 0u32..6, any::<bool>()), 0..40),
        chunk_size in 1usize..8,
        parallel in any::<bool>(),
    ) {
        let options = PipelineOptions::default()
            .with_chunk_size(chunk_size)
            .with_parallel(parallel);
        let service = delay_sign_service(options);
        let input: Vec<BTreeMap<String, String>> = rows
            .iter()
            .map(|&(scheduled, real, broken)| {
                let mut row = fields(scheduled, real);
                if broken {
                    row.insert(ORDER_ITEM_QUANTITY.to_string(), "n/a".to_string());
                }
                row
            })
            .collect();

        let batch = service.predict_batch(&table(&input, &[])).expect("batch");
        prop_assert_eq!(batch.len(), rows.len());
        for (idx, (outcome, &(scheduled, real, broken))) in batch.rows.iter().zip(&rows).enumerate() {
            prop_assert_eq!(outcome.row, idx);
            if broken {
                prop_assert_eq!(outcome.error().map(PredictError::kind), Some(ErrorKind::MalformedInput));
            } else {
                let prediction = outcome.prediction().expect("prediction");
                prop_assert_eq!(prediction.score, f64::from(scheduled) - f64::from(real));
            }
        }
    }
}
