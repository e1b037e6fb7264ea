use std::fs;
use std::path::{Path, PathBuf};

use order_artifact::{ArtifactError, ModelArtifact, verify};

const REFERENCE: &str = "\
Order Item Id,Product Name,Type,Delivery Status,Customer Country,Customer Segment,Market,Shipping Mode,Order Item Discount,Benefit per order
1,A,DEBIT,Late delivery,Mexico,Consumer,LATAM,Standard Class,5,20
2,A,CASH,Shipping on time,Francia,Corporate,Europe,First Class,10,40
3,B,DEBIT,Late delivery,Mexico,Consumer,LATAM,Same Day,8,-3
";

const MODEL: &str = r#"{
    "objective": "binary",
    "classes": ["0", "1"],
    "base_score": 0.0,
    "feature_names": ["DelayOrdered", "market", "DiscountPerProduct"],
    "trees": [
        {"nodes": [
            {"feature": 0, "threshold": -0.5, "left": 1, "right": 2},
            {"leaf": 1.5},
            {"leaf": -1.5}
        ]}
    ]
}"#;

fn write_inputs(dir: &Path, model: &str) -> (PathBuf, PathBuf) {
    let reference = dir.join("reference.csv");
    let model_path = dir.join("model.json");
    fs::write(&reference, REFERENCE).expect("write reference");
    fs::write(&model_path, model).expect("write model");
    (reference, model_path)
}

#[test]
fn build_then_load_round_trips() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (reference, model) = write_inputs(temp.path(), MODEL);
    let out = temp.path().join("artifact");

    let built = ModelArtifact::build(&reference, &model, &out, ',').expect("build");
    for name in [
        "manifest.toml",
        "aggregates.json",
        "encodings.json",
        "schema.json",
        "model.json",
    ] {
        assert!(out.join(name).is_file(), "{name} missing");
    }

    let loaded = ModelArtifact::load(&out).expect("load");
    assert_eq!(loaded.schema, built.schema);
    assert_eq!(loaded.indexes, built.indexes);
    assert_eq!(loaded.encodings, built.encodings);
    assert_eq!(loaded.manifest.reference.rows, 3);
    assert_eq!(
        loaded.manifest.file_for_role("model").map(|file| file.path.as_str()),
        Some("model.json")
    );
    assert!(loaded.manifest.file_for_role("training_log").is_none());
    assert_eq!(
        loaded.schema.names(),
        ["DelayOrdered", "market", "DiscountPerProduct"]
    );
    assert_eq!(
        loaded.indexes.max_discount_by_product.lookup("A").value(),
        Some(10.0)
    );

    let summary = verify(&out).expect("verify");
    assert_eq!(summary.files.len(), 4);
    assert_eq!(summary.feature_count, 3);
}

#[test]
fn tampered_file_fails_verification() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (reference, model) = write_inputs(temp.path(), MODEL);
    let out = temp.path().join("artifact");
    ModelArtifact::build(&reference, &model, &out, ',').expect("build");

    let encodings = out.join("encodings.json");
    let mut text = fs::read_to_string(&encodings).expect("read encodings");
    text = text.replace("\"LATAM\": 1", "\"LATAM\": 0");
    text.push(' ');
    fs::write(&encodings, text).expect("tamper");

    let error = ModelArtifact::load(&out).unwrap_err();
    assert!(
        matches!(error, ArtifactError::Tampered { ref path, .. } if path.ends_with("encodings.json")),
        "unexpected error: {error}"
    );
}

#[test]
fn missing_file_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (reference, model) = write_inputs(temp.path(), MODEL);
    let out = temp.path().join("artifact");
    ModelArtifact::build(&reference, &model, &out, ',').expect("build");
    fs::remove_file(out.join("schema.json")).expect("remove schema");

    assert!(matches!(
        ModelArtifact::load(&out).unwrap_err(),
        ArtifactError::FileMissing { .. }
    ));
}

#[test]
fn model_with_unproducible_feature_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let model = MODEL.replace("\"market\"", "\"Late_delivery_risk\"");
    let (reference, model) = write_inputs(temp.path(), &model);
    let out = temp.path().join("artifact");

    let error = ModelArtifact::build(&reference, &model, &out, ',').unwrap_err();
    assert!(
        matches!(error, ArtifactError::IncompatibleModel(ref msg) if msg.contains("Late_delivery_risk")),
        "unexpected error: {error}"
    );
    assert!(!out.join("manifest.toml").exists());
}
