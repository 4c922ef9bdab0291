#![allow(dead_code)]

use engine::Store;
use serde_json::{json, Value};
use tempfile::TempDir;

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub store: Store,
}

pub fn setup_store() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let store = Store::open(dir.path().join("test.db")).expect("open store");
    TestDb { _dir: dir, store }
}

/// Minimal document carrying a description and a bucket span.
pub fn doc(job_id: &str, description: &str, bucket_span: &str) -> Value {
    json!({
        "job": {
            "job_id": job_id,
            "description": description,
            "groups": ["ecommerce"],
            "analysis_config": {
                "bucket_span": bucket_span,
                "detectors": [{"function": "sum", "field_name": "taxful_total_price"}],
                "influencers": ["customer_full_name", "category"]
            },
            "analysis_limits": {"model_memory_limit": "10mb"},
            "custom_settings": {"created_by": "ml-module-ecommerce"}
        },
        "datafeed": {"indices": ["kibana_sample_data_ecommerce"], "query": {"match_all": {}}}
    })
}

pub fn load_one(store: &mut Store, document: &Value) -> engine::LoadOutcome {
    let report = engine::load_value(store, document);
    assert_eq!(report.documents.len(), 1);
    report.documents[0].outcome.clone()
}

pub fn version_numbers(store: &Store, job_id: &str) -> Vec<u32> {
    store
        .versions(job_id, engine::VersionOrder::OldestFirst)
        .expect("list versions")
        .iter()
        .map(|v| v.version)
        .collect()
}
