use super::*;
use serde_json::json;
use shared::steps::LAST_ISSUED_INVOICE;

fn fields(pairs: &[(&str, Value)]) -> FieldMap {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn memory_store() -> ResolutionStore {
    ResolutionStore::in_memory()
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let store = memory_store();
    let record = WorkflowRecord::new(
        fields(&[
            ("irn", json!("IRN123")),
            ("lineItems", json!([{"qty": 2}, {"qty": 5}])),
            ("totalValue", json!(1180.5)),
        ]),
        "credential/invoice",
    );
    store.put(LAST_ISSUED_INVOICE, &record).await.expect("put");

    let loaded = store.get(LAST_ISSUED_INVOICE).await;
    assert_eq!(loaded, record.fields);

    let full = store.get_record(LAST_ISSUED_INVOICE).await.expect("record");
    assert_eq!(full.credential_key, "credential/invoice");
}

#[tokio::test]
async fn absent_key_reads_as_empty_map() {
    let store = memory_store();
    assert!(store.get("workflow/no_such_key").await.is_empty());
    assert!(store.get_record("workflow/no_such_key").await.is_none());
}

#[tokio::test]
async fn corrupt_record_reads_as_empty_map() {
    let inner = Arc::new(MemoryStore::new());
    inner
        .put_raw(LAST_ISSUED_INVOICE, "{not valid json")
        .await
        .expect("seed");
    let store = ResolutionStore::new(inner);
    assert!(store.get(LAST_ISSUED_INVOICE).await.is_empty());
}

#[tokio::test]
async fn put_supersedes_wholesale() {
    let store = memory_store();
    let first = WorkflowRecord::new(
        fields(&[("irn", json!("IRN-A")), ("ackNo", json!("112010"))]),
        "credential/invoice",
    );
    store.put(LAST_ISSUED_INVOICE, &first).await.expect("first");

    let second = WorkflowRecord::new(fields(&[("irn", json!("IRN-B"))]), "credential/invoice");
    store
        .put(LAST_ISSUED_INVOICE, &second)
        .await
        .expect("second");

    let loaded = store.get(LAST_ISSUED_INVOICE).await;
    assert_eq!(loaded.get("irn"), Some(&json!("IRN-B")));
    assert!(loaded.get("ackNo").is_none(), "old fields must not survive");
}

#[tokio::test]
async fn merge_overlays_onto_existing_record() {
    let store = memory_store();
    let base = WorkflowRecord::new(
        fields(&[("ewbNo", json!("EWB-1")), ("vehicleNo", json!("KA01AB1234"))]),
        "credential/waybill",
    );
    store
        .put(shared::steps::LAST_GENERATED_EWB, &base)
        .await
        .expect("base");

    store
        .merge(
            shared::steps::LAST_GENERATED_EWB,
            fields(&[("vehicleNo", json!("KA02CD5678"))]),
        )
        .await
        .expect("merge");

    let loaded = store.get(shared::steps::LAST_GENERATED_EWB).await;
    assert_eq!(loaded.get("ewbNo"), Some(&json!("EWB-1")));
    assert_eq!(loaded.get("vehicleNo"), Some(&json!("KA02CD5678")));

    let record = store
        .get_record(shared::steps::LAST_GENERATED_EWB)
        .await
        .expect("record");
    assert_eq!(record.credential_key, "credential/waybill");
}

#[tokio::test]
async fn storing_one_credential_invalidates_the_other_product() {
    let store = memory_store();
    let invoice = SessionCredential::new(ProductTag::Invoice, "tok-inv", "4001");
    store.store_credential(&invoice).await.expect("invoice");
    assert!(store.active_credential(ProductTag::Invoice).await.is_some());

    let waybill = SessionCredential::new(ProductTag::Waybill, "tok-ewb", "4001");
    store.store_credential(&waybill).await.expect("waybill");

    assert!(
        store.active_credential(ProductTag::Invoice).await.is_none(),
        "switching product must invalidate the previous credential"
    );
    let active = store
        .active_credential(ProductTag::Waybill)
        .await
        .expect("active");
    assert_eq!(active.token, "tok-ewb");
}

#[tokio::test]
async fn invalidated_credential_falls_through_to_default() {
    let store = memory_store();
    let credential = SessionCredential::new(ProductTag::Invoice, "tok-inv", "4001");
    store.store_credential(&credential).await.expect("store");

    let chain = FallbackChain::empty_default()
        .then_credential(ProductTag::Invoice, CredentialField::CompanyId);
    assert_eq!(store.resolve(&chain, None).await, json!("4001"));

    store
        .invalidate_credential(ProductTag::Invoice)
        .await
        .expect("invalidate");
    assert_eq!(store.resolve(&chain, None).await, json!(""));
}

#[tokio::test]
async fn form_value_wins_over_every_source() {
    let store = memory_store();
    store
        .put(
            LAST_ISSUED_INVOICE,
            &WorkflowRecord::new(fields(&[("irn", json!("IRN-OLD"))]), "credential/invoice"),
        )
        .await
        .expect("record");

    let chain = FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "irn");
    let resolved = store.resolve(&chain, Some(&json!("IRN-EDITED"))).await;
    assert_eq!(resolved, json!("IRN-EDITED"));
}

#[tokio::test]
async fn empty_form_value_does_not_shadow_later_sources() {
    let store = memory_store();
    store
        .put(
            LAST_ISSUED_INVOICE,
            &WorkflowRecord::new(fields(&[("irn", json!("IRN123"))]), "credential/invoice"),
        )
        .await
        .expect("record");

    let chain = FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "irn");
    assert_eq!(store.resolve(&chain, Some(&json!(""))).await, json!("IRN123"));
    assert_eq!(store.resolve(&chain, None).await, json!("IRN123"));
}

#[tokio::test]
async fn resolution_probes_record_then_credential_then_default() {
    let store = memory_store();
    let credential = SessionCredential::new(ProductTag::Invoice, "tok-inv", "29AAACX0892K1ZK");
    store.store_credential(&credential).await.expect("cred");

    // Record field empty, credential non-empty: credential wins over default.
    store
        .put(
            LAST_ISSUED_INVOICE,
            &WorkflowRecord::new(fields(&[("gstin", json!(""))]), "credential/invoice"),
        )
        .await
        .expect("record");

    let chain = FallbackChain::empty_default()
        .then_record(LAST_ISSUED_INVOICE, "gstin")
        .then_credential(ProductTag::Invoice, CredentialField::CompanyId);
    assert_eq!(store.resolve(&chain, None).await, json!("29AAACX0892K1ZK"));

    // Record field present: earlier source wins over credential.
    store
        .put(
            LAST_ISSUED_INVOICE,
            &WorkflowRecord::new(
                fields(&[("gstin", json!("07BBBCX1234A1Z5"))]),
                "credential/invoice",
            ),
        )
        .await
        .expect("record");
    assert_eq!(store.resolve(&chain, None).await, json!("07BBBCX1234A1Z5"));
}

#[tokio::test]
async fn empty_record_field_falls_through_to_static_default() {
    // Scenario from the continuation contract: {"irn": "IRN123", "ewbNo": ""}.
    let store = memory_store();
    store
        .put(
            LAST_ISSUED_INVOICE,
            &WorkflowRecord::new(
                fields(&[("irn", json!("IRN123")), ("ewbNo", json!(""))]),
                "credential/invoice",
            ),
        )
        .await
        .expect("record");

    let irn_chain = FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "irn");
    let ewb_chain = FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "ewbNo");

    assert_eq!(store.resolve(&irn_chain, None).await, json!("IRN123"));
    assert_eq!(store.resolve(&ewb_chain, None).await, json!(""));
}

#[tokio::test]
async fn typoed_key_degrades_to_default_not_error() {
    let store = memory_store();
    let chain = FallbackChain::new("GSTIN-DEFAULT").then_record("workflow/last_isued_invoice", "gstin");
    assert_eq!(store.resolve(&chain, None).await, json!("GSTIN-DEFAULT"));
}

#[tokio::test]
async fn reset_drops_records_and_credentials() {
    let store = memory_store();
    store
        .put(
            LAST_ISSUED_INVOICE,
            &WorkflowRecord::new(fields(&[("irn", json!("IRN123"))]), "credential/invoice"),
        )
        .await
        .expect("record");
    store
        .store_credential(&SessionCredential::new(ProductTag::Invoice, "tok", "4001"))
        .await
        .expect("cred");

    store.reset().await.expect("reset");

    assert!(store.get(LAST_ISSUED_INVOICE).await.is_empty());
    assert!(store.active_credential(ProductTag::Invoice).await.is_none());
}

#[tokio::test]
async fn sqlite_store_round_trips_and_pings() {
    let sqlite = SqliteStore::new("sqlite::memory:").await.expect("db");
    sqlite.health_check().await.expect("health check");

    let store = ResolutionStore::new(Arc::new(sqlite));
    let record = WorkflowRecord::new(fields(&[("irn", json!("IRN123"))]), "credential/invoice");
    store.put(LAST_ISSUED_INVOICE, &record).await.expect("put");
    assert_eq!(store.get(LAST_ISSUED_INVOICE).await, record.fields);
}

#[tokio::test]
async fn sqlite_store_creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("gst_bridge_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("records.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let sqlite = SqliteStore::new(&database_url).await.expect("db");
    drop(sqlite);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
