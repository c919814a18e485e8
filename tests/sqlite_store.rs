use std::collections::BTreeMap;

use serde_json::Map;
use tempfile::TempDir;

use rollrecon::{
    cache::RecordingInvalidator,
    config::ReconcilerConfig,
    core::reconciler::RollReconciler,
    op::{ChangeRequest, ExpectedPrior, Mutation},
    persist::{ObjectStore, PersistError, PutCondition, list_all, sqlite::SqliteObjectStore},
    roll::{Roll, RollPatch},
    types::{RollStatus, Unidad},
};

fn roll(roll_id: &str, lote: &str) -> Roll {
    Roll {
        roll_id: roll_id.to_string(),
        oc: "OC-42".to_string(),
        tela: "Jersey".to_string(),
        color: "Azul".to_string(),
        lote: lote.to_string(),
        unidad: Unidad::KG,
        cantidad: 25.0,
        fecha_ingreso: "2024-02-02".to_string(),
        status: RollStatus::Pending,
        extra: Map::new(),
    }
}

fn put(store: &mut SqliteObjectStore, key: &str, bytes: &[u8]) {
    store
        .put_object(key, bytes.to_vec(), "application/json", BTreeMap::new(), PutCondition::Any)
        .expect("put");
}

#[test]
fn reconcile_survives_reopen_with_backup_trail() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("objects.db");
    let key = "packing-lists/detalle_OC-42.json";
    let original = vec![roll("1", "L1"), roll("2", "L1"), roll("2", "L2")];

    let mut store = SqliteObjectStore::open(&db_path).expect("open sqlite");
    put(&mut store, key, &serde_json::to_vec(&original).unwrap());

    let request = ChangeRequest::Changes {
        changes: vec![
            Mutation::delete("OC-42_Jersey_Azul_L2_2").expecting(ExpectedPrior::from(&original[2])),
            Mutation::update(
                "1",
                RollPatch {
                    status: Some(RollStatus::Active),
                    ..RollPatch::default()
                },
            )
            .routed_to("OC-42"),
        ],
    };
    let report = RollReconciler::new(ReconcilerConfig::default())
        .reconcile(&mut store, &mut RecordingInvalidator::new(), request, "eva")
        .expect("reconcile");
    assert_eq!(report.changes_applied, 2);
    let backup = report.per_file_results[0].backup_reference.clone().expect("backup");

    drop(store);

    let mut reopened = SqliteObjectStore::open(&db_path).expect("reopen");
    let doc = reopened.get_object(key).expect("get").expect("document");
    assert_eq!(doc.version, 2);
    assert_eq!(doc.metadata.get("changes-applied").map(String::as_str), Some("2"));
    let rolls: Vec<Roll> = serde_json::from_slice(&doc.bytes).unwrap();
    assert_eq!(rolls.len(), 2);
    assert_eq!(rolls[0].status, RollStatus::Active);
    assert_eq!(rolls[1].lote, "L1");

    let copy = reopened.get_object(&backup).expect("get").expect("backup");
    let saved: Vec<Roll> = serde_json::from_slice(&copy.bytes).unwrap();
    assert_eq!(saved, original);
    assert_eq!(reopened.object_count().expect("count"), 2);
}

#[test]
fn conditional_puts_enforce_versions() {
    let mut store = SqliteObjectStore::open_in_memory().expect("open");
    let v1 = store
        .put_object("k.json", b"[]".to_vec(), "application/json", BTreeMap::new(), PutCondition::IfAbsent)
        .expect("create");
    assert_eq!(v1, 1);

    let err = store
        .put_object("k.json", b"[]".to_vec(), "application/json", BTreeMap::new(), PutCondition::IfAbsent)
        .unwrap_err();
    assert!(matches!(err, PersistError::VersionConflict { found: Some(1), .. }));

    let v2 = store
        .put_object("k.json", b"[1]".to_vec(), "application/json", BTreeMap::new(), PutCondition::IfVersion(1))
        .expect("update");
    assert_eq!(v2, 2);

    let err = store
        .put_object("k.json", b"[2]".to_vec(), "application/json", BTreeMap::new(), PutCondition::IfVersion(1))
        .unwrap_err();
    assert!(matches!(
        err,
        PersistError::VersionConflict { expected: Some(1), found: Some(2), .. }
    ));

    let v3 = store
        .put_object("k.json", b"[3]".to_vec(), "text/plain", BTreeMap::new(), PutCondition::Any)
        .expect("overwrite");
    assert_eq!(v3, 3);
    let obj = store.get_object("k.json").expect("get").expect("object");
    assert_eq!(obj.bytes, b"[3]".to_vec());
    assert_eq!(obj.content_type, "text/plain");
}

#[test]
fn listing_drains_pages_within_prefix() {
    let mut store = SqliteObjectStore::open_in_memory().expect("open");
    for i in 0..7 {
        put(&mut store, &format!("packing-lists/detalle_{i}.json"), b"[]");
    }
    put(&mut store, "packing-listsX/detalle_9.json", b"[]");
    put(&mut store, "archive/detalle_1.json", b"[]");

    let page = store.list_objects("packing-lists/", None, 3).expect("page");
    assert_eq!(page.objects.len(), 3);
    assert!(page.next_token.is_some());

    let all = list_all(&mut store, "packing-lists/", 3).expect("list");
    let keys: Vec<&str> = all.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys.len(), 7);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    assert!(all.iter().all(|o| o.size == 2));
}
