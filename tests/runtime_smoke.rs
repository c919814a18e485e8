use std::{collections::BTreeMap, time::Duration};

use serde_json::Map;

use rollrecon::{
    access::{AccessError, Caller, Role},
    cache::RecordingInvalidator,
    config::ReconcilerConfig,
    error::ReconcileError,
    op::{ChangeRequest, Mutation},
    persist::{ObjectStore, PutCondition, memory::MemoryObjectStore},
    roll::{Roll, RollPatch},
    runtime::{
        events::ReconcileEvent,
        handle::{RuntimeError, spawn_reconciler},
    },
    types::{RollStatus, Unidad},
};

const DOC: &str = "packing-lists/detalle_OC-3.json";

fn roll(roll_id: &str, cantidad: f64) -> Roll {
    Roll {
        roll_id: roll_id.to_string(),
        oc: "OC-3".to_string(),
        tela: "Rib".to_string(),
        color: "Blanco".to_string(),
        lote: "L7".to_string(),
        unidad: Unidad::KG,
        cantidad,
        fecha_ingreso: "2024-04-04".to_string(),
        status: RollStatus::Active,
        extra: Map::new(),
    }
}

fn seeded_store() -> MemoryObjectStore {
    let mut store = MemoryObjectStore::new();
    store
        .put_object(
            DOC,
            serde_json::to_vec(&vec![roll("1", 10.0), roll("2", 20.0)]).unwrap(),
            "application/json",
            BTreeMap::new(),
            PutCondition::Any,
        )
        .unwrap();
    store
}

fn set_qty(target: &str, value: f64) -> ChangeRequest {
    ChangeRequest::Changes {
        changes: vec![Mutation::update(
            target,
            RollPatch {
                cantidad: Some(value),
                ..RollPatch::default()
            },
        )
        .routed_to("OC-3")],
    }
}

fn admin() -> Option<Caller> {
    Some(Caller::new("luis", Role::Admin))
}

#[tokio::test]
async fn reconcile_emits_events_in_order() {
    let handle = spawn_reconciler(
        Box::new(seeded_store()),
        Box::new(RecordingInvalidator::new()),
        ReconcilerConfig::default(),
    );
    let mut sub = handle.subscribe();

    let report = handle.reconcile(admin(), set_qty("2", 5.0)).await.expect("reconcile");
    assert_eq!(report.changes_applied, 1);

    let mut seen = Vec::new();
    for _ in 0..4 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        seen.push(evt);
    }

    assert!(matches!(&seen[0], ReconcileEvent::BackupWritten { key } if key.contains("_backup_")));
    assert_eq!(
        seen[1],
        ReconcileEvent::DocumentWritten {
            key: DOC.to_string(),
            oc: "OC-3".to_string(),
            changes_applied: 1,
        }
    );
    assert!(matches!(&seen[2], ReconcileEvent::CachesInvalidated { patterns } if patterns.len() == 3));
    assert_eq!(
        seen[3],
        ReconcileEvent::BatchCompleted {
            changes_requested: 1,
            changes_applied: 1,
        }
    );

    let (key, rolls) = handle.rolls_for_oc(" oc-3 ").await.expect("query").expect("document");
    assert_eq!(key, DOC);
    assert_eq!(rolls[1].cantidad, 5.0);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn non_admin_and_anonymous_callers_are_rejected() {
    let handle = spawn_reconciler(
        Box::new(seeded_store()),
        Box::new(RecordingInvalidator::new()),
        ReconcilerConfig::default(),
    );

    let err = handle.reconcile(None, set_qty("1", 0.0)).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Reconcile(ReconcileError::Access(AccessError::Unauthenticated))
    ));

    let viewer = Some(Caller::new("ana", Role::User));
    let err = handle.reconcile(viewer, set_qty("1", 0.0)).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Reconcile(ReconcileError::Access(AccessError::Forbidden(Role::User)))
    ));

    let (_, rolls) = handle.rolls_for_oc("OC-3").await.expect("query").expect("document");
    assert_eq!(rolls[0].cantidad, 10.0);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn rate_limit_short_circuits_before_reconciliation() {
    let config = ReconcilerConfig {
        rate_limit_max_requests: 2,
        rate_limit_window_ms: 60_000,
        ..ReconcilerConfig::default()
    };
    let handle = spawn_reconciler(
        Box::new(seeded_store()),
        Box::new(RecordingInvalidator::new()),
        config,
    );

    handle.reconcile(admin(), set_qty("1", 1.0)).await.expect("first");
    handle.reconcile(admin(), set_qty("1", 2.0)).await.expect("second");
    let err = handle.reconcile(admin(), set_qty("1", 3.0)).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Reconcile(ReconcileError::Access(AccessError::RateLimited { .. }))
    ));

    let other = Some(Caller::new("eva", Role::MajorAdmin));
    handle.reconcile(other, set_qty("2", 9.0)).await.expect("separate bucket");

    let (_, rolls) = handle.rolls_for_oc("OC-3").await.expect("query").expect("document");
    assert_eq!(rolls[0].cantidad, 2.0);
    assert_eq!(rolls[1].cantidad, 9.0);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn concurrent_requests_through_one_handle_do_not_lose_writes() {
    let config = ReconcilerConfig {
        rate_limit_max_requests: 0,
        ..ReconcilerConfig::default()
    };
    let handle = spawn_reconciler(
        Box::new(seeded_store()),
        Box::new(RecordingInvalidator::new()),
        config,
    );

    let mut tasks = Vec::new();
    for i in 0..20u32 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let added = roll(&format!("n{i}"), f64::from(i));
            let request = ChangeRequest::Changes {
                changes: vec![Mutation::add(added)],
            };
            handle.reconcile(admin(), request).await
        }));
    }
    for task in tasks {
        let report = task.await.expect("join").expect("reconcile");
        assert_eq!(report.changes_applied, 1);
    }

    let (_, rolls) = handle.rolls_for_oc("OC-3").await.expect("query").expect("document");
    assert_eq!(rolls.len(), 22);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn zero_effect_request_still_succeeds() {
    let handle = spawn_reconciler(
        Box::new(seeded_store()),
        Box::new(RecordingInvalidator::new()),
        ReconcilerConfig::default(),
    );
    let mut sub = handle.subscribe();

    let report = handle.reconcile(admin(), set_qty("missing", 1.0)).await.expect("reconcile");
    assert!(report.success);
    assert_eq!(report.changes_applied, 0);

    let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv");
    assert_eq!(
        evt,
        ReconcileEvent::BatchCompleted {
            changes_requested: 1,
            changes_applied: 0,
        }
    );

    handle.shutdown().await.expect("shutdown");
}
