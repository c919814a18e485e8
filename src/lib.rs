//! Roll identification and reconciliation for packing-list documents kept
//! as JSON arrays in an object store.
//!
//! # Examples
//!
//! Direct use of [`core::reconciler::RollReconciler`] over an in-memory store:
//! ```
//! use std::collections::BTreeMap;
//!
//! use rollrecon::{
//!     cache::RecordingInvalidator,
//!     config::ReconcilerConfig,
//!     core::reconciler::RollReconciler,
//!     op::{ChangeRequest, Mutation},
//!     persist::{memory::MemoryObjectStore, ObjectStore, PutCondition},
//!     roll::RollPatch,
//! };
//!
//! let mut store = MemoryObjectStore::new();
//! let doc = br#"[{"rollId":"5","OC":"X1","tela":"A","color":"Red","lote":"L1",
//!     "unidad":"KG","cantidad":10,"fechaIngreso":"2024-01-01","status":"active"}]"#;
//! store
//!     .put_object(
//!         "packing-lists/detalle_X1.json",
//!         doc.to_vec(),
//!         "application/json",
//!         BTreeMap::new(),
//!         PutCondition::Any,
//!     )
//!     .expect("seed");
//!
//! let reconciler = RollReconciler::new(ReconcilerConfig::default());
//! let patch = RollPatch { cantidad: Some(7.0), ..RollPatch::default() };
//! let request = ChangeRequest::Changes {
//!     changes: vec![Mutation::update("5", patch).routed_to("x1")],
//! };
//! let report = reconciler
//!     .reconcile(&mut store, &mut RecordingInvalidator::new(), request, "luis")
//!     .expect("reconcile");
//! assert_eq!((report.changes_applied, report.changes_requested), (1, 1));
//! ```
//!
//! Runtime usage with a SQLite-backed store:
//! ```no_run
//! use rollrecon::{
//!     access::{Caller, Role},
//!     cache::NoopInvalidator,
//!     config::ReconcilerConfig,
//!     op::{ChangeRequest, Mutation},
//!     persist::sqlite::SqliteObjectStore,
//!     runtime::handle::spawn_reconciler,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteObjectStore::open("objects.db").expect("open sqlite");
//! let handle = spawn_reconciler(Box::new(store), Box::new(NoopInvalidator), ReconcilerConfig::default());
//! let request = ChangeRequest::Changes {
//!     changes: vec![Mutation::delete("OC-7_Jersey_Azul_L3_12")],
//! };
//! let report = handle
//!     .reconcile(Some(Caller::new("eva", Role::MajorAdmin)), request)
//!     .await
//!     .expect("reconcile");
//! println!("{} of {} applied", report.changes_applied, report.changes_requested);
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Caller authorization and rate limiting.
pub mod access;
/// Read-cache invalidation collaborator.
pub mod cache;
/// Reconciler configuration.
pub mod config;
/// Documents, locator, validation, and the reconciler.
pub mod core;
/// Error types shared across layers.
pub mod error;
/// Roll identity matching tiers and integrity guard.
pub mod matching;
/// Mutation model and request entry points.
pub mod op;
/// Object-store abstraction with in-memory and SQLite implementations.
pub mod persist;
/// Roll records and patches.
pub mod roll;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
