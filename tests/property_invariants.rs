use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::Map;

use rollrecon::{
    config::ReconcilerConfig,
    core::reconciler::RollReconciler,
    op::{ExpectedPrior, Mutation},
    roll::{Roll, RollPatch},
    types::{RollStatus, Unidad},
};

#[derive(Debug, Clone)]
enum Action {
    SetQty { target: u8, qty: u16 },
    DeleteComposite { target: u8 },
    GuardedWrongTela { target: u8 },
    Missing { id: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..32, 0u16..500).prop_map(|(target, qty)| Action::SetQty { target, qty }),
        (0u8..32).prop_map(|target| Action::DeleteComposite { target }),
        (0u8..32).prop_map(|target| Action::GuardedWrongTela { target }),
        (0u8..32).prop_map(|id| Action::Missing { id }),
    ]
}

/// Rolls with unique composite keys; `rollId` repeats across lots.
fn rolls_strategy() -> impl Strategy<Value = Vec<Roll>> {
    prop::collection::btree_set((0u8..6, 0u8..3), 1..16).prop_map(|pairs: BTreeSet<(u8, u8)>| {
        pairs
            .into_iter()
            .map(|(id, lot)| Roll {
                roll_id: format!("r{id}"),
                oc: "OC-P".to_string(),
                tela: "Jersey".to_string(),
                color: "Gris".to_string(),
                lote: format!("L{lot}"),
                unidad: Unidad::KG,
                cantidad: 50.0,
                fecha_ingreso: "2024-06-01".to_string(),
                status: RollStatus::Active,
                extra: Map::new(),
            })
            .collect()
    })
}

fn identity(roll: &Roll) -> (String, String, String, String, String, String) {
    (
        roll.roll_id.clone(),
        roll.oc.clone(),
        roll.tela.clone(),
        roll.color.clone(),
        roll.lote.clone(),
        roll.fecha_ingreso.clone(),
    )
}

proptest! {
    #[test]
    fn random_batches_respect_matching_and_guard(
        initial in rolls_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let reconciler = RollReconciler::new(ReconcilerConfig::default());
        let mut rolls = initial.clone();

        for action in actions {
            let before = rolls.clone();
            let pick = |target: u8| before.get(usize::from(target) % before.len().max(1)).cloned();

            match action {
                Action::SetQty { target, qty } => {
                    let Some(victim) = pick(target) else { continue };
                    let key = victim.composite_key();
                    let change = Mutation::update(
                        key.clone(),
                        RollPatch { cantidad: Some(f64::from(qty)), ..RollPatch::default() },
                    );
                    let out = reconciler.apply_to_rolls(&mut rolls, &[(0, &change)]);
                    prop_assert!(out[0].applied);
                    prop_assert_eq!(rolls.len(), before.len());
                    for (a, b) in before.iter().zip(&rolls) {
                        prop_assert_eq!(identity(a), identity(b));
                        if a.composite_key() == key {
                            prop_assert_eq!(b.cantidad, f64::from(qty));
                        } else {
                            prop_assert_eq!(a, b);
                        }
                    }
                }
                Action::DeleteComposite { target } => {
                    let Some(victim) = pick(target) else { continue };
                    let key = victim.composite_key();
                    let change = Mutation::delete(key.clone());
                    let out = reconciler.apply_to_rolls(&mut rolls, &[(0, &change)]);
                    prop_assert!(out[0].applied);
                    prop_assert_eq!(rolls.len() + 1, before.len());
                    let expected: Vec<Roll> = before.iter().filter(|r| r.composite_key() != key).cloned().collect();
                    prop_assert_eq!(&rolls, &expected);
                }
                Action::GuardedWrongTela { target } => {
                    let Some(victim) = pick(target) else { continue };
                    let mut prior = ExpectedPrior::from(&victim);
                    prior.tela = "Otra".to_string();
                    let change = Mutation::delete(victim.roll_id.clone()).expecting(prior);
                    let out = reconciler.apply_to_rolls(&mut rolls, &[(0, &change)]);
                    prop_assert!(!out[0].applied);
                    prop_assert_eq!(&rolls, &before);
                }
                Action::Missing { id } => {
                    let change = Mutation::update(format!("missing-{id}"), RollPatch::default());
                    let out = reconciler.apply_to_rolls(&mut rolls, &[(0, &change)]);
                    prop_assert!(!out[0].applied);
                    prop_assert_eq!(&rolls, &before);
                }
            }
        }

        let keys: BTreeSet<String> = rolls.iter().map(Roll::composite_key).collect();
        prop_assert_eq!(keys.len(), rolls.len());
    }
}
