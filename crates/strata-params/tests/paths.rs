//! Leaf addressing and snapshot fingerprint properties

use proptest::collection::btree_map;
use proptest::prelude::*;
use strata_params::{ParamLeaf, ParamSnapshot, Stat};

fn stat() -> impl Strategy<Value = Stat> {
    prop_oneof![Just(Stat::Mean), Just(Stat::Stdev)]
}

fn leaf() -> impl Strategy<Value = ParamLeaf> {
    prop_oneof![
        edge_leaf(),
        ("[a-z]{1,6}", "[a-z]{1,6}")
            .prop_map(|(case_id, variant)| ParamLeaf::CaseWeight { case_id, variant }),
    ]
}

fn edge_leaf() -> impl Strategy<Value = ParamLeaf> {
    prop_oneof![
        stat().prop_map(ParamLeaf::Probability),
        ("cost_[a-z]{1,6}", stat()).prop_map(|(slot, stat)| ParamLeaf::Cost { slot, stat }),
        ("visited\\([a-z]{1,5}\\)", stat())
            .prop_map(|(condition, stat)| ParamLeaf::Conditional { condition, stat }),
    ]
}

fn writes() -> impl Strategy<Value = Vec<((String, ParamLeaf), f64)>> {
    // A node carries one case, so weights share a single case id.
    let weight = "[a-z]{1,6}".prop_map(|variant| ParamLeaf::CaseWeight {
        case_id: "experiment".to_string(),
        variant,
    });
    btree_map(("e[1-4]", prop_oneof![edge_leaf(), weight]), 0.0_f64..1.0, 1..12)
        .prop_map(|m| m.into_iter().collect())
}

fn snapshot_from<'a, I>(writes: I) -> ParamSnapshot
where
    I: IntoIterator<Item = &'a ((String, ParamLeaf), f64)>,
{
    let mut snap = ParamSnapshot::new();
    for ((entity, leaf), value) in writes {
        snap.set(entity, leaf, *value);
    }
    snap
}

proptest! {
    #[test]
    fn prop_leaf_path_roundtrip(leaf in leaf()) {
        prop_assert_eq!(leaf.to_path().to_leaf(), Ok(leaf));
    }

    #[test]
    fn prop_set_then_get(entity in "e[1-4]", leaf in leaf(), value in 0.0_f64..1.0) {
        let mut snap = ParamSnapshot::new();
        snap.set(&entity, &leaf, value);
        prop_assert_eq!(snap.get(&entity, &leaf), Some(value));
    }

    #[test]
    fn prop_fingerprint_ignores_write_order(writes in writes()) {
        let forward = snapshot_from(writes.iter());
        let backward = snapshot_from(writes.iter().rev());
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.fingerprint().unwrap(), backward.fingerprint().unwrap());
    }
}
