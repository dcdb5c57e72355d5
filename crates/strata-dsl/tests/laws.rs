//! Algebraic laws of the DSL printer and smart merge

use chrono::{Days, NaiveDate};
use proptest::collection::{btree_map, btree_set, vec};
use proptest::option;
use proptest::prelude::*;
use strata_dsl::{merge, parse, Bound, ConstraintSet, Unit, Window};

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn bound() -> impl Strategy<Value = Bound> {
    let unit = prop_oneof![
        Just(Unit::Day),
        Just(Unit::Week),
        Just(Unit::Month),
        Just(Unit::Year),
    ];
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    prop_oneof![
        (-400_i64..400, unit).prop_map(|(amount, unit)| Bound::Relative { amount, unit }),
        (0_u64..20_000).prop_map(move |d| Bound::Absolute(epoch + Days::new(d))),
    ]
}

fn window() -> impl Strategy<Value = Window> {
    (bound(), option::of(bound())).prop_map(|(start, end)| Window { start, end })
}

fn constraint_set() -> impl Strategy<Value = ConstraintSet> {
    (
        option::of(window()),
        option::of(btree_map(name(), option::of(name()), 1..3)),
        option::of(btree_map(name(), btree_set(name(), 1..3), 1..3)),
        option::of(btree_map(name(), name(), 1..3)),
        option::of(btree_set(name(), 1..3)),
        option::of(vec(btree_set(name(), 1..3), 1..3)),
        option::of(btree_set(name(), 1..3)),
    )
        .prop_map(
            |(window, context, context_any, case, visited, visited_any, exclude)| ConstraintSet {
                window,
                context,
                context_any,
                case,
                visited,
                visited_any,
                exclude,
            },
        )
}

proptest! {
    #[test]
    fn prop_print_parse_roundtrip(x in constraint_set()) {
        let printed = x.to_string();
        prop_assert_eq!(parse(&printed).unwrap(), x);
    }

    #[test]
    fn prop_merge_idempotent(x in constraint_set()) {
        prop_assert_eq!(merge(&x, &x), x);
    }

    #[test]
    fn prop_merge_associative(a in constraint_set(), b in constraint_set(), c in constraint_set()) {
        prop_assert_eq!(merge(&merge(&a, &b), &c), merge(&a, &merge(&b, &c)));
    }

    #[test]
    fn prop_split_recombines(x in constraint_set()) {
        prop_assert_eq!(merge(&x.fetch_parts(), &x.what_if_parts()), x);
    }

    #[test]
    fn prop_window_only_upper_keeps_lower_context(lower in constraint_set(), w in window()) {
        let upper = ConstraintSet::new().with_window(w);
        let merged = merge(&lower, &upper);
        prop_assert_eq!(merged.window, Some(w));
        prop_assert_eq!(merged.context, lower.context);
        prop_assert_eq!(merged.case, lower.case);
    }

    #[test]
    fn prop_context_key_comes_from_one_layer(lower in constraint_set(), upper in constraint_set()) {
        let merged = merge(&lower, &upper);
        let keys = |s: &ConstraintSet| -> Vec<String> {
            s.context.iter().flat_map(|m| m.keys().cloned()).collect()
        };
        let any_keys = |s: &ConstraintSet| -> Vec<String> {
            s.context_any.iter().flat_map(|m| m.keys().cloned()).collect()
        };
        let claimed: Vec<String> = keys(&upper).into_iter().chain(any_keys(&upper)).collect();
        for key in &claimed {
            let in_context = merged.context.as_ref().and_then(|m| m.get(key));
            let in_any = merged.context_any.as_ref().and_then(|m| m.get(key));
            prop_assert_eq!(in_context, upper.context.as_ref().and_then(|m| m.get(key)));
            prop_assert_eq!(in_any, upper.context_any.as_ref().and_then(|m| m.get(key)));
        }
    }
}

#[test]
fn skip_static_inheritance_example() {
    // Live A sets context, live C sets window; a static layer contributes nothing.
    let a = parse("context(google)").unwrap();
    let c = parse("window(-7d)").unwrap();
    let inherited = merge(&a.fetch_parts(), &c.fetch_parts());
    assert_eq!(inherited.to_string(), "window(-7d).context(google)");
}
