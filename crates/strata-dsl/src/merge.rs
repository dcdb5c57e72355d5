//! Smart merge of constraint sets
//!
//! For every category, `upper` wins when it sets the category and `lower` is
//! inherited otherwise. `context` and `contextAny` are keyed and share one
//! key space: a key `upper` names in either of them is dropped from both
//! categories of `lower`, and every other key of `lower` survives.

use crate::constraint::ConstraintSet;
use std::collections::{BTreeMap, BTreeSet};

/// Merge `upper` on top of `lower`
#[must_use]
pub fn merge(lower: &ConstraintSet, upper: &ConstraintSet) -> ConstraintSet {
    let claimed: BTreeSet<&str> = upper
        .context
        .iter()
        .flat_map(BTreeMap::keys)
        .chain(upper.context_any.iter().flat_map(BTreeMap::keys))
        .map(String::as_str)
        .collect();
    ConstraintSet {
        window: upper.window.or(lower.window),
        context: merge_keyed(lower.context.as_ref(), upper.context.as_ref(), &claimed),
        context_any: merge_keyed(
            lower.context_any.as_ref(),
            upper.context_any.as_ref(),
            &claimed,
        ),
        case: upper.case.clone().or_else(|| lower.case.clone()),
        visited: upper.visited.clone().or_else(|| lower.visited.clone()),
        visited_any: upper.visited_any.clone().or_else(|| lower.visited_any.clone()),
        exclude: upper.exclude.clone().or_else(|| lower.exclude.clone()),
    }
}

/// Left fold of [`merge`], lowest layer first
#[must_use]
pub fn merge_all<'a, I>(layers: I) -> ConstraintSet
where
    I: IntoIterator<Item = &'a ConstraintSet>,
{
    layers
        .into_iter()
        .fold(ConstraintSet::new(), |acc, layer| merge(&acc, layer))
}

fn merge_keyed<V: Clone>(
    lower: Option<&BTreeMap<String, V>>,
    upper: Option<&BTreeMap<String, V>>,
    claimed: &BTreeSet<&str>,
) -> Option<BTreeMap<String, V>> {
    let mut merged: BTreeMap<String, V> = lower
        .into_iter()
        .flatten()
        .filter(|(k, _)| !claimed.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(upper.into_iter().flatten().map(|(k, v)| (k.clone(), v.clone())));
    if merged.is_empty() && upper.is_none() {
        None
    } else {
        Some(merged)
    }
}
