//! Sparse diffs between two snapshots

use crate::error::{CompositionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use strata_params::{EdgeParams, Field, Moments, NodeParams, ParamSnapshot, VariantWeights};

/// Default numeric tolerance for [`CaptureMode::Differences`]
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// How much of "after" a diff captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Every field present in "after"
    All,

    /// Only fields that differ from "before"
    #[default]
    Differences,
}

impl Display for CaptureMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Differences => f.write_str("differences"),
        }
    }
}

/// Diff `after` against `before`
///
/// The result never contains empty entities or slots. In differences mode a
/// numeric field is kept when `|after - before| > epsilon` or when "before"
/// lacks it; variant maps are kept unless they have the same variants with
/// every weight within `epsilon`.
///
/// # Errors
/// Returns error if `epsilon` is negative or NaN
pub fn diff(
    before: &ParamSnapshot,
    after: &ParamSnapshot,
    mode: CaptureMode,
    epsilon: f64,
) -> Result<ParamSnapshot> {
    if epsilon.is_nan() || epsilon < 0.0 {
        return Err(CompositionError::InvalidEpsilon(epsilon));
    }
    if mode == CaptureMode::All {
        return Ok(after.clone().pruned());
    }

    let mut out = ParamSnapshot::new();
    for (id, edge) in &after.edges {
        let prior = before.edges.get(id);
        let changed = diff_edge(prior, edge, epsilon);
        if !changed.is_empty() {
            out.edges.insert(id.clone(), changed);
        }
    }
    for (id, node) in &after.nodes {
        let prior = before.nodes.get(id);
        let changed = diff_node(prior, node, epsilon);
        if !changed.is_empty() {
            out.nodes.insert(id.clone(), changed);
        }
    }
    Ok(out)
}

fn diff_edge(before: Option<&EdgeParams>, after: &EdgeParams, eps: f64) -> EdgeParams {
    EdgeParams {
        p: diff_moments(before.map(|b| &b.p), &after.p, eps),
        costs: diff_slots(before.map(|b| &b.costs), &after.costs, eps),
        conditional_p: diff_slots(before.map(|b| &b.conditional_p), &after.conditional_p, eps),
    }
}

fn diff_slots(
    before: Option<&BTreeMap<String, Moments>>,
    after: &BTreeMap<String, Moments>,
    eps: f64,
) -> BTreeMap<String, Moments> {
    after
        .iter()
        .filter_map(|(key, m)| {
            let changed = diff_moments(before.and_then(|b| b.get(key)), m, eps);
            (!changed.is_empty()).then(|| (key.clone(), changed))
        })
        .collect()
}

fn diff_moments(before: Option<&Moments>, after: &Moments, eps: f64) -> Moments {
    Moments {
        mean: diff_number(before.map(|b| &b.mean), &after.mean, eps),
        stdev: diff_number(before.map(|b| &b.stdev), &after.stdev, eps),
    }
}

fn diff_number(before: Option<&Field<f64>>, after: &Field<f64>, eps: f64) -> Field<f64> {
    let Some(a) = after.value() else {
        return Field::Absent;
    };
    match before.and_then(Field::value) {
        Some(b) if (a - b).abs() <= eps => Field::Absent,
        _ => Field::Set(a),
    }
}

fn diff_node(before: Option<&NodeParams>, after: &NodeParams, eps: f64) -> NodeParams {
    let mut out = NodeParams::default();
    if let Some(a) = after.case.variants.get() {
        let same = before
            .and_then(|b| b.case.variants.get())
            .is_some_and(|b| weights_equal(b, a, eps));
        if !same {
            out.case.variants = Field::Set(a.clone());
        }
    }
    out
}

fn weights_equal(a: &VariantWeights, b: &VariantWeights, eps: f64) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| ka == kb && (va - vb).abs() <= eps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_params::{ParamLeaf, Stat};

    fn snap(entries: &[(&str, f64)]) -> ParamSnapshot {
        let mut s = ParamSnapshot::new();
        for (id, v) in entries {
            s.set(id, &ParamLeaf::Probability(Stat::Mean), *v);
        }
        s
    }

    #[test]
    fn rejects_bad_epsilon() {
        let s = ParamSnapshot::new();
        assert_eq!(
            diff(&s, &s, CaptureMode::Differences, -1.0),
            Err(CompositionError::InvalidEpsilon(-1.0))
        );
        assert!(diff(&s, &s, CaptureMode::All, f64::NAN).is_err());
    }

    #[test]
    fn differences_keeps_only_changes() {
        let before = snap(&[("e1", 0.4), ("e2", 0.5)]);
        let after = snap(&[("e1", 0.4), ("e2", 0.7), ("e3", 0.1)]);
        let d = diff(&before, &after, CaptureMode::Differences, DEFAULT_EPSILON).unwrap();

        assert!(!d.edges.contains_key("e1"));
        assert_eq!(d.edges["e2"].p.mean.value(), Some(0.7));
        assert_eq!(d.edges["e3"].p.mean.value(), Some(0.1));
    }

    #[test]
    fn epsilon_absorbs_noise() {
        let before = snap(&[("e1", 0.4)]);
        let after = snap(&[("e1", 0.400_000_1)]);
        let d = diff(&before, &after, CaptureMode::Differences, 1e-3).unwrap();
        assert!(d.is_empty());
        assert_eq!(d.entity_count(), 0);
    }

    #[test]
    fn all_copies_everything() {
        let before = snap(&[("e1", 0.4)]);
        let after = snap(&[("e1", 0.4), ("e2", 0.7)]);
        let d = diff(&before, &after, CaptureMode::All, DEFAULT_EPSILON).unwrap();
        assert_eq!(d, after);
    }

    #[test]
    fn variant_maps_compare_whole() {
        let mut before = ParamSnapshot::new();
        before.nodes.insert(
            "n1".into(),
            NodeParams::with_variants(VariantWeights::from([
                ("a".to_string(), 0.5),
                ("b".to_string(), 0.5),
            ])),
        );
        let mut after = ParamSnapshot::new();
        after.nodes.insert(
            "n1".into(),
            NodeParams::with_variants(VariantWeights::from([
                ("a".to_string(), 1.0),
                ("b".to_string(), 0.0),
            ])),
        );

        let d = diff(&before, &after, CaptureMode::Differences, DEFAULT_EPSILON).unwrap();
        assert_eq!(d.nodes["n1"].case.variants.get().unwrap().len(), 2);

        let same = diff(&after, &after, CaptureMode::Differences, DEFAULT_EPSILON).unwrap();
        assert!(same.nodes.is_empty());
    }
}
