//! Deterministic overlay composition
//!
//! Overlays fold left to right, lowest stack index first. Each field an
//! overlay sets replaces the running value wholesale; everything else is
//! left as it was. No clock, randomness or shared state is involved, so
//! the fold can be called from any number of readers concurrently.

use strata_params::{EdgeParams, Moments, NodeParams, ParamSnapshot};

/// Fold ordered overlays onto `base`
#[must_use]
pub fn compose(base: &ParamSnapshot, overlays: &[ParamSnapshot]) -> ParamSnapshot {
    compose_visible(base, overlays)
}

/// Fold the overlays a consumer is displaying, in stack order
#[must_use]
pub fn compose_visible<'a, I>(base: &ParamSnapshot, overlays: I) -> ParamSnapshot
where
    I: IntoIterator<Item = &'a ParamSnapshot>,
{
    let mut running = base.clone();
    for overlay in overlays {
        compose_onto(&mut running, overlay);
    }
    running
}

/// Apply one overlay to a running result in place
pub fn compose_onto(running: &mut ParamSnapshot, overlay: &ParamSnapshot) {
    for (id, upper) in &overlay.edges {
        if upper.is_empty() {
            continue;
        }
        overlay_edge(running.edge_mut(id), upper);
    }
    for (id, upper) in &overlay.nodes {
        if upper.is_empty() {
            continue;
        }
        overlay_node(running.node_mut(id), upper);
    }
}

fn overlay_edge(lower: &mut EdgeParams, upper: &EdgeParams) {
    overlay_moments(&mut lower.p, &upper.p);
    for (slot, m) in &upper.costs {
        if !m.is_empty() {
            overlay_moments(lower.costs.entry(slot.clone()).or_default(), m);
        }
    }
    for (condition, m) in &upper.conditional_p {
        if !m.is_empty() {
            overlay_moments(lower.conditional_p.entry(condition.clone()).or_default(), m);
        }
    }
}

fn overlay_moments(lower: &mut Moments, upper: &Moments) {
    lower.mean.overlay(&upper.mean);
    lower.stdev.overlay(&upper.stdev);
}

fn overlay_node(lower: &mut NodeParams, upper: &NodeParams) {
    lower.case.variants.overlay(&upper.case.variants);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_params::{ParamLeaf, Stat, VariantWeights};

    const MEAN: ParamLeaf = ParamLeaf::Probability(Stat::Mean);
    const STDEV: ParamLeaf = ParamLeaf::Probability(Stat::Stdev);

    #[test]
    fn empty_overlay_list_is_identity() {
        let mut base = ParamSnapshot::new();
        base.set("e1", &MEAN, 0.4);
        assert_eq!(compose(&base, &[]), base);
    }

    #[test]
    fn later_overlay_wins() {
        let mut base = ParamSnapshot::new();
        base.set("e1", &MEAN, 0.4);
        let mut low = ParamSnapshot::new();
        low.set("e1", &MEAN, 0.5);
        let mut high = ParamSnapshot::new();
        high.set("e1", &MEAN, 0.6);

        assert_eq!(compose(&base, &[low.clone(), high.clone()]).get("e1", &MEAN), Some(0.6));
        assert_eq!(compose(&base, &[high, low]).get("e1", &MEAN), Some(0.5));
    }

    #[test]
    fn unmentioned_fields_survive() {
        let mut base = ParamSnapshot::new();
        base.set("e1", &MEAN, 0.4);
        base.set("e1", &STDEV, 0.05);
        let mut overlay = ParamSnapshot::new();
        overlay.set("e1", &MEAN, 0.0);

        let out = compose(&base, &[overlay]);
        assert_eq!(out.get("e1", &MEAN), Some(0.0));
        assert_eq!(out.get("e1", &STDEV), Some(0.05));
    }

    #[test]
    fn variant_maps_replace_wholesale() {
        let mut base = ParamSnapshot::new();
        base.nodes.insert(
            "n1".into(),
            NodeParams::with_variants(VariantWeights::from([
                ("control".to_string(), 0.5),
                ("treatment".to_string(), 0.5),
            ])),
        );
        let mut overlay = ParamSnapshot::new();
        overlay.nodes.insert(
            "n1".into(),
            NodeParams::with_variants(VariantWeights::from([("treatment".to_string(), 1.0)])),
        );

        let out = compose(&base, &[overlay]);
        let variants = out.nodes["n1"].case.variants.get().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants["treatment"], 1.0);
    }

    #[test]
    fn empty_entities_do_not_change_shape() {
        let base = ParamSnapshot::new();
        let mut overlay = ParamSnapshot::new();
        overlay.edge_mut("e9");
        overlay.node_mut("n9");
        assert_eq!(compose(&base, &[overlay]), base);
    }
}
