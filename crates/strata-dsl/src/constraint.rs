//! Typed constraint sets and their canonical text form

use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Constraint categories, in canonical print order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// `window(...)`
    Window,
    /// `context(...)`
    Context,
    /// `contextAny(...)`
    ContextAny,
    /// `case(...)`
    Case,
    /// `visited(...)`
    Visited,
    /// `visitedAny(...)`
    VisitedAny,
    /// `exclude(...)`
    Exclude,
}

impl Category {
    /// All categories in print order
    pub const ALL: [Self; 7] = [
        Self::Window,
        Self::Context,
        Self::ContextAny,
        Self::Case,
        Self::Visited,
        Self::VisitedAny,
        Self::Exclude,
    ];

    /// Function name in DSL text
    #[must_use]
    pub const fn function(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Context => "context",
            Self::ContextAny => "contextAny",
            Self::Case => "case",
            Self::Visited => "visited",
            Self::VisitedAny => "visitedAny",
            Self::Exclude => "exclude",
        }
    }

    /// Look up a category by function name
    #[must_use]
    pub fn from_function(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.function() == name)
    }

    /// Whether this category selects data to fetch (vs. a what-if selection)
    #[must_use]
    pub const fn is_fetch(self) -> bool {
        matches!(self, Self::Window | Self::Context | Self::ContextAny)
    }
}

/// A parsed query: each category is either set or inherited
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSet {
    /// Date window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,

    /// Exact-match segments; a key without value matches any value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, Option<String>>>,

    /// Any-of segments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_any: Option<BTreeMap<String, BTreeSet<String>>>,

    /// Case id -> selected variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<BTreeMap<String, String>>,

    /// Nodes that must all have been visited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<BTreeSet<String>>,

    /// Groups of which at least one node was visited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited_any: Option<Vec<BTreeSet<String>>>,

    /// Nodes removed from the flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<BTreeSet<String>>,
}

impl ConstraintSet {
    /// Empty set (inherits everything)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No category is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Category::ALL.into_iter().all(|c| !self.has(c))
    }

    /// Whether a category is set
    #[must_use]
    pub fn has(&self, category: Category) -> bool {
        match category {
            Category::Window => self.window.is_some(),
            Category::Context => self.context.is_some(),
            Category::ContextAny => self.context_any.is_some(),
            Category::Case => self.case.is_some(),
            Category::Visited => self.visited.is_some(),
            Category::VisitedAny => self.visited_any.is_some(),
            Category::Exclude => self.exclude.is_some(),
        }
    }

    /// Window, context and contextAny only
    #[must_use]
    pub fn fetch_parts(&self) -> Self {
        Self {
            window: self.window,
            context: self.context.clone(),
            context_any: self.context_any.clone(),
            ..Self::default()
        }
    }

    /// case, visited, visitedAny and exclude only
    #[must_use]
    pub fn what_if_parts(&self) -> Self {
        Self {
            case: self.case.clone(),
            visited: self.visited.clone(),
            visited_any: self.visited_any.clone(),
            exclude: self.exclude.clone(),
            ..Self::default()
        }
    }

    /// Any what-if category is set
    #[must_use]
    pub fn has_what_if(&self) -> bool {
        Category::ALL
            .into_iter()
            .any(|c| !c.is_fetch() && self.has(c))
    }

    /// Canonical text of the context categories alone
    ///
    /// Used as the slice key when matching cached data; empty when the set
    /// carries no context.
    #[must_use]
    pub fn context_slice(&self) -> String {
        Self {
            context: self.context.clone(),
            context_any: self.context_any.clone(),
            ..Self::default()
        }
        .to_string()
    }

    /// Set the window, returning self
    #[inline]
    #[must_use]
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    /// Add a context key, returning self
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.map(str::to_string));
        self
    }

    /// Select a case variant, returning self
    #[must_use]
    pub fn with_case(mut self, case_id: impl Into<String>, variant: impl Into<String>) -> Self {
        self.case
            .get_or_insert_with(BTreeMap::new)
            .insert(case_id.into(), variant.into());
        self
    }

    /// Add a visited node, returning self
    #[must_use]
    pub fn with_visited(mut self, node: impl Into<String>) -> Self {
        self.visited
            .get_or_insert_with(BTreeSet::new)
            .insert(node.into());
        self
    }

    /// Add an excluded node, returning self
    #[must_use]
    pub fn with_exclude(mut self, node: impl Into<String>) -> Self {
        self.exclude
            .get_or_insert_with(BTreeSet::new)
            .insert(node.into());
        self
    }

    fn terms(&self) -> Vec<String> {
        let mut terms = Vec::new();
        if let Some(window) = &self.window {
            terms.push(format!("window({window})"));
        }
        if let Some(context) = &self.context {
            let args: Vec<String> = context
                .iter()
                .map(|(k, v)| match v {
                    Some(v) => format!("{k}:{v}"),
                    None => k.clone(),
                })
                .collect();
            terms.push(call(Category::Context, &args));
        }
        if let Some(any) = &self.context_any {
            let args: Vec<String> = any
                .iter()
                .flat_map(|(k, vs)| vs.iter().map(move |v| format!("{k}:{v}")))
                .collect();
            terms.push(call(Category::ContextAny, &args));
        }
        if let Some(case) = &self.case {
            let args: Vec<String> = case.iter().map(|(c, v)| format!("{c}:{v}")).collect();
            terms.push(call(Category::Case, &args));
        }
        if let Some(visited) = &self.visited {
            let args: Vec<String> = visited.iter().cloned().collect();
            terms.push(call(Category::Visited, &args));
        }
        if let Some(groups) = &self.visited_any {
            for group in groups {
                let args: Vec<String> = group.iter().cloned().collect();
                terms.push(call(Category::VisitedAny, &args));
            }
        }
        if let Some(exclude) = &self.exclude {
            let args: Vec<String> = exclude.iter().cloned().collect();
            terms.push(call(Category::Exclude, &args));
        }
        terms
    }
}

fn call(category: Category, args: &[String]) -> String {
    format!("{}({})", category.function(), args.join(","))
}

impl Display for ConstraintSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.terms().join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::Bound;

    #[test]
    fn canonical_order_is_fixed() {
        let set = ConstraintSet::new()
            .with_exclude("n9")
            .with_case("exp", "treatment")
            .with_context("channel", Some("google"))
            .with_window(Window::new(Bound::days(-30), Bound::days(-1)));
        assert_eq!(
            set.to_string(),
            "window(-30d:-1d).context(channel:google).case(exp:treatment).exclude(n9)"
        );
    }

    #[test]
    fn split_into_fetch_and_what_if() {
        let set = ConstraintSet::new()
            .with_window(Window::open(Bound::days(-7)))
            .with_visited("promo");
        assert_eq!(set.fetch_parts().to_string(), "window(-7d)");
        assert_eq!(set.what_if_parts().to_string(), "visited(promo)");
        assert!(set.has_what_if());
        assert!(!set.fetch_parts().has_what_if());
    }

    #[test]
    fn context_slice_ignores_other_categories() {
        let set = ConstraintSet::new()
            .with_window(Window::open(Bound::days(-7)))
            .with_context("device", None);
        assert_eq!(set.context_slice(), "context(device)");
        assert_eq!(ConstraintSet::new().context_slice(), "");
    }

    #[test]
    fn category_lookup() {
        assert_eq!(Category::from_function("contextAny"), Some(Category::ContextAny));
        assert_eq!(Category::from_function("nope"), None);
        assert!(Category::Window.is_fetch());
        assert!(!Category::Exclude.is_fetch());
    }
}
