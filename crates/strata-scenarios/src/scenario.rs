//! Scenario model
//!
//! A scenario is a named sparse overlay. It is live when it carries query
//! text; static scenarios hold whatever was captured or edited into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use strata_params::ParamSnapshot;
use uuid::Uuid;

/// Unique scenario identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioId(pub Uuid);

impl ScenarioId {
    /// Generate new scenario ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScenarioId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ScenarioId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScenarioId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Descriptive and bookkeeping data for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMeta {
    /// Display name
    pub name: String,
    /// Display colour
    pub colour: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last edit or regeneration
    pub updated_at: DateTime<Utc>,
    /// Query text; present iff the scenario is live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_dsl: Option<String>,
    /// Written only by regeneration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_regenerated_at: Option<DateTime<Utc>>,
    /// Fully resolved query used by the last regeneration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_effective_dsl: Option<String>,
    /// Whether consumers fold this overlay into the displayed view
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

impl ScenarioMeta {
    /// Fresh metadata stamped at `now`
    #[must_use]
    pub fn new(name: impl Into<String>, colour: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            colour: colour.into(),
            created_at: now,
            updated_at: now,
            query_dsl: None,
            last_regenerated_at: None,
            last_effective_dsl: None,
            visible: true,
        }
    }
}

/// One overlay in the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Identifier
    pub id: ScenarioId,
    /// Position in the stack, 0 directly above the base
    pub order_index: usize,
    /// Metadata
    pub meta: ScenarioMeta,
    /// Sparse overrides
    #[serde(default)]
    pub params: ParamSnapshot,
}

impl Scenario {
    /// New scenario with empty params
    #[must_use]
    pub fn new(meta: ScenarioMeta) -> Self {
        Self {
            id: ScenarioId::new(),
            order_index: 0,
            meta,
            params: ParamSnapshot::new(),
        }
    }

    /// Live iff it carries query text
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.meta.query_dsl.is_some()
    }

    /// Query text, if live
    #[inline]
    #[must_use]
    pub fn query_dsl(&self) -> Option<&str> {
        self.meta.query_dsl.as_deref()
    }
}

/// Unsaved in-session edits, always displayed above every scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentLayer {
    /// Direct edits
    #[serde(default)]
    pub edits: ParamSnapshot,
    /// Active what-if selection, not persisted into any scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_if_dsl: Option<String>,
}

impl CurrentLayer {
    /// No edits and no what-if
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.what_if_dsl.is_none()
    }
}

/// What a consumer needs to draw a scenario's legend entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMeta {
    /// Identifier
    pub id: ScenarioId,
    /// Display name
    pub name: String,
    /// Display colour
    pub colour: String,
    /// Live or static
    pub live: bool,
    /// Folded into the view
    pub visible: bool,
    /// Last regeneration time
    pub last_regenerated_at: Option<DateTime<Utc>>,
}

impl From<&Scenario> for DisplayMeta {
    fn from(s: &Scenario) -> Self {
        Self {
            id: s.id,
            name: s.meta.name.clone(),
            colour: s.meta.colour.clone(),
            live: s.is_live(),
            visible: s.meta.visible,
            last_regenerated_at: s.meta.last_regenerated_at,
        }
    }
}
