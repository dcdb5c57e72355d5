//! Human-readable parameter addresses
//!
//! ```text
//! e.<edge-id>.p.mean
//! e.from(<node>).to(<node>).cost_gbp.stdev
//! e.uuid(<uuid>).conditional_p.visited(promo).mean
//! n.<node-id>.case(<case-id>:<variant>).weight
//! n.case(<case-id>:<variant>).weight
//! ```

use crate::error::AddressError;
use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::char as pchar,
    combinator::{all_consuming, opt},
    multi::separated_list1,
    sequence::delimited,
    IResult,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use strata_params::{EntityKind, ParamLeaf, ParamPath, PathSegment, CASE_SEGMENT};

/// How an address picks its entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Bare entity id
    ById(String),

    /// Edge between two nodes (node id or uuid)
    ByEndpoints {
        /// Source node
        from: String,
        /// Target node
        to: String,
    },

    /// Entity uuid
    ByUuid(String),

    /// Case node located by its case id
    ByCaseId(String),
}

/// A parsed address: entity kind, selector and leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    kind: EntityKind,
    selector: Selector,
    path: ParamPath,
    leaf: ParamLeaf,
}

impl Address {
    /// Address a leaf on an entity by id
    #[must_use]
    pub fn by_id(kind: EntityKind, id: impl Into<String>, leaf: ParamLeaf) -> Self {
        Self {
            kind,
            selector: Selector::ById(id.into()),
            path: leaf.to_path(),
            leaf,
        }
    }

    /// Parse address text
    ///
    /// # Errors
    /// Returns error if the text is not a well-formed address for a known leaf
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let trimmed = text.trim();
        let segments = match all_consuming(segments)(trimmed) {
            Ok((_, segs)) => segs,
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                return Err(AddressError::Syntax {
                    input: trimmed.to_string(),
                    offset: trimmed.len() - e.input.len(),
                });
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(AddressError::Syntax {
                    input: trimmed.to_string(),
                    offset: trimmed.len(),
                });
            }
        };

        let mut rest = segments.into_iter();
        let head = rest
            .next()
            .ok_or_else(|| AddressError::MissingSelector(trimmed.to_string()))?;
        let kind = match (head.name(), head.arg()) {
            ("e", None) => EntityKind::Edge,
            ("n", None) => EntityKind::Node,
            _ => return Err(AddressError::UnknownKind(head.to_string())),
        };

        let first = rest
            .next()
            .ok_or_else(|| AddressError::MissingSelector(trimmed.to_string()))?;
        let mut path = Vec::new();
        let name = first.name().to_string();
        let arg = first.arg().map(str::to_string);
        let selector = match (kind, name.as_str(), arg.as_deref()) {
            (_, "uuid", Some(uuid)) => Selector::ByUuid(non_empty(uuid, &first)?),
            (EntityKind::Edge, "from", Some(from)) => {
                let to_seg = rest
                    .next()
                    .ok_or_else(|| AddressError::InvalidSelector(first.to_string()))?;
                match (to_seg.name(), to_seg.arg()) {
                    ("to", Some(to)) => Selector::ByEndpoints {
                        from: non_empty(from, &first)?,
                        to: non_empty(to, &to_seg)?,
                    },
                    _ => return Err(AddressError::InvalidSelector(to_seg.to_string())),
                }
            }
            (EntityKind::Node, CASE_SEGMENT, Some(arg)) => {
                let case_id = arg
                    .split_once(':')
                    .map(|(c, _)| c.trim())
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| AddressError::InvalidSelector(first.to_string()))?;
                let selector = Selector::ByCaseId(case_id.to_string());
                path.push(first);
                selector
            }
            (_, id, None) => Selector::ById(id.to_string()),
            _ => return Err(AddressError::InvalidSelector(first.to_string())),
        };
        path.extend(rest);

        let path = ParamPath::new(path);
        let leaf = path.to_leaf()?;
        if leaf.entity_kind() != kind {
            return Err(AddressError::WrongKind {
                leaf: leaf.to_string(),
                kind: kind.label(),
            });
        }
        if let (Selector::ByCaseId(selected), ParamLeaf::CaseWeight { case_id, .. }) =
            (&selector, &leaf)
        {
            if selected != case_id {
                return Err(AddressError::InvalidSelector(path.to_string()));
            }
        }

        Ok(Self {
            kind,
            selector,
            path,
            leaf,
        })
    }

    /// Entity kind
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Entity selector
    #[inline]
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Path after the selector
    #[inline]
    #[must_use]
    pub const fn path(&self) -> &ParamPath {
        &self.path
    }

    /// Addressed leaf
    #[inline]
    #[must_use]
    pub const fn leaf(&self) -> &ParamLeaf {
        &self.leaf
    }
}

fn non_empty(arg: &str, seg: &PathSegment) -> Result<String, AddressError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(AddressError::InvalidSelector(seg.to_string()));
    }
    Ok(arg.to_string())
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn segment(input: &str) -> IResult<&str, PathSegment> {
    let (input, name) = take_while1(is_name_char)(input)?;
    let (input, arg) = opt(delimited(
        pchar('('),
        take_while(|c: char| c != '(' && c != ')'),
        pchar(')'),
    ))(input)?;
    let seg = match arg {
        Some(arg) => PathSegment::call(name, arg.trim()),
        None => PathSegment::plain(name),
    };
    Ok((input, seg))
}

fn segments(input: &str) -> IResult<&str, Vec<PathSegment>> {
    separated_list1(pchar('.'), segment)(input)
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let prefix = self.kind.prefix();
        match &self.selector {
            Selector::ById(id) => write!(f, "{prefix}.{id}.{}", self.path),
            Selector::ByEndpoints { from, to } => {
                write!(f, "{prefix}.from({from}).to({to}).{}", self.path)
            }
            Selector::ByUuid(uuid) => write!(f, "{prefix}.uuid({uuid}).{}", self.path),
            Selector::ByCaseId(_) => write!(f, "{prefix}.{}", self.path),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
