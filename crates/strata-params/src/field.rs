//! Presence wrapper for sparse overlay leaves
//!
//! [`Field`] distinguishes "explicitly set" from "not mentioned". An overlay
//! that sets a probability to `0.0` must still override the layer below, so
//! absence cannot be encoded as a sentinel value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A leaf that is either set to a value or absent (inherit from below)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    /// Not mentioned by this layer
    #[default]
    Absent,

    /// Explicitly set by this layer
    Set(T),
}

impl<T> Field<T> {
    /// Check if the field is set
    #[inline]
    #[must_use]
    pub const fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Check if the field is absent
    #[inline]
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Borrow the value if set
    #[inline]
    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Mutably borrow the value if set
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Set the value, returning the previous one
    #[inline]
    pub fn set(&mut self, value: T) -> Option<T> {
        match std::mem::replace(self, Self::Set(value)) {
            Self::Set(prev) => Some(prev),
            Self::Absent => None,
        }
    }

    /// Take the value, leaving the field absent
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Self::Set(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Convert into an `Option`
    #[inline]
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Absent => None,
        }
    }
}

impl<T: Clone> Field<T> {
    /// Replace this field with `upper` when `upper` is set
    ///
    /// Replacement is wholesale; values are never blended.
    #[inline]
    pub fn overlay(&mut self, upper: &Self) {
        if let Self::Set(v) = upper {
            *self = Self::Set(v.clone());
        }
    }
}

impl<T: Copy> Field<T> {
    /// Copy the value out if set
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.get().copied()
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Absent,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Set(v) => v.serialize(serializer),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}
