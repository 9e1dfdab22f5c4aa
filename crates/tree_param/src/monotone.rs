//! Per-feature monotone constraint directions
//!
//! Each entry is `1` (prediction non-decreasing in the feature), `-1`
//! (non-increasing) or `0` (unconstrained). The text form is a Python-style
//! tuple, e.g. `(1,-1,0)`, and a single feature prints as `(1,)`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::TreeParamError;

/// Monotone direction per feature index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonotoneConstraints(Vec<i32>);

#[derive(Deserialize)]
#[serde(untagged)]
enum MonotoneRepr {
    Text(String),
    List(Vec<i32>),
}

impl MonotoneConstraints {
    pub fn new(directions: Vec<i32>) -> Result<Self, TreeParamError> {
        for &d in &directions {
            check_direction(d)?;
        }
        Ok(Self(directions))
    }

    /// Direction of `feature`; features past the end are unconstrained
    #[inline]
    pub fn direction(&self, feature: usize) -> i32 {
        self.0.get(feature).copied().unwrap_or(0)
    }

    /// Pad with unconstrained entries (or truncate) to `num_feature`
    pub fn resize(&mut self, num_feature: usize) {
        self.0.resize(num_feature, 0);
    }

    /// Whether any feature carries a direction
    pub fn is_constrained(&self) -> bool {
        self.0.iter().any(|&d| d != 0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

fn check_direction(d: i32) -> Result<i32, TreeParamError> {
    if (-1..=1).contains(&d) {
        Ok(d)
    } else {
        Err(TreeParamError::MonotoneParse(format!(
            "direction {d} must be -1, 0 or 1"
        )))
    }
}

fn parse_direction(item: &str) -> Result<i32, TreeParamError> {
    let digits = item.strip_suffix('L').unwrap_or(item).trim();
    let value: i32 = digits
        .parse()
        .map_err(|_| TreeParamError::MonotoneParse(format!("`{item}` is not an integer")))?;
    check_direction(value)
}

impl FromStr for MonotoneConstraints {
    type Err = TreeParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let Some(rest) = text.strip_prefix('(') else {
            // a bare integer is a one-feature tuple
            return parse_direction(text).map(|d| Self(vec![d]));
        };
        let inner = rest.strip_suffix(')').ok_or_else(|| {
            TreeParamError::MonotoneParse(format!("`{text}` is missing a closing parenthesis"))
        })?;

        let mut items: Vec<&str> = inner.split(',').map(str::trim).collect();
        if items.last() == Some(&"") {
            items.pop();
        }

        let directions = items
            .into_iter()
            .map(parse_direction)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(directions))
    }
}

impl fmt::Display for MonotoneConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{d}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

impl Serialize for MonotoneConstraints {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.0)
    }
}

impl<'de> Deserialize<'de> for MonotoneConstraints {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match MonotoneRepr::deserialize(deserializer)? {
            MonotoneRepr::Text(text) => text.parse().map_err(de::Error::custom),
            MonotoneRepr::List(list) => Self::new(list).map_err(de::Error::custom),
        }
    }
}
