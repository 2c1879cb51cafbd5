//! Partition key values
//!
//! A partition key value is an ordered tuple with one component per configured
//! partition-key path. Components keep the JSON kind they were resolved from, so
//! a missing property ([`PartitionKeyComponent::Undefined`]) never compares equal
//! to an explicit `null` ([`PartitionKeyComponent::Null`]).

use crate::document::IdentityError;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// One component of a partition key value
#[derive(Debug, Clone)]
pub enum PartitionKeyComponent {
    /// String value
    String(String),
    /// Numeric value (IEEE-754 double)
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Path resolved to JSON `null`
    Null,
    /// Path did not resolve
    Undefined,
}

impl PartitionKeyComponent {
    /// Classify a resolved JSON value
    ///
    /// Returns `None` for objects and arrays, which cannot be partition keys.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value {
            None => Some(Self::Undefined),
            Some(Value::Null) => Some(Self::Null),
            Some(Value::Bool(b)) => Some(Self::Bool(*b)),
            Some(Value::String(s)) => Some(Self::String(s.clone())),
            Some(Value::Number(n)) => n.as_f64().map(Self::Number),
            Some(Value::Object(_) | Value::Array(_)) => None,
        }
    }

    /// JSON form; `Undefined` is the empty object marker `{}`
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => {
                serde_json::Number::from_f64(positive_zero(*n)).map_or(Value::Null, Value::Number)
            }
            Self::Bool(b) => Value::Bool(*b),
            Self::Null => Value::Null,
            Self::Undefined => Value::Object(Map::new()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if map.is_empty() => Some(Self::Undefined),
            other => Self::from_value(Some(other)),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Null => 1,
            Self::Bool(_) => 2,
            Self::Number(_) => 3,
            Self::String(_) => 4,
        }
    }
}

/// Fold `-0.0` into `0.0` so equal keys also render and order alike
fn positive_zero(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

impl PartialEq for PartitionKeyComponent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) | (Self::Undefined, Self::Undefined) => true,
            _ => false,
        }
    }
}

// JSON never yields NaN, so f64 equality is reflexive here.
impl Eq for PartitionKeyComponent {}

impl Hash for PartitionKeyComponent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Self::String(s) => s.hash(state),
            // -0.0 == 0.0, so both must hash alike
            Self::Number(n) => positive_zero(*n).to_bits().hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Null | Self::Undefined => {}
        }
    }
}

/// Ordered partition key tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PartitionKeyValue(Vec<PartitionKeyComponent>);

impl PartitionKeyValue {
    /// Create from components
    #[inline]
    #[must_use]
    pub fn new(components: Vec<PartitionKeyComponent>) -> Self {
        Self(components)
    }

    /// Single string component, the common single-path case
    #[inline]
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![PartitionKeyComponent::String(value.into())])
    }

    /// Extract the key from a document
    ///
    /// Key order follows `paths` order. Each path is a JSON-pointer-like
    /// `/a/b` path into the document.
    ///
    /// # Errors
    /// Returns [`IdentityError::UnsupportedPartitionKeyShape`] when any path
    /// resolves to an object or array. No partial key is produced.
    pub fn extract<P: AsRef<str>>(
        document: &Map<String, Value>,
        paths: &[P],
    ) -> Result<Self, IdentityError> {
        paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                PartitionKeyComponent::from_value(resolve_path(document, path)).ok_or_else(|| {
                    IdentityError::UnsupportedPartitionKeyShape {
                        path: path.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Components in path order
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[PartitionKeyComponent] {
        &self.0
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no components
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON array form
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.0.iter().map(PartitionKeyComponent::to_json).collect())
    }
}

impl Display for PartitionKeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<Vec<PartitionKeyComponent>> for PartitionKeyValue {
    fn from(components: Vec<PartitionKeyComponent>) -> Self {
        Self(components)
    }
}

impl serde::Serialize for PartitionKeyValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for PartitionKeyValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<Value>::deserialize(deserializer)?;
        items
            .iter()
            .map(|item| {
                PartitionKeyComponent::from_json(item).ok_or_else(|| {
                    serde::de::Error::custom(format!("unsupported partition key component: {item}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Resolve a `/a/b` path against a document
///
/// Segments use JSON pointer escaping (`~1` for `/`, `~0` for `~`). Only
/// objects are traversed.
fn resolve_path<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');
    let first = unescape(segments.next()?);
    let mut current = document.get(first.as_str())?;
    for segment in segments {
        current = current.as_object()?.get(unescape(segment).as_str())?;
    }
    Some(current)
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
