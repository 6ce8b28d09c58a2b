
use core::fmt;
use std::{ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Object, Record, Str};

pub const SEPARATOR: &str = ".";

/// A dotted path such as `spec.k8sServiceAccount.name`, locating a value inside a [`Record`].
///
/// Segments are opaque strings: a literal `.` inside a field name cannot be expressed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Box<[Str]>,
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{self}""#)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(SEPARATOR))
    }
}

impl Deref for FieldPath {
    type Target = [Str];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let segments = s
            .split(SEPARATOR)
            .map(|segment| {
                if segment.is_empty() {
                    Err(PathError::EmptySegment(s.into()))
                } else {
                    Ok(Str::from(segment))
                }
            })
            .collect::<Result<Box<_>, _>>()?;

        Ok(FieldPath { segments })
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Str::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path cannot be empty")]
    Empty,
    #[error("path `{0}` contains an empty segment")]
    EmptySegment(Str),
    #[error("cannot resolve `{path}`: expected an object at `{at}` but found {found}")]
    Traversal {
        path: FieldPath,
        at: Str,
        found: &'static str,
    },
}

impl FieldPath {
    pub fn segments(&self) -> &[Str] {
        &self.segments
    }

    /// Whether `self` lies strictly beneath `ancestor`, e.g. `spec.userId` under `spec`.
    pub fn is_descendant_of(&self, ancestor: &FieldPath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.segments.starts_with(&ancestor.segments)
    }

    /// The remainder of this path below `ancestor`, if it lies strictly beneath it.
    pub fn relative_to(&self, ancestor: &FieldPath) -> Option<FieldPath> {
        self.is_descendant_of(ancestor).then(|| FieldPath {
            segments: self.segments[ancestor.segments.len()..].into(),
        })
    }

    /// Reads the value at this path.
    ///
    /// A missing field or a `null` anywhere along the way resolves to `None`. Walking through a
    /// scalar or a sequence is an error, since neither has named fields.
    pub fn get<'a>(&self, record: &'a Record) -> Result<Option<&'a Record>, PathError> {
        let mut curr = record;
        for (depth, segment) in self.segments.iter().enumerate() {
            let obj = match curr {
                Value::Object(obj) => obj,
                Value::Null => return Ok(None),
                other => return Err(self.traversal_error(depth, other)),
            };

            match obj.get(segment.as_str()) {
                Some(value) => curr = value,
                None => return Ok(None),
            }
        }

        Ok(match curr {
            Value::Null => None,
            value => Some(value),
        })
    }

    /// Like [`FieldPath::get`], but a traversal error is logged and treated as absent.
    pub fn get_lenient<'a>(&self, record: &'a Record) -> Option<&'a Record> {
        self.get(record).unwrap_or_else(|err| {
            tracing::warn!(%err, "treating unresolvable path as absent");
            None
        })
    }

    /// Writes `value` at this path, creating empty objects for every missing (or `null`)
    /// intermediate field. An existing leaf is overwritten.
    pub fn set(&self, record: &mut Record, value: Record) -> Result<(), PathError> {
        let last = self.segments.len() - 1;
        let mut curr = record;
        for (depth, segment) in self.segments.iter().enumerate() {
            if curr.is_null() {
                *curr = Value::Object(Object::new());
            }

            let obj = match curr {
                Value::Object(obj) => obj,
                other => return Err(self.traversal_error(depth, other)),
            };

            if depth == last {
                obj.insert(segment.to_string(), value);
                return Ok(());
            }

            curr = obj.entry(segment.as_str()).or_insert(Value::Null);
        }

        unreachable!("a field path always has at least one segment")
    }

    fn traversal_error(&self, depth: usize, found: &Value) -> PathError {
        let at = if depth == 0 {
            Str::from("<root>")
        } else {
            Str::from(self.segments[..depth].join(SEPARATOR))
        };

        PathError::Traversal {
            path: self.clone(),
            at,
            found: describe(found),
        }
    }
}

pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}
