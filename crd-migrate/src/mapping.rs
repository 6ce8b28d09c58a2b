mod builtin;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    Object, Record,
    path::{FieldPath, PathError},
};

/// Declarative description of how a source record becomes a target record.
///
/// Evaluated in a fixed order: every `reserve` path is copied from the source (or taken from
/// `replace` when it has an entry for that path), then every `add` path is written with its
/// default. Nothing else from the source reaches the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMappingSpec")]
pub struct MappingSpec {
    reserve: Vec<FieldPath>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    replace: IndexMap<FieldPath, Record>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    add: IndexMap<FieldPath, Record>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMappingSpec {
    reserve: Vec<FieldPath>,
    #[serde(default)]
    replace: IndexMap<FieldPath, Record>,
    #[serde(default)]
    add: IndexMap<FieldPath, Record>,
}

impl TryFrom<RawMappingSpec> for MappingSpec {
    type Error = MappingError;

    fn try_from(raw: RawMappingSpec) -> Result<Self, Self::Error> {
        MappingSpec::new(raw.reserve, raw.replace, raw.add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("path `{0}` is reserved more than once")]
    DuplicateReserve(FieldPath),
    #[error("replaced path `{0}` is not reserved, new paths belong in `add`")]
    ReplaceNotReserved(FieldPath),
    #[error("added path `{0}` is also reserved, use `replace` to override a reserved path")]
    AddReserved(FieldPath),
    #[error("added path `{add}` would overwrite reserved path `{reserved}` beneath it")]
    AddShadowsReserved { add: FieldPath, reserved: FieldPath },
    #[error("replacement for `{replaced}` would overwrite reserved path `{reserved}` beneath it")]
    ReplaceShadowsReserved {
        replaced: FieldPath,
        reserved: FieldPath,
    },
    #[error("added path `{add}` would overwrite added path `{other}` beneath it")]
    AddShadowsAdd { add: FieldPath, other: FieldPath },
}

/// Finds a path in `order` with a value in `values` that would erase, or could not hold, another
/// path of `order` beneath it. Such a value is written in one piece, so every nested path must
/// come later and must be able to descend through it.
fn find_shadowed<'a>(
    order: &'a [FieldPath],
    values: &IndexMap<FieldPath, Record>,
) -> Option<(&'a FieldPath, &'a FieldPath)> {
    for (position, path) in order.iter().enumerate() {
        let Some(value) = values.get(path) else {
            continue;
        };

        for (other, nested) in order.iter().enumerate() {
            let Some(rest) = nested.relative_to(path) else {
                continue;
            };

            if other < position || rest.get(value).is_err() {
                return Some((path, nested));
            }
        }
    }

    None
}

impl MappingSpec {
    pub fn new(
        reserve: Vec<FieldPath>,
        replace: IndexMap<FieldPath, Record>,
        add: IndexMap<FieldPath, Record>,
    ) -> Result<Self, MappingError> {
        let spec = MappingSpec {
            reserve,
            replace,
            add,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// The mapping used to move kubeai users from `data.kubeai.io` to
    /// `data.kubeai.alibabacloud.com`.
    pub fn builtin_users() -> &'static Self {
        builtin::users()
    }

    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn reserve(&self) -> &[FieldPath] {
        &self.reserve
    }

    pub fn replace(&self) -> &IndexMap<FieldPath, Record> {
        &self.replace
    }

    pub fn add(&self) -> &IndexMap<FieldPath, Record> {
        &self.add
    }

    /// Every path the mapped record will contain, in evaluation order.
    pub fn target_paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.reserve.iter().chain(self.add.keys())
    }

    fn validate(&self) -> Result<(), MappingError> {
        let mut reserved = HashSet::with_capacity(self.reserve.len());
        for path in &self.reserve {
            if !reserved.insert(path) {
                return Err(MappingError::DuplicateReserve(path.clone()));
            }
        }

        if let Some(path) = self.replace.keys().find(|path| !reserved.contains(path)) {
            return Err(MappingError::ReplaceNotReserved(path.clone()));
        }

        if let Some(path) = self.add.keys().find(|path| reserved.contains(path)) {
            return Err(MappingError::AddReserved(path.clone()));
        }

        // `add` runs after every reserved path has been written.
        for add in self.add.keys() {
            if let Some(path) = self.reserve.iter().find(|path| path.is_descendant_of(add)) {
                return Err(MappingError::AddShadowsReserved {
                    add: add.clone(),
                    reserved: path.clone(),
                });
            }
        }

        if let Some((replaced, reserved)) = find_shadowed(&self.reserve, &self.replace) {
            return Err(MappingError::ReplaceShadowsReserved {
                replaced: replaced.clone(),
                reserved: reserved.clone(),
            });
        }

        let added = self.add.keys().cloned().collect::<Vec<_>>();
        if let Some((add, other)) = find_shadowed(&added, &self.add) {
            return Err(MappingError::AddShadowsAdd {
                add: add.clone(),
                other: other.clone(),
            });
        }

        Ok(())
    }

    /// Builds a new record in the target shape from `source`.
    ///
    /// A reserved path missing from the source is written as `null` rather than skipped. Fails
    /// only when a write has to pass through a scalar, e.g. a reserved path nested under another
    /// reserved path whose value is a string.
    pub fn apply(&self, source: &Record) -> Result<Record, PathError> {
        let mut target = Record::Object(Object::new());

        for path in &self.reserve {
            let value = match self.replace.get(path) {
                Some(value) => value.clone(),
                None => path.get_lenient(source).cloned().unwrap_or(Record::Null),
            };
            path.set(&mut target, value)?;
        }

        for (path, value) in &self.add {
            path.set(&mut target, value.clone())?;
        }

        Ok(target)
    }
}
