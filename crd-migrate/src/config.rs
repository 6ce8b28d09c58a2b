use std::path::Path;

use anyhow::Context;

use crate::{PathExt, cluster::ResourceRef, mapping::MappingSpec};

/// What to do with the rest of the batch after one record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failure, report it, and move on to the next record.
    #[default]
    Continue,
    /// Stop at the first failure, leaving later records untouched.
    Abort,
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub source: ResourceRef,
    pub target: ResourceRef,
    pub mapping: MappingSpec,
    pub policy: ErrorPolicy,
    /// Map and checkpoint records without creating anything at the destination.
    pub dry_run: bool,
}

impl MigrationConfig {
    pub fn new(source: ResourceRef, target: ResourceRef, mapping: MappingSpec) -> Self {
        Self {
            source,
            target,
            mapping,
            policy: ErrorPolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Loads a mapping file, or falls back to the builtin users mapping when none is given.
pub fn load_mapping(path: Option<&Path>) -> anyhow::Result<MappingSpec> {
    let Some(path) = path else {
        return Ok(MappingSpec::builtin_users().clone());
    };

    crate::load_yaml(path).with_context(|| format!("loading mapping {}", path.pretty()))
}
