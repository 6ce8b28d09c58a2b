use core::fmt;
use std::{collections::HashSet, io::Write, sync::LazyLock};

use crate::{
    Record, Str,
    checkpoint::Checkpoint,
    cluster::{ClusterClient, ClusterError},
    config::{ErrorPolicy, MigrationConfig},
    path::{FieldPath, PathError},
};

static NAME: LazyLock<FieldPath> =
    LazyLock::new(|| "metadata.name".parse().expect("valid name path"));

/// The identifier used to recognise a record that already exists at the destination.
pub fn record_name(record: &Record) -> Option<Str> {
    NAME.get_lenient(record)
        .and_then(|name| name.as_str())
        .map(Str::from)
}

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("record has no `metadata.name`")]
    MissingName,
    #[error("mapping record: {0}")]
    Path(#[from] PathError),
    #[error("serializing record: {0}")]
    Serialization(#[from] serde_yaml::Error),
    #[error("writing checkpoint: {0}")]
    Checkpoint(#[from] std::io::Error),
    #[error(transparent)]
    Transport(#[from] ClusterError),
}

#[derive(Debug)]
pub struct Failure {
    pub name: Option<Str>,
    pub error: MigrateError,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub total: usize,
    pub created: Vec<Str>,
    pub skipped: Vec<Str>,
    pub failed: Vec<Failure>,
    /// Set when [`ErrorPolicy::Abort`] stopped the run before every record was seen.
    pub aborted: bool,
    pub dry_run: bool,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }

    pub fn unprocessed(&self) -> usize {
        self.total - self.created.len() - self.skipped.len() - self.failed.len()
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let created = if self.dry_run {
            "would create"
        } else {
            "created"
        };
        write!(
            f,
            "{} source records: {created} {}, skipped {}, failed {}",
            self.total,
            self.created.len(),
            self.skipped.len(),
            self.failed.len()
        )?;

        if self.aborted {
            write!(f, ", aborted with {} unprocessed", self.unprocessed())?;
        }

        for failure in &self.failed {
            let name = failure.name.as_deref().unwrap_or("<unnamed>");
            write!(f, "\n  {name}: {}", failure.error)?;
        }

        Ok(())
    }
}

pub struct Migrator {
    config: MigrationConfig,
}

impl Migrator {
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Copies every source record that is not yet present at the destination.
    ///
    /// Records are handled one at a time: mapped, written to `checkpoint`, then created. Failing
    /// to list either side fails the whole run before anything is written.
    #[tracing::instrument(
        skip_all,
        fields(source = %self.config.source, target = %self.config.target)
    )]
    pub async fn run<C, W>(
        &self,
        client: &C,
        checkpoint: &mut Checkpoint<W>,
    ) -> Result<MigrationReport, ClusterError>
    where
        C: ClusterClient + ?Sized,
        W: Write,
    {
        let mut existing = client
            .list(&self.config.target)
            .await?
            .iter()
            .filter_map(record_name)
            .collect::<HashSet<_>>();
        tracing::info!(count = existing.len(), "found records at destination");

        let records = client.list(&self.config.source).await?;
        tracing::info!(count = records.len(), "found records to migrate");

        let mut report = MigrationReport {
            total: records.len(),
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        for record in &records {
            let name = record_name(record);
            let result = match &name {
                None => Err(MigrateError::MissingName),
                Some(name) if existing.contains(name) => {
                    tracing::info!(%name, "skipping record already present at destination");
                    report.skipped.push(name.clone());
                    continue;
                }
                Some(name) => self.migrate_one(client, checkpoint, name, record).await,
            };

            match result {
                Ok(()) => {
                    let name = name.unwrap_or_default();
                    existing.insert(name.clone());
                    report.created.push(name);
                }
                Err(error) => {
                    tracing::error!(name = name.as_deref(), %error, "failed to migrate record");
                    report.failed.push(Failure { name, error });
                    if self.config.policy == ErrorPolicy::Abort {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            aborted = report.aborted,
            "migration finished"
        );

        Ok(report)
    }

    #[tracing::instrument(skip_all, fields(name = %name))]
    async fn migrate_one<C, W>(
        &self,
        client: &C,
        checkpoint: &mut Checkpoint<W>,
        name: &Str,
        record: &Record,
    ) -> Result<(), MigrateError>
    where
        C: ClusterClient + ?Sized,
        W: Write,
    {
        tracing::debug!(?record, "processing record");
        let target = self.config.mapping.apply(record)?;
        let document = serde_yaml::to_string(&target)?;
        checkpoint.append(&document)?;

        if self.config.dry_run {
            tracing::info!("dry run, not creating record");
            return Ok(());
        }

        client.create(&self.config.target, &target).await?;
        tracing::info!("created record at destination");
        Ok(())
    }
}
