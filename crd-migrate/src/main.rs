use std::{fs::File, io::Read, path::PathBuf, sync::Mutex};

use anyhow::{Context, bail};
use clap::Parser;
use crd_migrate::{
    PathExt,
    checkpoint::Checkpoint,
    cluster::{KubeClient, ResourceRef},
    config::{ErrorPolicy, MigrationConfig, load_mapping},
    migrate::Migrator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(version, about)]
struct Args {
    /// Write logs to this file (truncated on start) instead of stderr.
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Copy records from the source resource to the target resource on a cluster.
    Run(RunArgs),
    /// Map a YAML stream of records offline and print the results.
    Transform {
        /// Mapping file, the builtin users mapping if omitted.
        #[clap(long)]
        mapping: Option<PathBuf>,
        /// Input file, stdin if omitted.
        input: Option<PathBuf>,
    },
    /// Print the effective mapping.
    Mapping {
        #[clap(long)]
        mapping: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Kubeconfig to connect with, the ambient configuration if omitted.
    #[clap(long)]
    kubeconfig: Option<PathBuf>,
    #[clap(long, default_value = "kube-ai")]
    namespace: String,
    #[clap(long, default_value = "data.kubeai.io")]
    source_group: String,
    #[clap(long, default_value = "v1")]
    source_version: String,
    #[clap(long, default_value = "data.kubeai.alibabacloud.com")]
    target_group: String,
    #[clap(long, default_value = "v1")]
    target_version: String,
    #[clap(long, default_value = "User")]
    kind: String,
    #[clap(long, default_value = "users")]
    plural: String,
    /// Mapping file, the builtin users mapping if omitted.
    #[clap(long)]
    mapping: Option<PathBuf>,
    #[clap(long, default_value = "users.data.kubeai.io.checkpoint")]
    checkpoint: PathBuf,
    /// Stop at the first record that fails instead of continuing with the rest.
    #[clap(long)]
    abort_on_error: bool,
    /// Map and checkpoint records without creating them.
    #[clap(long)]
    dry_run: bool,
}

impl RunArgs {
    fn resource(&self, group: &str, version: &str) -> ResourceRef {
        ResourceRef {
            group: group.into(),
            version: version.into(),
            kind: self.kind.as_str().into(),
            plural: self.plural.as_str().into(),
            namespace: self.namespace.as_str().into(),
        }
    }

    fn config(&self) -> anyhow::Result<MigrationConfig> {
        let mapping = load_mapping(self.mapping.as_deref())?;
        let policy = if self.abort_on_error {
            ErrorPolicy::Abort
        } else {
            ErrorPolicy::Continue
        };

        Ok(MigrationConfig::new(
            self.resource(&self.source_group, &self.source_version),
            self.resource(&self.target_group, &self.target_version),
            mapping,
        )
        .with_policy(policy)
        .with_dry_run(self.dry_run))
    }
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.pretty()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    }
    .map_err(anyhow::Error::msg)
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.config()?;

    let client = match &args.kubeconfig {
        Some(path) => KubeClient::from_kubeconfig(path).await,
        None => KubeClient::infer().await,
    }
    .context("configuring kubernetes client")?;
    tracing::info!(cluster = client.cluster_url(), "client configured");

    let mut checkpoint = Checkpoint::create(&args.checkpoint)?;
    let report = Migrator::new(config)
        .run(&client, &mut checkpoint)
        .await
        .context("listing custom objects")?;
    drop(checkpoint);

    println!("{report}");
    println!("checkpoint written to {}", args.checkpoint.pretty());

    if !report.is_success() {
        bail!("migration did not complete cleanly");
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_ref())?;

    match args.command {
        Command::Run(run_args) => run(run_args).await?,
        Command::Transform { mapping, input } => {
            let mapping = load_mapping(mapping.as_deref())?;
            let mut buf = String::new();
            match &input {
                Some(path) => File::open(path)
                    .with_context(|| format!("opening {}", path.pretty()))?
                    .read_to_string(&mut buf)?,
                None => std::io::stdin().read_to_string(&mut buf)?,
            };

            let n = crd_migrate::transform(&mapping, &buf, std::io::stdout().lock())?;
            tracing::info!(records = n, "transformed records");
        }
        Command::Mapping { mapping } => {
            let mapping = load_mapping(mapping.as_deref())?;
            serde_yaml::to_writer(std::io::stdout(), &mapping)?;
        }
    }

    Ok(())
}
