mod cli;
mod plan;
mod registry;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use patchgeom_backend_savedmodel::{SavedModelBackend, SavedModelGraph};
use patchgeom_core::{CancelFlag, Framework, ResolvedArtifact, SignatureBinding};
use patchgeom_discovery::{Discovery, DiscoveryOptions};
use patchgeom_signature::{get_entry_point, SignatureResolver, TagResolution};
use registry::ModelRegistry;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    // Discovery and metadata reads are blocking filesystem work.
    let report = tokio::task::spawn_blocking(move || run(cli.command, &cancel))
        .await
        .context("worker task failed")??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run(command: Command, cancel: &CancelFlag) -> Result<serde_json::Value> {
    let report = match command {
        Command::Discover {
            dir,
            framework,
            require_descriptor,
        } => {
            let discovery = Discovery::new(DiscoveryOptions {
                require_descriptor,
                ..DiscoveryOptions::default()
            });
            let artifact = discovery.discover_with(&dir, |_| framework.map(Framework::from))?;
            serde_json::to_value(artifact)?
        }
        Command::List { models_dir } => {
            let registry = ModelRegistry::scan(&Discovery::default(), &models_dir)?;
            tracing::info!(models = registry.len(), dir = %models_dir.display(), "listed models");
            serde_json::to_value(registry.entries())?
        }
        Command::Resolve {
            dir,
            tag,
            signature,
            vendor_names,
        } => {
            let resolution = resolve(&dir, tag.as_deref(), cancel)?;
            let entry_point = signature
                .map(|name| get_entry_point(&resolution, &name))
                .transpose()?;
            serde_json::to_value(TagReport::new(&resolution, vendor_names, entry_point))?
        }
        Command::Geometry { dir, plan, tag } => {
            let plan = plan::load(&plan)?;
            let resolution = resolve(&dir, tag.as_deref(), cancel)?;
            let binding = get_entry_point(&resolution, &plan.signature)?;
            serde_json::to_value(plan::apply(&plan, &binding)?)?
        }
    };
    Ok(report)
}

/// Finds the graph bundle in `dir`, then its tag.
fn resolve(dir: &Path, tag: Option<&str>, cancel: &CancelFlag) -> Result<TagResolution<SavedModelGraph>> {
    let artifact = Discovery::default().discover_with(dir, |_| Some(Framework::TensorFlow))?;
    let root = match artifact {
        ResolvedArtifact::TfSavedModelDir(root) => root,
        ResolvedArtifact::TorchScriptPath(path) => {
            bail!("{} is a scripted module; tags and signatures need a graph bundle", path.display())
        }
    };

    let resolver = SignatureResolver::new(SavedModelBackend::new());
    let resolution = match tag {
        Some(tag) => resolver.open_tag(&root, tag)?,
        None => resolver.resolve_tag_cancellable(&root, cancel)?,
    };
    Ok(resolution)
}

#[derive(Serialize)]
struct TagReport {
    root: PathBuf,
    tag: String,
    tensorflow_version: String,
    signatures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_point: Option<SignatureBinding>,
}

impl TagReport {
    fn new(
        resolution: &TagResolution<SavedModelGraph>,
        vendor_names: bool,
        entry_point: Option<SignatureBinding>,
    ) -> Self {
        let (tag, signatures) = if vendor_names {
            (
                resolution.vendor_tag().to_string(),
                resolution.vendor_signature_names(),
            )
        } else {
            (
                resolution.tag().to_string(),
                resolution.signature_names().to_vec(),
            )
        };
        Self {
            root: resolution.root().to_path_buf(),
            tag,
            tensorflow_version: resolution.graph().tensorflow_version().to_string(),
            signatures,
            entry_point,
        }
    }
}
