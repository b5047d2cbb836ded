//! Finds a model artifact in a directory and classifies it.
//!
//! A directory may hold a TensorFlow graph bundle (`saved_model.pb` plus
//! `variables/`), a TorchScript module (`*.pt`), both, or only a zipped
//! bundle. Zipped bundles are unpacked in place once and the directory is
//! scanned again; discovery never scans more than twice.

pub mod archive;

use std::fs;
use std::path::{Path, PathBuf};

use patchgeom_core::{Error, Framework, ModelArtifact, ResolvedArtifact, Result};
use patchgeom_proto::{SAVED_MODEL_FILE, VARIABLES_DIR};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use archive::{ArchiveExtractor, ZipExtractor};

/// Substring identifying a zipped graph bundle.
pub const ARCHIVE_MARKER: &str = "tensorflow_saved_model_bundle.zip";

/// Model descriptor expected next to end-user models.
pub const DESCRIPTOR_FILE: &str = "model.yaml";

const MAX_SCANS: usize = 2;

#[derive(Clone, Debug)]
pub struct DiscoveryOptions {
    /// Treat a directory without [`DESCRIPTOR_FILE`] as empty.
    pub require_descriptor: bool,
    pub archive_marker: String,
    /// Lower-case extensions of scripted module files.
    pub module_extensions: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            require_descriptor: false,
            archive_marker: ARCHIVE_MARKER.to_string(),
            module_extensions: vec!["pt".to_string(), "pth".to_string()],
        }
    }
}

pub struct Discovery<E = ZipExtractor> {
    options: DiscoveryOptions,
    extractor: E,
}

impl Discovery<ZipExtractor> {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self::with_extractor(options, ZipExtractor)
    }
}

impl Default for Discovery<ZipExtractor> {
    fn default() -> Self {
        Self::new(DiscoveryOptions::default())
    }
}

/// What one pass over the directory saw.
#[derive(Debug, Default)]
struct Scan {
    graph_bundle: bool,
    module: Option<PathBuf>,
    archive: Option<PathBuf>,
    descriptor: Option<PathBuf>,
}

impl<E: ArchiveExtractor> Discovery<E> {
    pub fn with_extractor(options: DiscoveryOptions, extractor: E) -> Self {
        Self { options, extractor }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    pub fn discover(&self, root: &Path) -> Result<ModelArtifact> {
        if !root.is_dir() {
            let detail = if root.exists() {
                "not a directory"
            } else {
                "directory does not exist"
            };
            return Err(Error::NotFound {
                path: root.to_path_buf(),
                detail: detail.to_string(),
            });
        }

        for pass in 0..MAX_SCANS {
            let scan = self.scan(root)?;
            debug!(root = %root.display(), pass, ?scan, "scanned model directory");

            if self.options.require_descriptor && scan.descriptor.is_none() {
                return Err(Error::NotFound {
                    path: root.to_path_buf(),
                    detail: format!("no {DESCRIPTOR_FILE} found"),
                });
            }

            let artifact = match (scan.graph_bundle, scan.module) {
                (true, Some(module)) => {
                    ModelArtifact::ambiguous(root.to_path_buf(), module, weights_size(root))
                }
                (true, None) => ModelArtifact::graph_bundle(root.to_path_buf(), weights_size(root)),
                (false, Some(module)) => ModelArtifact::scripted_module(root.to_path_buf(), module),
                (false, None) => match scan.archive {
                    Some(archive) if pass + 1 < MAX_SCANS => {
                        let written = self
                            .extractor
                            .extract(&archive, root)
                            .map_err(|e| Error::io(&archive, e))?;
                        info!(archive = %archive.display(), written, "unpacked model bundle");
                        continue;
                    }
                    _ => break,
                },
            };

            let artifact = artifact.with_descriptor(scan.descriptor);
            info!(
                root = %root.display(),
                kind = ?artifact.kind(),
                weights_bytes = artifact.weights_bytes(),
                "discovered model artifact"
            );
            return Ok(artifact);
        }

        Err(Error::NotFound {
            path: root.to_path_buf(),
            detail: format!(
                "no {SAVED_MODEL_FILE} with {VARIABLES_DIR}/, scripted module, or bundle archive"
            ),
        })
    }

    /// Discovery with the framework decision injected. `decide` is only
    /// consulted for ambiguous directories; returning `None` leaves the
    /// ambiguity unresolved.
    pub fn discover_with<F>(&self, root: &Path, decide: F) -> Result<ResolvedArtifact>
    where
        F: FnOnce(&ModelArtifact) -> Option<Framework>,
    {
        let artifact = self.discover(root)?;
        match artifact.resolve() {
            Err(Error::AmbiguousFormat { path }) => match decide(&artifact) {
                Some(framework) => artifact.choose(framework),
                None => Err(Error::AmbiguousFormat { path }),
            },
            other => other,
        }
    }

    /// Every model below `models_dir`, keyed by directory name.
    pub fn discover_all(&self, models_dir: &Path) -> Result<Vec<(String, ModelArtifact)>> {
        if !models_dir.is_dir() {
            return Err(Error::NotFound {
                path: models_dir.to_path_buf(),
                detail: "models directory does not exist".to_string(),
            });
        }

        let mut found = Vec::new();
        for dir in sorted_entries(models_dir)? {
            if !dir.is_dir() {
                continue;
            }
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.discover(&dir) {
                Ok(artifact) => found.push((name, artifact)),
                Err(err) => debug!(dir = %dir.display(), error = %err, "skipping directory"),
            }
        }
        Ok(found)
    }

    fn scan(&self, root: &Path) -> Result<Scan> {
        let mut scan = Scan {
            graph_bundle: root.join(SAVED_MODEL_FILE).is_file()
                && root.join(VARIABLES_DIR).is_dir(),
            ..Scan::default()
        };

        let descriptor = root.join(DESCRIPTOR_FILE);
        if descriptor.is_file() {
            scan.descriptor = Some(descriptor);
        }

        let mut modules = Vec::new();
        for path in sorted_entries(root)? {
            if !path.is_file() {
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if self.is_module(&path) {
                modules.push(path);
            } else if scan.archive.is_none() && file_name.contains(&self.options.archive_marker) {
                scan.archive = Some(path);
            }
        }

        if modules.len() > 1 {
            warn!(
                root = %root.display(),
                count = modules.len(),
                chosen = %modules[0].display(),
                "several scripted modules found, using the first"
            );
        }
        scan.module = modules.into_iter().next();
        Ok(scan)
    }

    fn is_module(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.options.module_extensions.contains(&ext))
    }
}

/// [`Discovery::discover`] with default options.
pub fn discover(root: &Path) -> Result<ModelArtifact> {
    Discovery::default().discover(root)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

fn weights_size(root: &Path) -> u64 {
    WalkDir::new(root.join(VARIABLES_DIR))
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
