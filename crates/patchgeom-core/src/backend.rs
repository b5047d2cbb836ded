use std::path::Path;

use anyhow::Result;

use crate::SignatureDecl;

/// Reads the metadata of a graph bundle. Model execution lives elsewhere;
/// this is only "open under a tag, list signatures, describe one".
pub trait GraphBackend: Send + Sync + 'static {
    type Graph: GraphMetadata;

    fn name(&self) -> &'static str;

    /// Fails when no meta graph in `root` is addressed by `tag`.
    fn open(&self, root: &Path, tag: &str) -> Result<Self::Graph>;
}

pub trait GraphMetadata: Send + 'static {
    fn signature_names(&self) -> Result<Vec<String>>;

    /// `Ok(None)` when the signature does not exist.
    fn signature(&self, name: &str) -> Result<Option<SignatureDecl>>;
}
