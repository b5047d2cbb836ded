use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use patchgeom_core::{ArtifactKind, ModelArtifact};
use patchgeom_discovery::Discovery;
use serde::Serialize;

/// Models found under one directory, by name.
#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelArtifact>,
}

#[derive(Serialize)]
pub struct ModelEntry<'a> {
    pub name: &'a str,
    #[serde(flatten)]
    pub artifact: &'a ModelArtifact,
    pub needs_choice: bool,
}

impl ModelRegistry {
    pub fn scan(discovery: &Discovery, models_dir: &Path) -> Result<Self> {
        let models = discovery.discover_all(models_dir)?.into_iter().collect();
        Ok(Self { models })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn entries(&self) -> Vec<ModelEntry<'_>> {
        self.models
            .iter()
            .map(|(name, artifact)| ModelEntry {
                name,
                artifact,
                needs_choice: artifact.kind() == ArtifactKind::Ambiguous,
            })
            .collect()
    }
}
