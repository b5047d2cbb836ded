use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    GraphBundle,
    ScriptedModule,
    Ambiguous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Framework {
    TensorFlow,
    PyTorch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FrameworkHint {
    TensorFlow,
    PyTorch,
    TensorFlowOrPyTorch,
}

/// What discovery found in a model directory. Immutable once built;
/// reclassifying means running discovery again.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelArtifact {
    root: PathBuf,
    kind: ArtifactKind,
    framework_hint: FrameworkHint,
    module_path: Option<PathBuf>,
    weights_bytes: Option<u64>,
    descriptor_path: Option<PathBuf>,
}

impl ModelArtifact {
    pub fn graph_bundle(root: PathBuf, weights_bytes: u64) -> Self {
        Self {
            root,
            kind: ArtifactKind::GraphBundle,
            framework_hint: FrameworkHint::TensorFlow,
            module_path: None,
            weights_bytes: Some(weights_bytes),
            descriptor_path: None,
        }
    }

    pub fn scripted_module(root: PathBuf, module_path: PathBuf) -> Self {
        Self {
            root,
            kind: ArtifactKind::ScriptedModule,
            framework_hint: FrameworkHint::PyTorch,
            module_path: Some(module_path),
            weights_bytes: None,
            descriptor_path: None,
        }
    }

    pub fn ambiguous(root: PathBuf, module_path: PathBuf, weights_bytes: u64) -> Self {
        Self {
            root,
            kind: ArtifactKind::Ambiguous,
            framework_hint: FrameworkHint::TensorFlowOrPyTorch,
            module_path: Some(module_path),
            weights_bytes: Some(weights_bytes),
            descriptor_path: None,
        }
    }

    pub fn with_descriptor(mut self, path: Option<PathBuf>) -> Self {
        self.descriptor_path = path;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn framework_hint(&self) -> FrameworkHint {
        self.framework_hint
    }

    pub fn module_path(&self) -> Option<&Path> {
        self.module_path.as_deref()
    }

    /// Total size of the `variables` directory, graph bundles only.
    pub fn weights_bytes(&self) -> Option<u64> {
        self.weights_bytes
    }

    pub fn descriptor_path(&self) -> Option<&Path> {
        self.descriptor_path.as_deref()
    }

    /// Fixes the framework. Only meaningful for what the artifact holds:
    /// choosing PyTorch for a bare graph bundle fails.
    pub fn choose(&self, framework: Framework) -> Result<ResolvedArtifact> {
        match (self.kind, framework) {
            (ArtifactKind::GraphBundle | ArtifactKind::Ambiguous, Framework::TensorFlow) => {
                Ok(ResolvedArtifact::TfSavedModelDir(self.root.clone()))
            }
            (ArtifactKind::ScriptedModule | ArtifactKind::Ambiguous, Framework::PyTorch) => self
                .module_path
                .clone()
                .map(ResolvedArtifact::TorchScriptPath)
                .ok_or_else(|| Error::NotFound {
                    path: self.root.clone(),
                    detail: "no scripted module recorded".to_string(),
                }),
            (kind, framework) => Err(Error::NotFound {
                path: self.root.clone(),
                detail: format!("a {kind:?} artifact holds no {framework:?} model"),
            }),
        }
    }

    /// The unique usable model; ambiguous artifacts need [`Self::choose`].
    pub fn resolve(&self) -> Result<ResolvedArtifact> {
        match self.kind {
            ArtifactKind::GraphBundle => self.choose(Framework::TensorFlow),
            ArtifactKind::ScriptedModule => self.choose(Framework::PyTorch),
            ArtifactKind::Ambiguous => Err(Error::AmbiguousFormat {
                path: self.root.clone(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ResolvedArtifact {
    TfSavedModelDir(PathBuf),
    TorchScriptPath(PathBuf),
}
