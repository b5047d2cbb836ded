//! Tag search and signature lookup for graph bundles.

pub mod tags;

use std::path::{Path, PathBuf};
use std::time::Instant;

use patchgeom_core::{
    AxisForm, CancelFlag, Error, GraphBackend, GraphMetadata, Result, Shape, SignatureBinding,
    TensorDecl, TensorSpec,
};
use tracing::{debug, info};

pub use tags::*;

/// A tag that opened the bundle, with the signatures it exposes.
pub struct TagResolution<G> {
    root: PathBuf,
    tag: String,
    signatures: Vec<String>,
    graph: G,
}

impl<G: GraphMetadata> TagResolution<G> {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn vendor_tag(&self) -> &str {
        tag_to_vendor(&self.tag)
    }

    /// Sorted signature names.
    pub fn signature_names(&self) -> &[String] {
        &self.signatures
    }

    pub fn vendor_signature_names(&self) -> Vec<String> {
        signatures_to_vendor(&self.signatures)
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }
}

pub struct SignatureResolver<B> {
    backend: B,
    candidates: Vec<String>,
}

impl<B: GraphBackend> SignatureResolver<B> {
    pub fn new(backend: B) -> Self {
        Self::with_candidates(backend, MODEL_TAGS.iter().map(|t| t.to_string()).collect())
    }

    pub fn with_candidates(backend: B, candidates: Vec<String>) -> Self {
        Self {
            backend,
            candidates,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// First candidate tag whose metadata opens, in candidate order.
    pub fn resolve_tag(&self, root: &Path) -> Result<TagResolution<B::Graph>> {
        self.resolve_tag_cancellable(root, &CancelFlag::new())
    }

    pub fn resolve_tag_cancellable(
        &self,
        root: &Path,
        cancel: &CancelFlag,
    ) -> Result<TagResolution<B::Graph>> {
        let mut tried = Vec::with_capacity(self.candidates.len());
        for tag in &self.candidates {
            if cancel.is_cancelled() {
                debug!(root = %root.display(), "tag search cancelled");
                return Err(Error::Cancelled);
            }
            if let Some(resolution) = self.try_tag(root, tag)? {
                return Ok(resolution);
            }
            tried.push(tag.clone());
        }

        Err(Error::Unresolved {
            path: root.to_path_buf(),
            tried,
        })
    }

    /// Opens a caller-supplied tag, canonical or vendor spelling.
    pub fn open_tag(&self, root: &Path, tag: &str) -> Result<TagResolution<B::Graph>> {
        let tag = tag_from_vendor(tag.trim());
        self.try_tag(root, tag)?.ok_or_else(|| Error::Unresolved {
            path: root.to_path_buf(),
            tried: vec![tag.to_string()],
        })
    }

    fn try_tag(&self, root: &Path, tag: &str) -> Result<Option<TagResolution<B::Graph>>> {
        let t0 = Instant::now();
        let graph = match self.backend.open(root, tag) {
            Ok(graph) => graph,
            Err(err) => {
                debug!(tag, backend = self.backend.name(), error = %err, "tag did not open");
                return Ok(None);
            }
        };

        let signatures = graph
            .signature_names()
            .map_err(|err| Error::MalformedMetadata {
                tag: tag.to_string(),
                detail: format!("{err:#}"),
            })?;

        info!(
            tag,
            backend = self.backend.name(),
            signatures = signatures.len(),
            load_ms = t0.elapsed().as_millis() as u64,
            "resolved model tag"
        );

        Ok(Some(TagResolution {
            root: root.to_path_buf(),
            tag: tag.to_string(),
            signatures,
            graph,
        }))
    }
}

/// Resolves one signature into tensor specs with default axis forms.
/// Vendor signature names are accepted.
pub fn get_entry_point<G: GraphMetadata>(
    resolution: &TagResolution<G>,
    signature: &str,
) -> Result<SignatureBinding> {
    let name = signature_from_vendor(signature.trim());
    let malformed = |detail: String| Error::MalformedMetadata {
        tag: resolution.tag.clone(),
        detail,
    };

    let decl = resolution
        .graph
        .signature(name)
        .map_err(|err| malformed(format!("{err:#}")))?
        .ok_or_else(|| Error::UnknownSignature {
            name: name.to_string(),
            available: resolution.signatures.clone(),
        })?;

    let inputs = decl
        .inputs
        .iter()
        .map(|(tensor, decl)| tensor_spec_from_decl(tensor, decl).map_err(&malformed))
        .collect::<Result<Vec<_>>>()?;
    let outputs = decl
        .outputs
        .iter()
        .map(|(tensor, decl)| tensor_spec_from_decl(tensor, decl).map_err(&malformed))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        signature = name,
        inputs = inputs.len(),
        outputs = outputs.len(),
        "resolved entry point"
    );

    Ok(SignatureBinding {
        tag: resolution.tag.clone(),
        signature_name: name.to_string(),
        method_name: decl.method_name,
        inputs,
        outputs,
    })
}

fn tensor_spec_from_decl(name: &str, decl: &TensorDecl) -> std::result::Result<TensorSpec, String> {
    let dims = decl
        .dims
        .as_ref()
        .ok_or_else(|| format!("tensor `{name}` has unknown rank"))?;
    let form = AxisForm::default_for_rank(dims.len())
        .ok_or_else(|| format!("tensor `{name}` has unsupported rank {}", dims.len()))?;
    TensorSpec::new(name, form, Shape::from_signed(dims)).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use anyhow::{anyhow, bail};
    use patchgeom_core::{AxisLabel, DType, ErrorKind, SignatureDecl};

    use super::*;

    #[derive(Clone)]
    enum FakeGraph {
        Ok(BTreeMap<String, SignatureDecl>),
        Broken,
    }

    impl GraphMetadata for FakeGraph {
        fn signature_names(&self) -> anyhow::Result<Vec<String>> {
            match self {
                FakeGraph::Ok(sigs) => Ok(sigs.keys().cloned().collect()),
                FakeGraph::Broken => bail!("signature map is not readable"),
            }
        }

        fn signature(&self, name: &str) -> anyhow::Result<Option<SignatureDecl>> {
            match self {
                FakeGraph::Ok(sigs) => Ok(sigs.get(name).cloned()),
                FakeGraph::Broken => bail!("signature map is not readable"),
            }
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        graphs: HashMap<String, FakeGraph>,
        opened: Mutex<Vec<String>>,
        cancel_after_open: Option<CancelFlag>,
    }

    impl GraphBackend for FakeBackend {
        type Graph = FakeGraph;

        fn name(&self) -> &'static str {
            "fake"
        }

        fn open(&self, _root: &Path, tag: &str) -> anyhow::Result<FakeGraph> {
            self.opened.lock().unwrap().push(tag.to_string());
            if let Some(flag) = &self.cancel_after_open {
                flag.cancel();
            }
            self.graphs
                .get(tag)
                .cloned()
                .ok_or_else(|| anyhow!("no meta graph tagged `{tag}`"))
        }
    }

    fn decl(dims: Option<Vec<i64>>) -> TensorDecl {
        TensorDecl {
            dtype: DType::F32,
            dims,
        }
    }

    fn unet() -> FakeGraph {
        let sig = SignatureDecl {
            method_name: "tensorflow/serving/predict".to_string(),
            inputs: BTreeMap::from([("input".to_string(), decl(Some(vec![-1, -1, -1, 1])))]),
            outputs: BTreeMap::from([
                ("output".to_string(), decl(Some(vec![-1, 256, 256, 2]))),
                ("scores".to_string(), decl(Some(vec![-1, 10]))),
            ]),
        };
        FakeGraph::Ok(BTreeMap::from([
            ("serving_default".to_string(), sig.clone()),
            ("train".to_string(), sig),
        ]))
    }

    fn backend_with(tags: &[(&str, FakeGraph)]) -> FakeBackend {
        FakeBackend {
            graphs: tags
                .iter()
                .map(|(tag, graph)| (tag.to_string(), graph.clone()))
                .collect(),
            ..FakeBackend::default()
        }
    }

    #[test]
    fn walks_candidates_in_order_until_one_opens() {
        let resolver = SignatureResolver::new(backend_with(&[("eval", unet()), ("gpu", unet())]));

        let resolution = resolver.resolve_tag(Path::new("/models/unet")).unwrap();
        assert_eq!(resolution.tag(), "eval");
        assert_eq!(
            resolution.vendor_tag(),
            "tf.saved_model.tag_constants.EVAL"
        );
        assert_eq!(
            resolution.signature_names(),
            &["serving_default".to_string(), "train".to_string()]
        );
        assert_eq!(
            *resolver.backend.opened.lock().unwrap(),
            vec!["serve", "inference", "train", "eval"]
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = SignatureResolver::new(backend_with(&[("train", unet()), ("tpu", unet())]));
        let first = resolver.resolve_tag(Path::new("/m")).unwrap();
        let second = resolver.resolve_tag(Path::new("/m")).unwrap();
        assert_eq!(first.tag(), second.tag());
        assert_eq!(first.signature_names(), second.signature_names());
    }

    #[test]
    fn exhausted_candidates_are_unresolved() {
        let resolver = SignatureResolver::new(backend_with(&[("custom", unet())]));
        let err = resolver.resolve_tag(Path::new("/m")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unresolved);
        match err {
            Error::Unresolved { tried, .. } => assert_eq!(tried, MODEL_TAGS),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn manual_tag_recovers_from_unresolved() {
        let resolver = SignatureResolver::new(backend_with(&[("custom", unet())]));
        let resolution = resolver.open_tag(Path::new("/m"), "custom").unwrap();
        assert_eq!(resolution.tag(), "custom");

        let err = resolver.open_tag(Path::new("/m"), "other").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unresolved);
    }

    #[test]
    fn manual_tag_accepts_vendor_spelling() {
        let resolver = SignatureResolver::new(backend_with(&[("serve", unet())]));
        let resolution = resolver
            .open_tag(Path::new("/m"), "tf.saved_model.tag_constants.SERVING")
            .unwrap();
        assert_eq!(resolution.tag(), "serve");
    }

    #[test]
    fn broken_signatures_are_malformed_and_not_retried() {
        let resolver = SignatureResolver::new(backend_with(&[
            ("serve", FakeGraph::Broken),
            ("inference", unet()),
        ]));
        let err = resolver.resolve_tag(Path::new("/m")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
        assert_eq!(*resolver.backend.opened.lock().unwrap(), vec!["serve"]);
    }

    #[test]
    fn cancellation_stops_the_search_without_a_result() {
        let cancel = CancelFlag::new();
        let backend = FakeBackend {
            cancel_after_open: Some(cancel.clone()),
            ..backend_with(&[("gpu", unet())])
        };
        let resolver = SignatureResolver::new(backend);

        let err = resolver
            .resolve_tag_cancellable(Path::new("/m"), &cancel)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(*resolver.backend.opened.lock().unwrap(), vec!["serve"]);
    }

    #[test]
    fn entry_point_builds_tensor_specs() {
        let resolver = SignatureResolver::new(backend_with(&[("serve", unet())]));
        let resolution = resolver.resolve_tag(Path::new("/m")).unwrap();

        let binding = get_entry_point(&resolution, "serving_default").unwrap();
        assert_eq!(binding.tag, "serve");
        assert_eq!(binding.signature_name, "serving_default");
        assert_eq!(binding.method_name, "tensorflow/serving/predict");
        assert_eq!(binding.inputs.len(), 1);

        let output = binding.output("output").unwrap();
        assert_eq!(output.form.to_string(), "BYXC");
        assert_eq!(output.size_of(AxisLabel::Batch), None);
        assert_eq!(output.size_of(AxisLabel::Height), Some(256));
        assert_eq!(binding.output("scores").unwrap().form.to_string(), "YX");
    }

    #[test]
    fn entry_point_accepts_vendor_signature_names() {
        let resolver = SignatureResolver::new(backend_with(&[("serve", unet())]));
        let resolution = resolver.resolve_tag(Path::new("/m")).unwrap();
        let binding = get_entry_point(
            &resolution,
            "tf.saved_model.signature_constants.DEFAULT_SERVING_SIGNATURE_DEF_KEY",
        )
        .unwrap();
        assert_eq!(binding.signature_name, "serving_default");
    }

    #[test]
    fn unknown_signature_lists_the_alternatives() {
        let resolver = SignatureResolver::new(backend_with(&[("serve", unet())]));
        let resolution = resolver.resolve_tag(Path::new("/m")).unwrap();
        let err = get_entry_point(&resolution, "predict").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSignature);
        assert!(err.to_string().contains("serving_default"));
    }

    #[test]
    fn unknown_rank_is_malformed() {
        let graph = FakeGraph::Ok(BTreeMap::from([(
            "serving_default".to_string(),
            SignatureDecl {
                method_name: String::new(),
                inputs: BTreeMap::from([("input".to_string(), decl(None))]),
                outputs: BTreeMap::from([("output".to_string(), decl(Some(vec![1, 2])))]),
            },
        )]));
        let resolver = SignatureResolver::new(backend_with(&[("serve", graph)]));
        let resolution = resolver.resolve_tag(Path::new("/m")).unwrap();
        let err = get_entry_point(&resolution, "serving_default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
    }
}
