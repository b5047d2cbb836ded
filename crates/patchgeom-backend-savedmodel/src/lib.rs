use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use bytes::Bytes;
use patchgeom_core::{DType, GraphBackend, GraphMetadata, SignatureDecl, TensorDecl};
use patchgeom_proto::{
    tensor_info, DataType, MetaGraphDef, SavedModel, SignatureDef, TensorInfo, SAVED_MODEL_FILE,
};
use prost::Message;
use tracing::debug;

/// Reads signatures straight from `saved_model.pb`.
pub struct SavedModelBackend;

impl SavedModelBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SavedModelBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// The meta graph selected by one tag.
pub struct SavedModelGraph {
    tag: String,
    tensorflow_version: String,
    signatures: HashMap<String, SignatureDef>,
}

impl SavedModelGraph {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn tensorflow_version(&self) -> &str {
        &self.tensorflow_version
    }
}

impl GraphBackend for SavedModelBackend {
    type Graph = SavedModelGraph;

    fn name(&self) -> &'static str {
        "tensorflow-savedmodel"
    }

    fn open(&self, root: &Path, tag: &str) -> Result<Self::Graph> {
        let path = root.join(SAVED_MODEL_FILE);
        let raw = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let model = SavedModel::decode(Bytes::from(raw))
            .with_context(|| format!("failed to decode {}", path.display()))?;

        debug!(
            path = %path.display(),
            meta_graphs = model.meta_graphs.len(),
            "decoded saved model"
        );

        let meta = model
            .meta_graphs
            .into_iter()
            .find(|meta| tagged_exactly(meta, tag))
            .with_context(|| format!("no meta graph tagged `{tag}` in {}", path.display()))?;

        let tensorflow_version = meta
            .meta_info_def
            .as_ref()
            .map(|info| info.tensorflow_version.clone())
            .unwrap_or_default();

        Ok(SavedModelGraph {
            tag: tag.to_string(),
            tensorflow_version,
            signatures: meta.signature_def,
        })
    }
}

impl GraphMetadata for SavedModelGraph {
    fn signature_names(&self) -> Result<Vec<String>> {
        ensure!(
            !self.signatures.is_empty(),
            "meta graph `{}` declares no signatures",
            self.tag
        );

        // Listing does not validate: TF2 exports carry an outputs-only
        // `__saved_model_init_op` next to the real entry points.
        let mut names: Vec<String> = self.signatures.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Checks the named signature only.
    fn signature(&self, name: &str) -> Result<Option<SignatureDecl>> {
        self.signatures
            .get(name)
            .map(|sig| build_signature_decl(name, sig))
            .transpose()
    }
}

/// The engine loads a meta graph only when its tag set is exactly `{tag}`.
fn tagged_exactly(meta: &MetaGraphDef, tag: &str) -> bool {
    match &meta.meta_info_def {
        Some(info) => info.tags.len() == 1 && info.tags[0] == tag,
        None => false,
    }
}

fn build_signature_decl(name: &str, sig: &SignatureDef) -> Result<SignatureDecl> {
    ensure!(!sig.inputs.is_empty(), "signature `{name}` declares no inputs");
    ensure!(!sig.outputs.is_empty(), "signature `{name}` declares no outputs");

    let inputs = sig
        .inputs
        .iter()
        .map(|(key, info)| Ok((key.clone(), tensor_decl_from_info(key, info)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let outputs = sig
        .outputs
        .iter()
        .map(|(key, info)| Ok((key.clone(), tensor_decl_from_info(key, info)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(SignatureDecl {
        method_name: sig.method_name.clone(),
        inputs,
        outputs,
    })
}

fn tensor_decl_from_info(key: &str, info: &TensorInfo) -> Result<TensorDecl> {
    let Some(tensor_info::Encoding::Name(node)) = &info.encoding else {
        anyhow::bail!("tensor `{key}` is not a dense tensor");
    };
    debug!(key, node = %node, "tensor info");

    let dtype = tf_data_type_to_dtype(info.dtype);
    let dims = match &info.tensor_shape {
        Some(shape) if !shape.unknown_rank => {
            Some(shape.dim.iter().map(|d| d.size).collect::<Vec<_>>())
        }
        _ => None,
    };

    Ok(TensorDecl { dtype, dims })
}

fn tf_data_type_to_dtype(raw: i32) -> DType {
    match DataType::try_from(raw) {
        Ok(DataType::DtFloat) => DType::F32,
        Ok(DataType::DtHalf) => DType::F16,
        Ok(DataType::DtDouble) => DType::F64,
        Ok(DataType::DtInt64) => DType::I64,
        Ok(DataType::DtInt32) => DType::I32,
        Ok(DataType::DtUint8) => DType::U8,
        _ => DType::Other,
    }
}
