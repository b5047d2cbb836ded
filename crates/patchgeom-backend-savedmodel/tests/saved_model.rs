use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use patchgeom_backend_savedmodel::SavedModelBackend;
use patchgeom_core::{DType, GraphBackend, GraphMetadata};
use patchgeom_proto::{
    tensor_info, tensor_shape_proto::Dim, DataType, MetaGraphDef, MetaInfoDef, SavedModel,
    SignatureDef, TensorInfo, TensorShapeProto, SAVED_MODEL_FILE,
};
use prost::Message;

fn tensor(node: &str, dims: &[i64]) -> TensorInfo {
    TensorInfo {
        encoding: Some(tensor_info::Encoding::Name(node.to_string())),
        dtype: DataType::DtFloat as i32,
        tensor_shape: Some(TensorShapeProto {
            dim: dims
                .iter()
                .map(|&size| Dim {
                    size,
                    name: String::new(),
                })
                .collect(),
            unknown_rank: false,
        }),
    }
}

fn meta_graph(tags: &[&str], signatures: HashMap<String, SignatureDef>) -> MetaGraphDef {
    MetaGraphDef {
        meta_info_def: Some(MetaInfoDef {
            meta_graph_version: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tensorflow_version: "1.15.0".to_string(),
        }),
        signature_def: signatures,
    }
}

fn unet_signature() -> SignatureDef {
    SignatureDef {
        inputs: HashMap::from([("input".to_string(), tensor("input:0", &[-1, -1, -1, 1]))]),
        outputs: HashMap::from([(
            "output".to_string(),
            tensor("conv2d_19/Sigmoid:0", &[-1, -1, -1, 2]),
        )]),
        method_name: "tensorflow/serving/predict".to_string(),
    }
}

fn write_model(dir: &Path, meta_graphs: Vec<MetaGraphDef>) -> Result<()> {
    let model = SavedModel {
        saved_model_schema_version: 1,
        meta_graphs,
    };
    std::fs::write(dir.join(SAVED_MODEL_FILE), model.encode_to_vec())?;
    Ok(())
}

#[test]
fn opens_meta_graph_by_tag() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_model(
        dir.path(),
        vec![meta_graph(
            &["serve"],
            HashMap::from([("serving_default".to_string(), unet_signature())]),
        )],
    )?;

    let graph = SavedModelBackend::new().open(dir.path(), "serve")?;
    assert_eq!(graph.tensorflow_version(), "1.15.0");
    assert_eq!(graph.signature_names()?, vec!["serving_default".to_string()]);

    let sig = graph
        .signature("serving_default")?
        .context("missing serving_default")?;
    assert_eq!(sig.method_name, "tensorflow/serving/predict");
    let input = sig.inputs.get("input").context("missing input")?;
    assert_eq!(input.dtype, DType::F32);
    assert_eq!(input.dims.as_deref(), Some(&[-1, -1, -1, 1][..]));
    assert!(graph.signature("nope")?.is_none());
    Ok(())
}

#[test]
fn wrong_tag_fails_to_open() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_model(
        dir.path(),
        vec![meta_graph(
            &["train"],
            HashMap::from([("train".to_string(), unet_signature())]),
        )],
    )?;

    let backend = SavedModelBackend::new();
    assert!(backend.open(dir.path(), "serve").is_err());
    assert!(backend.open(dir.path(), "train").is_ok());
    Ok(())
}

#[test]
fn multi_tag_meta_graph_needs_the_full_set() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_model(
        dir.path(),
        vec![meta_graph(
            &["serve", "gpu"],
            HashMap::from([("serving_default".to_string(), unet_signature())]),
        )],
    )?;

    let backend = SavedModelBackend::new();
    assert!(backend.open(dir.path(), "serve").is_err());
    assert!(backend.open(dir.path(), "gpu").is_err());
    Ok(())
}

#[test]
fn missing_file_and_garbage_fail() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = SavedModelBackend::new();
    assert!(backend.open(dir.path(), "serve").is_err());

    std::fs::write(dir.path().join(SAVED_MODEL_FILE), b"\xff\xff\xff\xff not protobuf")?;
    assert!(backend.open(dir.path(), "serve").is_err());
    Ok(())
}

#[test]
fn signature_without_outputs_is_malformed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut broken = unet_signature();
    broken.outputs.clear();
    write_model(
        dir.path(),
        vec![meta_graph(
            &["serve"],
            HashMap::from([("serving_default".to_string(), broken)]),
        )],
    )?;

    let graph = SavedModelBackend::new().open(dir.path(), "serve")?;
    assert_eq!(graph.signature_names()?, vec!["serving_default".to_string()]);
    let err = graph.signature("serving_default").unwrap_err();
    assert!(err.to_string().contains("declares no outputs"));
    Ok(())
}

#[test]
fn init_op_signature_does_not_hide_the_others() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let init_op = SignatureDef {
        inputs: HashMap::new(),
        outputs: HashMap::from([("__saved_model_init_op".to_string(), tensor("NoOp", &[]))]),
        method_name: String::new(),
    };
    write_model(
        dir.path(),
        vec![meta_graph(
            &["serve"],
            HashMap::from([
                ("serving_default".to_string(), unet_signature()),
                ("__saved_model_init_op".to_string(), init_op),
            ]),
        )],
    )?;

    let graph = SavedModelBackend::new().open(dir.path(), "serve")?;
    assert_eq!(
        graph.signature_names()?,
        vec![
            "__saved_model_init_op".to_string(),
            "serving_default".to_string()
        ]
    );
    assert!(graph.signature("serving_default")?.is_some());
    assert!(graph.signature("__saved_model_init_op").is_err());
    Ok(())
}

#[test]
fn unknown_rank_is_reported_as_missing_dims() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut sig = unet_signature();
    sig.outputs.insert(
        "scores".to_string(),
        TensorInfo {
            encoding: Some(tensor_info::Encoding::Name("scores:0".to_string())),
            dtype: DataType::DtInt64 as i32,
            tensor_shape: Some(TensorShapeProto {
                dim: Vec::new(),
                unknown_rank: true,
            }),
        },
    );
    write_model(
        dir.path(),
        vec![meta_graph(
            &["serve"],
            HashMap::from([("serving_default".to_string(), sig)]),
        )],
    )?;

    let graph = SavedModelBackend::new().open(dir.path(), "serve")?;
    let sig = graph
        .signature("serving_default")?
        .context("missing signature")?;
    let scores = sig.outputs.get("scores").context("missing scores")?;
    assert_eq!(scores.dtype, DType::I64);
    assert!(scores.dims.is_none());
    Ok(())
}
