use std::collections::BTreeMap;

use serde::Serialize;

use crate::{DType, TensorSpec};

/// One tensor as declared by a signature, before an axis form is attached.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorDecl {
    pub dtype: DType,
    /// `None` when the backend reports an unknown rank.
    pub dims: Option<Vec<i64>>,
}

/// Raw signature entry point: tensor name -> declaration, plus method name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignatureDecl {
    pub method_name: String,
    pub inputs: BTreeMap<String, TensorDecl>,
    pub outputs: BTreeMap<String, TensorDecl>,
}

/// A signature resolved into tensor specs under a specific tag.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignatureBinding {
    pub tag: String,
    pub signature_name: String,
    pub method_name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl SignatureBinding {
    pub fn input(&self, name: &str) -> Option<&TensorSpec> {
        self.inputs.iter().find(|t| t.name.0 == name)
    }

    pub fn output(&self, name: &str) -> Option<&TensorSpec> {
        self.outputs.iter().find(|t| t.name.0 == name)
    }
}
