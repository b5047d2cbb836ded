use patchgeom_core::{Error, ListRole, Result, TensorSpec};
use serde::{Deserialize, Serialize};

use crate::{
    remap_list_axes, validate_image_geometry, validate_pyramidal_geometry, AxisGeometry,
    ImageGeometry, ListGeometry, PyramidalGeometry, ReferenceInput,
};

/// What an output holds, as chosen by the caller. Pyramidal outputs are a
/// property of the whole model, not of one output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputClass {
    #[default]
    Image,
    List,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftKind {
    Image,
    Pyramidal,
    List,
}

impl DraftKind {
    pub fn for_output(class: OutputClass, pyramidal: bool) -> Self {
        match (class, pyramidal) {
            (OutputClass::List, _) => DraftKind::List,
            (OutputClass::Image, true) => DraftKind::Pyramidal,
            (OutputClass::Image, false) => DraftKind::Image,
        }
    }
}

/// Caller-entered geometry for one output, not yet validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GeometryDraft {
    Image {
        reference: String,
        axes: Vec<AxisGeometry>,
    },
    Pyramidal {
        levels: Vec<i64>,
    },
    List {
        roles: Vec<ListRole>,
    },
}

impl GeometryDraft {
    pub fn kind(&self) -> DraftKind {
        match self {
            GeometryDraft::Image { .. } => DraftKind::Image,
            GeometryDraft::Pyramidal { .. } => DraftKind::Pyramidal,
            GeometryDraft::List { .. } => DraftKind::List,
        }
    }

    /// Validates against `output`, returning the geometry and the output as
    /// it should be described afterwards.
    pub fn validate(
        &self,
        output: &TensorSpec,
        inputs: &[ReferenceInput],
    ) -> Result<(OutputKind, TensorSpec)> {
        match self {
            GeometryDraft::Image { reference, axes } => {
                let input = inputs
                    .iter()
                    .find(|i| i.name() == reference)
                    .ok_or_else(|| Error::UnknownTensor {
                        name: reference.clone(),
                    })?;
                let geometry = validate_image_geometry(input, output, axes)?;
                Ok((OutputKind::Image(geometry), output.clone()))
            }
            GeometryDraft::Pyramidal { levels } => {
                let geometry = validate_pyramidal_geometry(output, levels)?;
                Ok((OutputKind::Pyramidal(geometry), output.clone()))
            }
            GeometryDraft::List { roles } => {
                let table = remap_list_axes(output, roles)?;
                let geometry = ListGeometry {
                    roles: roles.clone(),
                    source_form: output.form.clone(),
                };
                Ok((OutputKind::List(geometry), table))
            }
        }
    }
}

/// A validated output geometry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputKind {
    Image(ImageGeometry),
    Pyramidal(PyramidalGeometry),
    List(ListGeometry),
}

impl OutputKind {
    pub fn kind(&self) -> DraftKind {
        match self {
            OutputKind::Image(_) => DraftKind::Image,
            OutputKind::Pyramidal(_) => DraftKind::Pyramidal,
            OutputKind::List(_) => DraftKind::List,
        }
    }
}
