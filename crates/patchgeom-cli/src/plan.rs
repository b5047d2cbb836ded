//! JSON geometry plans: what the caller would otherwise type in, output by
//! output.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use patchgeom_core::{bound_index, AxisForm, AxisLabel, Error, SignatureBinding};
use patchgeom_geometry::{
    GeometryDraft, ModelGeometry, OutputClass, OutputDraft, ReferenceInput, ResolutionSession,
};
use patchgeom_signature::DEFAULT_SERVING_SIGNATURE;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default = "default_signature")]
    pub signature: String,
    #[serde(default)]
    pub pyramidal: bool,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputPlan>,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputPlan>,
}

fn default_signature() -> String {
    DEFAULT_SERVING_SIGNATURE.to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPlan {
    pub form: Option<String>,
    /// Keyed by axis letter.
    #[serde(default)]
    pub axes: BTreeMap<String, AxisPlan>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisPlan {
    pub minimum_size: usize,
    #[serde(default)]
    pub step: usize,
    pub patch: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputPlan {
    pub form: Option<String>,
    #[serde(default)]
    pub class: OutputClass,
    pub geometry: Option<GeometryDraft>,
    pub data_range: Option<[String; 2]>,
}

pub fn load(path: &Path) -> Result<Plan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading plan {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing plan {}", path.display()))
}

/// Runs every output of `binding` through a session, taking values from the
/// plan where it has them and the pre-filled defaults otherwise.
pub fn apply(plan: &Plan, binding: &SignatureBinding) -> Result<ModelGeometry> {
    let mut session = ResolutionSession::new(binding, plan.pyramidal)?;

    for (name, input_plan) in &plan.inputs {
        let spec = binding
            .input(name)
            .ok_or_else(|| Error::UnknownTensor { name: name.clone() })?;
        let spec = match &input_plan.form {
            Some(form) => spec.with_form(form.parse()?)?,
            None => spec.clone(),
        };
        let mut input = ReferenceInput::from_spec(spec);
        for (letter, axis) in &input_plan.axes {
            let label = axis_label(&input.spec.form, letter)?;
            input = input.with_axis(label, axis.minimum_size, axis.step, axis.patch)?;
        }
        session.replace_input(input)?;
    }

    for (name, output_plan) in &plan.outputs {
        let form = match &output_plan.form {
            Some(form) => form.parse()?,
            None => binding
                .output(name)
                .ok_or_else(|| Error::UnknownTensor { name: name.clone() })?
                .form
                .clone(),
        };
        session.configure_output(name, form, output_plan.class)?;
    }

    for _ in 0..session.outputs().len() {
        let name = session.current().name().to_string();
        let output_plan = plan.outputs.get(&name);
        let mut draft = match output_plan.and_then(|o| o.geometry.clone()) {
            Some(geometry) => OutputDraft::new(geometry),
            None => session.default_draft(),
        };
        if let Some([low, high]) = output_plan.and_then(|o| o.data_range.as_ref()) {
            let invalid = || Error::InvalidDataRange {
                low: low.clone(),
                high: high.clone(),
            };
            draft = draft.with_range(
                bound_index(low).ok_or_else(invalid)?,
                bound_index(high).ok_or_else(invalid)?,
            );
        }
        debug!(output = %name, ?draft, "entering output geometry");
        session.enter(draft)?;
        session
            .next()
            .with_context(|| format!("output `{name}` rejected"))?;
    }

    Ok(session.finish()?)
}

fn axis_label(form: &AxisForm, letter: &str) -> Result<AxisLabel> {
    let mut chars = letter.chars();
    let label = match (chars.next(), chars.next()) {
        (Some(c), None) => AxisLabel::from_char(c, form.is_tabular()),
        _ => None,
    };
    label.ok_or_else(|| {
        Error::InvalidForm {
            form: form.to_string(),
            detail: format!("`{letter}` is not an axis label"),
        }
        .into()
    })
}
