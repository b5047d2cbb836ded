//! Output-by-output resolution of a signature's geometry.
//!
//! Each output moves `Unset -> PendingInput -> Validated | Rejected`. A
//! rejected output stays rejected until the caller enters a corrected draft;
//! a validated one is final. The session keeps a cursor over the outputs and
//! only advances past one that validated.

use patchgeom_core::{
    range::RANGE_BOUNDS, AxisForm, DataRange, Error, Result, SignatureBinding, TensorSpec,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    default_list_roles, DraftKind, GeometryDraft, ImageGeometry, OutputClass, OutputKind,
    PyramidalGeometry, ReferenceInput,
};

/// Everything the caller enters for one output.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDraft {
    pub geometry: GeometryDraft,
    /// Indices into [`RANGE_BOUNDS`].
    pub range: (usize, usize),
}

impl OutputDraft {
    pub fn new(geometry: GeometryDraft) -> Self {
        Self {
            geometry,
            range: (0, RANGE_BOUNDS.len() - 1),
        }
    }

    pub fn with_range(mut self, low: usize, high: usize) -> Self {
        self.range = (low, high);
        self
    }
}

/// A finished output, as it goes into the model description.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedOutput {
    pub tensor: TensorSpec,
    pub geometry: OutputKind,
    pub data_range: DataRange,
}

#[derive(Clone, Debug)]
pub enum GeometryState {
    Unset,
    PendingInput(OutputDraft),
    Validated(ResolvedOutput),
    Rejected { draft: OutputDraft, error: Error },
}

impl GeometryState {
    fn name(&self) -> &'static str {
        match self {
            GeometryState::Unset => "unset",
            GeometryState::PendingInput(_) => "pending",
            GeometryState::Validated(_) => "validated",
            GeometryState::Rejected { .. } => "rejected",
        }
    }
}

/// One output and where it stands.
#[derive(Clone, Debug)]
pub struct OutputResolution {
    output: TensorSpec,
    class: OutputClass,
    expected: DraftKind,
    state: GeometryState,
}

impl OutputResolution {
    pub fn new(output: TensorSpec, class: OutputClass, pyramidal: bool) -> Self {
        Self {
            output,
            class,
            expected: DraftKind::for_output(class, pyramidal),
            state: GeometryState::Unset,
        }
    }

    pub fn output(&self) -> &TensorSpec {
        &self.output
    }

    pub fn name(&self) -> &str {
        &self.output.name.0
    }

    pub fn class(&self) -> OutputClass {
        self.class
    }

    pub fn expected_kind(&self) -> DraftKind {
        self.expected
    }

    pub fn state(&self) -> &GeometryState {
        &self.state
    }

    pub fn resolved(&self) -> Option<&ResolvedOutput> {
        match &self.state {
            GeometryState::Validated(resolved) => Some(resolved),
            _ => None,
        }
    }

    /// The draft last entered, whether pending or rejected.
    pub fn draft(&self) -> Option<&OutputDraft> {
        match &self.state {
            GeometryState::PendingInput(draft) | GeometryState::Rejected { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Pre-filled values for this output.
    pub fn default_draft(&self, inputs: &[ReferenceInput]) -> OutputDraft {
        let geometry = match self.expected {
            DraftKind::Image => match inputs.first() {
                Some(input) => GeometryDraft::Image {
                    reference: input.name().to_string(),
                    axes: ImageGeometry::defaults(input, &self.output),
                },
                None => GeometryDraft::Image {
                    reference: String::new(),
                    axes: Vec::new(),
                },
            },
            DraftKind::Pyramidal => GeometryDraft::Pyramidal {
                levels: PyramidalGeometry::defaults(&self.output),
            },
            DraftKind::List => GeometryDraft::List {
                roles: default_list_roles(&self.output),
            },
        };
        OutputDraft::new(geometry)
    }

    /// Records a draft. From `Rejected` this is the correction.
    pub fn enter(&mut self, draft: OutputDraft) -> Result<()> {
        if let GeometryState::Validated(_) = self.state {
            return Err(Error::InvalidState(format!(
                "output `{}` is already validated",
                self.name()
            )));
        }
        if draft.geometry.kind() != self.expected {
            return Err(Error::InvalidState(format!(
                "output `{}` takes {:?} geometry, got {:?}",
                self.name(),
                self.expected,
                draft.geometry.kind()
            )));
        }
        self.state = GeometryState::PendingInput(draft);
        Ok(())
    }

    /// Validates the pending draft.
    pub fn submit(&mut self, inputs: &[ReferenceInput]) -> Result<&ResolvedOutput> {
        let draft = match std::mem::replace(&mut self.state, GeometryState::Unset) {
            GeometryState::PendingInput(draft) => draft,
            other => {
                let err = Error::InvalidState(format!(
                    "output `{}` has no pending geometry ({})",
                    self.output.name,
                    other.name()
                ));
                self.state = other;
                return Err(err);
            }
        };

        let outcome = draft
            .geometry
            .validate(&self.output, inputs)
            .and_then(|(geometry, tensor)| {
                let data_range = DataRange::from_indices(draft.range.0, draft.range.1)?;
                Ok(ResolvedOutput {
                    tensor,
                    geometry,
                    data_range,
                })
            });

        match outcome {
            Ok(resolved) => {
                debug!(output = %self.output.name, kind = ?resolved.geometry.kind(), "output validated");
                self.state = GeometryState::Validated(resolved);
                self.resolved().ok_or_else(|| {
                    Error::InvalidState(format!("output `{}` lost its geometry", self.output.name))
                })
            }
            Err(error) => {
                warn!(output = %self.output.name, %error, "output rejected");
                self.state = GeometryState::Rejected {
                    draft,
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }

    fn reconfigure(&mut self, form: AxisForm, class: OutputClass, pyramidal: bool) -> Result<()> {
        if let GeometryState::Validated(_) = self.state {
            return Err(Error::InvalidState(format!(
                "output `{}` is already validated",
                self.name()
            )));
        }
        self.output = self.output.with_form(form)?;
        self.class = class;
        self.expected = DraftKind::for_output(class, pyramidal);
        self.state = GeometryState::Unset;
        Ok(())
    }
}

/// The description a finished session produces.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelGeometry {
    pub tag: String,
    pub signature: String,
    pub pyramidal: bool,
    pub inputs: Vec<ReferenceInput>,
    pub outputs: Vec<ResolvedOutput>,
}

/// Walks the outputs of one signature binding.
#[derive(Clone, Debug)]
pub struct ResolutionSession {
    tag: String,
    signature: String,
    pyramidal: bool,
    inputs: Vec<ReferenceInput>,
    outputs: Vec<OutputResolution>,
    current: usize,
}

impl ResolutionSession {
    /// Every output starts as an image; see [`Self::configure_output`].
    pub fn new(binding: &SignatureBinding, pyramidal: bool) -> Result<Self> {
        if binding.outputs.is_empty() {
            return Err(Error::InvalidState(format!(
                "signature `{}` has no outputs",
                binding.signature_name
            )));
        }
        Ok(Self {
            tag: binding.tag.clone(),
            signature: binding.signature_name.clone(),
            pyramidal,
            inputs: binding
                .inputs
                .iter()
                .cloned()
                .map(ReferenceInput::from_spec)
                .collect(),
            outputs: binding
                .outputs
                .iter()
                .cloned()
                .map(|o| OutputResolution::new(o, OutputClass::Image, pyramidal))
                .collect(),
            current: 0,
        })
    }

    pub fn is_pyramidal(&self) -> bool {
        self.pyramidal
    }

    pub fn inputs(&self) -> &[ReferenceInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputResolution] {
        &self.outputs
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &OutputResolution {
        &self.outputs[self.current]
    }

    /// Replaces the constraints of the input with the same name. Not allowed
    /// once any output validated against the old ones.
    pub fn replace_input(&mut self, input: ReferenceInput) -> Result<()> {
        if self.outputs.iter().any(|o| o.resolved().is_some()) {
            return Err(Error::InvalidState(
                "inputs cannot change after an output was validated".to_string(),
            ));
        }
        let slot = self
            .inputs
            .iter_mut()
            .find(|i| i.name() == input.name())
            .ok_or_else(|| Error::UnknownTensor {
                name: input.name().to_string(),
            })?;
        *slot = input;
        Ok(())
    }

    /// Sets an output's axis form and class, discarding any draft.
    pub fn configure_output(&mut self, name: &str, form: AxisForm, class: OutputClass) -> Result<()> {
        let pyramidal = self.pyramidal;
        self.output_mut(name)?.reconfigure(form, class, pyramidal)
    }

    pub fn default_draft(&self) -> OutputDraft {
        self.current().default_draft(&self.inputs)
    }

    /// Enters a draft for the current output.
    pub fn enter(&mut self, draft: OutputDraft) -> Result<()> {
        self.outputs[self.current].enter(draft)
    }

    /// Enters and validates a draft for the named output, wherever the
    /// cursor is.
    pub fn resolve_output(&mut self, name: &str, draft: OutputDraft) -> Result<&ResolvedOutput> {
        let Self {
            inputs, outputs, ..
        } = self;
        let output = outputs
            .iter_mut()
            .find(|o| o.name() == name)
            .ok_or_else(|| Error::UnknownTensor {
                name: name.to_string(),
            })?;
        output.enter(draft)?;
        output.submit(inputs)
    }

    /// Validates the current output if needed, then moves to the next one.
    /// Stays put on failure, and on the last output.
    pub fn next(&mut self) -> Result<usize> {
        let Self {
            inputs,
            outputs,
            current,
            ..
        } = self;
        let output = &mut outputs[*current];
        if output.resolved().is_none() {
            output.submit(inputs)?;
        }
        if *current + 1 < outputs.len() {
            *current += 1;
        }
        Ok(*current)
    }

    /// Moves back one output. Validated outputs stay validated.
    pub fn previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// The finished description. Every output must be validated.
    pub fn finish(&self) -> Result<ModelGeometry> {
        let outputs = self
            .outputs
            .iter()
            .map(|o| {
                o.resolved().cloned().ok_or_else(|| {
                    Error::InvalidState(format!(
                        "output `{}` is not resolved ({})",
                        o.name(),
                        o.state.name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            tag = %self.tag,
            signature = %self.signature,
            outputs = outputs.len(),
            "model geometry resolved"
        );
        Ok(ModelGeometry {
            tag: self.tag.clone(),
            signature: self.signature.clone(),
            pyramidal: self.pyramidal,
            inputs: self.inputs.clone(),
            outputs,
        })
    }

    fn output_mut(&mut self, name: &str) -> Result<&mut OutputResolution> {
        self.outputs
            .iter_mut()
            .find(|o| o.name() == name)
            .ok_or_else(|| Error::UnknownTensor {
                name: name.to_string(),
            })
    }
}
