//! Typed failures for the fallible pipeline stages.
//!
//! Each stage returns its own error enum so the orchestrator can decide,
//! per stage, whether the run continues. `StageError` wraps them for the
//! report.

use dopplertrace_common::{Axis, FailureKind, Side};
use thiserror::Error;

/// Waveform segmentation failed; nothing downstream can run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// The single failure signal for "no waveform region found"
    #[error("no waveform region found ({candidates} component(s) rejected)")]
    NoWaveformRegion { candidates: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AxisError {
    #[error("{side} axis search region lies outside the image")]
    EmptyRegion { side: Side },

    #[error("{side} axis has {found} readable tick(s), at least 2 are needed")]
    TooFewTicks { side: Side, found: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("no curve pixels inside the waveform region")]
    EmptyTrace,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("insufficient calibration data on the {axis} axis: {found} tick(s), at least 2 are needed")]
    InsufficientData { axis: Axis, found: usize },

    #[error("{axis} axis ticks all share one pixel position")]
    DegenerateAxis { axis: Axis },

    #[error("no usable {axis} tick set")]
    MissingAxis { axis: Axis },

    #[error("curve trace is empty")]
    EmptyTrace,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("no templates supplied")]
    NoTemplates,

    #[error("unknown image institute, keys read: {keys:?}")]
    UnknownInstitute { keys: Vec<String> },
}

/// Any stage failure, as recorded in the stage report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Axis(#[from] AxisError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl StageError {
    /// Cause recorded in the stage report
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Segmentation(SegmentationError::EmptyImage { .. }) => FailureKind::EmptyImage,
            StageError::Segmentation(SegmentationError::NoWaveformRegion { .. }) => {
                FailureKind::NoWaveformRegion
            }
            StageError::Axis(AxisError::EmptyRegion { side }) => FailureKind::EmptyAxisRegion { side: *side },
            StageError::Axis(AxisError::TooFewTicks { side, found }) => FailureKind::TooFewTicks {
                side: *side,
                found: *found,
            },
            StageError::Trace(TraceError::EmptyTrace) => FailureKind::EmptyTrace,
            StageError::Calibration(CalibrationError::InsufficientData { axis, found }) => {
                FailureKind::InsufficientData {
                    axis: *axis,
                    found: *found,
                }
            }
            StageError::Calibration(CalibrationError::MissingAxis { axis }) => {
                FailureKind::InsufficientData { axis: *axis, found: 0 }
            }
            StageError::Calibration(CalibrationError::DegenerateAxis { axis }) => {
                FailureKind::DegenerateAxis { axis: *axis }
            }
            StageError::Calibration(CalibrationError::EmptyTrace) => FailureKind::EmptyTrace,
            StageError::Template(TemplateError::NoTemplates) => FailureKind::NoTemplates,
            StageError::Template(TemplateError::UnknownInstitute { .. }) => FailureKind::UnknownInstitute,
        }
    }
}
