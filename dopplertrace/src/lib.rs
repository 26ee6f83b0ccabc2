//! Digitize scanned doppler ultrasound printouts.
//!
//! The pipeline finds the waveform panel, reads both axis scales, traces
//! the upper envelope of the spectrum and maps it to calibrated time and
//! velocity. Readings printed on the scan are recovered through a
//! [`TextRecognizer`] and paired with the values computed from the
//! digitized series.

pub mod batch;
pub mod calibration;
pub mod colour;
pub mod config;
pub mod correction;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod roi;
pub mod segmentation;
pub mod smoothing;
pub mod template;
pub mod tesseract;
pub mod text;
pub mod tracing;

pub use config::PipelineConfig;
pub use error::StageError;
pub use pipeline::Digitizer;
pub use tesseract::TesseractRecognizer;
pub use text::{OcrProfile, TextRecognizer};
