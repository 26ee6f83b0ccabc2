//! Single-image digitization.
//!
//! [`Digitizer`] runs the stages in order and records the outcome of
//! each one. A stage whose required input was not produced is recorded
//! as skipped and never invoked. The run always yields a report.

use image::RgbImage;

use dopplertrace_common::{
    CalibratedSeries, CurveTrace, DigitizationReport, MetadataRecord, ResultTable, Roi, Stage, StageReport,
    StageStatus, Template, TickSet,
};

use crate::calibration::calibrate;
use crate::colour::isolate_colour;
use crate::config::PipelineConfig;
use crate::correction::{build_table, summarize, WaveformSummary};
use crate::detection::{require_ticks, scan_axis};
use crate::error::{StageError, TemplateError};
use crate::roi::locate_rois;
use crate::segmentation::segment_waveform;
use crate::template::{extract_metadata, select_template};
use crate::text::{extract_readings, TextRecognizer};
use crate::tracing::trace_envelope;

fn failed(error: impl Into<StageError>) -> StageStatus {
    let error = error.into();
    StageStatus::Failed {
        kind: error.kind(),
        reason: error.to_string(),
    }
}

fn degraded(reason: impl Into<String>) -> StageStatus {
    StageStatus::Degraded {
        reason: reason.into(),
    }
}

/// Runs the pipeline on one image. Holds only read-only configuration,
/// so one instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Digitizer {
    config: PipelineConfig,
    templates: Vec<Template>,
}

impl Digitizer {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            templates: Vec::new(),
        }
    }

    pub fn with_templates(mut self, templates: Vec<Template>) -> Self {
        self.templates = templates;
        self
    }

    pub fn digitize(&self, image: &RgbImage, ocr: &mut dyn TextRecognizer) -> DigitizationReport {
        let mut stages = StageReport::default();
        let metadata = self.read_metadata(image, ocr, &mut stages);
        let mut report = DigitizationReport {
            metadata,
            bounding_box: None,
            rois: Vec::new(),
            ticks: Vec::new(),
            trace: None,
            series: None,
            table: ResultTable::default(),
            stages,
        };

        let summary = self.digitize_waveform(image, ocr, &mut report);

        report.table = build_table(&report.metadata.readings, summary.as_ref());
        let correction = match &summary {
            Some(_) => StageStatus::Succeeded,
            None => degraded("no calibrated series, digitized values left empty"),
        };
        report.stages.record(Stage::Correction, correction);

        if report.stages.low_confidence() {
            log::warn!("Digitization finished with low confidence");
        }
        report
    }

    /// Annotation readings and template fields
    fn read_metadata(
        &self,
        image: &RgbImage,
        ocr: &mut dyn TextRecognizer,
        stages: &mut StageReport,
    ) -> MetadataRecord {
        let mask = isolate_colour(image, &self.config.colour);
        stages.record(Stage::ColourIsolation, StageStatus::Succeeded);

        let readings = extract_readings(&mask, ocr);
        let text_status = if readings.is_empty() {
            degraded("no annotation readings recognised")
        } else {
            StageStatus::Succeeded
        };
        stages.record(Stage::TextExtraction, text_status);

        let mut metadata = match select_template(image, &self.templates, ocr) {
            Ok(template) => {
                stages.record(Stage::Metadata, StageStatus::Succeeded);
                extract_metadata(image, &template, ocr)
            }
            Err(TemplateError::NoTemplates) => {
                stages.record(Stage::Metadata, degraded("no templates configured"));
                MetadataRecord::default()
            }
            Err(e) => {
                log::warn!("{}", e);
                stages.record(Stage::Metadata, failed(e));
                MetadataRecord::default()
            }
        };
        metadata.readings = readings;
        metadata
    }

    /// Segmentation through calibration. Returns the summary when a
    /// calibrated series was produced.
    fn digitize_waveform(
        &self,
        image: &RgbImage,
        ocr: &mut dyn TextRecognizer,
        report: &mut DigitizationReport,
    ) -> Option<WaveformSummary> {
        let stages = &mut report.stages;

        let region = match segment_waveform(image, &self.config.segmentation) {
            Ok(region) => {
                stages.record(Stage::Segmentation, StageStatus::Succeeded);
                region
            }
            Err(e) => {
                stages.record(Stage::Segmentation, failed(e));
                for stage in [
                    Stage::RoiLocation,
                    Stage::LeftAxis,
                    Stage::RightAxis,
                    Stage::CurveTrace,
                    Stage::Calibration,
                ] {
                    stages.record(
                        stage,
                        StageStatus::Skipped {
                            missing: Stage::Segmentation,
                        },
                    );
                }
                return None;
            }
        };
        report.bounding_box = Some(region.bbox);

        let rois = locate_rois(&region.bbox, image.width(), image.height(), &self.config.roi);
        stages.record(Stage::RoiLocation, StageStatus::Succeeded);
        report.rois = rois.to_vec();

        let [left_roi, right_roi] = rois;
        let horizontal = self.read_ticks(image, &left_roi, Stage::LeftAxis, ocr, stages);
        let vertical = self.read_ticks(image, &right_roi, Stage::RightAxis, ocr, stages);
        report.ticks = [&horizontal, &vertical]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        let trace = match trace_envelope(image, &region.bbox, &self.config.trace) {
            Ok(trace) => {
                let status = if trace.gap_columns > 0 {
                    degraded(format!("{} column(s) without curve pixels", trace.gap_columns))
                } else {
                    StageStatus::Succeeded
                };
                stages.record(Stage::CurveTrace, status);
                trace
            }
            Err(e) => {
                stages.record(Stage::CurveTrace, failed(e));
                stages.record(
                    Stage::Calibration,
                    StageStatus::Skipped {
                        missing: Stage::CurveTrace,
                    },
                );
                return None;
            }
        };

        let series = self.calibrate_trace(&trace, horizontal.as_ref(), vertical.as_ref(), stages);
        report.trace = Some(trace);

        let summary = series
            .as_ref()
            .map(|series| summarize(series, &self.config.correction));
        report.series = series;
        summary
    }

    /// Tick set of one axis, None when its search region is empty
    fn read_ticks(
        &self,
        image: &RgbImage,
        roi: &Roi,
        stage: Stage,
        ocr: &mut dyn TextRecognizer,
        stages: &mut StageReport,
    ) -> Option<TickSet> {
        let set = match scan_axis(image, roi, &self.config.axis, ocr) {
            Ok(set) => set,
            Err(e) => {
                stages.record(stage, failed(e));
                return None;
            }
        };

        match require_ticks(&set) {
            Ok(()) if set.unreadable > 0 => {
                stages.record(
                    stage,
                    degraded(format!("{} tick label(s) unreadable", set.unreadable)),
                );
            }
            Ok(()) => stages.record(stage, StageStatus::Succeeded),
            Err(e) => {
                log::warn!("{}", e);
                stages.record(stage, failed(e));
            }
        }
        Some(set)
    }

    /// The vertical fit is required. Without a horizontal fit the series
    /// keeps pixel columns as its time axis.
    fn calibrate_trace(
        &self,
        trace: &CurveTrace,
        horizontal: Option<&TickSet>,
        vertical: Option<&TickSet>,
        stages: &mut StageReport,
    ) -> Option<CalibratedSeries> {
        let right_usable = stages
            .status(Stage::RightAxis)
            .is_some_and(StageStatus::is_usable);
        let left_usable = stages
            .status(Stage::LeftAxis)
            .is_some_and(StageStatus::is_usable);

        let Some(vertical) = vertical.filter(|_| right_usable) else {
            stages.record(
                Stage::Calibration,
                StageStatus::Skipped {
                    missing: Stage::RightAxis,
                },
            );
            return None;
        };
        let horizontal = horizontal.filter(|_| left_usable);

        match calibrate(trace, horizontal, vertical) {
            Ok(calibration) => {
                let status = match calibration.time_fallback {
                    Some(e) => degraded(format!("time axis uncalibrated: {}", e)),
                    None => StageStatus::Succeeded,
                };
                stages.record(Stage::Calibration, status);
                Some(calibration.series)
            }
            Err(e) => {
                stages.record(Stage::Calibration, failed(e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dopplertrace_common::FailureKind;
    use image::{GrayImage, Rgb};

    use crate::text::OcrProfile;

    #[test]
    fn test_blank_image_reports_segmentation_failure() {
        let image = RgbImage::from_pixel(120, 80, Rgb([0, 0, 0]));
        let mut ocr = |_: &GrayImage, _: &OcrProfile| String::new();

        let report = Digitizer::default().digitize(&image, &mut ocr);

        assert!(matches!(
            report.stages.status(Stage::Segmentation),
            Some(StageStatus::Failed {
                kind: FailureKind::NoWaveformRegion,
                ..
            })
        ));
        assert_eq!(
            report.stages.status(Stage::CurveTrace),
            Some(&StageStatus::Skipped {
                missing: Stage::Segmentation
            })
        );
        assert!(report.bounding_box.is_none());
        assert!(report.series.is_none());
        assert!(report.table.is_empty());
    }

    #[test]
    fn test_readings_survive_failed_segmentation() {
        let mut image = RgbImage::from_pixel(120, 80, Rgb([0, 0, 0]));
        for x in 10..30 {
            for y in 10..16 {
                image.put_pixel(x, y, Rgb([255, 255, 100]));
            }
        }
        let mut ocr = |_: &GrayImage, profile: &OcrProfile| match profile.name {
            "annotations" => String::from("PS 55.0 cm/s\nRI 0.62"),
            _ => String::new(),
        };

        let report = Digitizer::default().digitize(&image, &mut ocr);

        assert_eq!(report.metadata.readings.len(), 2);
        assert_eq!(report.table.len(), 2);
        assert!(report.table.rows.iter().all(|r| r.digitized.is_none()));
        assert_eq!(
            report.stages.status(Stage::TextExtraction),
            Some(&StageStatus::Succeeded)
        );
    }
}
