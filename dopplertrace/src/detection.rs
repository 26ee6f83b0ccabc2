// Axis tick detection module
// Finds tick marks inside an axis search region and reads the label next to each one

use image::{imageops, RgbImage};

use dopplertrace_common::{Axis, PixelRect, Roi, Tick, TickSet};

use crate::config::{AxisConfig, LabelBox};
use crate::error::AxisError;
use crate::segmentation::{component_metrics, foreground_mask};
use crate::text::{read_number, TextRecognizer};

/// A tick-shaped component, before its label is read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickDetection {
    /// Centre of the tick along the axis, in image pixels
    pub position: f64,
    /// Tick extent in image pixels
    pub bounds: PixelRect,
}

/// Short dashes perpendicular to the axis that start near the region's
/// waveform-facing edge. Digits and minus signs sit further out or are
/// too thick along the axis.
pub fn detect_ticks(image: &RgbImage, roi: &Roi, config: &AxisConfig) -> Vec<TickDetection> {
    let region = roi.bounds.clamp_to(image.width(), image.height());
    if region.is_empty() {
        return Vec::new();
    }

    let crop = imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
    let gray = imageops::grayscale(&crop);
    let binary = foreground_mask(&gray, config.intensity_threshold);

    let mut detections: Vec<TickDetection> = component_metrics(&binary)
        .into_iter()
        .filter_map(|c| {
            let (thickness, length, anchor) = match roi.axis {
                Axis::Vertical => (c.height(), c.width(), c.xmin),
                Axis::Horizontal => (c.width(), c.height(), c.ymin),
            };
            if thickness > config.max_tick_thickness
                || length < config.min_tick_length
                || length > config.max_tick_length
                || anchor > config.anchor_tolerance
            {
                return None;
            }

            let (cx, cy) = c.centroid();
            let position = match roi.axis {
                Axis::Vertical => region.y as f64 + cy,
                Axis::Horizontal => region.x as f64 + cx,
            };
            Some(TickDetection {
                position,
                bounds: PixelRect::new(region.x + c.xmin, region.y + c.ymin, c.width(), c.height()),
            })
        })
        .collect();

    detections.sort_by(|a, b| a.position.total_cmp(&b.position));
    detections
}

/// Where the label of `tick` is printed: beside it on the vertical
/// scale, below it on the time scale
pub fn label_region(tick: &TickDetection, axis: Axis, config: &AxisConfig, width: u32, height: u32) -> PixelRect {
    let centre = tick.position.round() as i64;
    let (left, top, label): (i64, i64, &LabelBox) = match axis {
        Axis::Vertical => {
            let label = &config.vertical_label;
            (
                tick.bounds.right() as i64 + label.offset as i64,
                centre - label.height as i64 / 2,
                label,
            )
        }
        Axis::Horizontal => {
            let label = &config.horizontal_label;
            (
                centre - label.width as i64 / 2,
                tick.bounds.bottom() as i64 + label.offset as i64,
                label,
            )
        }
    };

    PixelRect::from_edges_clamped(
        left,
        top,
        left + label.width as i64,
        top + label.height as i64,
        width,
        height,
    )
}

/// Detect ticks and read their labels.
///
/// Ticks whose label does not read as a number are counted in
/// `unreadable` and left out. Only an empty search region is an error
/// here; see [`require_ticks`] for the minimum tick count.
pub fn scan_axis(
    image: &RgbImage,
    roi: &Roi,
    config: &AxisConfig,
    ocr: &mut dyn TextRecognizer,
) -> Result<TickSet, AxisError> {
    if roi.bounds.clamp_to(image.width(), image.height()).is_empty() {
        return Err(AxisError::EmptyRegion { side: roi.side });
    }

    let detections = detect_ticks(image, roi, config);
    let mut ticks = Vec::with_capacity(detections.len());
    let mut unreadable = 0;

    for detection in &detections {
        let rect = label_region(detection, roi.axis, config, image.width(), image.height());
        match read_number(image, &rect, ocr) {
            Some(value) => ticks.push(Tick {
                position: detection.position,
                value,
            }),
            None => {
                log::debug!(
                    "{} axis: tick at {:.1} has no readable label",
                    roi.side,
                    detection.position
                );
                unreadable += 1;
            }
        }
    }

    let mut set = TickSet::new(roi.side, roi.axis, ticks);
    set.candidates = detections.len();
    set.unreadable = unreadable;

    log::info!(
        "{} axis: {} tick(s) read ({} candidate(s), {} unreadable)",
        roi.side,
        set.len(),
        set.candidates,
        set.unreadable
    );
    Ok(set)
}

/// A tick set can calibrate its axis only with two or more ticks
pub fn require_ticks(set: &TickSet) -> Result<(), AxisError> {
    if set.len() < 2 {
        return Err(AxisError::TooFewTicks {
            side: set.side,
            found: set.len(),
        });
    }
    Ok(())
}
