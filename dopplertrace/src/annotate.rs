// Debug annotation module
// Draws the pipeline's intermediate results over the input scan

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use dopplertrace_common::{Axis, DigitizationReport, PixelRect};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]); // Green for the waveform box
const ROI_COLOR: Rgb<u8> = Rgb([0, 255, 255]); // Cyan for axis search regions
const TICK_COLOR: Rgb<u8> = Rgb([255, 0, 255]); // Magenta for ticks
const TRACE_COLOR: Rgb<u8> = Rgb([255, 0, 0]); // Red for the envelope
const BASELINE_COLOR: Rgb<u8> = Rgb([255, 128, 0]);

fn to_rect(rect: &PixelRect) -> Option<Rect> {
    (!rect.is_empty()).then(|| Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height))
}

/// Copy of `image` with the report drawn on top
pub fn draw_annotations(image: &RgbImage, report: &DigitizationReport) -> RgbImage {
    let mut img = image.clone();

    if let Some(bbox) = &report.bounding_box {
        if let Some(rect) = to_rect(&bbox.to_rect()) {
            draw_hollow_rect_mut(&mut img, rect, BOX_COLOR);
        }
    }

    for roi in &report.rois {
        if let Some(rect) = to_rect(&roi.bounds) {
            draw_hollow_rect_mut(&mut img, rect, ROI_COLOR);
        }
    }

    // Crosshair on each tick, pinned to the edge of its region
    for set in &report.ticks {
        let Some(roi) = report.rois.iter().find(|r| r.side == set.side) else {
            continue;
        };
        for tick in set.ticks() {
            let (x, y) = match set.axis {
                Axis::Vertical => (roi.bounds.x as i32, tick.position.round() as i32),
                Axis::Horizontal => (tick.position.round() as i32, roi.bounds.y as i32),
            };
            draw_cross_mut(&mut img, TICK_COLOR, x, y);
        }
    }

    if let Some(trace) = &report.trace {
        for pair in trace.points().windows(2) {
            // Gaps stay visible
            if pair[1].x != pair[0].x + 1 {
                continue;
            }
            draw_line_segment_mut(
                &mut img,
                (pair[0].x as f32, pair[0].y as f32),
                (pair[1].x as f32, pair[1].y as f32),
                TRACE_COLOR,
            );
        }
    }

    if let (Some(series), Some(bbox)) = (&report.series, &report.bounding_box) {
        if let Some(baseline) = series.baseline {
            let y = baseline.pixel as f32;
            draw_line_segment_mut(
                &mut img,
                (bbox.xmin() as f32, y),
                (bbox.xmax() as f32, y),
                BASELINE_COLOR,
            );
        }
    }

    img
}
