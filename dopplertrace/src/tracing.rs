// Curve tracing module
// Extracts the top envelope of the doppler spectrum inside the waveform box

use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;

use dopplertrace_common::{BoundingBox, CurvePoint, CurveTrace};

use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::smoothing::apply_median_smoothing;

/// Binarised waveform box: blur, Otsu threshold, then a morphological
/// opening to drop speckle and thin grid lines
pub fn binarize_region(image: &RgbImage, bbox: &BoundingBox, config: &TraceConfig) -> GrayImage {
    let rect = bbox.to_rect().clamp_to(image.width(), image.height());
    let crop = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    let gray = imageops::grayscale(&crop);

    let blurred = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, config.blur_sigma)
    } else {
        gray
    };

    let level = otsu_level(&blurred);
    let binary = GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        if blurred.get_pixel(x, y).0[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    if config.opening_radius > 0 {
        open(&binary, Norm::LInf, config.opening_radius)
    } else {
        binary
    }
}

/// Topmost foreground pixel of every column, in image coordinates.
/// Returns the points and the number of empty columns.
pub fn topmost_pixels(binary: &GrayImage, origin_x: u32, origin_y: u32) -> (Vec<CurvePoint>, u32) {
    let mut points = Vec::with_capacity(binary.width() as usize);
    let mut gaps = 0;

    for x in 0..binary.width() {
        match (0..binary.height()).find(|&y| binary.get_pixel(x, y).0[0] > 0) {
            Some(y) => points.push(CurvePoint {
                x: origin_x + x,
                y: origin_y + y,
            }),
            None => gaps += 1,
        }
    }

    (points, gaps)
}

/// Trace the upper envelope of the waveform.
///
/// Columns with no foreground are left out of the trace and counted in
/// `gap_columns`; they are never interpolated.
pub fn trace_envelope(
    image: &RgbImage,
    bbox: &BoundingBox,
    config: &TraceConfig,
) -> Result<CurveTrace, TraceError> {
    let binary = binarize_region(image, bbox, config);
    let (raw, gaps) = topmost_pixels(&binary, bbox.xmin(), bbox.ymin());

    if raw.is_empty() {
        log::warn!("No curve pixels inside {}", bbox);
        return Err(TraceError::EmptyTrace);
    }

    let smoothed = apply_median_smoothing(&raw, config.median_window);
    let trace = CurveTrace::new(smoothed, gaps);

    log::info!(
        "Traced envelope: {} column(s), {} gap column(s)",
        trace.len(),
        trace.gap_columns
    );
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Filled waveform whose top edge follows `top(x)` down to `bottom`
    fn filled_waveform(width: u32, height: u32, bottom: u32, top: impl Fn(u32) -> u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        for x in 10..width - 10 {
            for y in top(x)..=bottom {
                image.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        image
    }

    #[test]
    fn test_traces_flat_top() {
        let image = filled_waveform(120, 80, 70, |_| 30);
        let bbox = BoundingBox::new(5, 114, 25, 75).unwrap();

        let trace = trace_envelope(&image, &bbox, &TraceConfig::default()).unwrap();

        assert!((98..=102).contains(&trace.len()));
        assert_eq!(trace.len() as u32 + trace.gap_columns, 110);
        assert!(trace.points().iter().all(|p| (28..=31).contains(&p.y)));
    }

    #[test]
    fn test_follows_a_ramp() {
        let image = filled_waveform(140, 100, 90, |x| 20 + (x - 10) / 2);
        let bbox = BoundingBox::new(10, 129, 20, 90).unwrap();

        let trace = trace_envelope(&image, &bbox, &TraceConfig::default()).unwrap();

        let xs: Vec<u32> = trace.points().iter().map(|p| p.x).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        for p in trace.points().iter().filter(|p| p.x > 14 && p.x < 125) {
            let expected = 20 + (p.x - 10) / 2;
            assert!(p.y.abs_diff(expected) <= 2, "x={} y={} expected {}", p.x, p.y, expected);
        }
    }

    #[test]
    fn test_gap_columns_are_not_filled() {
        let mut image = filled_waveform(120, 80, 70, |_| 30);
        for x in 50..60 {
            for y in 0..80 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let bbox = BoundingBox::new(5, 114, 25, 75).unwrap();

        let trace = trace_envelope(&image, &bbox, &TraceConfig::default()).unwrap();

        // Blur may bleed one column into the gap on each side
        assert!(trace.points().iter().all(|p| !(52..58).contains(&p.x)));
        assert!(trace.gap_columns >= 6);
    }

    #[test]
    fn test_uniform_region_is_empty() {
        let image = RgbImage::from_pixel(60, 40, Rgb([0, 0, 0]));
        let bbox = BoundingBox::new(5, 50, 5, 30).unwrap();

        assert_eq!(
            trace_envelope(&image, &bbox, &TraceConfig::default()),
            Err(TraceError::EmptyTrace)
        );
    }
}
