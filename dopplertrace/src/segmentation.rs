// Waveform segmentation module
// Thresholds the scan and picks the connected component holding the doppler spectrum

use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use dopplertrace_common::BoundingBox;

use crate::config::SegmentationConfig;
use crate::error::SegmentationError;

/// The component chosen as the waveform
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformRegion {
    pub bbox: BoundingBox,
    /// Foreground pixels in the component
    pub area: u32,
    /// Components considered before filtering
    pub candidates: usize,
}

/// Shape measurements of one labelled component
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ComponentMetrics {
    pub label: u32,
    pub area: u32,
    pub xmin: u32,
    pub xmax: u32,
    pub ymin: u32,
    pub ymax: u32,
    /// Sums for the centroid
    sum_x: u64,
    sum_y: u64,
}

impl ComponentMetrics {
    fn new(label: u32, x: u32, y: u32) -> Self {
        Self {
            label,
            area: 0,
            xmin: x,
            xmax: x,
            ymin: y,
            ymax: y,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
        self.sum_x += x as u64;
        self.sum_y += y as u64;
    }

    pub fn width(&self) -> u32 {
        self.xmax - self.xmin + 1
    }

    pub fn height(&self) -> u32 {
        self.ymax - self.ymin + 1
    }

    pub fn centroid(&self) -> (f64, f64) {
        let n = self.area.max(1) as f64;
        (self.sum_x as f64 / n, self.sum_y as f64 / n)
    }

    fn touches_border(&self, width: u32, height: u32) -> bool {
        self.xmin == 0 || self.ymin == 0 || self.xmax + 1 >= width || self.ymax + 1 >= height
    }
}

/// Binary image, 255 where luma exceeds `threshold`
pub fn foreground_mask(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Label 8-connected foreground components and measure each one.
/// Returned in label order.
pub(crate) fn component_metrics(binary: &GrayImage) -> Vec<ComponentMetrics> {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));

    let mut metrics: Vec<Option<ComponentMetrics>> = Vec::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 {
            continue;
        }
        let idx = (label - 1) as usize;
        if idx >= metrics.len() {
            metrics.resize(idx + 1, None);
        }
        metrics[idx]
            .get_or_insert_with(|| ComponentMetrics::new(label, x, y))
            .add(x, y);
    }

    metrics.into_iter().flatten().collect()
}

/// Locate the waveform panel of a doppler scan.
///
/// The spectrum is the largest wide component that does not touch the
/// image border: text is too small, the B-mode sector too tall and the
/// screen chrome touches the border or spans the whole image.
pub fn segment_waveform(
    image: &RgbImage,
    config: &SegmentationConfig,
) -> Result<WaveformRegion, SegmentationError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentationError::EmptyImage { width, height });
    }

    let gray = image::imageops::grayscale(image);
    let binary = foreground_mask(&gray, config.intensity_threshold);
    let components = component_metrics(&binary);

    log::debug!(
        "Segmenting {}x{} image: {} component(s) above intensity {}",
        width,
        height,
        components.len(),
        config.intensity_threshold
    );

    let image_area = width as f64 * height as f64;
    let best = components
        .iter()
        .filter(|c| is_waveform_candidate(c, width, height, image_area, config))
        .max_by_key(|c| (c.area, std::cmp::Reverse(c.label)));

    match best {
        Some(c) => {
            let bbox = BoundingBox::new(c.xmin, c.xmax, c.ymin, c.ymax).ok_or(
                SegmentationError::NoWaveformRegion {
                    candidates: components.len(),
                },
            )?;
            log::info!("Waveform region {} (area {} px)", bbox, c.area);
            Ok(WaveformRegion {
                bbox,
                area: c.area,
                candidates: components.len(),
            })
        }
        None => {
            log::warn!(
                "No waveform region among {} component(s)",
                components.len()
            );
            Err(SegmentationError::NoWaveformRegion {
                candidates: components.len(),
            })
        }
    }
}

fn is_waveform_candidate(
    c: &ComponentMetrics,
    width: u32,
    height: u32,
    image_area: f64,
    config: &SegmentationConfig,
) -> bool {
    if c.area < config.min_area {
        return false;
    }
    if config.reject_border && c.touches_border(width, height) {
        log::trace!("  Component {}: REJECTED (touches border)", c.label);
        return false;
    }
    let aspect = c.width() as f64 / c.height() as f64;
    if aspect < config.min_aspect {
        log::trace!("  Component {}: REJECTED (aspect {:.2})", c.label, aspect);
        return false;
    }
    let box_fraction = (c.width() as f64 * c.height() as f64) / image_area;
    if box_fraction > config.max_area_fraction {
        log::trace!("  Component {}: REJECTED (covers {:.0}% of image)", c.label, box_fraction * 100.0);
        return false;
    }

    let (cx, cy) = c.centroid();
    log::trace!(
        "  Component {}: area={} box={}x{} centre=({:.0},{:.0})",
        c.label,
        c.area,
        c.width(),
        c.height(),
        cx,
        cy
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn fill(image: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, colour: [u8; 3]) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, Rgb(colour));
            }
        }
    }

    #[test]
    fn test_picks_wide_component_over_sector_and_chrome() {
        let mut image = RgbImage::new(300, 240);
        // Chrome bar along the top edge
        fill(&mut image, 0, 0, 300, 6, [90, 90, 90]);
        // B-mode sector: large but square
        fill(&mut image, 80, 20, 110, 100, [150, 150, 150]);
        // Waveform panel
        fill(&mut image, 40, 150, 200, 60, [200, 200, 200]);
        // Annotation text
        fill(&mut image, 250, 30, 12, 8, [255, 255, 100]);

        let region = segment_waveform(&image, &SegmentationConfig::default()).unwrap();

        assert_eq!(region.bbox, BoundingBox::new(40, 239, 150, 209).unwrap());
        assert_eq!(region.area, 200 * 60);
        assert_eq!(region.candidates, 4);
    }

    #[test]
    fn test_blank_image_has_no_region() {
        let image = RgbImage::new(64, 48);
        let result = segment_waveform(&image, &SegmentationConfig::default());
        assert_eq!(
            result,
            Err(SegmentationError::NoWaveformRegion { candidates: 0 })
        );
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let image = RgbImage::new(0, 10);
        assert!(matches!(
            segment_waveform(&image, &SegmentationConfig::default()),
            Err(SegmentationError::EmptyImage { .. })
        ));
    }

    #[test]
    fn test_component_metrics_box() {
        let mut binary = GrayImage::new(10, 10);
        for (x, y) in [(2, 3), (3, 4), (4, 4), (7, 8)] {
            binary.put_pixel(x, y, Luma([255]));
        }

        let metrics = component_metrics(&binary);

        assert_eq!(metrics.len(), 2);
        let first = metrics.iter().find(|m| m.area == 3).unwrap();
        assert_eq!((first.xmin, first.xmax, first.ymin, first.ymax), (2, 4, 3, 4));
        assert_eq!(first.width(), 3);
    }
}
