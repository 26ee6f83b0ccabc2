// Colour isolation module
// Selects pixels inside a cylinder of RGB space centred on a target colour

use image::{GrayImage, Luma, RgbImage};

use crate::config::ColourConfig;

/// Cylinder in RGB space.
///
/// The axis runs through the target along the origin → target direction
/// and extends `radial` each way from the target; `perpendicular` is the
/// radius. Brightness changes from antialiasing or scanning move a colour
/// mostly along that axis, so they stay inside.
#[derive(Debug, Clone, Copy)]
pub struct ColourCylinder {
    centre: [f64; 3],
    /// Unit axis, None for a black target (the cylinder becomes a sphere)
    axis: Option<[f64; 3]>,
    radial: f64,
    perpendicular: f64,
}

impl ColourCylinder {
    pub fn new(target: [u8; 3], radial: f64, perpendicular: f64) -> Self {
        let centre = target.map(f64::from);
        let norm = (centre[0] * centre[0] + centre[1] * centre[1] + centre[2] * centre[2]).sqrt();
        let axis = (norm > 0.0).then(|| centre.map(|c| c / norm));

        Self {
            centre,
            axis,
            radial: radial.abs(),
            perpendicular: perpendicular.abs(),
        }
    }

    pub fn from_config(config: &ColourConfig) -> Self {
        Self::new(config.target, config.radial, config.perpendicular)
    }

    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        let d = [
            rgb[0] as f64 - self.centre[0],
            rgb[1] as f64 - self.centre[1],
            rgb[2] as f64 - self.centre[2],
        ];
        let dist_sq = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];

        match self.axis {
            Some(u) => {
                let along = d[0] * u[0] + d[1] * u[1] + d[2] * u[2];
                let perp_sq = (dist_sq - along * along).max(0.0);
                along.abs() <= self.radial && perp_sq <= self.perpendicular * self.perpendicular
            }
            None => dist_sq <= self.perpendicular * self.perpendicular,
        }
    }
}

/// Mask of the pixels near the configured colour, 255 where selected.
/// Same dimensions as the input.
pub fn isolate_colour(image: &RgbImage, config: &ColourConfig) -> GrayImage {
    let cylinder = ColourCylinder::from_config(config);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if cylinder.contains(image.get_pixel(x, y).0) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Number of selected pixels in a mask
pub fn mask_coverage(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}
