// Axis search regions around the waveform box

use dopplertrace_common::{Axis, BoundingBox, PixelRect, Roi, Side};

use crate::config::RoiConfig;

/// Strip right of the waveform carrying the velocity scale
pub fn vertical_scale_region(bbox: &BoundingBox, width: u32, height: u32, config: &RoiConfig) -> Roi {
    let left = bbox.xmax() as i64 + 1 + config.gap as i64;
    let bounds = PixelRect::from_edges_clamped(
        left,
        bbox.ymin() as i64 - config.padding as i64,
        left + config.strip_width as i64,
        bbox.ymax() as i64 + 1 + config.padding as i64,
        width,
        height,
    );

    Roi {
        side: Side::Right,
        axis: Axis::Vertical,
        bounds,
    }
}

/// Band under the waveform carrying the time scale
pub fn time_scale_region(bbox: &BoundingBox, width: u32, height: u32, config: &RoiConfig) -> Roi {
    let top = bbox.ymax() as i64 + 1 + config.gap as i64;
    let bounds = PixelRect::from_edges_clamped(
        bbox.xmin() as i64 - config.padding as i64,
        top,
        bbox.xmax() as i64 + 1,
        top + config.band_height as i64,
        width,
        height,
    );

    Roi {
        side: Side::Left,
        axis: Axis::Horizontal,
        bounds,
    }
}

/// Both axis regions, left first. Regions are clipped to the image and may be empty.
pub fn locate_rois(bbox: &BoundingBox, width: u32, height: u32, config: &RoiConfig) -> [Roi; 2] {
    [
        time_scale_region(bbox, width, height, config),
        vertical_scale_region(bbox, width, height, config),
    ]
}
