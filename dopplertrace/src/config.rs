//! Tunable parameters for every pipeline stage.
//!
//! Defaults are calibrated for scanned Voluson-style doppler printouts.
//! Every struct is `#[serde(default)]` so a config file only needs the
//! keys it overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub colour: ColourConfig,
    pub segmentation: SegmentationConfig,
    pub roi: RoiConfig,
    pub axis: AxisConfig,
    pub trace: TraceConfig,
    pub correction: CorrectionConfig,
}

/// Colour cylinder used to pick out annotation text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColourConfig {
    pub target: [u8; 3],
    /// Half length of the cylinder along the origin → target direction
    pub radial: f64,
    /// Cylinder radius
    pub perpendicular: f64,
}

impl Default for ColourConfig {
    fn default() -> Self {
        Self {
            target: [255, 255, 100],
            radial: 95.0,
            perpendicular: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Luma above which a pixel belongs to the foreground
    pub intensity_threshold: u8,
    /// Smallest component area in pixels (drops text and speckle)
    pub min_area: u32,
    /// Minimum width / height of the waveform component (drops the B-mode sector)
    pub min_aspect: f64,
    /// Components whose box covers more of the image than this are chrome
    pub max_area_fraction: f64,
    /// Drop components touching the image border
    pub reject_border: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            intensity_threshold: 30,
            min_area: 400,
            min_aspect: 1.5,
            max_area_fraction: 0.9,
            reject_border: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Pixels left between the waveform box and a search region
    pub gap: u32,
    /// Width of the vertical scale strip right of the waveform
    pub strip_width: u32,
    /// Height of the time scale band under the waveform
    pub band_height: u32,
    /// Extension of each region past the box along its axis
    pub padding: u32,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            gap: 2,
            strip_width: 70,
            band_height: 40,
            padding: 20,
        }
    }
}

/// Size and placement of the label crop next to a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelBox {
    /// Distance from the tick's outer end
    pub offset: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub intensity_threshold: u8,
    /// Largest tick extent along the axis
    pub max_tick_thickness: u32,
    /// Tick extent across the axis
    pub min_tick_length: u32,
    pub max_tick_length: u32,
    /// Ticks start within this many pixels of the region's waveform-facing edge
    pub anchor_tolerance: u32,
    pub vertical_label: LabelBox,
    pub horizontal_label: LabelBox,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            intensity_threshold: 128,
            max_tick_thickness: 4,
            min_tick_length: 3,
            max_tick_length: 20,
            anchor_tolerance: 12,
            vertical_label: LabelBox {
                offset: 2,
                width: 40,
                height: 18,
            },
            horizontal_label: LabelBox {
                offset: 2,
                width: 36,
                height: 16,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub blur_sigma: f32,
    /// Radius of the morphological opening, 0 disables it
    pub opening_radius: u8,
    /// Running median window over contiguous columns, 1 disables it
    pub median_window: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            opening_radius: 1,
            median_window: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Peaks closer than this many samples belong to one cycle
    pub min_peak_distance: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_peak_distance: 10,
        }
    }
}
