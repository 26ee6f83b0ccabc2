//! Synthetic doppler scans and a recognizer that reads them back.
//!
//! Axis labels are drawn as bars whose width encodes the label's index
//! in a lookup table; the recognizer measures the bar in the
//! preprocessed crop. Other fields are answered from a script whenever
//! the crop contains ink.

#![allow(dead_code)]

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use dopplertrace::config::AxisConfig;
use dopplertrace::{OcrProfile, TextRecognizer};
use dopplertrace_common::{PixelRect, Template};

pub const WIDTH: u32 = 480;
pub const HEIGHT: u32 = 360;

pub const WAVEFORM_X: u32 = 60;
pub const BASELINE_Y: u32 = 300;

const BAR_BASE: u32 = 7;
const BAR_STEP: u32 = 3;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const SPECTRUM: Rgb<u8> = Rgb([200, 200, 200]);
const SECTOR: Rgb<u8> = Rgb([120, 120, 120]);
const CHROME: Rgb<u8> = Rgb([80, 80, 80]);
const ANNOTATION: Rgb<u8> = Rgb([255, 255, 100]);

/// Fractions of the cardiac cycle
const RISE: f64 = 0.12;
const PLATEAU: f64 = 0.05;
const DECAY_RATE: f64 = 4.5;

/// Printed reference values of the synthetic scan
pub const READINGS: &str = "PS 70.64 cm/s\n\
                            ED 20.50 cm/s\n\
                            S/D 3.45\n\
                            PI 1.46\n\
                            RI 0.71\n\
                            TAmean 19.89 cm/s\n\
                            TAmax 34.40 cm/s\n\
                            HR 82 bpm\n";

pub const GROUND_TRUTH: [(&str, f64); 8] = [
    ("PS", 70.64),
    ("ED", 20.50),
    ("S/D", 3.45),
    ("PI", 1.46),
    ("RI", 0.71),
    ("TAmean", 19.89),
    ("TAmax", 34.40),
    ("HR", 82.0),
];

#[derive(Debug, Clone)]
pub struct SceneParams {
    pub peak_systolic: f64,
    pub end_diastolic: f64,
    pub heart_rate: f64,
    pub cycles: f64,
    /// Pixels per cm/s
    pub velocity_scale: f64,
    /// Pixels per second
    pub time_scale: f64,
    pub time_axis: bool,
    pub velocity_axis: bool,
    pub annotations: bool,
    pub template_fields: bool,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            peak_systolic: 70.64,
            end_diastolic: 20.50,
            heart_rate: 82.0,
            cycles: 4.0,
            velocity_scale: 2.0,
            time_scale: 100.0,
            time_axis: true,
            velocity_axis: true,
            annotations: true,
            template_fields: false,
        }
    }
}

impl SceneParams {
    /// Velocity of the envelope `t` seconds into the trace
    pub fn velocity_at(&self, t: f64) -> f64 {
        let period = 60.0 / self.heart_rate;
        let phase = (t / period).fract();
        let span = self.peak_systolic - self.end_diastolic;

        if phase < RISE {
            self.end_diastolic + span * (FRAC_PI_2 * phase / RISE).sin()
        } else if phase < RISE + PLATEAU {
            self.peak_systolic
        } else {
            let s = (phase - RISE - PLATEAU) / (1.0 - RISE - PLATEAU);
            let floor = (-DECAY_RATE).exp();
            self.end_diastolic + span * ((-DECAY_RATE * s).exp() - floor) / (1.0 - floor)
        }
    }

    pub fn waveform_width(&self) -> u32 {
        (self.cycles * 60.0 / self.heart_rate * self.time_scale) as u32
    }

    pub fn waveform_xmax(&self) -> u32 {
        WAVEFORM_X + self.waveform_width() - 1
    }
}

pub struct SyntheticScan {
    pub image: RgbImage,
    pub vertical_labels: Vec<String>,
    pub horizontal_labels: Vec<String>,
}

fn fill(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, colour: Rgb<u8>) {
    draw_filled_rect_mut(image, Rect::at(x as i32, y as i32).of_size(w, h), colour);
}

fn bar_width(index: usize) -> u32 {
    BAR_BASE + BAR_STEP * index as u32
}

/// Reference layout used by the template tests
pub fn scan_template() -> Template {
    Template {
        name: "synthetic".to_string(),
        key_str: "VOLUSON E8".to_string(),
        reference_width: WIDTH,
        reference_height: HEIGHT,
        key: PixelRect::new(16, 16, 40, 10),
        patient_id: PixelRect::new(16, 32, 40, 10),
        gestation: PixelRect::new(16, 48, 40, 10),
        exam_date: PixelRect::new(16, 64, 40, 10),
        vessel_type: PixelRect::new(16, 80, 12, 10),
    }
}

pub fn render_scan(scene: &SceneParams) -> SyntheticScan {
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, BLACK);

    // Screen chrome and B-mode sector
    draw_hollow_rect_mut(&mut image, Rect::at(0, 0).of_size(WIDTH, HEIGHT), CHROME);
    draw_hollow_rect_mut(&mut image, Rect::at(1, 1).of_size(WIDTH - 2, HEIGHT - 2), CHROME);
    fill(&mut image, 200, 20, 120, 100, SECTOR);

    // Spectrum: filled from the envelope down to the baseline
    let xmax = scene.waveform_xmax();
    for x in WAVEFORM_X..=xmax {
        let t = (x - WAVEFORM_X) as f64 / scene.time_scale;
        let top = (BASELINE_Y as f64 - scene.velocity_at(t) * scene.velocity_scale).round() as u32;
        fill(&mut image, x, top, 1, BASELINE_Y - top + 1, SPECTRUM);
    }

    // Velocity scale right of the spectrum, 10 cm/s per tick
    let mut vertical_labels = Vec::new();
    if scene.velocity_axis {
        let tick_x = xmax + 4;
        let top_value = (scene.peak_systolic / 10.0).floor() as u32 * 10;
        for (i, value) in (0..=top_value).step_by(10).enumerate() {
            let y = (BASELINE_Y as f64 - value as f64 * scene.velocity_scale).round() as u32;
            fill(&mut image, tick_x, y, 8, 1, WHITE);
            fill(&mut image, tick_x + 11, y - 2, bar_width(i), 5, WHITE);
            vertical_labels.push(value.to_string());
        }
    }

    // Time scale under the spectrum, one tick per half second
    let mut horizontal_labels = Vec::new();
    if scene.time_axis {
        let tick_y = BASELINE_Y + 4;
        let mut j = 0;
        loop {
            let x = WAVEFORM_X + (j as f64 * 0.5 * scene.time_scale).round() as u32;
            if x > xmax {
                break;
            }
            fill(&mut image, x, tick_y, 1, 8, WHITE);
            let w = bar_width(j);
            fill(&mut image, x - w / 2, tick_y + 11, w, 5, WHITE);
            horizontal_labels.push(format!("{}", j as f64 * 0.5));
            j += 1;
        }
    }

    if scene.annotations {
        for (i, width) in [40u32, 36, 30, 30, 30, 44, 44, 30].iter().enumerate() {
            fill(&mut image, 360, 30 + 9 * i as u32, *width, 5, ANNOTATION);
        }
    }

    if scene.template_fields {
        let template = scan_template();
        for rect in [
            template.key,
            template.patient_id,
            template.gestation,
            template.exam_date,
            template.vessel_type,
        ] {
            fill(&mut image, rect.x + 2, rect.y + 2, rect.width - 4, 5, WHITE);
        }
    }

    SyntheticScan {
        image,
        vertical_labels,
        horizontal_labels,
    }
}

/// Recognizer answering from the synthetic scene
pub struct ScriptedRecognizer {
    vertical: Vec<String>,
    horizontal: Vec<String>,
    vertical_label_height: u32,
    annotations: String,
    fields: HashMap<&'static str, String>,
    pub calls: usize,
}

impl ScriptedRecognizer {
    pub fn for_scan(scan: &SyntheticScan) -> Self {
        let mut fields = HashMap::new();
        fields.insert("template_key", "VOLUSON E8".to_string());
        fields.insert("patient_id", "ID4711".to_string());
        fields.insert("gestation", "32w3d".to_string());
        fields.insert("exam_date", "14.05.2019".to_string());
        fields.insert("vessel_type", "U".to_string());

        Self {
            vertical: scan.vertical_labels.clone(),
            horizontal: scan.horizontal_labels.clone(),
            vertical_label_height: AxisConfig::default().vertical_label.height,
            annotations: READINGS.to_string(),
            fields,
            calls: 0,
        }
    }

    /// Forget the velocity labels, as if they were illegible
    pub fn without_velocity_labels(mut self) -> Self {
        self.vertical.clear();
        self
    }
}

fn inked_columns(image: &GrayImage) -> u32 {
    (0..image.width())
        .filter(|&x| (0..image.height()).any(|y| image.get_pixel(x, y).0[0] == 0))
        .count() as u32
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&mut self, image: &GrayImage, profile: &OcrProfile) -> String {
        self.calls += 1;
        let inked = inked_columns(image);
        if inked == 0 {
            return String::new();
        }

        match profile.name {
            "axis_label" => {
                let table = if image.height() / profile.scale == self.vertical_label_height {
                    &self.vertical
                } else {
                    &self.horizontal
                };
                let width = inked as f64 / profile.scale as f64;
                let index = ((width - BAR_BASE as f64) / BAR_STEP as f64).round().max(0.0) as usize;
                table.get(index).cloned().unwrap_or_default()
            }
            "annotations" => self.annotations.clone(),
            other => self.fields.get(other).cloned().unwrap_or_default(),
        }
    }
}

/// Deterministic noise image
pub fn noise_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed;
    RgbImage::from_fn(width, height, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let v = (state >> 56) as u8;
        Rgb([v, v.wrapping_mul(3), v.wrapping_add(85)])
    })
}
