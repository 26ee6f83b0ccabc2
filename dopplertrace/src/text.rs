// Text extraction module
// OCR preprocessing, the recognizer seam and parsing of the recognised text

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use once_cell::sync::Lazy;
use regex::Regex;

use dopplertrace_common::{Field, FieldStatus, PixelRect, Reading, VesselType};

use crate::colour::mask_coverage;

/// Placeholder stored for a field whose crop produced no text
pub const NO_TEXT: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    SingleLine,
    SingleWord,
    Block,
}

/// Recognition parameters for one kind of field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrProfile {
    pub name: &'static str,
    pub layout: PageLayout,
    /// Characters the engine may emit, None for unrestricted
    pub whitelist: Option<&'static str>,
    /// Nearest-neighbour upscale applied before recognition
    pub scale: u32,
}

impl OcrProfile {
    pub const PATIENT_ID: OcrProfile = OcrProfile {
        name: "patient_id",
        layout: PageLayout::SingleLine,
        whitelist: None,
        scale: 2,
    };

    pub const GESTATION: OcrProfile = OcrProfile {
        name: "gestation",
        layout: PageLayout::SingleLine,
        whitelist: Some("0123456789wWdD=:"),
        scale: 2,
    };

    pub const EXAM_DATE: OcrProfile = OcrProfile {
        name: "exam_date",
        layout: PageLayout::SingleLine,
        whitelist: Some("0123456789./"),
        scale: 2,
    };

    /// Single letter field, upscaled harder
    pub const VESSEL_TYPE: OcrProfile = OcrProfile {
        name: "vessel_type",
        layout: PageLayout::SingleWord,
        whitelist: Some("LUR"),
        scale: 4,
    };

    pub const AXIS_LABEL: OcrProfile = OcrProfile {
        name: "axis_label",
        layout: PageLayout::SingleLine,
        whitelist: Some("0123456789-."),
        scale: 2,
    };

    pub const ANNOTATIONS: OcrProfile = OcrProfile {
        name: "annotations",
        layout: PageLayout::Block,
        whitelist: None,
        scale: 2,
    };

    pub const TEMPLATE_KEY: OcrProfile = OcrProfile {
        name: "template_key",
        layout: PageLayout::SingleLine,
        whitelist: None,
        scale: 2,
    };
}

/// An OCR engine.
///
/// Receives a preprocessed crop (dark text on white) and returns the raw
/// text. Engine failures and timeouts come back as an empty string.
pub trait TextRecognizer {
    fn recognize(&mut self, image: &GrayImage, profile: &OcrProfile) -> String;
}

impl<F> TextRecognizer for F
where
    F: FnMut(&GrayImage, &OcrProfile) -> String,
{
    fn recognize(&mut self, image: &GrayImage, profile: &OcrProfile) -> String {
        self(image, profile)
    }
}

/// Copy of `rect` clipped to the image, None when nothing remains
pub fn crop_rgb(image: &RgbImage, rect: &PixelRect) -> Option<RgbImage> {
    let rect = rect.clamp_to(image.width(), image.height());
    if rect.is_empty() {
        return None;
    }
    Some(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Red channel, upscaled, smoothed and binarised at half its maximum.
///
/// Bright text on the dark scan background comes out black on white.
pub fn prepare_for_ocr(crop: &RgbImage, scale: u32) -> GrayImage {
    let scale = scale.max(1);
    let red = GrayImage::from_fn(crop.width(), crop.height(), |x, y| {
        Luma([crop.get_pixel(x, y).0[0]])
    });
    let upscaled = imageops::resize(
        &red,
        red.width() * scale,
        red.height() * scale,
        FilterType::Nearest,
    );
    let blurred = gaussian_blur_f32(&upscaled, 1.0);

    let max = blurred.pixels().map(|p| p.0[0]).max().unwrap_or(0) as u16;
    if max == 0 {
        return GrayImage::from_pixel(blurred.width(), blurred.height(), Luma([255u8]));
    }
    GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        // p < max / 2 without losing the half
        if (blurred.get_pixel(x, y).0[0] as u16) * 2 < max {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Colour mask (255 = text) inverted and upscaled for recognition
pub fn prepare_mask_for_ocr(mask: &GrayImage, scale: u32) -> GrayImage {
    let scale = scale.max(1);
    let inverted = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([255 - mask.get_pixel(x, y).0[0]])
    });
    imageops::resize(
        &inverted,
        inverted.width() * scale,
        inverted.height() * scale,
        FilterType::Nearest,
    )
}

/// First whitespace separated token of recognised text
pub fn first_token(raw: &str) -> Option<&str> {
    raw.split_whitespace().next()
}

/// OCR a region of the image and return its first token, or `NO_TEXT`
pub fn read_token(
    image: &RgbImage,
    rect: &PixelRect,
    profile: &OcrProfile,
    ocr: &mut dyn TextRecognizer,
) -> String {
    let Some(crop) = crop_rgb(image, rect) else {
        return NO_TEXT.to_string();
    };
    let prepared = prepare_for_ocr(&crop, profile.scale);
    let raw = ocr.recognize(&prepared, profile);

    first_token(&raw).unwrap_or(NO_TEXT).to_string()
}

/// Numeric axis label inside `rect`
pub fn read_number(image: &RgbImage, rect: &PixelRect, ocr: &mut dyn TextRecognizer) -> Option<f64> {
    let token = read_token(image, rect, &OcrProfile::AXIS_LABEL, ocr);
    parse_number(&token)
}

pub fn parse_number(token: &str) -> Option<f64> {
    let cleaned = token.trim().replace(',', ".");
    let cleaned = cleaned.trim_end_matches('.');
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Gestational age "NwM" in days; -1 when absent or malformed
pub fn parse_gestation(text: &str) -> Field<i32> {
    let text = text.trim();
    if text.is_empty() || text == NO_TEXT {
        return Field::with_status(-1, FieldStatus::NoText);
    }

    let lower = text.to_lowercase();
    let parts: Vec<&str> = lower.split('w').collect();
    if parts.len() != 2 {
        return Field::with_status(-1, FieldStatus::Unparsable);
    }

    let weeks = parts[0].trim_matches(|c: char| c == '=' || c == ':' || c.is_whitespace());
    let days = parts[1].trim().trim_end_matches('d');

    match (weeks.parse::<i32>(), days.parse::<i32>()) {
        (Ok(w), Ok(d)) => Field::extracted(w.abs() * 7 + d.abs()),
        _ => Field::with_status(-1, FieldStatus::Unparsable),
    }
}

/// Vessel from the first character of the recognised token
pub fn parse_vessel(text: &str) -> Field<VesselType> {
    let text = text.trim();
    if text.is_empty() || text == NO_TEXT {
        return Field::with_status(VesselType::NotRecorded, FieldStatus::NoText);
    }

    match text.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('U') => Field::extracted(VesselType::Umbilical),
        Some('L') => Field::extracted(VesselType::LeftUterine),
        Some('R') => Field::extracted(VesselType::RightUterine),
        _ => Field::with_status(VesselType::Unrecognized, FieldStatus::Unparsable),
    }
}

/// Exam dates are printed with dots, stored with slashes
pub fn normalize_date(text: &str) -> Field<String> {
    let text = text.trim();
    if text.is_empty() || text == NO_TEXT {
        return Field::with_status(NO_TEXT.to_string(), FieldStatus::NoText);
    }
    Field::extracted(text.replace('.', "/"))
}

/// Free text field such as the patient id
pub fn text_field(token: String) -> Field<String> {
    if token == NO_TEXT {
        Field::with_status(token, FieldStatus::NoText)
    } else {
        Field::extracted(token)
    }
}

static READING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?P<label>[A-Za-z][A-Za-z/]*)[ \t]*[:=]?[ \t]*(?P<value>-?\d+(?:[.,]\d+)?)(?:[ \t]*(?P<unit>[A-Za-z/%]+))?",
    )
    .expect("reading pattern is valid")
});

/// "label value [unit]" lines of an annotation block, in reading order
pub fn parse_readings(text: &str) -> Vec<Reading> {
    READING_LINE
        .captures_iter(text)
        .filter_map(|caps| {
            let value = parse_number(&caps["value"])?;
            Some(Reading {
                label: caps["label"].to_string(),
                value,
                unit: caps.name("unit").map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

/// Readings printed in the annotation colour.
///
/// An empty mask means no annotation text; the recognizer is not called.
pub fn extract_readings(mask: &GrayImage, ocr: &mut dyn TextRecognizer) -> Vec<Reading> {
    if mask_coverage(mask) == 0 {
        return Vec::new();
    }
    let prepared = prepare_mask_for_ocr(mask, OcrProfile::ANNOTATIONS.scale);
    let raw = ocr.recognize(&prepared, &OcrProfile::ANNOTATIONS);
    parse_readings(&raw)
}
