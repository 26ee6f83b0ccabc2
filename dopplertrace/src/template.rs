// Template module
// Picks the screen layout of a scan and reads the fixed metadata fields

use image::RgbImage;

use dopplertrace_common::{MetadataRecord, PixelRect, Template};

use crate::error::TemplateError;
use crate::text::{
    first_token, normalize_date, parse_gestation, parse_vessel, read_token, text_field, OcrProfile,
    TextRecognizer, NO_TEXT,
};

fn scale_rect(rect: &PixelRect, sx: f64, sy: f64) -> PixelRect {
    let left = (rect.x as f64 * sx) as u32;
    let top = (rect.y as f64 * sy) as u32;
    let right = (rect.right() as f64 * sx) as u32;
    let bottom = (rect.bottom() as f64 * sy) as u32;
    PixelRect::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
}

/// Template rescaled from its reference resolution to `width` x `height`
pub fn scale_template(template: &Template, width: u32, height: u32) -> Template {
    let sx = width as f64 / template.reference_width.max(1) as f64;
    let sy = height as f64 / template.reference_height.max(1) as f64;

    Template {
        name: template.name.clone(),
        key_str: template.key_str.clone(),
        reference_width: width,
        reference_height: height,
        key: scale_rect(&template.key, sx, sy),
        patient_id: scale_rect(&template.patient_id, sx, sy),
        gestation: scale_rect(&template.gestation, sx, sy),
        exam_date: scale_rect(&template.exam_date, sx, sy),
        vessel_type: scale_rect(&template.vessel_type, sx, sy),
    }
}

/// First template whose key region reads as the first word of its
/// `key_str`, scaled to the image
pub fn select_template(
    image: &RgbImage,
    templates: &[Template],
    ocr: &mut dyn TextRecognizer,
) -> Result<Template, TemplateError> {
    if templates.is_empty() {
        return Err(TemplateError::NoTemplates);
    }

    let mut keys = Vec::with_capacity(templates.len());
    for template in templates {
        let scaled = scale_template(template, image.width(), image.height());
        let key = read_token(image, &scaled.key, &OcrProfile::TEMPLATE_KEY, ocr);
        log::debug!("Template '{}': key region reads '{}'", template.name, key);

        if key != NO_TEXT && first_token(&template.key_str) == Some(key.as_str()) {
            log::info!("Using template '{}'", template.name);
            return Ok(scaled);
        }
        keys.push(key);
    }

    Err(TemplateError::UnknownInstitute { keys })
}

/// Read the fixed-position fields of an already scaled template
pub fn extract_metadata(
    image: &RgbImage,
    template: &Template,
    ocr: &mut dyn TextRecognizer,
) -> MetadataRecord {
    let patient_id = read_token(image, &template.patient_id, &OcrProfile::PATIENT_ID, ocr);
    let gestation = read_token(image, &template.gestation, &OcrProfile::GESTATION, ocr);
    let exam_date = read_token(image, &template.exam_date, &OcrProfile::EXAM_DATE, ocr);
    let vessel = read_token(image, &template.vessel_type, &OcrProfile::VESSEL_TYPE, ocr);

    MetadataRecord {
        template: Some(template.name.clone()),
        patient_id: text_field(patient_id),
        gestation_days: parse_gestation(&gestation),
        exam_date: normalize_date(&exam_date),
        vessel_type: parse_vessel(&vessel),
        readings: Vec::new(),
    }
}
