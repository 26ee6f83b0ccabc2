// Batch processing module
// Digitizes many scans in parallel, one recognizer per worker thread

use std::path::{Path, PathBuf};

use image::RgbImage;
use rayon::prelude::*;

use dopplertrace_common::DigitizationReport;

use crate::pipeline::Digitizer;
use crate::text::TextRecognizer;

/// Outcome for one input file
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<DigitizationReport, image::ImageError>,
}

/// Digitize in-memory images; reports come back in input order.
///
/// `make_ocr` is called once per worker, so recognizers are never shared
/// between threads.
pub fn digitize_batch<R, F>(digitizer: &Digitizer, images: &[RgbImage], make_ocr: F) -> Vec<DigitizationReport>
where
    R: TextRecognizer,
    F: Fn() -> R + Sync + Send,
{
    images
        .par_iter()
        .map_init(make_ocr, |ocr, image| digitizer.digitize(image, ocr))
        .collect()
}

/// Load and digitize image files. A file that cannot be decoded yields
/// an error for that item only.
pub fn digitize_files<R, F>(digitizer: &Digitizer, paths: &[PathBuf], make_ocr: F) -> Vec<BatchItem>
where
    R: TextRecognizer,
    F: Fn() -> R + Sync + Send,
{
    paths
        .par_iter()
        .map_init(make_ocr, |ocr, path| {
            log::info!("Processing {}", path.display());
            let result = load_rgb(path).map(|image| digitizer.digitize(&image, ocr));
            if let Err(e) = &result {
                log::error!("Failed to load {}: {}", path.display(), e);
            }
            BatchItem {
                path: path.clone(),
                result,
            }
        })
        .collect()
}

pub fn load_rgb(path: &Path) -> Result<RgbImage, image::ImageError> {
    Ok(image::open(path)?.to_rgb8())
}
