use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dopplertrace::batch::{digitize_files, load_rgb};
use dopplertrace::{Digitizer, PipelineConfig, TesseractRecognizer};
use dopplertrace_common::{DigitizationReport, OutputFormat, Template};

mod annotate;
mod export_json;
mod export_svg;

/// Digitize doppler ultrasound scans into calibrated waveforms
#[derive(Parser, Debug)]
#[command(name = "dopplertrace")]
#[command(about = "Digitize doppler ultrasound waveform scans", long_about = None)]
struct Args {
    /// Input image file path(s)
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "both")]
    format: FormatArg,

    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Institute layout templates (TOML)
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// OCR timeout per crop, in seconds
    #[arg(long, default_value = "10.0")]
    ocr_timeout: f64,

    /// Worker threads (default: one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable debug mode (save annotated images)
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Json,
    Svg,
    Both,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Svg => OutputFormat::Svg,
            FormatArg::Both => OutputFormat::Both,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    templates: Vec<Template>,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn load_templates(path: Option<&Path>) -> Result<Vec<Template>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read templates {}", path.display()))?;
    let file: TemplateFile =
        toml::from_str(&text).with_context(|| format!("Invalid templates {}", path.display()))?;
    Ok(file.templates)
}

fn output_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string())
}

fn write_outputs(
    input: &Path,
    report: &DigitizationReport,
    args: &Args,
    format: OutputFormat,
) -> Result<()> {
    let stem = output_stem(input);

    if format.writes_json() {
        export_json::export_json(report, &args.output.join(format!("{}.json", stem)))?;
    }
    if format.writes_svg() {
        match &report.series {
            Some(series) => export_svg::export_svg(series, &args.output.join(format!("{}.svg", stem)))?,
            None => println!("  No calibrated series, skipping SVG"),
        }
    }
    if args.debug {
        let image = load_rgb(input).with_context(|| format!("Failed to reload {}", input.display()))?;
        let annotated = annotate::draw_annotations(&image, report);
        let debug_path = args.output.join(format!("{}_debug.png", stem));
        annotated
            .save(&debug_path)
            .with_context(|| format!("Failed to save {}", debug_path.display()))?;
        println!("  Saved debug image to: {}", debug_path.display());
    }
    Ok(())
}

fn print_summary(input: &Path, report: &DigitizationReport) {
    println!("\n{}", input.display());
    match &report.bounding_box {
        Some(bbox) => println!("  Waveform region: {}", bbox),
        None => println!("  Waveform region: not found"),
    }
    if let Some(series) = &report.series {
        println!(
            "  Series: {} sample(s){}",
            series.len(),
            if series.time_calibrated { "" } else { " (time axis in pixels)" }
        );
    }
    for row in &report.table.rows {
        let digitized = match (row.digitized, row.relative_error()) {
            (Some(v), Some(err)) => format!("{:.2} ({:.1}% off)", v, err * 100.0),
            (Some(v), None) => format!("{:.2}", v),
            (None, _) => "-".to_string(),
        };
        println!(
            "  {:<8} {:>8.2} {:<5} digitized {}",
            row.label,
            row.value,
            row.unit.as_deref().unwrap_or(""),
            digitized
        );
    }
    if report.stages.low_confidence() {
        for entry in &report.stages.entries {
            println!("  [{}] {:?}", entry.stage, entry.status);
        }
    }
}

fn main() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .try_init();

    let args = Args::parse();
    let format = OutputFormat::from(args.format);

    println!("DopplerTrace - Doppler Waveform Digitizer");
    println!("=========================================");
    println!("Input: {} file(s)", args.input.len());
    println!("Output: {}", args.output.display());
    println!("Format: {:?}", args.format);
    println!("Debug mode: {}", args.debug);

    let config = load_config(args.config.as_deref())?;
    let templates = load_templates(args.templates.as_deref())?;
    println!("Templates: {}", templates.len());

    let timeout = Duration::try_from_secs_f64(args.ocr_timeout)
        .with_context(|| format!("Invalid OCR timeout {}", args.ocr_timeout))?;

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let digitizer = Digitizer::new(config).with_templates(templates);
    let tesseract = args.tesseract.clone();
    let items = digitize_files(&digitizer, &args.input, || {
        TesseractRecognizer::new(tesseract.clone(), timeout)
    });

    let mut failures = 0;
    for item in &items {
        match &item.result {
            Ok(report) => {
                print_summary(&item.path, report);
                write_outputs(&item.path, report, &args, format)?;
            }
            Err(e) => {
                println!("\n{}: could not be loaded ({})", item.path.display(), e);
                failures += 1;
            }
        }
    }

    println!("\nProcessed {} of {} image(s)", items.len() - failures, items.len());
    Ok(())
}
