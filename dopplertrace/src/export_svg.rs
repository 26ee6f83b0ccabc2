// SVG export module
// Plots a calibrated series as an SVG polyline in physical units

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use dopplertrace_common::CalibratedSeries;

const PLOT_WIDTH: f64 = 800.0;
const PLOT_HEIGHT: f64 = 300.0;
const MARGIN: f64 = 10.0;

/// Export the series to an SVG file
pub fn export_svg(series: &CalibratedSeries, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_svg(series, &mut writer)?;
    writer.flush()?;

    log::info!(
        "Exported {} sample(s) to SVG: {}",
        series.len(),
        output_path.display()
    );
    Ok(())
}

/// Time runs left to right, velocity bottom to top
pub fn write_svg<W: Write>(series: &CalibratedSeries, out: &mut W) -> Result<()> {
    let (min_t, min_v, max_t, max_v) = calculate_bounds(series);
    let sx = PLOT_WIDTH / (max_t - min_t);
    let sy = PLOT_HEIGHT / (max_v - min_v);
    let to_x = |t: f64| MARGIN + (t - min_t) * sx;
    let to_y = |v: f64| MARGIN + (max_v - v) * sy;

    let time_unit = if series.time_calibrated { "s" } else { "px" };

    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1""#)?;
    writeln!(
        out,
        r#"     width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = PLOT_WIDTH + 2.0 * MARGIN,
        h = PLOT_HEIGHT + 2.0 * MARGIN
    )?;
    writeln!(out, r#"  <title>DopplerTrace - Digitized Waveform</title>"#)?;
    writeln!(
        out,
        r#"  <desc>time {:.3}..{:.3} {}, velocity {:.2}..{:.2}</desc>"#,
        min_t, max_t, time_unit, min_v, max_v
    )?;

    if let Some(baseline) = series.baseline {
        let y = to_y(baseline.value);
        writeln!(
            out,
            r#"  <line id="baseline" x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="gray" stroke-dasharray="4 2" />"#,
            MARGIN,
            MARGIN + PLOT_WIDTH,
        )?;
    }

    if let Some((first, rest)) = series.samples.split_first() {
        write!(out, r#"  <path id="envelope" stroke="black" stroke-width="1" fill="none" d=""#)?;
        write!(out, "M {:.2},{:.2} ", to_x(first.time), to_y(first.value))?;
        for s in rest {
            write!(out, "L {:.2},{:.2} ", to_x(s.time), to_y(s.value))?;
        }
        writeln!(out, r#"" />"#)?;
    }

    writeln!(out, "</svg>")?;
    Ok(())
}

/// Data bounds, widened so that neither span is zero
fn calculate_bounds(series: &CalibratedSeries) -> (f64, f64, f64, f64) {
    let mut min_t = f64::MAX;
    let mut min_v = f64::MAX;
    let mut max_t = f64::MIN;
    let mut max_v = f64::MIN;

    for s in &series.samples {
        min_t = min_t.min(s.time);
        max_t = max_t.max(s.time);
        min_v = min_v.min(s.value);
        max_v = max_v.max(s.value);
    }
    if let Some(baseline) = series.baseline {
        min_v = min_v.min(baseline.value);
        max_v = max_v.max(baseline.value);
    }

    if min_t > max_t {
        return (0.0, 0.0, 1.0, 1.0);
    }
    if max_t - min_t < f64::EPSILON {
        max_t = min_t + 1.0;
    }
    if max_v - min_v < f64::EPSILON {
        max_v = min_v + 1.0;
    }
    (min_t, min_v, max_t, max_v)
}
