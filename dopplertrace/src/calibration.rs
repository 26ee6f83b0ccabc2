// Axis calibration module
// Fits pixel → physical mappings from tick sets and applies them to the envelope

use dopplertrace_common::{Axis, Baseline, CalibratedSeries, CurveTrace, LinearFit, Sample, TickSet};

use crate::error::CalibrationError;

/// Least squares fit of tick labels against tick positions
pub fn fit_axis(ticks: &TickSet) -> Result<LinearFit, CalibrationError> {
    let n = ticks.len();
    if n < 2 {
        return Err(CalibrationError::InsufficientData {
            axis: ticks.axis,
            found: n,
        });
    }

    let positions = ticks.positions();
    let values = ticks.values();
    let mean_p = positions.iter().sum::<f64>() / n as f64;
    let mean_v = values.iter().sum::<f64>() / n as f64;

    let mut spp = 0.0;
    let mut spv = 0.0;
    for (p, v) in positions.iter().zip(&values) {
        spp += (p - mean_p) * (p - mean_p);
        spv += (p - mean_p) * (v - mean_v);
    }
    if spp < 1e-12 {
        return Err(CalibrationError::DegenerateAxis { axis: ticks.axis });
    }

    let slope = spv / spp;
    let intercept = mean_v - slope * mean_p;

    // Verify the fit against the ticks it came from
    let rms_residual = (positions
        .iter()
        .zip(&values)
        .map(|(p, v)| (slope * p + intercept - v).powi(2))
        .sum::<f64>()
        / n as f64)
        .sqrt();

    log::debug!(
        "{} axis fit: value = {:.5} * px + {:.3} (rms residual {:.4}, {} ticks)",
        ticks.axis,
        slope,
        intercept,
        rms_residual,
        n
    );

    Ok(LinearFit {
        slope,
        intercept,
        rms_residual,
    })
}

/// Zero-flow reference: the vertical tick whose label is nearest 0
pub fn find_baseline(vertical: &TickSet, fit: &LinearFit) -> Option<Baseline> {
    vertical.nearest_label(0.0).map(|tick| Baseline {
        pixel: tick.position,
        value: fit.apply(tick.position),
    })
}

/// Map every envelope point through the two axis fits
pub fn apply_calibration(
    trace: &CurveTrace,
    horizontal: LinearFit,
    vertical: LinearFit,
    baseline: Option<Baseline>,
    time_calibrated: bool,
) -> Result<CalibratedSeries, CalibrationError> {
    if trace.is_empty() {
        return Err(CalibrationError::EmptyTrace);
    }

    let samples = trace
        .points()
        .iter()
        .map(|p| Sample {
            time: horizontal.apply(p.x as f64),
            value: vertical.apply(p.y as f64),
        })
        .collect();

    Ok(CalibratedSeries {
        samples,
        baseline,
        horizontal,
        vertical,
        time_calibrated,
    })
}

/// Calibrated series plus the reason the time axis fell back to pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub series: CalibratedSeries,
    /// Set when `series.time` holds pixel columns
    pub time_fallback: Option<CalibrationError>,
}

/// Fit both axes and calibrate the trace.
///
/// The vertical fit is required. A missing or unfittable horizontal tick
/// set leaves the time axis in pixel columns instead of failing.
pub fn calibrate(
    trace: &CurveTrace,
    horizontal: Option<&TickSet>,
    vertical: &TickSet,
) -> Result<Calibration, CalibrationError> {
    debug_assert_eq!(vertical.axis, Axis::Vertical);

    let v_fit = fit_axis(vertical)?;
    let baseline = find_baseline(vertical, &v_fit);

    let h_fit = match horizontal {
        Some(set) => fit_axis(set),
        None => Err(CalibrationError::MissingAxis {
            axis: Axis::Horizontal,
        }),
    };
    let (h_fit, time_fallback) = match h_fit {
        Ok(fit) => (fit, None),
        Err(e) => {
            log::warn!("Time axis left in pixels: {}", e);
            (LinearFit::identity(), Some(e))
        }
    };

    let series = apply_calibration(trace, h_fit, v_fit, baseline, time_fallback.is_none())?;
    Ok(Calibration {
        series,
        time_fallback,
    })
}
