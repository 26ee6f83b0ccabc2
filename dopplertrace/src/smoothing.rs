// Envelope smoothing module
// Running median over contiguous columns of the traced envelope

use dopplertrace_common::CurvePoint;

/// Apply a running median to the y values of the envelope.
///
/// Each run of consecutive columns is filtered on its own, so the
/// smoother never bridges a gap or invents columns. Near the ends of a
/// run the window shrinks symmetrically, which keeps run endpoints fixed.
pub fn apply_median_smoothing(points: &[CurvePoint], window: usize) -> Vec<CurvePoint> {
    let half = window / 2;
    if half == 0 || points.len() < 3 {
        log::trace!("Median smoothing skipped ({} points, window {})", points.len(), window);
        return points.to_vec();
    }

    let mut smoothed = Vec::with_capacity(points.len());
    for run in split_runs(points) {
        smoothed.extend(median_run(run, half));
    }

    log::trace!(
        "Median smoothing: {} points, window {}",
        smoothed.len(),
        2 * half + 1
    );
    smoothed
}

/// Slices of points whose x values are consecutive
fn split_runs(points: &[CurvePoint]) -> Vec<&[CurvePoint]> {
    let mut runs = Vec::new();
    let mut start = 0;

    for i in 1..points.len() {
        if points[i].x != points[i - 1].x + 1 {
            runs.push(&points[start..i]);
            start = i;
        }
    }
    if start < points.len() {
        runs.push(&points[start..]);
    }

    runs
}

fn median_run(run: &[CurvePoint], half: usize) -> Vec<CurvePoint> {
    let n = run.len();
    let mut window: Vec<u32> = Vec::with_capacity(2 * half + 1);

    (0..n)
        .map(|i| {
            let reach = half.min(i).min(n - 1 - i);
            window.clear();
            window.extend(run[i - reach..=i + reach].iter().map(|p| p.y));
            window.sort_unstable();

            CurvePoint {
                x: run[i].x,
                y: window[window.len() / 2],
            }
        })
        .collect()
}
