//! Value correction: clinical summary statistics of the calibrated
//! envelope, paired with the readings printed on the scan.
//!
//! All velocities are measured relative to the zero-flow baseline. A
//! cardiac cycle is a run of samples above the midpoint of the series'
//! range; its maximum is the systolic peak.

use serde::{Deserialize, Serialize};

use dopplertrace_common::{CalibratedSeries, Reading, ResultRow, ResultTable};

use crate::config::CorrectionConfig;

/// Quantities the pipeline can compute from a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    PeakSystolic,
    EndDiastolic,
    MinDiastolic,
    SdRatio,
    ResistiveIndex,
    PulsatilityIndex,
    TimeAveragedMax,
    HeartRate,
}

impl Quantity {
    /// Resolve an on-screen label such as "PS", "S/D" or "TAmax"
    pub fn from_label(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '/')
            .collect::<String>()
            .to_ascii_uppercase();

        match key.as_str() {
            "PS" | "PSV" | "VMAX" => Some(Quantity::PeakSystolic),
            "ED" | "EDV" => Some(Quantity::EndDiastolic),
            "MD" => Some(Quantity::MinDiastolic),
            "S/D" | "SD" => Some(Quantity::SdRatio),
            "RI" => Some(Quantity::ResistiveIndex),
            "PI" => Some(Quantity::PulsatilityIndex),
            "TAMX" | "TAMAX" | "TAPV" => Some(Quantity::TimeAveragedMax),
            "HR" => Some(Quantity::HeartRate),
            _ => None,
        }
    }
}

/// Summary of one digitized waveform. Fields are None when they cannot
/// be computed (zero denominator, no time calibration).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaveformSummary {
    pub peak_systolic: Option<f64>,
    pub end_diastolic: Option<f64>,
    pub min_diastolic: Option<f64>,
    pub time_averaged_max: Option<f64>,
    pub sd_ratio: Option<f64>,
    pub resistive_index: Option<f64>,
    pub pulsatility_index: Option<f64>,
    pub heart_rate: Option<f64>,
    /// Systolic peaks found
    pub cycles: usize,
    /// Minimum lies below the baseline
    pub reversed_flow: bool,
}

impl WaveformSummary {
    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::PeakSystolic => self.peak_systolic,
            Quantity::EndDiastolic => self.end_diastolic,
            Quantity::MinDiastolic => self.min_diastolic,
            Quantity::SdRatio => self.sd_ratio,
            Quantity::ResistiveIndex => self.resistive_index,
            Quantity::PulsatilityIndex => self.pulsatility_index,
            Quantity::TimeAveragedMax => self.time_averaged_max,
            Quantity::HeartRate => self.heart_rate,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator.abs() > f64::EPSILON).then(|| numerator / denominator)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Index of the maximum of each run above `threshold`. Runs separated
/// by fewer than `min_distance` samples merge into one.
pub fn find_peaks(values: &[f64], threshold: f64, min_distance: usize) -> Vec<usize> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut start = None;

    for (i, &v) in values.iter().enumerate() {
        match (v > threshold, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, values.len()));
    }

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if run.0 - last.1 < min_distance => last.1 = run.1,
            _ => merged.push(run),
        }
    }

    merged
        .into_iter()
        .filter_map(|(s, e)| {
            (s..e).max_by(|&a, &b| values[a].total_cmp(&values[b]).then(b.cmp(&a)))
        })
        .collect()
}

/// Clinical indices of a calibrated series
pub fn summarize(series: &CalibratedSeries, config: &CorrectionConfig) -> WaveformSummary {
    let zero = series.baseline.map(|b| b.value).unwrap_or(0.0);
    let values: Vec<f64> = series.samples.iter().map(|s| s.value - zero).collect();
    if values.is_empty() {
        return WaveformSummary::default();
    }

    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let peaks = find_peaks(&values, min + 0.5 * (max - min), config.min_peak_distance.max(1));

    let peak_values: Vec<f64> = peaks.iter().map(|&i| values[i]).collect();
    let ps = mean(&peak_values).unwrap_or(max);

    let troughs: Vec<f64> = peaks
        .windows(2)
        .filter_map(|w| values[w[0]..w[1]].iter().copied().reduce(f64::min))
        .collect();
    let ed = mean(&troughs).unwrap_or(min);
    let md = min;

    let cycle_span = match (peaks.first(), peaks.last()) {
        (Some(&first), Some(&last)) if last > first => &values[first..last],
        _ => &values[..],
    };
    let ta_max = mean(cycle_span);

    let heart_rate = match (series.time_calibrated, peaks.first(), peaks.last()) {
        (true, Some(&first), Some(&last)) if last > first => {
            let span = series.samples[last].time - series.samples[first].time;
            ratio(60.0 * (peaks.len() - 1) as f64, span).filter(|hr| *hr > 0.0)
        }
        _ => None,
    };

    let summary = WaveformSummary {
        peak_systolic: Some(ps),
        end_diastolic: Some(ed),
        min_diastolic: Some(md),
        time_averaged_max: ta_max,
        sd_ratio: ratio(ps, ed),
        resistive_index: ratio(ps - ed, ps),
        pulsatility_index: ta_max.and_then(|ta| ratio(ps - md, ta)),
        heart_rate,
        cycles: peaks.len(),
        reversed_flow: md < 0.0,
    };

    log::info!(
        "Summary: {} cycle(s), PS {:.2}, ED {:.2}, RI {:?}, PI {:?}",
        summary.cycles,
        ps,
        ed,
        summary.resistive_index,
        summary.pulsatility_index
    );
    summary
}

/// Pair each reading with its digitized counterpart. Readings with no
/// counterpart, or no summary at all, keep `digitized` empty.
pub fn build_table(readings: &[Reading], summary: Option<&WaveformSummary>) -> ResultTable {
    let rows = readings
        .iter()
        .map(|reading| ResultRow {
            label: reading.label.clone(),
            value: reading.value,
            unit: reading.unit.clone(),
            digitized: Quantity::from_label(&reading.label)
                .zip(summary)
                .and_then(|(quantity, summary)| summary.get(quantity)),
        })
        .collect();

    ResultTable { rows }
}
