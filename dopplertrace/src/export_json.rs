// JSON export module
// Writes the per-image digitization report

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use dopplertrace_common::DigitizationReport;

pub fn export_json(report: &DigitizationReport, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to serialize report to {}", output_path.display()))?;
    writer.flush()?;

    log::info!("Saved report to: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dopplertrace_common::{MetadataRecord, ResultTable, StageReport};

    #[test]
    fn test_report_round_trips_through_file() {
        let report = DigitizationReport {
            metadata: MetadataRecord::default(),
            bounding_box: None,
            rois: Vec::new(),
            ticks: Vec::new(),
            trace: None,
            series: None,
            table: ResultTable::default(),
            stages: StageReport::default(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        export_json(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: DigitizationReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, report);
    }
}
