mod common;

use common::{render_scan, scan_template, SceneParams, ScriptedRecognizer};
use dopplertrace::Digitizer;
use dopplertrace_common::{FailureKind, FieldStatus, Side, Stage, StageStatus, VesselType};

#[test]
fn test_missing_time_scale_keeps_pixel_columns() {
    let scene = SceneParams {
        time_axis: false,
        ..SceneParams::default()
    };
    let scan = render_scan(&scene);
    let mut ocr = ScriptedRecognizer::for_scan(&scan);

    let report = Digitizer::default().digitize(&scan.image, &mut ocr);

    assert!(matches!(
        report.stages.status(Stage::LeftAxis),
        Some(StageStatus::Failed {
            kind: FailureKind::TooFewTicks { side: Side::Left, .. },
            ..
        })
    ));
    assert!(matches!(
        report.stages.status(Stage::Calibration),
        Some(StageStatus::Degraded { .. })
    ));

    let series = report.series.as_ref().expect("series with uncalibrated time");
    assert!(!series.time_calibrated);
    assert_eq!(series.samples[0].time, common::WAVEFORM_X as f64);

    let hr = report.table.row("HR").expect("HR reading");
    assert!(hr.digitized.is_none());
    let ps = report.table.row("PS").and_then(|r| r.digitized).expect("PS");
    assert!((ps - 70.64).abs() / 70.64 < 0.2);
}

#[test]
fn test_illegible_velocity_scale_skips_calibration() {
    let scan = render_scan(&SceneParams::default());
    let mut ocr = ScriptedRecognizer::for_scan(&scan).without_velocity_labels();

    let report = Digitizer::default().digitize(&scan.image, &mut ocr);

    assert!(matches!(
        report.stages.status(Stage::RightAxis),
        Some(StageStatus::Failed {
            kind: FailureKind::TooFewTicks {
                side: Side::Right,
                found: 0
            },
            ..
        })
    ));
    assert_eq!(
        report.stages.status(Stage::Calibration),
        Some(&StageStatus::Skipped {
            missing: Stage::RightAxis
        })
    );
    assert!(report.trace.is_some());
    assert!(report.series.is_none());

    // Partial results are still reported
    let right = report
        .ticks
        .iter()
        .find(|set| set.side == Side::Right)
        .expect("right tick set");
    assert!(right.is_empty());
    assert_eq!(right.unreadable, scan.vertical_labels.len());
    assert!(!report.table.is_empty());
    assert!(report.table.rows.iter().all(|r| r.digitized.is_none()));
}

#[test]
fn test_scan_without_annotations() {
    let scene = SceneParams {
        annotations: false,
        ..SceneParams::default()
    };
    let scan = render_scan(&scene);
    let mut ocr = ScriptedRecognizer::for_scan(&scan);

    let report = Digitizer::default().digitize(&scan.image, &mut ocr);

    assert!(report.metadata.readings.is_empty());
    assert!(report.table.is_empty());
    assert!(matches!(
        report.stages.status(Stage::TextExtraction),
        Some(StageStatus::Degraded { .. })
    ));
    assert!(report.series.is_some());
}

#[test]
fn test_template_fields_are_read() {
    let scene = SceneParams {
        template_fields: true,
        ..SceneParams::default()
    };
    let scan = render_scan(&scene);
    let mut ocr = ScriptedRecognizer::for_scan(&scan);
    let digitizer = Digitizer::default().with_templates(vec![scan_template()]);

    let report = digitizer.digitize(&scan.image, &mut ocr);

    assert_eq!(report.stages.status(Stage::Metadata), Some(&StageStatus::Succeeded));
    let metadata = &report.metadata;
    assert_eq!(metadata.template.as_deref(), Some("synthetic"));
    assert_eq!(metadata.patient_id.value, "ID4711");
    assert_eq!(metadata.gestation_days.value, 32 * 7 + 3);
    assert_eq!(metadata.exam_date.value, "14/05/2019");
    assert_eq!(metadata.vessel_type.value, VesselType::Umbilical);
    assert_eq!(metadata.vessel_type.value.code(), 0);
    assert!(report.series.is_some());
}

#[test]
fn test_unknown_layout_leaves_fields_unread() {
    let scan = render_scan(&SceneParams::default());
    let mut ocr = ScriptedRecognizer::for_scan(&scan);
    let digitizer = Digitizer::default().with_templates(vec![scan_template()]);

    // No key text is drawn, so the layout is not recognised
    let report = digitizer.digitize(&scan.image, &mut ocr);

    assert!(matches!(
        report.stages.status(Stage::Metadata),
        Some(StageStatus::Failed {
            kind: FailureKind::UnknownInstitute,
            ..
        })
    ));
    assert!(report.metadata.template.is_none());
    assert_eq!(report.metadata.patient_id.status, FieldStatus::NotAttempted);
    assert!(report.series.is_some());
}
