mod common;

use common::{noise_image, render_scan, SceneParams, ScriptedRecognizer, BASELINE_Y, GROUND_TRUTH, WAVEFORM_X};
use dopplertrace::batch::digitize_batch;
use dopplertrace::Digitizer;
use dopplertrace_common::{Axis, FailureKind, Side, Stage, StageStatus};

#[test]
fn test_synthetic_scan_is_digitized() {
    let scene = SceneParams::default();
    let scan = render_scan(&scene);
    let mut ocr = ScriptedRecognizer::for_scan(&scan);

    let report = Digitizer::default().digitize(&scan.image, &mut ocr);

    let bbox = report.bounding_box.expect("waveform region");
    assert_eq!(bbox.xmin(), WAVEFORM_X);
    assert_eq!(bbox.xmax(), scene.waveform_xmax());
    assert_eq!(bbox.ymax(), BASELINE_Y);

    for stage in [
        Stage::Segmentation,
        Stage::LeftAxis,
        Stage::RightAxis,
        Stage::CurveTrace,
        Stage::Calibration,
        Stage::Correction,
    ] {
        assert_eq!(
            report.stages.status(stage),
            Some(&StageStatus::Succeeded),
            "stage {}",
            stage
        );
    }

    let vertical = report
        .ticks
        .iter()
        .find(|set| set.side == Side::Right)
        .expect("vertical ticks");
    assert_eq!(vertical.axis, Axis::Vertical);
    assert_eq!(vertical.len(), scan.vertical_labels.len());
    assert_eq!(vertical.unreadable, 0);

    let horizontal = report
        .ticks
        .iter()
        .find(|set| set.side == Side::Left)
        .expect("horizontal ticks");
    assert_eq!(horizontal.len(), scan.horizontal_labels.len());

    let series = report.series.as_ref().expect("calibrated series");
    assert!(series.time_calibrated);
    let baseline = series.baseline.expect("baseline");
    assert!((baseline.pixel - BASELINE_Y as f64).abs() < 0.5);
    assert!(baseline.value.abs() < 0.5);
    assert!((series.vertical.slope + 1.0 / scene.velocity_scale).abs() < 1e-6);
    assert!((series.horizontal.slope - 1.0 / scene.time_scale).abs() < 1e-6);
    assert!(series.samples.windows(2).all(|w| w[0].time < w[1].time));
}

#[test]
fn test_digitized_values_match_printed_readings() {
    let scan = render_scan(&SceneParams::default());
    let mut ocr = ScriptedRecognizer::for_scan(&scan);

    let report = Digitizer::default().digitize(&scan.image, &mut ocr);

    assert_eq!(report.table.len(), GROUND_TRUTH.len());
    for (label, truth) in GROUND_TRUTH {
        let row = report.table.row(label).expect(label);
        assert!(
            (row.value - truth).abs() / truth < 0.05,
            "{} read as {}",
            label,
            row.value
        );

        match label {
            "TAmean" => assert!(row.digitized.is_none()),
            _ => {
                let digitized = row.digitized.expect(label);
                assert!(
                    row.relative_error().expect(label) < 0.2,
                    "{} digitized as {}, printed {}",
                    label,
                    digitized,
                    row.value
                );
            }
        }
    }
    assert_eq!(report.table.row("HR").and_then(|r| r.unit.as_deref()), Some("bpm"));
}

#[test]
fn test_digitization_is_repeatable() {
    let scan = render_scan(&SceneParams::default());
    let digitizer = Digitizer::default();

    let first = digitizer.digitize(&scan.image, &mut ScriptedRecognizer::for_scan(&scan));
    let second = digitizer.digitize(&scan.image, &mut ScriptedRecognizer::for_scan(&scan));

    assert!(first.series.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_noise_yields_report_without_series() {
    let image = noise_image(200, 150, 7);
    let scan = render_scan(&SceneParams::default());
    let mut ocr = ScriptedRecognizer::for_scan(&scan);

    let report = Digitizer::default().digitize(&image, &mut ocr);

    assert!(matches!(
        report.stages.status(Stage::Segmentation),
        Some(StageStatus::Failed {
            kind: FailureKind::NoWaveformRegion,
            ..
        })
    ));
    assert!(report.bounding_box.is_none());
    assert!(report.trace.is_none());
    assert!(report.series.is_none());
    assert!(report.table.rows.iter().all(|r| r.digitized.is_none()));
}

#[test]
fn test_batch_keeps_input_order() {
    let fast = SceneParams {
        heart_rate: 120.0,
        cycles: 5.0,
        ..SceneParams::default()
    };
    let scan = render_scan(&SceneParams::default());
    let images = vec![
        scan.image.clone(),
        noise_image(200, 150, 11),
        render_scan(&fast).image,
    ];

    let reports = digitize_batch(&Digitizer::default(), &images, || {
        ScriptedRecognizer::for_scan(&scan)
    });

    assert_eq!(reports.len(), 3);
    assert!(reports[0].series.is_some());
    assert!(reports[1].series.is_none());
    assert_eq!(
        reports[2].bounding_box.map(|b| b.xmax()),
        Some(fast.waveform_xmax())
    );
}
