use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the waveform panel an axis scale is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Image axis a scale calibrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Time, along x
    Horizontal,
    /// Velocity, along y
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => write!(f, "horizontal"),
            Axis::Vertical => write!(f, "vertical"),
        }
    }
}

/// Pixel rectangle given by its top-left corner and size.
/// A zero width or height is a valid, empty rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from signed edges, clamping to `[0, max_width) x [0, max_height)`
    pub fn from_edges_clamped(
        left: i64,
        top: i64,
        right: i64,
        bottom: i64,
        max_width: u32,
        max_height: u32,
    ) -> Self {
        let left = left.clamp(0, max_width as i64);
        let right = right.clamp(0, max_width as i64);
        let top = top.clamp(0, max_height as i64);
        let bottom = bottom.clamp(0, max_height as i64);

        Self {
            x: left as u32,
            y: top as u32,
            width: (right - left).max(0) as u32,
            height: (bottom - top).max(0) as u32,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersection with an image of the given size
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self::from_edges_clamped(
            self.x as i64,
            self.y as i64,
            self.right() as i64,
            self.bottom() as i64,
            width,
            height,
        )
    }
}

/// Rectangle enclosing the waveform trace, inclusive on all edges.
///
/// Constructed once by the segmenter and read-only afterwards; the
/// constructor guarantees `xmin < xmax` and `ymin < ymax`, and
/// deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    xmin: u32,
    xmax: u32,
    ymin: u32,
    ymax: u32,
}

impl BoundingBox {
    /// Returns None for a degenerate box
    pub fn new(xmin: u32, xmax: u32, ymin: u32, ymax: u32) -> Option<Self> {
        if xmin < xmax && ymin < ymax {
            Some(Self { xmin, xmax, ymin, ymax })
        } else {
            None
        }
    }

    pub fn xmin(&self) -> u32 {
        self.xmin
    }

    pub fn xmax(&self) -> u32 {
        self.xmax
    }

    pub fn ymin(&self) -> u32 {
        self.ymin
    }

    pub fn ymax(&self) -> u32 {
        self.ymax
    }

    pub fn width(&self) -> u32 {
        self.xmax - self.xmin + 1
    }

    pub fn height(&self) -> u32 {
        self.ymax - self.ymin + 1
    }

    pub fn to_rect(&self) -> PixelRect {
        PixelRect::new(self.xmin, self.ymin, self.width(), self.height())
    }
}

#[derive(Deserialize)]
struct RawBoundingBox {
    xmin: u32,
    xmax: u32,
    ymin: u32,
    ymax: u32,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = String;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        BoundingBox::new(raw.xmin, raw.xmax, raw.ymin, raw.ymax).ok_or_else(|| {
            format!(
                "degenerate bounding box: x {}..={}, y {}..={}",
                raw.xmin, raw.xmax, raw.ymin, raw.ymax
            )
        })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x {}..={}, y {}..={}",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// Axis search region on one side of the waveform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub side: Side,
    /// Axis whose ticks this region holds
    pub axis: Axis,
    pub bounds: PixelRect,
}

/// A tick mark and the number printed next to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Centre of the tick along the calibrated axis, in pixels
    pub position: f64,
    pub value: f64,
}

/// Ticks found on one side, ordered by strictly increasing position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSet {
    pub side: Side,
    pub axis: Axis,
    ticks: Vec<Tick>,
    /// Tick-shaped components seen before label reading
    pub candidates: usize,
    /// Candidates dropped because their label could not be read
    pub unreadable: usize,
}

impl TickSet {
    /// Sorts ticks by position and drops any tick within one pixel of its predecessor
    pub fn new(side: Side, axis: Axis, mut ticks: Vec<Tick>) -> Self {
        ticks.retain(|t| t.position.is_finite() && t.value.is_finite());
        ticks.sort_by(|a, b| a.position.total_cmp(&b.position));

        let mut ordered: Vec<Tick> = Vec::with_capacity(ticks.len());
        for tick in ticks {
            match ordered.last() {
                Some(prev) if tick.position - prev.position < 1.0 => {}
                _ => ordered.push(tick),
            }
        }

        Self {
            side,
            axis,
            ticks: ordered,
            candidates: 0,
            unreadable: 0,
        }
    }

    pub fn empty(side: Side, axis: Axis) -> Self {
        Self::new(side, axis, Vec::new())
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn positions(&self) -> Vec<f64> {
        self.ticks.iter().map(|t| t.position).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.ticks.iter().map(|t| t.value).collect()
    }

    /// Tick whose label is closest to `value`
    pub fn nearest_label(&self, value: f64) -> Option<&Tick> {
        self.ticks
            .iter()
            .min_by(|a, b| (a.value - value).abs().total_cmp(&(b.value - value).abs()))
    }
}

/// Pixel on the traced envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: u32,
    pub y: u32,
}

/// Top envelope of the waveform: at most one point per column, x strictly increasing.
/// Columns without a detected pixel are absent, not interpolated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveTrace {
    points: Vec<CurvePoint>,
    /// Columns inside the bounding box with no curve pixel
    pub gap_columns: u32,
}

impl CurveTrace {
    /// Orders points by x; when a column repeats the topmost pixel wins
    pub fn new(mut points: Vec<CurvePoint>, gap_columns: u32) -> Self {
        points.sort_by_key(|p| (p.x, p.y));
        points.dedup_by_key(|p| p.x);
        Self {
            points,
            gap_columns,
        }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Affine pixel → physical-unit mapping fitted by least squares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Root mean square of the fit residuals, in physical units
    pub rms_residual: f64,
}

impl LinearFit {
    /// Leaves pixel coordinates unchanged
    pub fn identity() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
            rms_residual: 0.0,
        }
    }

    pub fn apply(&self, pixel: f64) -> f64 {
        self.slope * pixel + self.intercept
    }
}

/// Zero-flow reference (Ynought)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Pixel row of the tick labelled closest to zero
    pub pixel: f64,
    /// Calibrated value at that row
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// Digitized waveform in physical units, one sample per trace point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedSeries {
    pub samples: Vec<Sample>,
    pub baseline: Option<Baseline>,
    pub horizontal: LinearFit,
    pub vertical: LinearFit,
    /// False when the time axis could not be fitted and `time` holds pixel columns
    pub time_calibrated: bool,
}

impl CalibratedSeries {
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Outcome of reading one metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStatus {
    Extracted,
    /// OCR returned nothing for the crop
    NoText,
    /// Text was read but could not be interpreted
    Unparsable,
    /// The field was never read, e.g. no template matched
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field<T> {
    pub value: T,
    pub status: FieldStatus,
}

impl<T> Field<T> {
    pub fn extracted(value: T) -> Self {
        Self {
            value,
            status: FieldStatus::Extracted,
        }
    }

    pub fn with_status(value: T, status: FieldStatus) -> Self {
        Self { value, status }
    }
}

/// Vessel insonated for the recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VesselType {
    Umbilical,
    LeftUterine,
    RightUterine,
    NotRecorded,
    Unrecognized,
}

impl VesselType {
    /// Numeric code used in exported spreadsheets
    pub fn code(&self) -> i32 {
        match self {
            VesselType::Umbilical => 0,
            VesselType::LeftUterine => 1,
            VesselType::RightUterine => 2,
            VesselType::NotRecorded => -1,
            VesselType::Unrecognized => -2,
        }
    }
}

impl fmt::Display for VesselType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VesselType::Umbilical => write!(f, "umbilical artery"),
            VesselType::LeftUterine => write!(f, "left uterine artery"),
            VesselType::RightUterine => write!(f, "right uterine artery"),
            VesselType::NotRecorded => write!(f, "not recorded"),
            VesselType::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Clinical measurement printed on the scan, e.g. "PS 70.64 cm/s"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub label: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// Everything read as text from one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Name of the institute template that matched, if any
    pub template: Option<String>,
    pub patient_id: Field<String>,
    /// Gestation age in days, -1 when absent
    pub gestation_days: Field<i32>,
    pub exam_date: Field<String>,
    pub vessel_type: Field<VesselType>,
    pub readings: Vec<Reading>,
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            template: None,
            patient_id: Field::with_status(String::new(), FieldStatus::NotAttempted),
            gestation_days: Field::with_status(-1, FieldStatus::NotAttempted),
            exam_date: Field::with_status(String::new(), FieldStatus::NotAttempted),
            vessel_type: Field::with_status(VesselType::NotRecorded, FieldStatus::NotAttempted),
            readings: Vec::new(),
        }
    }
}

/// One clinically labelled quantity with its OCR and digitized values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub label: String,
    pub value: f64,
    pub unit: Option<String>,
    /// None when the pipeline has no counterpart or could not compute it
    pub digitized: Option<f64>,
}

impl ResultRow {
    /// |digitized - value| / |value|
    pub fn relative_error(&self) -> Option<f64> {
        let digitized = self.digitized?;
        if self.value == 0.0 {
            return None;
        }
        Some((digitized - self.value).abs() / self.value.abs())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn row(&self, label: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.label.eq_ignore_ascii_case(label))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-institute layout of the metadata fields at a reference resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    /// Text expected in the key crop, only its first word is compared
    pub key_str: String,
    pub reference_width: u32,
    pub reference_height: u32,
    pub key: PixelRect,
    pub patient_id: PixelRect,
    pub gestation: PixelRect,
    pub exam_date: PixelRect,
    pub vessel_type: PixelRect,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    ColourIsolation,
    TextExtraction,
    Metadata,
    Segmentation,
    RoiLocation,
    LeftAxis,
    RightAxis,
    CurveTrace,
    Calibration,
    Correction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ColourIsolation => "colour isolation",
            Stage::TextExtraction => "text extraction",
            Stage::Metadata => "metadata",
            Stage::Segmentation => "waveform segmentation",
            Stage::RoiLocation => "ROI location",
            Stage::LeftAxis => "left axis",
            Stage::RightAxis => "right axis",
            Stage::CurveTrace => "curve trace",
            Stage::Calibration => "calibration",
            Stage::Correction => "value correction",
        };
        write!(f, "{}", name)
    }
}

/// Machine-readable cause of a failed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    EmptyImage,
    NoWaveformRegion,
    /// The axis search region lies outside the image
    EmptyAxisRegion { side: Side },
    TooFewTicks { side: Side, found: usize },
    EmptyTrace,
    InsufficientData { axis: Axis, found: usize },
    DegenerateAxis { axis: Axis },
    NoTemplates,
    UnknownInstitute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageStatus {
    Succeeded,
    /// Output produced with reduced confidence
    Degraded { reason: String },
    Failed { kind: FailureKind, reason: String },
    /// Not run because a prerequisite stage produced nothing
    Skipped { missing: Stage },
}

impl StageStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, StageStatus::Succeeded | StageStatus::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub status: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageReport {
    pub entries: Vec<StageEntry>,
}

impl StageReport {
    pub fn record(&mut self, stage: Stage, status: StageStatus) {
        self.entries.push(StageEntry { stage, status });
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.entries
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| &e.status)
    }

    /// True when any stage failed or degraded
    pub fn low_confidence(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.status, StageStatus::Failed { .. } | StageStatus::Degraded { .. }))
    }
}

/// Everything one pipeline run produced, partial or complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitizationReport {
    pub metadata: MetadataRecord,
    pub bounding_box: Option<BoundingBox>,
    pub rois: Vec<Roi>,
    pub ticks: Vec<TickSet>,
    pub trace: Option<CurveTrace>,
    pub series: Option<CalibratedSeries>,
    pub table: ResultTable,
    pub stages: StageReport,
}

/// Output files written for each processed image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Json,
    Svg,
    Both,
}

impl OutputFormat {
    pub fn writes_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }

    pub fn writes_svg(&self) -> bool {
        matches!(self, OutputFormat::Svg | OutputFormat::Both)
    }
}
