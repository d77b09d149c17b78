//! Time-series chart assembly for the second dashboard panel.
//!
//! Health KPI rows (one per calendar month) and quarterly figure rows are
//! shaped into eight chart view-models, always in the same slot order:
//!
//! 1. Rolling 4 Qtr pipeline trend
//! 2. Qualified pipeline % trend
//! 3. Mature pipeline trend
//! 4. Coverage % trend
//! 5. 4 Qtr gap by quarter
//! 6. Rolling 2 Qtr pipeline trend
//! 7. Mature stage gap by quarter, with stage legend
//! 8. Coverage/maturity quadrant snapshot
//!
//! Scalars that are not series (targets, gap labels, growth footers, the
//! quadrant point and bucket counts) come from a single snapshot row. In
//! [`AxisOrder::Stored`] that is the first row as returned by the store, and the
//! y-axis series keep store order while the x-axis labels are sorted by date.
//! [`AxisOrder::Chronological`] sorts the rows first, which keeps both axes
//! aligned and snapshots the latest month.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::dates::{parse_label, sort_labels};
use crate::decoder::DecodedRow;
use crate::error::{PipelineError, PipelineResult};

/// Row ordering used when building the trend charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisOrder {
    #[default]
    Stored,
    Chronological,
}

impl FromStr for AxisOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stored" => Ok(Self::Stored),
            "chronological" => Ok(Self::Chronological),
            other => Err(format!("unknown axis order '{}'", other)),
        }
    }
}

// ============================================================================
// View-model types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChartViewModel {
    pub comments: &'static str,
    pub header: ChartHeader,
    pub body: ChartBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<ChartFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<Vec<GridBucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Vec<LegendEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartHeader {
    pub title: &'static str,
    pub subtitle: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChartBody {
    Trend(TrendBody),
    Gap(GapBody),
    Quadrant(QuadrantBody),
}

/// Line chart over calendar months.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBody {
    pub x_axis: Vec<String>,
    pub y_axis: Vec<Value>,
    pub target: Value,
    pub prefix: &'static str,
    pub suffix: &'static str,
    pub fill_color: &'static str,
}

/// Bar chart of gap against threshold, one bar per quarter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapBody {
    pub mature_values: Vec<Value>,
    pub threshold_values: Vec<Value>,
    pub mature_descriptions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ir_percent_values: Option<Vec<Value>>,
    pub target: Value,
    pub prefix: &'static str,
    pub suffix: &'static str,
    pub fill_colors: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantBody {
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub points: Vec<ScatterPoint>,
    pub fill_color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScatterPoint {
    pub x: Value,
    pub y: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartFooter {
    pub qoq: Value,
    pub yoy: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridBucket {
    pub label: &'static str,
    pub value: Value,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub weight: f64,
    pub color: &'static str,
}

// ============================================================================
// Fixed chart definitions
// ============================================================================

struct TrendSpec {
    slot: &'static str,
    title: &'static str,
    descriptor: &'static str,
    series: &'static str,
    target: &'static str,
    gap: &'static str,
    prefix: &'static str,
    suffix: &'static str,
    color: &'static str,
    footer: Option<(&'static str, &'static str)>,
}

const FOUR_QTR_TREND: TrendSpec = TrendSpec {
    slot: "1st chart",
    title: "Rolling 4 Qtr Pipeline",
    descriptor: "Open pipeline, next 4 quarters",
    series: "4rq_amount",
    target: "4rq_target",
    gap: "4rq_gap",
    prefix: "$",
    suffix: "M",
    color: "blue",
    footer: Some(("4rq_qoq_growth", "4rq_yoy_growth")),
};

const QUALIFIED_TREND: TrendSpec = TrendSpec {
    slot: "2nd chart",
    title: "Qualified Pipeline",
    descriptor: "Share of 4 Qtr pipeline in qualification stages",
    series: "qualified_percent",
    target: "qualification_target",
    gap: "qualification_gap",
    prefix: "",
    suffix: "%",
    color: "teal",
    footer: None,
};

const MATURE_TREND: TrendSpec = TrendSpec {
    slot: "3rd chart",
    title: "Mature Pipeline",
    descriptor: "4 Qtr pipeline in mature stages",
    series: "maturity_amount",
    target: "maturity_target",
    gap: "maturity_gap",
    prefix: "$",
    suffix: "M",
    color: "purple",
    footer: Some(("maturity_qoq_growth", "maturity_yoy_growth")),
};

const COVERAGE_TREND: TrendSpec = TrendSpec {
    slot: "4th chart",
    title: "Pipeline Coverage",
    descriptor: "Pipeline coverage of target",
    series: "coverage_percent",
    target: "coverage_target",
    gap: "coverage_gap",
    prefix: "",
    suffix: "%",
    color: "amber",
    footer: None,
};

const TWO_QTR_TREND: TrendSpec = TrendSpec {
    slot: "6th chart",
    title: "Rolling 2 Qtr Pipeline",
    descriptor: "Open pipeline, next 2 quarters",
    series: "2rq_amount",
    target: "2rq_target",
    gap: "2rq_gap",
    prefix: "$",
    suffix: "M",
    color: "indigo",
    footer: None,
};

const QUADRANT_BUCKETS: [(&str, &str, &str); 5] = [
    ("Low Pipe & Maturity", "low_pipe_and_maturity", "red"),
    ("Low Maturity", "low_maturity", "orange"),
    ("Low Pipe", "low_pipe", "yellow"),
    ("Ideal Pipe & Maturity", "ideal_pipe_and_maturity", "green"),
    ("High Risk", "high_risk", "rose"),
];

fn stage_legend() -> Vec<LegendEntry> {
    vec![
        LegendEntry {
            label: "Stage 4",
            weight: 0.9,
            color: "purple",
        },
        LegendEntry {
            label: "Stage 5",
            weight: 0.1,
            color: "violet",
        },
    ]
}

// ============================================================================
// Assembly
// ============================================================================

/// Build the eight chart view-models for one node.
///
/// Fails with `NotFound` when either input is empty, since the snapshot row
/// would not exist.
pub fn assemble_charts(
    kpi_rows: Vec<DecodedRow>,
    quarterly_rows: &[DecodedRow],
    order: AxisOrder,
) -> PipelineResult<Vec<ChartViewModel>> {
    if kpi_rows.is_empty() {
        return Err(PipelineError::NotFound("no health KPI rows".to_string()));
    }
    if quarterly_rows.is_empty() {
        return Err(PipelineError::NotFound("no quarterly figure rows".to_string()));
    }

    let kpi_rows = match order {
        AxisOrder::Stored => kpi_rows,
        AxisOrder::Chronological => sort_by_month(kpi_rows)?,
    };
    let snapshot = match order {
        AxisOrder::Stored => kpi_rows.first(),
        AxisOrder::Chronological => kpi_rows.last(),
    }
    .ok_or_else(|| PipelineError::NotFound("no health KPI rows".to_string()))?;

    let labels = kpi_rows
        .iter()
        .map(month_label)
        .collect::<PipelineResult<Vec<_>>>()?;
    let x_axis = sort_labels(&labels)?;

    let four_qtr_gap = gap_chart(
        "5th chart",
        "Rolling 4 Qtr Pipeline Gap",
        "Gap to target by quarter",
        snapshot,
        ("4rq_target", "4rq_gap"),
        quarterly_rows,
        ("4rq_gap", "4rq_target"),
        None,
        vec!["red", "gray"],
    )?;

    let mut mature_gap = gap_chart(
        "7th chart",
        "Mature Stage Pipeline Gap",
        "Mature stage gap to target by quarter",
        snapshot,
        ("maturity_target", "maturity_gap"),
        quarterly_rows,
        ("maturity_gap", "maturity_target"),
        Some("4rq_gap_percent"),
        vec!["purple", "gray"],
    )?;
    mature_gap.legend = Some(stage_legend());

    Ok(vec![
        trend_chart(&FOUR_QTR_TREND, snapshot, &kpi_rows, &x_axis)?,
        trend_chart(&QUALIFIED_TREND, snapshot, &kpi_rows, &x_axis)?,
        trend_chart(&MATURE_TREND, snapshot, &kpi_rows, &x_axis)?,
        trend_chart(&COVERAGE_TREND, snapshot, &kpi_rows, &x_axis)?,
        four_qtr_gap,
        trend_chart(&TWO_QTR_TREND, snapshot, &kpi_rows, &x_axis)?,
        mature_gap,
        quadrant_chart(snapshot)?,
    ])
}

fn trend_chart(
    spec: &TrendSpec,
    snapshot: &DecodedRow,
    rows: &[DecodedRow],
    x_axis: &[String],
) -> PipelineResult<ChartViewModel> {
    let y_axis = rows
        .iter()
        .map(|row| row.value(spec.series))
        .collect::<PipelineResult<Vec<_>>>()?;

    let footer = match spec.footer {
        Some((qoq, yoy)) => Some(ChartFooter {
            qoq: snapshot.value(qoq)?,
            yoy: snapshot.value(yoy)?,
        }),
        None => None,
    };

    Ok(ChartViewModel {
        comments: spec.slot,
        header: ChartHeader {
            title: spec.title,
            subtitle: vec![
                spec.descriptor.to_string(),
                gap_label(spec.prefix, snapshot.get(spec.gap)?, spec.suffix),
            ],
        },
        body: ChartBody::Trend(TrendBody {
            x_axis: x_axis.to_vec(),
            y_axis,
            target: snapshot.value(spec.target)?,
            prefix: spec.prefix,
            suffix: spec.suffix,
            fill_color: spec.color,
        }),
        footer,
        grid: None,
        legend: None,
    })
}

#[allow(clippy::too_many_arguments)]
fn gap_chart(
    slot: &'static str,
    title: &'static str,
    descriptor: &'static str,
    snapshot: &DecodedRow,
    (target, gap): (&str, &str),
    quarterly_rows: &[DecodedRow],
    (gap_column, threshold_column): (&str, &str),
    ir_column: Option<&str>,
    fill_colors: Vec<&'static str>,
) -> PipelineResult<ChartViewModel> {
    let mut mature_values = Vec::with_capacity(quarterly_rows.len());
    let mut threshold_values = Vec::with_capacity(quarterly_rows.len());
    let mut mature_descriptions = Vec::with_capacity(quarterly_rows.len());
    let mut ir_percent_values = ir_column.map(|_| Vec::with_capacity(quarterly_rows.len()));

    for row in quarterly_rows {
        mature_values.push(row.value(gap_column)?);
        threshold_values.push(row.value(threshold_column)?);
        mature_descriptions.push(row.value("title")?);
        if let (Some(column), Some(values)) = (ir_column, ir_percent_values.as_mut()) {
            values.push(row.value(column)?);
        }
    }

    Ok(ChartViewModel {
        comments: slot,
        header: ChartHeader {
            title,
            subtitle: vec![
                descriptor.to_string(),
                gap_label("$", snapshot.get(gap)?, "M"),
            ],
        },
        body: ChartBody::Gap(GapBody {
            mature_values,
            threshold_values,
            mature_descriptions,
            ir_percent_values,
            target: snapshot.value(target)?,
            prefix: "$",
            suffix: "M",
            fill_colors,
        }),
        footer: None,
        grid: None,
        legend: None,
    })
}

fn quadrant_chart(snapshot: &DecodedRow) -> PipelineResult<ChartViewModel> {
    let grid = QUADRANT_BUCKETS
        .iter()
        .map(|&(label, column, color)| {
            Ok(GridBucket {
                label,
                value: snapshot.value(column)?,
                color,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    Ok(ChartViewModel {
        comments: "8th chart",
        header: ChartHeader {
            title: "Pipeline Quadrant",
            subtitle: vec!["Reps by coverage and maturity".to_string()],
        },
        body: ChartBody::Quadrant(QuadrantBody {
            x_label: "Coverage Factor",
            y_label: "Mature Factor",
            points: vec![ScatterPoint {
                x: snapshot.value("coverage_factor")?,
                y: snapshot.value("mature_factor")?,
            }],
            fill_color: "blue",
        }),
        footer: None,
        grid: Some(grid),
        legend: None,
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn month_label(row: &DecodedRow) -> PipelineResult<String> {
    match row.get("calendar_month")? {
        Value::String(s) => Ok(s.clone()),
        other => Err(PipelineError::Decode(format!(
            "calendar_month is not a string: {}",
            other
        ))),
    }
}

/// Stable sort of KPI rows by their calendar month.
fn sort_by_month(rows: Vec<DecodedRow>) -> PipelineResult<Vec<DecodedRow>> {
    let mut keyed = rows
        .into_iter()
        .map(|row| {
            let date = parse_label(&month_label(&row)?)?;
            Ok((date, row))
        })
        .collect::<PipelineResult<Vec<_>>>()?;
    keyed.sort_by_key(|(date, _)| *date);
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

/// Second subtitle line, e.g. `Gap: $1.25M`.
fn gap_label(prefix: &str, value: &Value, suffix: &str) -> String {
    let rendered = match value {
        Value::Null => return "Gap: -".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("Gap: {}{}{}", prefix, rendered, suffix)
}
