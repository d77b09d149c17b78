//! Field-order contracts for the three source tables.
//!
//! `SELECT *` results are decoded positionally, so the order here must match
//! the column order of the deployed tables. The overview field list doubles as
//! the allow-list for insert and update bodies.

use std::str::FromStr;

const OVERVIEW_V1_FIELDS: &[&str] = &[
    "node",
    "coverage_4rq",
    "coverage_threshold",
    "qualification_4rq",
    "qualification_threshold",
    "maturity_4rq",
    "maturity_threshold",
    "spread_percent",
    "quality_percent",
    "coverage_score",
    "qualification_score",
    "maturity_score",
    "spread_score",
    "quality_score",
    "total_score",
    "spread_threshold",
    "quality_threshold",
    "coverage_score_status",
    "qualification_score_status",
    "maturity_score_status",
    "spread_score_status",
    "quality_score_status",
    "total_score_status",
    "2rq_open_pipe",
    "2rq_threshold",
    "openpipe_gap_final",
    "qualified_gap_final",
    "mature_gap_final",
    "coverage_insights",
    "qualification_insights",
    "maturity_insights",
    "spread_insights",
    "quality_insights",
    "parent",
];

// v1 plus the trailing display-name column.
const OVERVIEW_V2_FIELDS: &[&str] = &[
    "node",
    "coverage_4rq",
    "coverage_threshold",
    "qualification_4rq",
    "qualification_threshold",
    "maturity_4rq",
    "maturity_threshold",
    "spread_percent",
    "quality_percent",
    "coverage_score",
    "qualification_score",
    "maturity_score",
    "spread_score",
    "quality_score",
    "total_score",
    "spread_threshold",
    "quality_threshold",
    "coverage_score_status",
    "qualification_score_status",
    "maturity_score_status",
    "spread_score_status",
    "quality_score_status",
    "total_score_status",
    "2rq_open_pipe",
    "2rq_threshold",
    "openpipe_gap_final",
    "qualified_gap_final",
    "mature_gap_final",
    "coverage_insights",
    "qualification_insights",
    "maturity_insights",
    "spread_insights",
    "quality_insights",
    "parent",
    "node_label",
];

pub const HEALTH_KPI_FIELDS: &[&str] = &[
    "node",
    "calendar_month",
    "4rq_amount",
    "4rq_target",
    "4rq_gap",
    "4rq_percent",
    "4rq_qoq_growth",
    "4rq_yoy_growth",
    "qualification_amount",
    "qualification_target",
    "qualification_gap",
    "qualified_percent",
    "qualification_qoq_growth",
    "qualification_yoy_growth",
    "maturity_amount",
    "maturity_target",
    "maturity_gap",
    "maturity_percent",
    "maturity_qoq_growth",
    "maturity_yoy_growth",
    "coverage_percent",
    "coverage_target",
    "coverage_gap",
    "coverage_qoq_growth",
    "coverage_yoy_growth",
    "2rq_amount",
    "2rq_target",
    "2rq_gap",
    "2rq_percent",
    "2rq_qoq_growth",
    "2rq_yoy_growth",
    "coverage_factor",
    "mature_factor",
    "low_pipe_and_maturity",
    "low_maturity",
    "low_pipe",
    "ideal_pipe_and_maturity",
    "high_risk",
    "total_reps",
    "mature_stage4_amount",
    "mature_stage5_amount",
    "quarter",
    "parent",
    "updated_at",
];

pub const QUARTERLY_FIELDS: &[&str] = &[
    "node",
    "quarter",
    "title",
    "fiscal_year",
    "4rq_pipe",
    "4rq_gap",
    "4rq_target",
    "4rq_gap_percent",
    "maturity_pipe",
    "maturity_gap",
    "maturity_target",
    "maturity_gap_percent",
    "stage4_pipe",
    "stage5_pipe",
    "percentage_gap",
    "parent",
    "updated_at",
];

/// Which revision of the overview table is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverviewLayout {
    /// Base column set, cards carry no title.
    #[default]
    V1,
    /// Adds `node_label`, cards carry their title.
    V2,
}

impl OverviewLayout {
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::V1 => OVERVIEW_V1_FIELDS,
            Self::V2 => OVERVIEW_V2_FIELDS,
        }
    }
}

impl FromStr for OverviewLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(format!("unknown overview layout '{}'", other)),
        }
    }
}

/// A table name bound to its ordered field list.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub fields: &'static [&'static str],
}

impl TableSchema {
    pub fn new(name: impl Into<String>, fields: &'static [&'static str]) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Whether `field` is part of this table's contract.
    pub fn allows(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

/// The three tables the service reads, resolved against configuration.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub overview: TableSchema,
    pub health_kpi: TableSchema,
    pub quarterly: TableSchema,
    pub layout: OverviewLayout,
}

impl Catalog {
    pub fn new(
        layout: OverviewLayout,
        overview: impl Into<String>,
        health_kpi: impl Into<String>,
        quarterly: impl Into<String>,
    ) -> Self {
        Self {
            overview: TableSchema::new(overview, layout.fields()),
            health_kpi: TableSchema::new(health_kpi, HEALTH_KPI_FIELDS),
            quarterly: TableSchema::new(quarterly, QUARTERLY_FIELDS),
            layout,
        }
    }
}
