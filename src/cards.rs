//! Metric cards for the overview panel.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::decoder::DecodedRow;
use crate::error::PipelineResult;
use crate::schema::OverviewLayout;

/// The five scored pipeline-health dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Coverage,
    Qualification,
    Maturity,
    Spread,
    Quality,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Coverage,
        Metric::Qualification,
        Metric::Maturity,
        Metric::Spread,
        Metric::Quality,
    ];

    /// Card key and title.
    pub fn key(self) -> &'static str {
        match self {
            Self::Coverage => "Coverage",
            Self::Qualification => "Qualification",
            Self::Maturity => "Maturity",
            Self::Spread => "Spread",
            Self::Quality => "Quality",
        }
    }

    /// Column prefix in the overview table.
    fn column_prefix(self) -> &'static str {
        match self {
            Self::Coverage => "coverage",
            Self::Qualification => "qualification",
            Self::Maturity => "maturity",
            Self::Spread => "spread",
            Self::Quality => "quality",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            Self::Coverage => "Rolling 4 Qtr Pipeline",
            Self::Qualification => "Rolling 4 Qtr Pipeline in Qualification Stages",
            Self::Maturity => "Rolling 4 Qtr Pipeline in Mature Stages",
            Self::Spread => "Reps Pipeline Health",
            Self::Quality => "Deal Hygiene",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricCard {
    pub values: Value,
    pub title: String,
    pub description: CardDescription,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDescription {
    pub content: Value,
    pub subtitle: String,
    // Reserved by the UI, never populated.
    pub bold_label: Vec<String>,
    pub link_label: Vec<String>,
    pub link_action: Vec<String>,
}

pub type MetricCards = BTreeMap<&'static str, MetricCard>;

/// Build the five cards for one overview row.
pub fn project_cards(row: &DecodedRow, layout: OverviewLayout) -> PipelineResult<MetricCards> {
    let mut cards = BTreeMap::new();

    for metric in Metric::ALL {
        let prefix = metric.column_prefix();
        let title = match layout {
            OverviewLayout::V1 => String::new(),
            OverviewLayout::V2 => metric.key().to_string(),
        };

        let card = MetricCard {
            values: row.value(&format!("{}_score", prefix))?,
            title,
            description: CardDescription {
                content: row.value(&format!("{}_insights", prefix))?,
                subtitle: metric.subtitle().to_string(),
                bold_label: Vec::new(),
                link_label: Vec::new(),
                link_action: Vec::new(),
            },
        };
        cards.insert(metric.key(), card);
    }

    Ok(cards)
}
