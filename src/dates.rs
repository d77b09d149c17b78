//! Calendar-month labels used on chart x-axes.
//!
//! Labels carry their own quote characters, e.g. `"2024.03.01"` including the
//! quotes. They are parsed strictly and rendered back in the same shape.

use chrono::NaiveDate;

use crate::error::{PipelineError, PipelineResult};

const LABEL_FORMAT: &str = "\"%Y.%m.%d\"";

/// Parse a quoted `YYYY.MM.DD` label into a date.
pub fn parse_label(label: &str) -> PipelineResult<NaiveDate> {
    NaiveDate::parse_from_str(label, LABEL_FORMAT)
        .map_err(|e| PipelineError::Decode(format!("invalid calendar month {}: {}", label, e)))
}

/// Render a date as a quoted `YYYY.MM.DD` label.
pub fn render_label(date: NaiveDate) -> String {
    date.format(LABEL_FORMAT).to_string()
}

/// Sort labels ascending by date. Equal dates keep their input order.
pub fn sort_labels<S: AsRef<str>>(labels: &[S]) -> PipelineResult<Vec<String>> {
    let mut dates = labels
        .iter()
        .map(|l| parse_label(l.as_ref()))
        .collect::<PipelineResult<Vec<_>>>()?;
    dates.sort();
    Ok(dates.into_iter().map(render_label).collect())
}
