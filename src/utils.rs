use serde_json::Value;

use crate::error::{EngineError, Result};

/// Coerces a raw JSON value into an amount, defaulting to 0.0 on anything
/// unparsable. Draft forms deliver amounts as numbers, numeric strings
/// (sometimes with thousands separators), empty strings, or nulls; none of
/// those may surface as an error or a NaN.
pub fn amount_or_zero(raw: &Value) -> f64 {
    match raw {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_amount_str(s),
        _ => 0.0,
    }
}

fn parse_amount_str(s: &str) -> f64 {
    let cleaned: String = s.chars().filter(|c| *c != ',' && *c != ' ').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

pub fn validate_fiscal_year_end_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(EngineError::InvalidFiscalYearEndMonth(month));
    }
    Ok(())
}

/// Returns the 0-based index of the month within the fiscal year.
///
/// # Examples
/// - If FY ends in Dec (12): Jan=0, Feb=1, ..., Dec=11
/// - If FY ends in June (6): July=0, Aug=1, ..., June=11
pub fn fiscal_month_index(calendar_month: u32, fiscal_year_end_month: u32) -> usize {
    let fy_start_month = if fiscal_year_end_month == 12 {
        1
    } else {
        fiscal_year_end_month + 1
    };

    if calendar_month >= fy_start_month {
        (calendar_month - fy_start_month) as usize
    } else {
        (calendar_month + 12 - fy_start_month) as usize
    }
}
