//! Resolution of which quarter of the fiscal year is currently editable,
//! which quarters are locked, and which are visible at all.

use chrono::{Datelike, NaiveDate};

use crate::error::Result;
use crate::schema::Quarter;
use crate::utils::{fiscal_month_index, validate_fiscal_year_end_month};

/// The quarter posture of one report session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuarterContext {
    current: Quarter,
}

impl QuarterContext {
    pub fn new(current: Quarter) -> Self {
        Self { current }
    }

    /// Resolves the current quarter from a reporting date and the fiscal
    /// year-end month (6 for the July-June fiscal year health programs
    /// run on, 12 for calendar-year programs).
    pub fn for_date(date: NaiveDate, fiscal_year_end_month: u32) -> Result<Self> {
        validate_fiscal_year_end_month(fiscal_year_end_month)?;
        let month_index = fiscal_month_index(date.month(), fiscal_year_end_month);
        let current = Quarter::ALL[month_index / 3];
        Ok(Self { current })
    }

    pub fn current(&self) -> Quarter {
        self.current
    }

    /// Only the current quarter accepts edits.
    pub fn is_editable(&self, quarter: Quarter) -> bool {
        quarter == self.current
    }

    /// Earlier quarters are locked: their figures were finalized when
    /// those quarters were current.
    pub fn is_locked(&self, quarter: Quarter) -> bool {
        quarter < self.current
    }

    /// Future quarters are hidden entirely.
    pub fn visible_quarters(&self) -> Vec<Quarter> {
        Quarter::ALL
            .iter()
            .copied()
            .filter(|q| *q <= self.current)
            .collect()
    }
}
