//! Extraction of opening balances from the prior quarter's closing
//! snapshot. Absent data is a zero opening balance, not an error: a
//! facility's first reporting quarter legitimately has no prior data.

use std::collections::BTreeMap;

use crate::codes;
use crate::schema::{PreviousQuarterBalances, Section, VatCategory};

pub struct RolloverResolver<'a> {
    previous: &'a PreviousQuarterBalances,
}

impl<'a> RolloverResolver<'a> {
    pub fn new(previous: &'a PreviousQuarterBalances) -> Self {
        Self { previous }
    }

    /// `previous.closing_balances[section][resolve(code)]`, or 0 when the
    /// snapshot, the section, or the code is absent. Never errors.
    pub fn opening_balance(&self, section: Section, code: &str) -> f64 {
        if !self.previous.exists {
            return 0.0;
        }
        let map = match section {
            Section::D => &self.previous.closing_balances.d,
            Section::E => &self.previous.closing_balances.e,
            _ => return 0.0,
        };
        map.get(&codes::resolve(code)).copied().unwrap_or(0.0)
    }

    pub fn opening_cash(&self, cash_code: &str) -> f64 {
        self.opening_balance(Section::D, cash_code)
    }

    /// The prior quarter's entire closing Section-E map, filtered to
    /// positive amounts. Legacy codes that resolve onto the same canonical
    /// payable sum rather than overwrite.
    pub fn opening_payables(&self) -> BTreeMap<String, f64> {
        if !self.previous.exists {
            return BTreeMap::new();
        }
        let mut payables = BTreeMap::new();
        for (code, amount) in &self.previous.closing_balances.e {
            if *amount > 0.0 {
                *payables.entry(codes::resolve(code)).or_insert(0.0) += amount;
            }
        }
        payables
    }

    /// VAT openings come from the dedicated VAT map when the snapshot has
    /// one; older snapshots kept VAT inside Section D, so the fallback
    /// reconstructs per-category openings from D entries whose code
    /// matches a VAT category.
    pub fn opening_vat(&self) -> BTreeMap<VatCategory, f64> {
        if !self.previous.exists {
            return BTreeMap::new();
        }
        if let Some(vat) = &self.previous.closing_balances.vat {
            return vat.clone();
        }

        let mut reconstructed = BTreeMap::new();
        for (code, amount) in &self.previous.closing_balances.d {
            if let Some(category) = codes::vat_category_from_code(&codes::resolve(code)) {
                *reconstructed.entry(category).or_insert(0.0) += amount;
            }
        }
        reconstructed
    }

    pub fn opening_other_receivables(&self, other_receivables_code: &str) -> f64 {
        self.opening_balance(Section::D, other_receivables_code)
    }
}
