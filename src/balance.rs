//! The Balance Calculator: double-entry derivation of Cash at Bank,
//! Payables, VAT Receivables, and Other Receivables for every quarter of
//! the report, chained Q1 through Q4.

use std::collections::{BTreeMap, BTreeSet};

use crate::activity_tree::{ActivityTree, Mappings};
use crate::error::{EngineError, Result};
use crate::ledger::build_ledger;
use crate::rollover::RolloverResolver;
use crate::schema::{
    ActivityValue, PreviousQuarterBalances, Quarter, Quarterly, Section, ValueMap, VatCategory,
};

/// Whether a derived balance may go below zero.
///
/// Payables and VAT receivables clamp: a negative payable or refund claim
/// is nonsensical. Other Receivables does not: a negative balance is the
/// over-clearance signal the Validator reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativePolicy {
    ClampToZero,
    AllowNegative,
}

impl NegativePolicy {
    pub fn apply(self, balance: f64) -> f64 {
        match self {
            NegativePolicy::ClampToZero => balance.max(0.0),
            NegativePolicy::AllowNegative => balance,
        }
    }
}

pub const PAYABLE_POLICY: NegativePolicy = NegativePolicy::ClampToZero;
pub const VAT_POLICY: NegativePolicy = NegativePolicy::ClampToZero;
pub const OTHER_RECEIVABLE_POLICY: NegativePolicy = NegativePolicy::AllowNegative;

/// Every balance the calculator derives, per quarter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSet {
    pub cash: Quarterly<f64>,
    pub payables: BTreeMap<String, Quarterly<f64>>,
    pub vat: BTreeMap<VatCategory, Quarterly<f64>>,
    pub other_receivables: Quarterly<f64>,
    pub prior_year_adjustments: Quarterly<f64>,
}

pub struct BalanceCalculator<'a> {
    tree: &'a ActivityTree,
    mappings: &'a Mappings,
    previous: &'a PreviousQuarterBalances,
}

impl<'a> BalanceCalculator<'a> {
    pub fn new(
        tree: &'a ActivityTree,
        mappings: &'a Mappings,
        previous: &'a PreviousQuarterBalances,
    ) -> Self {
        Self {
            tree,
            mappings,
            previous,
        }
    }

    /// Derives all stock balances for all four quarters.
    ///
    /// The cross-execution rollover seeds Q1 only; each later quarter
    /// opens at the previous quarter's own computed balance. That is the
    /// intra-year chaining the stock cumulative rule depends on.
    pub fn compute(&self, values: &ValueMap) -> BalanceSet {
        let rollover = RolloverResolver::new(self.previous);
        let opening_payables = rollover.opening_payables();
        let opening_vat = rollover.opening_vat();

        let mut payable_codes: BTreeSet<String> = self
            .tree
            .leaves(Section::E)
            .map(|a| a.code.clone())
            .collect();
        payable_codes.extend(opening_payables.keys().cloned());

        let mut set = BalanceSet::default();
        for code in &payable_codes {
            set.payables.insert(code.clone(), Quarterly::default());
        }
        for category in VatCategory::ALL {
            set.vat.insert(category, Quarterly::default());
        }

        for quarter in Quarter::ALL {
            let ledger = build_ledger(self.tree, self.mappings, values, quarter);

            let receipts = self.section_flow(values, Section::A, quarter);
            let misc_adjustments = self.section_flow(values, Section::X, quarter);
            let paid_expenses: f64 = ledger.iter().map(|l| l.amount_paid).sum();

            let vat_cleared_by_category = self.vat_cleared(values, quarter);
            let vat_cleared_total: f64 = vat_cleared_by_category.values().sum();

            let payables_cleared_total: f64 = payable_codes
                .iter()
                .map(|code| *field(values, code).payable_cleared.get(quarter))
                .sum();

            let other_value = field(values, &self.mappings.other_receivables_code);
            let other_cleared = *other_value.other_receivable_cleared.get(quarter);
            let other_pya = *other_value.prior_year_adjustment.get(quarter);

            let cash_pya = *field(values, &self.mappings.cash_code)
                .prior_year_adjustment
                .get(quarter);

            // 1. Cash at Bank
            let opening_cash = match quarter.prev() {
                None => rollover.opening_cash(&self.mappings.cash_code),
                Some(prev) => *set.cash.get(prev),
            };
            *set.cash.get_mut(quarter) = opening_cash + receipts - paid_expenses
                - misc_adjustments
                + vat_cleared_total
                - payables_cleared_total
                + other_cleared
                + cash_pya;

            // 2. Payables, one balance per payable code
            for code in &payable_codes {
                let opening = match quarter.prev() {
                    None => opening_payables.get(code).copied().unwrap_or(0.0),
                    Some(prev) => *set.payables[code].get(prev),
                };
                let accrued: f64 = ledger
                    .iter()
                    .filter(|l| l.payable_code.as_deref() == Some(code))
                    .map(|l| l.unpaid_portion())
                    .sum();
                let value = field(values, code);
                let cleared = *value.payable_cleared.get(quarter);
                let pya = *value.prior_year_adjustment.get(quarter);

                *set.payables.get_mut(code).unwrap().get_mut(quarter) =
                    PAYABLE_POLICY.apply(opening + accrued - cleared + pya);
            }

            // 3. VAT receivables, one balance per category
            for category in VatCategory::ALL {
                let opening = match quarter.prev() {
                    None => opening_vat.get(&category).copied().unwrap_or(0.0),
                    Some(prev) => *set.vat[&category].get(prev),
                };
                let incurred: f64 = ledger
                    .iter()
                    .filter(|l| l.vat_category == Some(category))
                    .map(|l| l.vat)
                    .sum();
                let cleared = vat_cleared_by_category
                    .get(&category)
                    .copied()
                    .unwrap_or(0.0);
                let pya = self
                    .mappings
                    .vat_code(category)
                    .map(|code| *field(values, code).prior_year_adjustment.get(quarter))
                    .unwrap_or(0.0);

                *set.vat.get_mut(&category).unwrap().get_mut(quarter) =
                    VAT_POLICY.apply(opening + incurred - cleared + pya);
            }

            // 4. Other receivables, deliberately unclamped
            let opening_other = match quarter.prev() {
                None => rollover.opening_other_receivables(&self.mappings.other_receivables_code),
                Some(prev) => *set.other_receivables.get(prev),
            };
            *set.other_receivables.get_mut(quarter) = OTHER_RECEIVABLE_POLICY
                .apply(opening_other + misc_adjustments + other_pya - other_cleared);

            *set.prior_year_adjustments.get_mut(quarter) =
                field(values, &self.mappings.prior_year_adjustments_code)
                    .amounts
                    .reported_or_zero(quarter);
        }

        set
    }

    fn section_flow(&self, values: &ValueMap, section: Section, quarter: Quarter) -> f64 {
        self.tree
            .leaves(section)
            .filter(|a| a.is_editable)
            .map(|a| field(values, &a.code).amounts.reported_or_zero(quarter))
            .sum()
    }

    /// VAT cleared per category: refunds recorded on the Section-D VAT
    /// line plus any recorded against individual expenses of the category.
    fn vat_cleared(&self, values: &ValueMap, quarter: Quarter) -> BTreeMap<VatCategory, f64> {
        let mut cleared = BTreeMap::new();
        for category in VatCategory::ALL {
            let mut total = 0.0;
            if let Some(code) = self.mappings.vat_code(category) {
                total += *field(values, code).vat_cleared.get(quarter);
            }
            for activity in self.tree.leaves(Section::B) {
                if activity.vat_category == Some(category) {
                    total += *field(values, &activity.code).vat_cleared.get(quarter);
                }
            }
            cleared.insert(category, total);
        }
        cleared
    }
}

fn field<'v>(values: &'v ValueMap, code: &str) -> &'v ActivityValue {
    static EMPTY: std::sync::OnceLock<ActivityValue> = std::sync::OnceLock::new();
    values
        .get(code)
        .unwrap_or_else(|| EMPTY.get_or_init(ActivityValue::default))
}

/// The target of a manual clearance or prior-year adjustment.
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustmentTarget {
    Cash,
    Payable(String),
    Vat(VatCategory),
    OtherReceivables,
}

/// Records a payable settlement. Double-entry: the cleared ledger on the
/// payable accumulates, and the cash formula subtracts the full cleared
/// amount the next recomputation. The payable balance itself floors at
/// zero by policy; cash always moves by exactly the amount requested.
pub fn clear_payable(
    values: &mut ValueMap,
    payable_code: &str,
    quarter: Quarter,
    amount: f64,
) -> Result<()> {
    ensure_positive(payable_code, amount)?;
    let entry = values.entry(payable_code.to_string()).or_default();
    *entry.payable_cleared.get_mut(quarter) += amount;
    Ok(())
}

/// Records a VAT refund receipt. The amount is capped at the category's
/// current balance so a refund can never drive the receivable negative;
/// the capped amount is returned and is what cash will gain.
pub fn clear_vat(
    values: &mut ValueMap,
    mappings: &Mappings,
    category: VatCategory,
    quarter: Quarter,
    amount: f64,
    current_balance: f64,
) -> Result<f64> {
    let code = mappings
        .vat_code(category)
        .ok_or(EngineError::MissingCatalogLine("VAT receivable"))?
        .to_string();
    ensure_positive(&code, amount)?;
    let applied = amount.min(current_balance.max(0.0));
    let entry = values.entry(code).or_default();
    *entry.vat_cleared.get_mut(quarter) += applied;
    Ok(applied)
}

/// Records collection of an other receivable. Unclamped: over-clearance
/// pushes the balance negative, which the Validator surfaces.
pub fn clear_other_receivable(
    values: &mut ValueMap,
    mappings: &Mappings,
    quarter: Quarter,
    amount: f64,
) -> Result<()> {
    ensure_positive(&mappings.other_receivables_code, amount)?;
    let entry = values
        .entry(mappings.other_receivables_code.clone())
        .or_default();
    *entry.other_receivable_cleared.get_mut(quarter) += amount;
    Ok(())
}

/// Posts a prior-year correction: once to the target line's adjustment
/// ledger (picked up by that balance's formula) and once to the dedicated
/// Prior Year Adjustments display line under Section G. Cash targets get
/// no separate balance mutation; the cash formula re-derives from its own
/// adjustment ledger.
pub fn post_prior_year_adjustment(
    values: &mut ValueMap,
    mappings: &Mappings,
    target: AdjustmentTarget,
    quarter: Quarter,
    amount: f64,
) -> Result<()> {
    let target_code = match &target {
        AdjustmentTarget::Cash => mappings.cash_code.clone(),
        AdjustmentTarget::Payable(code) => code.clone(),
        AdjustmentTarget::Vat(category) => mappings
            .vat_code(*category)
            .ok_or(EngineError::MissingCatalogLine("VAT receivable"))?
            .to_string(),
        AdjustmentTarget::OtherReceivables => mappings.other_receivables_code.clone(),
    };

    let entry = values.entry(target_code).or_default();
    *entry.prior_year_adjustment.get_mut(quarter) += amount;

    let display = values
        .entry(mappings.prior_year_adjustments_code.clone())
        .or_default();
    let slot = display.amounts.get_mut(quarter);
    *slot = Some(slot.unwrap_or(0.0) + amount);
    Ok(())
}

fn ensure_positive(target: &str, amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidClearance {
            target: target.to_string(),
            amount,
            details: "clearance amounts must be positive and finite".to_string(),
        })
    }
}
