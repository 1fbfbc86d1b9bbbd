//! The report engine: owns the draft state for one report session and
//! recomputes every derived figure synchronously after each mutation.
//!
//! There is no incremental path. Cash chaining across quarters and the
//! per-category VAT sums depend on the entire current state, so every
//! mutation runs the full pass before control returns to the caller.

use std::collections::BTreeMap;

use crate::activity_tree::{ActivityTree, Mappings};
use crate::aggregate::{
    compute_totals, merge_balances, ReportedQuarters, TableProjection,
};
use crate::balance::{self, AdjustmentTarget, BalanceCalculator};
use crate::error::{EngineError, Result};
use crate::ingest::{normalize_values, RawActivityValue};
use crate::quarters::QuarterContext;
use crate::schema::{
    ComputedValues, PaymentStatus, PreviousQuarterBalances, Quarter, ValueMap, VatCategory,
};
use crate::validate::{self, ValidationResult};

/// One full derivation pass over a value map.
pub fn recompute(
    tree: &ActivityTree,
    mappings: &Mappings,
    previous: &PreviousQuarterBalances,
    values: &ValueMap,
) -> ComputedValues {
    let (_, computed) = recompute_with_merge(tree, mappings, previous, values);
    computed
}

fn recompute_with_merge(
    tree: &ActivityTree,
    mappings: &Mappings,
    previous: &PreviousQuarterBalances,
    values: &ValueMap,
) -> (ValueMap, ComputedValues) {
    let balances = BalanceCalculator::new(tree, mappings, previous).compute(values);
    let reported = ReportedQuarters::from_values(values);
    let merged = merge_balances(values, &balances, mappings, reported);
    let computed = compute_totals(tree, mappings, &merged, &balances, reported);
    (merged, computed)
}

/// The authoritative draft state of one report session.
///
/// The tree and the prior-quarter snapshot are fetched once and held
/// read-only; the value map is the only mutable state. Every mutation
/// recomputes before returning, so `computed()` is never stale.
pub struct ReportDraft {
    tree: ActivityTree,
    mappings: Mappings,
    previous: PreviousQuarterBalances,
    context: QuarterContext,
    values: ValueMap,
    merged: ValueMap,
    computed: ComputedValues,
}

impl ReportDraft {
    pub fn new(
        mut tree: ActivityTree,
        previous: PreviousQuarterBalances,
        context: QuarterContext,
        values: ValueMap,
    ) -> Result<Self> {
        tree.backfill_vat_categories();
        let mappings = Mappings::from_tree(&tree)?;
        log::info!(
            "opening report draft: {} activities, current quarter {}, prior snapshot {}",
            tree.total_activities(),
            context.current().label(),
            if previous.exists { previous.quarter.as_str() } else { "absent" }
        );
        let mut draft = Self {
            tree,
            mappings,
            previous,
            context,
            values,
            merged: ValueMap::new(),
            computed: ComputedValues::default(),
        };
        draft.recompute();
        Ok(draft)
    }

    /// Opens a draft from a raw collaborator payload, normalizing legacy
    /// shapes and legacy codes on the way in.
    pub fn from_raw(
        tree: ActivityTree,
        previous: PreviousQuarterBalances,
        context: QuarterContext,
        raw: &BTreeMap<String, RawActivityValue>,
    ) -> Result<Self> {
        Self::new(tree, previous, context, normalize_values(raw))
    }

    fn recompute(&mut self) {
        let (merged, computed) =
            recompute_with_merge(&self.tree, &self.mappings, &self.previous, &self.values);
        self.merged = merged;
        self.computed = computed;
        log::debug!(
            "recomputed: cash {:?}, closing balance {:.2}",
            self.computed.cash_at_bank,
            self.computed.closing_balance.cumulative_balance
        );
    }

    /// Rejects writes against unknown codes, non-editable lines, and
    /// quarters other than the current one.
    fn guard_edit(&self, code: &str, quarter: Quarter) -> Result<()> {
        let activity = self
            .tree
            .find(code)
            .ok_or_else(|| EngineError::UnknownActivity(code.to_string()))?;
        if !activity.is_editable {
            return Err(EngineError::NotEditable(code.to_string()));
        }
        if !self.context.is_editable(quarter) {
            return Err(EngineError::QuarterLocked(quarter));
        }
        Ok(())
    }

    fn guard_quarter(&self, quarter: Quarter) -> Result<()> {
        if self.context.is_editable(quarter) {
            Ok(())
        } else {
            Err(EngineError::QuarterLocked(quarter))
        }
    }

    /// Sets a reported amount. `None` clears the slot back to
    /// not-reported, which is distinct from a reported zero.
    pub fn set_amount(&mut self, code: &str, quarter: Quarter, amount: Option<f64>) -> Result<()> {
        self.guard_edit(code, quarter)?;
        let entry = self.values.entry(code.to_string()).or_default();
        *entry.amounts.get_mut(quarter) = amount;
        self.recompute();
        Ok(())
    }

    pub fn set_payment(
        &mut self,
        code: &str,
        quarter: Quarter,
        status: PaymentStatus,
        amount_paid: Option<f64>,
    ) -> Result<()> {
        self.guard_edit(code, quarter)?;
        let entry = self.values.entry(code.to_string()).or_default();
        *entry.payment_status.get_mut(quarter) = status;
        if let Some(paid) = amount_paid {
            *entry.amount_paid.get_mut(quarter) = paid;
        }
        self.recompute();
        Ok(())
    }

    /// Records the net/VAT split of a VAT-applicable invoice. The gross
    /// reported amount follows the split.
    pub fn set_vat_components(
        &mut self,
        code: &str,
        quarter: Quarter,
        net: f64,
        vat: f64,
    ) -> Result<()> {
        self.guard_edit(code, quarter)?;
        let entry = self.values.entry(code.to_string()).or_default();
        *entry.net_amount.get_mut(quarter) = net;
        *entry.vat_amount.get_mut(quarter) = vat;
        *entry.amounts.get_mut(quarter) = Some(net + vat);
        self.recompute();
        Ok(())
    }

    pub fn set_comment(&mut self, code: &str, comment: Option<String>) -> Result<()> {
        if self.tree.find(code).is_none() {
            return Err(EngineError::UnknownActivity(code.to_string()));
        }
        self.values.entry(code.to_string()).or_default().comment = comment;
        Ok(())
    }

    pub fn clear_payable(&mut self, payable_code: &str, quarter: Quarter, amount: f64) -> Result<()> {
        self.guard_quarter(quarter)?;
        if self.tree.find(payable_code).is_none() {
            return Err(EngineError::UnknownActivity(payable_code.to_string()));
        }
        balance::clear_payable(&mut self.values, payable_code, quarter, amount)?;
        self.recompute();
        Ok(())
    }

    /// Records a VAT refund receipt; returns the amount actually applied
    /// after capping at the category's current balance.
    pub fn clear_vat(&mut self, category: VatCategory, quarter: Quarter, amount: f64) -> Result<f64> {
        self.guard_quarter(quarter)?;
        let current = self
            .computed
            .vat_receivables
            .get(&category)
            .map(|q| *q.get(quarter))
            .unwrap_or(0.0);
        let applied =
            balance::clear_vat(&mut self.values, &self.mappings, category, quarter, amount, current)?;
        self.recompute();
        Ok(applied)
    }

    pub fn clear_other_receivable(&mut self, quarter: Quarter, amount: f64) -> Result<()> {
        self.guard_quarter(quarter)?;
        balance::clear_other_receivable(&mut self.values, &self.mappings, quarter, amount)?;
        self.recompute();
        Ok(())
    }

    pub fn post_prior_year_adjustment(
        &mut self,
        target: AdjustmentTarget,
        quarter: Quarter,
        amount: f64,
    ) -> Result<()> {
        self.guard_quarter(quarter)?;
        balance::post_prior_year_adjustment(&mut self.values, &self.mappings, target, quarter, amount)?;
        self.recompute();
        Ok(())
    }

    pub fn validate(&self, budget: Option<f64>) -> ValidationResult {
        validate::validate(&self.tree, &self.mappings, &self.values, &self.computed, budget)
    }

    pub fn computed(&self) -> &ComputedValues {
        &self.computed
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    pub fn context(&self) -> &QuarterContext {
        &self.context
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn table(&self) -> TableProjection {
        let reported = ReportedQuarters::from_values(&self.values);
        TableProjection::build(&self.tree, &self.mappings, &self.merged, &self.computed, reported)
    }
}
