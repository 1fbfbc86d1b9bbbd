//! The expense ledger: every expenditure line normalized into
//! {gross, net, vat, status, paid} for one quarter. A pure transform over
//! the value map; nothing here mutates state.

use crate::activity_tree::{ActivityTree, Mappings};
use crate::schema::{PaymentStatus, Quarter, Section, ValueMap, VatCategory};

/// One expenditure line of the active quarter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseLine {
    pub code: String,
    pub name: String,
    /// Full invoice amount: net + VAT for VAT-applicable lines, the
    /// reported amount otherwise. The supplier liability accrues against
    /// this figure, not the net, because the VAT owed to the supplier
    /// stays in the payable until reclaimed from the tax authority.
    pub gross: f64,
    pub net: f64,
    pub vat: f64,
    pub vat_category: Option<VatCategory>,
    pub status: PaymentStatus,
    pub amount_paid: f64,
    /// Where the unpaid portion accrues. `None` marks transfers, which
    /// are always paid on receipt.
    pub payable_code: Option<String>,
}

impl ExpenseLine {
    pub fn unpaid_portion(&self) -> f64 {
        (self.gross - self.amount_paid).max(0.0)
    }
}

/// Builds the expense ledger for one quarter from the Section-B leaves.
///
/// VAT applicability comes from the activity's `vat_category`. VAT lines
/// read `net_amount`/`vat_amount` from their quarter slots (default 0);
/// non-VAT lines treat the reported amount as the net with zero VAT.
/// A line with a zero invoice is `Unpaid` regardless of recorded status.
pub fn build_ledger(
    tree: &ActivityTree,
    mappings: &Mappings,
    values: &ValueMap,
    quarter: Quarter,
) -> Vec<ExpenseLine> {
    tree.leaves(Section::B)
        .map(|activity| {
            let value = values.get(&activity.code).cloned().unwrap_or_default();
            let reported = value.amounts.reported_or_zero(quarter);

            let (net, vat) = match activity.vat_category {
                Some(_) => (
                    *value.net_amount.get(quarter),
                    *value.vat_amount.get(quarter),
                ),
                None => (reported, 0.0),
            };
            let gross = net + vat;

            let status = if gross == 0.0 {
                PaymentStatus::Unpaid
            } else {
                *value.payment_status.get(quarter)
            };

            let amount_paid = match status {
                PaymentStatus::Paid => gross,
                PaymentStatus::Partial => *value.amount_paid.get(quarter),
                PaymentStatus::Unpaid => 0.0,
            };

            ExpenseLine {
                code: activity.code.clone(),
                name: activity.name.clone(),
                gross,
                net,
                vat,
                vat_category: activity.vat_category,
                status,
                amount_paid,
                payable_code: mappings
                    .payable_for_expense(&activity.code)
                    .map(|s| s.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_tree::Mappings;
    use crate::schema::{ActivityValue, Quarterly};
    use crate::test_fixtures::sample_tree;
    use std::collections::BTreeMap;

    fn ledger_for(values: &ValueMap, quarter: Quarter) -> Vec<ExpenseLine> {
        let tree = sample_tree();
        let mappings = Mappings::from_tree(&tree).unwrap();
        build_ledger(&tree, &mappings, values, quarter)
    }

    fn line<'a>(ledger: &'a [ExpenseLine], code: &str) -> &'a ExpenseLine {
        ledger.iter().find(|l| l.code == code).unwrap()
    }

    #[test]
    fn test_non_vat_line_uses_reported_amount_as_net() {
        let mut values: ValueMap = BTreeMap::new();
        let mut salaries = ActivityValue::reported(Quarter::Q1, 400.0);
        *salaries.payment_status.get_mut(Quarter::Q1) = PaymentStatus::Paid;
        values.insert("HIV-HC-B-01".to_string(), salaries);

        let ledger = ledger_for(&values, Quarter::Q1);
        let salaries = line(&ledger, "HIV-HC-B-01");
        assert_eq!(salaries.net, 400.0);
        assert_eq!(salaries.vat, 0.0);
        assert_eq!(salaries.gross, 400.0);
        assert_eq!(salaries.amount_paid, 400.0);
        assert_eq!(salaries.payable_code.as_deref(), Some("HIV-HC-E-01"));
    }

    #[test]
    fn test_vat_line_reads_net_and_vat_submaps() {
        let mut values: ValueMap = BTreeMap::new();
        let mut phone = ActivityValue::reported(Quarter::Q2, 1000.0);
        phone.net_amount = Quarterly { q2: 1000.0, ..Default::default() };
        phone.vat_amount = Quarterly { q2: 180.0, ..Default::default() };
        *phone.payment_status.get_mut(Quarter::Q2) = PaymentStatus::Paid;
        values.insert("HIV-HC-B-02".to_string(), phone);

        let ledger = ledger_for(&values, Quarter::Q2);
        let phone = line(&ledger, "HIV-HC-B-02");
        assert_eq!(phone.net, 1000.0);
        assert_eq!(phone.vat, 180.0);
        assert_eq!(phone.gross, 1180.0);
        // A paid invoice is paid in full, VAT included.
        assert_eq!(phone.amount_paid, 1180.0);
        assert_eq!(phone.vat_category, Some(VatCategory::Communication));
    }

    #[test]
    fn test_partial_payment_uses_recorded_amount() {
        let mut values: ValueMap = BTreeMap::new();
        let mut fuel = ActivityValue::reported(Quarter::Q1, 500.0);
        fuel.net_amount = Quarterly { q1: 500.0, ..Default::default() };
        fuel.vat_amount = Quarterly { q1: 90.0, ..Default::default() };
        *fuel.payment_status.get_mut(Quarter::Q1) = PaymentStatus::Partial;
        *fuel.amount_paid.get_mut(Quarter::Q1) = 200.0;
        values.insert("HIV-HC-B-03".to_string(), fuel);

        let ledger = ledger_for(&values, Quarter::Q1);
        let fuel = line(&ledger, "HIV-HC-B-03");
        assert_eq!(fuel.amount_paid, 200.0);
        assert_eq!(fuel.unpaid_portion(), 390.0);
    }

    #[test]
    fn test_zero_invoice_defaults_to_unpaid() {
        let mut values: ValueMap = BTreeMap::new();
        let mut empty = ActivityValue::default();
        // Stale status left over from an abandoned edit.
        *empty.payment_status.get_mut(Quarter::Q1) = PaymentStatus::Paid;
        values.insert("HIV-HC-B-01".to_string(), empty);

        let ledger = ledger_for(&values, Quarter::Q1);
        let salaries = line(&ledger, "HIV-HC-B-01");
        assert_eq!(salaries.status, PaymentStatus::Unpaid);
        assert_eq!(salaries.amount_paid, 0.0);
    }

    #[test]
    fn test_transfers_have_no_payable() {
        let values: ValueMap = BTreeMap::new();
        let ledger = ledger_for(&values, Quarter::Q1);
        let transfer = line(&ledger, "HIV-HC-B-04");
        assert_eq!(transfer.payable_code, None);
    }

    #[test]
    fn test_ledger_is_pure() {
        let mut values: ValueMap = BTreeMap::new();
        values.insert(
            "HIV-HC-B-01".to_string(),
            ActivityValue::reported(Quarter::Q1, 100.0),
        );
        let before = values.clone();
        let _ = ledger_for(&values, Quarter::Q1);
        assert_eq!(values, before);
    }
}
