use std::collections::BTreeMap;

use execution_report_engine::*;

fn activity(
    code: &str,
    name: &str,
    section: Section,
    order: u32,
    activity_type: ActivityType,
    vat_category: Option<VatCategory>,
) -> Activity {
    let editable = matches!(
        activity_type,
        ActivityType::Regular | ActivityType::MiscellaneousAdjustment
    );
    Activity {
        code: code.to_string(),
        name: name.to_string(),
        section,
        subsection_code: None,
        display_order: order,
        activity_type,
        is_editable: editable,
        is_computed: !editable,
        vat_category,
    }
}

fn node(label: &str, order: u32, computed: bool, items: Vec<Activity>) -> SectionNode {
    SectionNode {
        label: label.to_string(),
        display_order: order,
        is_computed: computed,
        items,
        sub_categories: BTreeMap::new(),
    }
}

/// A dispensary-sized catalog: one receipt line, three expense lines (one
/// VAT-applicable, one transfer), matching payables, and the derived lines.
fn dispensary_tree() -> ActivityTree {
    use ActivityType::*;
    use Section::*;

    let mut sections = BTreeMap::new();
    sections.insert(
        A,
        node(
            "Receipts",
            1,
            false,
            vec![activity("MAL-DP-A-01", "Transfers from central programs", A, 1, Regular, None)],
        ),
    );
    sections.insert(
        B,
        node(
            "Expenditures",
            2,
            false,
            vec![
                activity("MAL-DP-B-01", "Salaries and wages", B, 1, Regular, None),
                activity(
                    "MAL-DP-B-02",
                    "Telephone and internet charges",
                    B,
                    2,
                    Regular,
                    Some(VatCategory::Communication),
                ),
                activity("MAL-DP-B-03", "Transfers to community units", B, 3, Regular, None),
            ],
        ),
    );
    sections.insert(C, node("Surplus / Deficit", 3, true, vec![]));
    sections.insert(
        D,
        node(
            "Financial Assets",
            4,
            true,
            vec![
                activity("MAL-DP-D-01", "Cash at bank", D, 1, ComputedAsset, None),
                activity("MAL-DP-D-02", "Other receivables", D, 2, ComputedAsset, None),
                activity(
                    "MAL-DP-D-VAT-COMMUNICATION",
                    "VAT receivable - communication",
                    D,
                    3,
                    VatReceivable,
                    Some(VatCategory::Communication),
                ),
            ],
        ),
    );
    sections.insert(
        E,
        node(
            "Financial Liabilities",
            5,
            true,
            vec![
                activity("MAL-DP-E-01", "Salary arrears payable", E, 1, ComputedAsset, None),
                activity("MAL-DP-E-02", "Telephone charges payable", E, 2, ComputedAsset, None),
            ],
        ),
    );
    sections.insert(F, node("Net Financial Assets", 6, true, vec![]));
    sections.insert(
        G,
        node(
            "Closing Balance",
            7,
            true,
            vec![
                activity("MAL-DP-G-01", "Accumulated surplus/deficit", G, 1, ComputedAsset, None),
                activity("MAL-DP-G-02", "Prior year adjustments", G, 2, ComputedAsset, None),
            ],
        ),
    );
    sections.insert(
        X,
        node(
            "Miscellaneous Adjustments",
            8,
            false,
            vec![activity(
                "MAL-DP-X-01",
                "Cash transferred to mobile money float",
                X,
                1,
                MiscellaneousAdjustment,
                None,
            )],
        ),
    );

    ActivityTree { sections }
}

fn previous_with_cash(cash: f64) -> PreviousQuarterBalances {
    let mut d = BTreeMap::new();
    d.insert("MAL-DP-D-01".to_string(), cash);
    PreviousQuarterBalances {
        exists: true,
        quarter: "2025-Q4".to_string(),
        closing_balances: ClosingBalances {
            d,
            e: BTreeMap::new(),
            vat: None,
        },
    }
}

#[test]
fn test_first_quarter_report() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        PreviousQuarterBalances::none(),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();

    draft.set_amount("MAL-DP-A-01", Quarter::Q1, Some(1000.0)).unwrap();
    draft.set_amount("MAL-DP-B-01", Quarter::Q1, Some(400.0)).unwrap();

    let computed = draft.computed();
    // Unpaid expense: cash untouched, payable accrues, period surplus 600.
    assert_eq!(computed.cash_at_bank.q1, 1000.0);
    assert_eq!(computed.payables["MAL-DP-E-01"].q1, 400.0);
    assert_eq!(computed.surplus.quarters.q1, 600.0);
}

#[test]
fn test_rollover_with_paid_expense() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        previous_with_cash(500.0),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();

    draft.set_amount("MAL-DP-B-01", Quarter::Q1, Some(200.0)).unwrap();
    draft
        .set_payment("MAL-DP-B-01", Quarter::Q1, PaymentStatus::Paid, None)
        .unwrap();

    assert_eq!(draft.computed().cash_at_bank.q1, 300.0);
    assert_eq!(draft.computed().payables["MAL-DP-E-01"].q1, 0.0);
}

#[test]
fn test_vat_refund_cycle() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        PreviousQuarterBalances::none(),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();

    draft
        .set_vat_components("MAL-DP-B-02", Quarter::Q1, 1000.0, 180.0)
        .unwrap();
    draft
        .set_payment("MAL-DP-B-02", Quarter::Q1, PaymentStatus::Paid, None)
        .unwrap();

    let before = draft.computed().clone();
    assert_eq!(before.cash_at_bank.q1, -1180.0);
    assert_eq!(before.payables["MAL-DP-E-02"].q1, 0.0);
    assert_eq!(before.vat_receivables[&VatCategory::Communication].q1, 180.0);

    let applied = draft
        .clear_vat(VatCategory::Communication, Quarter::Q1, 180.0)
        .unwrap();
    assert_eq!(applied, 180.0);

    let after = draft.computed();
    assert_eq!(after.vat_receivables[&VatCategory::Communication].q1, 0.0);
    assert_eq!(after.cash_at_bank.q1, before.cash_at_bank.q1 + 180.0);
}

#[test]
fn test_payable_clearance_double_entry() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        previous_with_cash(1000.0),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();
    draft.set_amount("MAL-DP-B-01", Quarter::Q1, Some(400.0)).unwrap();

    let before = draft.computed().clone();
    draft.clear_payable("MAL-DP-E-01", Quarter::Q1, 100.0).unwrap();
    let after = draft.computed();

    assert_eq!(
        after.payables["MAL-DP-E-01"].q1,
        before.payables["MAL-DP-E-01"].q1 - 100.0
    );
    assert_eq!(after.cash_at_bank.q1, before.cash_at_bank.q1 - 100.0);
}

#[test]
fn test_recompute_is_bit_identical_on_unchanged_input() {
    let tree = dispensary_tree();
    let previous = previous_with_cash(750.0);

    let mut values = ValueMap::new();
    values.insert(
        "MAL-DP-A-01".to_string(),
        ActivityValue::reported(Quarter::Q1, 320.5),
    );
    let mut expense = ActivityValue::reported(Quarter::Q2, 99.99);
    *expense.payment_status.get_mut(Quarter::Q2) = PaymentStatus::Partial;
    *expense.amount_paid.get_mut(Quarter::Q2) = 33.33;
    values.insert("MAL-DP-B-01".to_string(), expense);

    let first = compute_report(&tree, &previous, &values).unwrap();
    let second = compute_report(&tree, &previous, &values).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_derived_section_arithmetic_across_quarters() {
    let tree = dispensary_tree();
    let previous = previous_with_cash(500.0);

    let mut values = ValueMap::new();
    let mut receipts = ActivityValue::reported(Quarter::Q1, 800.0);
    *receipts.amounts.get_mut(Quarter::Q2) = Some(600.0);
    *receipts.amounts.get_mut(Quarter::Q3) = Some(0.0);
    values.insert("MAL-DP-A-01".to_string(), receipts);
    let mut expense = ActivityValue::reported(Quarter::Q1, 300.0);
    *expense.amounts.get_mut(Quarter::Q2) = Some(450.0);
    *expense.payment_status.get_mut(Quarter::Q1) = PaymentStatus::Paid;
    values.insert("MAL-DP-B-01".to_string(), expense);

    let computed = compute_report(&tree, &previous, &values).unwrap();

    for quarter in Quarter::ALL {
        assert_eq!(
            *computed.surplus.quarters.get(quarter),
            computed.receipts.quarters.get(quarter)
                - computed.expenditures.quarters.get(quarter)
        );
        assert_eq!(
            *computed.net_financial_assets.quarters.get(quarter),
            computed.financial_assets.quarters.get(quarter)
                - computed.financial_liabilities.quarters.get(quarter)
        );
    }

    // Flow cumulatives sum; stock cumulatives take the latest reported
    // quarter (Q3, where a zero was explicitly reported).
    assert_eq!(computed.receipts.cumulative_balance, 1400.0);
    assert_eq!(
        computed.net_financial_assets.cumulative_balance,
        *computed.net_financial_assets.quarters.get(Quarter::Q3)
    );
}

#[test]
fn test_closing_balance_counts_accumulated_surplus_once() {
    let tree = dispensary_tree();
    let previous = previous_with_cash(500.0);

    let mut values = ValueMap::new();
    let mut accumulated = ActivityValue::default();
    accumulated.amounts = Quarterly::from_fn(|_| Some(500.0));
    values.insert("MAL-DP-G-01".to_string(), accumulated);
    let mut receipts = ActivityValue::reported(Quarter::Q1, 100.0);
    *receipts.amounts.get_mut(Quarter::Q2) = Some(200.0);
    values.insert("MAL-DP-A-01".to_string(), receipts);

    let computed = compute_report(&tree, &previous, &values).unwrap();
    assert_eq!(
        computed.closing_balance.cumulative_balance,
        500.0 + computed.prior_year_adjustments.total() + computed.surplus.quarters.total()
    );
    assert_eq!(computed.closing_balance.cumulative_balance, 800.0);
    // F agrees: opening cash 500 plus 300 of receipts.
    assert_eq!(computed.net_financial_assets.cumulative_balance, 800.0);
}

#[test]
fn test_overpayment_produces_blocking_finding() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        PreviousQuarterBalances::none(),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();
    draft.set_amount("MAL-DP-B-01", Quarter::Q1, Some(100.0)).unwrap();
    draft
        .set_payment("MAL-DP-B-01", Quarter::Q1, PaymentStatus::Partial, Some(150.0))
        .unwrap();

    let result = draft.validate(None);
    assert!(!result.is_valid);
    assert!(result
        .blocking()
        .any(|f| f.field == "MAL-DP-B-01" && f.severity == Severity::Blocking));
}

#[test]
fn test_locked_quarter_rejects_edits_but_keeps_state() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        PreviousQuarterBalances::none(),
        QuarterContext::new(Quarter::Q2),
        ValueMap::new(),
    )
    .unwrap();

    let err = draft
        .set_amount("MAL-DP-A-01", Quarter::Q1, Some(1.0))
        .unwrap_err();
    assert!(matches!(err, EngineError::QuarterLocked(Quarter::Q1)));
    assert!(draft.values().is_empty());

    draft.set_amount("MAL-DP-A-01", Quarter::Q2, Some(700.0)).unwrap();
    assert_eq!(draft.computed().cash_at_bank.q2, 700.0);
}

#[test]
fn test_misc_adjustment_routes_to_other_receivables() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        previous_with_cash(1000.0),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();
    draft.set_amount("MAL-DP-X-01", Quarter::Q1, Some(250.0)).unwrap();

    let computed = draft.computed();
    assert_eq!(computed.cash_at_bank.q1, 750.0);
    assert_eq!(computed.other_receivables.q1, 250.0);

    draft.clear_other_receivable(Quarter::Q1, 250.0).unwrap();
    let computed = draft.computed();
    assert_eq!(computed.cash_at_bank.q1, 1000.0);
    assert_eq!(computed.other_receivables.q1, 0.0);
}

#[test]
fn test_legacy_payload_and_codes_normalize_on_ingest() {
    let raw_json = serde_json::json!({
        "MAL-DP-A-01": {
            "amounts": {"q1": "2,500"}
        },
        "MAL-DP-B-01": {
            "amounts": {"q1": 400},
            "payment_status": "paid",
            "amount_paid": 400
        },
        "MAL-DP-D-VAT-TELEPHONE": {
            "vat_cleared": {"q1": 50}
        }
    });
    let raw: BTreeMap<String, RawActivityValue> = serde_json::from_value(raw_json).unwrap();
    let values = normalize_values(&raw);

    assert_eq!(values["MAL-DP-A-01"].amounts.q1, Some(2500.0));
    // The scalar status shape applies to every quarter.
    assert_eq!(
        *values["MAL-DP-B-01"].payment_status.get(Quarter::Q3),
        PaymentStatus::Paid
    );
    // The legacy telephone code lands on the canonical communication line.
    assert!(values.contains_key("MAL-DP-D-VAT-COMMUNICATION"));
    assert!(!values.contains_key("MAL-DP-D-VAT-TELEPHONE"));
}

#[test]
fn test_prior_year_adjustment_flows_into_g() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        previous_with_cash(500.0),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();

    draft
        .post_prior_year_adjustment(AdjustmentTarget::Cash, Quarter::Q1, -45.0)
        .unwrap();

    let computed = draft.computed();
    assert_eq!(computed.cash_at_bank.q1, 455.0);
    assert_eq!(computed.prior_year_adjustments.q1, -45.0);
    assert_eq!(computed.closing_balance.quarters.q1, -45.0);
}

#[test]
fn test_table_projection_csv_export() {
    let mut draft = ReportDraft::new(
        dispensary_tree(),
        PreviousQuarterBalances::none(),
        QuarterContext::new(Quarter::Q1),
        ValueMap::new(),
    )
    .unwrap();
    draft.set_amount("MAL-DP-A-01", Quarter::Q1, Some(1000.0)).unwrap();

    let table = draft.table();
    let csv = table.to_csv();
    assert!(csv.starts_with("Section,Code,Name,Q1,Q2,Q3,Q4,Cumulative"));
    assert!(csv.contains("MAL-DP-A-01"));
    assert!(csv.contains("Cash at bank"));
    // Category rows precede their leaves and carry the section totals.
    let receipts_line = csv
        .lines()
        .find(|l| l.starts_with("A,,Receipts"))
        .unwrap();
    assert!(receipts_line.contains("1000.00"));
}
